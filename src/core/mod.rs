pub mod config;
pub mod types;

pub use config::{ConfigStore, Degree, RunConfig, TargetMode, WaitProfile};
pub use types::{
    AttemptStatus, ConnectionAttempt, HaltReason, RunReport, SourceHint, TargetProfile,
};
