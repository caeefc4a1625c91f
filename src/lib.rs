pub mod actions;
pub mod auth;
pub mod core;
pub mod driver;
pub mod locate;
pub mod note;
pub mod operator;
pub mod targets;
pub mod workflow;

// --- Primary core exports ---
pub use crate::core::config::{ConfigStore, Degree, RunConfig, TargetMode, WaitProfile};
pub use crate::core::types::{
    AttemptStatus, ConnectionAttempt, HaltReason, RunReport, SourceHint, TargetProfile,
};
pub use driver::{DriverPort, ElementHandle, Strategy};
pub use targets::{ExplicitListSupplier, SearchResultSupplier, TargetSupplier};
