//! Target suppliers: the ordered stream of profiles to attempt.
//!
//! Two strategies, selected by run configuration: a live paginated search
//! feed read page-by-page off the results surface, or a pre-enumerated list
//! of profile addresses from an external sheet. The orchestrator consumes
//! either through [`TargetSupplier`], one target at a time, in yield order.

pub mod list;
pub mod search;

use crate::core::TargetProfile;
use async_trait::async_trait;
use thiserror::Error;

pub use list::ExplicitListSupplier;
pub use search::SearchResultSupplier;

#[derive(Debug, Error)]
pub enum SupplyError {
    #[error("target source unreachable or malformed: {0}")]
    Source(String),

    #[error(transparent)]
    Driver(#[from] crate::driver::DriverError),
}

#[async_trait]
pub trait TargetSupplier: Send {
    /// Next target in order, or `None` when the stream is exhausted.
    async fn next_target(&mut self) -> Result<Option<TargetProfile>, SupplyError>;
}
