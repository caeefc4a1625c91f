//! Activation with a fallback chain.
//!
//! Sticky headers, toast overlays, and hover-gated controls routinely
//! intercept the primary click channel. Rather than duplicating recovery
//! logic at every call site, activation is one explicit chain: direct
//! pointer click → forced programmatic click → simulated hover gesture.
//! Stage failures are swallowed; only full exhaustion surfaces, and the
//! workflow treats that as an attempt failure, never a run abort.

use crate::driver::{DriverPort, ElementHandle};
use std::time::Duration;
use thiserror::Error;

/// Pause between hover and click in the gesture stage, long enough for
/// hover-triggered visibility transitions to finish.
const HOVER_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
#[error("all activation channels failed: {last}")]
pub struct ActivationError {
    pub last: String,
}

/// Activate `el`, falling through the channel chain until one succeeds.
pub async fn activate(
    driver: &dyn DriverPort,
    el: ElementHandle,
) -> Result<(), ActivationError> {
    let direct_err = match driver.click(el).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    tracing::debug!("activation: direct click failed ({direct_err}), forcing");

    let forced_err = match driver.click_forced(el).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    tracing::debug!("activation: forced click failed ({forced_err}), trying hover gesture");

    match driver.hover_click(el, HOVER_PAUSE).await {
        Ok(()) => Ok(()),
        Err(e) => Err(ActivationError {
            last: e.to_string(),
        }),
    }
}
