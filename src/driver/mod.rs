//! Browser driver port.
//!
//! The orchestrator never talks to a browser library directly. Everything it
//! needs from the document surface is expressed through [`DriverPort`], a
//! capability trait over one serially-accessed page: navigation, structural
//! queries, activation channels, typing, cookies, and scroll. The production
//! implementation is [`cdp::CdpDriver`] on chromiumoxide; tests script a fake
//! against the same trait.

pub mod browser;
pub mod cdp;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Poll interval for bounded waits. Waits are polled, never busy-spun.
pub const WAIT_POLL: Duration = Duration::from_millis(250);

/// Opaque reference to a live DOM element.
///
/// Handles are only meaningful on the document they were resolved against; a
/// navigation or re-render invalidates them and subsequent operations report
/// [`DriverError::Stale`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u64);

/// One structural way of finding an element. The locator layer owns the
/// ordering of strategies per semantic role; the driver just executes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    Css(String),
    XPath(String),
}

impl Strategy {
    pub fn css(sel: impl Into<String>) -> Self {
        Strategy::Css(sel.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Strategy::XPath(expr.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Strategy::Css(s) | Strategy::XPath(s) => s,
        }
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("element reference is stale")]
    Stale,

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("script evaluation failed: {0}")]
    Eval(String),

    #[error("element is not interactable: {0}")]
    NotInteractable(String),
}

/// Capability surface over one authenticated, navigable document context.
///
/// All operations assume exclusive serial access; no two calls run
/// concurrently against the same session.
#[async_trait]
pub trait DriverPort: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    async fn refresh(&self) -> Result<(), DriverError>;

    /// Resolve the first element matching `strategy`, or `None`.
    async fn query(&self, strategy: &Strategy) -> Result<Option<ElementHandle>, DriverError>;

    /// Resolve the first match of `strategy` relative to `scope`.
    /// XPath strategies may use ancestor/descendant axes from the scope node.
    async fn query_within(
        &self,
        scope: ElementHandle,
        strategy: &Strategy,
    ) -> Result<Option<ElementHandle>, DriverError>;

    async fn query_all(&self, strategy: &Strategy) -> Result<Vec<ElementHandle>, DriverError>;

    /// Visible text of the element, `None` when empty.
    async fn text(&self, el: ElementHandle) -> Result<Option<String>, DriverError>;

    async fn attribute(
        &self,
        el: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Whether the handle still refers to a node attached to the document.
    async fn is_attached(&self, el: ElementHandle) -> Result<bool, DriverError>;

    /// Direct UI-level activation: real pointer event sequence with
    /// hit-testing. Fails when an overlay intercepts the point.
    async fn click(&self, el: ElementHandle) -> Result<(), DriverError>;

    /// Programmatic activation bypassing hit-testing.
    async fn click_forced(&self, el: ElementHandle) -> Result<(), DriverError>;

    /// Hover over the element, pause, then click — for controls that only
    /// become interactable on hover.
    async fn hover_click(&self, el: ElementHandle, pause: Duration) -> Result<(), DriverError>;

    async fn type_text(&self, el: ElementHandle, text: &str) -> Result<(), DriverError>;

    async fn get_cookie(&self, name: &str) -> Result<Option<String>, DriverError>;

    async fn set_cookie(&self, name: &str, value: &str, domain: &str)
        -> Result<(), DriverError>;

    async fn scroll_into_view(&self, el: ElementHandle) -> Result<(), DriverError>;

    async fn scroll_by(&self, x: i64, y: i64) -> Result<(), DriverError>;

    async fn scroll_to_bottom(&self) -> Result<(), DriverError>;

    /// Whether the rendered page text contains `needle` (login challenge
    /// detection).
    async fn page_contains(&self, needle: &str) -> Result<bool, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_as_str_exposes_selector() {
        assert_eq!(Strategy::css("#nav").as_str(), "#nav");
        assert_eq!(Strategy::xpath("//button").as_str(), "//button");
    }
}
