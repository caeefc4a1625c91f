//! Element location by semantic role.
//!
//! The page markup offers no stable contract: the "same" control appears
//! under several DOM shapes depending on layout experiments and viewport.
//! Each semantic [`Role`] therefore maps to an ordered list of structural
//! strategies, recomputed at resolution time and tried in sequence — the
//! first strategy that yields a usable element wins, and exhausting the list
//! is an attempt-local `NotFound`, never a run-level fault.

use crate::driver::{DriverPort, ElementHandle, Strategy, WAIT_POLL};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Semantic role of a control or datum the workflow needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Post-login landmark confirming an authenticated surface.
    NavLandmark,
    /// Primary invite control on a profile detail page.
    ConnectButton,
    /// Overflow menu trigger on profiles that tuck Connect away.
    MoreButton,
    /// Connect entry inside the opened overflow menu.
    ConnectMenuItem,
    /// "Add a note" control inside the invite modal.
    AddNoteButton,
    /// Free-text note input inside the invite modal.
    NoteInput,
    /// Submit control for an invite carrying a note.
    SendInvite,
    /// Submit control for a note-less invite.
    SendWithoutNote,
    /// Pagination control on the search results surface.
    NextPage,
    /// Platform's "no invitations remaining" banner.
    RateLimitBanner,
    /// Display-name heading on a profile detail page.
    ProfileHeading,
    /// Login form fields and controls.
    LoginIdentifier,
    LoginSecret,
    LoginSubmit,
    /// Second-factor challenge fields.
    ChallengePinInput,
    ChallengePinSubmit,
    /// Location refinement controls on the search surface.
    GeoFilterButton,
    GeoLocationInput,
    GeoApplyButton,
    /// A geo suggestion matching this exact visible text.
    GeoOption(String),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::GeoOption(text) => write!(f, "GeoOption({text})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Ordered structural strategies for a role, most specific first.
/// Recomputed per resolution; carries no persistent identity.
pub fn strategies(role: &Role) -> Vec<Strategy> {
    match role {
        Role::NavLandmark => vec![
            Strategy::css("#global-nav-typeahead"),
            Strategy::css("input.search-global-typeahead__input"),
        ],
        Role::ConnectButton => vec![
            Strategy::xpath("//button[.//span[text()='Connect'] and not(@disabled)]"),
            Strategy::xpath("//main//button[.//span[text()='Connect']]"),
            Strategy::css("button[aria-label$='to connect']"),
        ],
        Role::MoreButton => vec![
            Strategy::xpath("//button[.//span[normalize-space()='More']]"),
            Strategy::xpath("//main//button[@aria-label='More actions']"),
        ],
        Role::ConnectMenuItem => vec![
            Strategy::xpath(
                "//div[@role='menu']//span[text()='Connect']\
                 /ancestor::*[@role='menuitem' or @role='button'][1]",
            ),
            Strategy::xpath(
                "//div[contains(@class,'dropdown')]//span[text()='Connect']/parent::*",
            ),
        ],
        Role::AddNoteButton => vec![
            Strategy::xpath("//button[@aria-label='Add a note']"),
            Strategy::xpath("//button[.//span[text()='Add a note']]"),
        ],
        Role::NoteInput => vec![
            Strategy::xpath("//textarea[@name='message']"),
            Strategy::css("textarea#custom-message"),
        ],
        Role::SendInvite => vec![
            Strategy::xpath("//button[@aria-label='Send invitation']"),
            Strategy::xpath("//button[@aria-label='Send now' or .//span[text()='Send']]"),
        ],
        Role::SendWithoutNote => vec![
            Strategy::xpath(
                "//button[@aria-label='Send now' or @aria-label='Send without a note']",
            ),
            Strategy::xpath("//button[.//span[text()='Send without a note']]"),
        ],
        Role::NextPage => vec![Strategy::xpath("//button[@aria-label='Next']")],
        Role::ProfileHeading => vec![
            Strategy::xpath("//h1[contains(@class,'text-heading-xlarge')]"),
            Strategy::xpath("//main//h1"),
        ],
        Role::RateLimitBanner => vec![
            Strategy::xpath("//h2[text()='No free personalized invitations left']"),
            Strategy::xpath("//*[contains(text(),'No free personalized invitations')]"),
        ],
        Role::LoginIdentifier => vec![Strategy::css("#username")],
        Role::LoginSecret => vec![Strategy::css("#password")],
        Role::LoginSubmit => vec![Strategy::xpath("//button[@type='submit']")],
        Role::ChallengePinInput => vec![Strategy::css("#input__email_verification_pin")],
        Role::ChallengePinSubmit => vec![Strategy::css("#email-pin-submit-button")],
        Role::GeoFilterButton => vec![Strategy::css("#searchFilter_geoUrn")],
        Role::GeoLocationInput => vec![Strategy::xpath("//input[@placeholder='Add a location']")],
        Role::GeoApplyButton => vec![Strategy::xpath(
            "//button[@aria-label='Apply current filter to show results']",
        )],
        Role::GeoOption(text) => vec![Strategy::xpath(format!(
            "//*[text()={}]",
            xpath_literal(text)
        ))],
    }
}

/// Quote `text` as an XPath string literal. XPath has no escape sequences, so
/// text containing both quote kinds must be split through `concat()`.
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    let parts: Vec<String> = text
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(r#", "'", "#))
}

/// Candidate invite controls on a search results page (bulk query).
pub fn candidate_controls_strategy() -> Strategy {
    Strategy::xpath("//*[text()='Connect']/..")
}

/// Ancestor-container / descendant-link pairs used to resolve the profile
/// link and display name belonging to a candidate row. Tried in order; the
/// last pair is the most generic.
const IDENTITY_CHAIN: &[(&str, &str)] = &[
    (
        "./ancestor::div[contains(@class, 'entity-result')]",
        ".//a[contains(@href, '/in/')]",
    ),
    (
        "./ancestor::li",
        ".//span[contains(@class, 'entity-result__title')]//a",
    ),
    (
        "./ancestor::*[contains(@class, 'result')]",
        ".//a[contains(@href, 'linkedin.com/in/')]",
    ),
];

/// Placeholder used when no display name can be resolved.
pub const NAME_PLACEHOLDER: &str = "there";

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("no strategy matched role {0}")]
    NotFound(String),

    #[error(transparent)]
    Driver(#[from] crate::driver::DriverError),
}

/// Resolves semantic roles against the live page through the driver port.
pub struct Locator<'a> {
    driver: &'a dyn DriverPort,
}

impl<'a> Locator<'a> {
    pub fn new(driver: &'a dyn DriverPort) -> Self {
        Self { driver }
    }

    /// Try each strategy for `role` once, in order. First usable element wins.
    pub async fn locate(&self, role: &Role) -> Result<ElementHandle, LocateError> {
        for strategy in strategies(role) {
            match self.driver.query(&strategy).await {
                Ok(Some(el)) => {
                    tracing::debug!("locate {role}: matched via {:?}", strategy.as_str());
                    return Ok(el);
                }
                Ok(None) => continue,
                Err(e) => {
                    // A single failing strategy never decides the role.
                    tracing::debug!("locate {role}: strategy error ({e}), trying next");
                    continue;
                }
            }
        }
        Err(LocateError::NotFound(role.to_string()))
    }

    /// Like [`Self::locate`] but re-runs the full strategy chain every poll
    /// tick until `timeout` elapses.
    pub async fn wait_locate(
        &self,
        role: &Role,
        timeout: Duration,
    ) -> Result<ElementHandle, LocateError> {
        let start = tokio::time::Instant::now();
        loop {
            if let Ok(el) = self.locate(role).await {
                return Ok(el);
            }
            if start.elapsed() >= timeout {
                return Err(LocateError::NotFound(role.to_string()));
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    /// Whether any strategy for `role` currently matches.
    pub async fn present(&self, role: &Role) -> bool {
        self.locate(role).await.is_ok()
    }

    /// Resolve the profile address and best-effort display name belonging to
    /// a candidate invite control on the results surface.
    ///
    /// Walks [`IDENTITY_CHAIN`] in order; within the winning container the
    /// name degrades gracefully: visible link text → `aria-label` → `None`
    /// (callers substitute [`NAME_PLACEHOLDER`]). Returns `None` only when
    /// every ancestor pair fails — the caller skips the candidate.
    pub async fn candidate_identity(
        &self,
        anchor: ElementHandle,
    ) -> Option<(String, Option<String>)> {
        for (idx, (container_expr, link_expr)) in IDENTITY_CHAIN.iter().enumerate() {
            let container = match self
                .driver
                .query_within(anchor, &Strategy::xpath(*container_expr))
                .await
            {
                Ok(Some(c)) => c,
                _ => {
                    tracing::debug!("candidate identity: chain {} missed container", idx + 1);
                    continue;
                }
            };
            let link = match self
                .driver
                .query_within(container, &Strategy::xpath(*link_expr))
                .await
            {
                Ok(Some(l)) => l,
                _ => {
                    tracing::debug!("candidate identity: chain {} missed link", idx + 1);
                    continue;
                }
            };
            let Ok(Some(href)) = self.driver.attribute(link, "href").await else {
                continue;
            };

            let name = match self.driver.text(link).await {
                Ok(Some(t)) if !t.trim().is_empty() => Some(t),
                _ => self
                    .driver
                    .attribute(link, "aria-label")
                    .await
                    .ok()
                    .flatten(),
            };
            return Some((href, name.filter(|n| !n.trim().is_empty())));
        }
        None
    }
}
