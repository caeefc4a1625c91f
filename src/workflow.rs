//! Invitation workflow and run orchestration.
//!
//! One state machine drives every target through the attempt lifecycle,
//! regardless of which supplier produced it:
//!
//! `Pending → Resolving → Inviting → ComposingNote? → Submitted →
//!  Confirmed | Skipped | Failed | RateLimited`
//!
//! Locator and activation failures are caught at this boundary and converted
//! into terminal attempt statuses; only the rate/limit guard's platform
//! signal halts the whole run. Success is decided by the post-submit
//! re-check for the invite control — a click that "worked" is not trusted on
//! its own, because modals can close without the request registering.

use crate::actions;
use crate::core::{
    AttemptStatus, ConnectionAttempt, HaltReason, RunConfig, RunReport, TargetProfile,
    WaitProfile,
};
use crate::driver::{DriverPort, ElementHandle};
use crate::locate::{Locator, Role};
use crate::note;
use crate::targets::TargetSupplier;
use rand::distr::{Distribution, Uniform};
use std::time::Duration;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Rate/limit guard
// ---------------------------------------------------------------------------

/// Watches the two run-halting conditions: the platform's own invitation
/// ceiling and the caller's numeric limit.
pub struct LimitGuard {
    limit: usize,
}

impl LimitGuard {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Whether the platform surface currently shows the "no invitations
    /// remaining" signal.
    pub async fn platform_exhausted(&self, driver: &dyn DriverPort) -> bool {
        Locator::new(driver).present(&Role::RateLimitBanner).await
    }

    pub fn limit_reached(&self, sent: usize) -> bool {
        sent >= self.limit
    }
}

// ---------------------------------------------------------------------------
// Per-target workflow
// ---------------------------------------------------------------------------

pub struct InvitationWorkflow<'a> {
    driver: &'a dyn DriverPort,
    include_note: bool,
    note_template: Option<String>,
    wait: WaitProfile,
}

/// Vertical offset applied after scrolling a control into view, clearing the
/// sticky page header that otherwise intercepts the click point.
const STICKY_HEADER_OFFSET: i64 = -150;

impl<'a> InvitationWorkflow<'a> {
    pub fn new(driver: &'a dyn DriverPort, cfg: &RunConfig) -> Self {
        Self {
            driver,
            include_note: cfg.include_note,
            note_template: cfg.note_template.clone(),
            wait: cfg.wait,
        }
    }

    /// Drive one target through the full lifecycle. Always returns a
    /// terminal attempt; never propagates attempt-local faults.
    pub async fn attempt(
        &self,
        target: TargetProfile,
        guard: &LimitGuard,
    ) -> ConnectionAttempt {
        let mut attempt = ConnectionAttempt::new(target);
        let locator = Locator::new(self.driver);

        // Resolving: find the primary invite control.
        attempt.advance(AttemptStatus::Resolving);
        let invite = match self.resolve_invite_control(&mut attempt, &locator).await {
            Some(el) => el,
            None => return attempt, // settled to Skipped (or RateLimited)
        };

        // Inviting: activate it.
        attempt.advance(AttemptStatus::Inviting);
        self.clear_sticky_header(invite).await;
        if let Err(e) = actions::activate(self.driver, invite).await {
            attempt.settle(AttemptStatus::Failed, Some(format!("invite control: {e}")));
            return attempt;
        }
        tokio::time::sleep(self.wait.settle).await;

        // ComposingNote (conditional), then submit. A note failure is not
        // terminal — it falls back to the note-less send path.
        let submitted = if self.include_note {
            attempt.advance(AttemptStatus::ComposingNote);
            match self.compose_and_send_note(&attempt, &locator).await {
                Ok(()) => true,
                Err(reason) => {
                    warn!("note composition failed ({reason}); sending without note");
                    self.send_without_note(&locator).await.is_ok()
                }
            }
        } else {
            self.send_without_note(&locator).await.is_ok()
        };

        if !submitted {
            // Distinguish "platform is out of invitations" from plain failure.
            if guard.platform_exhausted(self.driver).await {
                attempt.settle(
                    AttemptStatus::RateLimited,
                    Some("platform invitation ceiling reached".into()),
                );
            } else {
                attempt.settle(
                    AttemptStatus::Failed,
                    Some("could not submit invitation".into()),
                );
            }
            return attempt;
        }
        attempt.advance(AttemptStatus::Submitted);

        // Confirmation: the re-check, not the click, is the authority. A
        // short settle-delay lets the control disappear asynchronously before
        // we decide (slow removal would otherwise read as failure).
        tokio::time::sleep(self.wait.settle).await;
        if self.invite_control_still_present(&attempt, &locator).await {
            attempt.settle(
                AttemptStatus::Failed,
                Some("invite control still present after submit".into()),
            );
        } else {
            attempt.settle(AttemptStatus::Confirmed, None);
        }
        attempt
    }

    /// Resolve the invite control for this target: reuse the live anchor from
    /// the results surface when present, otherwise open the profile detail
    /// page and look there (top-level button first, overflow menu second).
    /// Settles the attempt to `Skipped` and returns `None` on failure.
    async fn resolve_invite_control(
        &self,
        attempt: &mut ConnectionAttempt,
        locator: &Locator<'_>,
    ) -> Option<ElementHandle> {
        if let Some(anchor) = attempt.target.invite_anchor {
            match self.driver.is_attached(anchor).await {
                Ok(true) => return Some(anchor),
                _ => {
                    attempt.settle(
                        AttemptStatus::Skipped,
                        Some("candidate row went stale".into()),
                    );
                    return None;
                }
            }
        }

        // Detail-page path.
        let address = attempt.target.address.clone();
        if let Err(e) = self.driver.navigate(&address).await {
            attempt.settle(AttemptStatus::Skipped, Some(format!("navigation: {e}")));
            return None;
        }
        tokio::time::sleep(self.wait.settle).await;

        // Best-effort display name for note personalization.
        if attempt.target.display_name.is_none() && self.include_note {
            attempt.target.display_name = self.resolve_profile_name(locator).await;
        }

        if let Ok(el) = locator.wait_locate(&Role::ConnectButton, self.wait.control).await {
            return Some(el);
        }

        // Some layouts tuck Connect behind the overflow menu.
        debug!("no top-level invite control; trying overflow menu");
        if let Ok(more) = locator.wait_locate(&Role::MoreButton, self.wait.control).await {
            self.clear_sticky_header(more).await;
            if actions::activate(self.driver, more).await.is_ok() {
                tokio::time::sleep(self.wait.settle).await;
                if let Ok(item) = locator
                    .wait_locate(&Role::ConnectMenuItem, self.wait.control)
                    .await
                {
                    return Some(item);
                }
            }
        }

        attempt.settle(
            AttemptStatus::Skipped,
            Some("no invite control under any known layout".into()),
        );
        None
    }

    async fn resolve_profile_name(&self, locator: &Locator<'_>) -> Option<String> {
        let heading = locator.locate(&Role::ProfileHeading).await.ok()?;
        match self.driver.text(heading).await {
            Ok(Some(t)) if !t.trim().is_empty() => Some(t),
            _ => self
                .driver
                .attribute(heading, "aria-label")
                .await
                .ok()
                .flatten(),
        }
    }

    /// Open the note editor, insert the personalized text, and send.
    /// Any missing control is reported back as a reason string so the caller
    /// can fall through to the note-less path.
    async fn compose_and_send_note(
        &self,
        attempt: &ConnectionAttempt,
        locator: &Locator<'_>,
    ) -> Result<(), String> {
        let template = self
            .note_template
            .as_deref()
            .ok_or_else(|| "note requested but no template configured".to_string())?;

        let add_note = locator
            .wait_locate(&Role::AddNoteButton, self.wait.control)
            .await
            .map_err(|e| e.to_string())?;
        actions::activate(self.driver, add_note)
            .await
            .map_err(|e| e.to_string())?;

        let input = locator
            .wait_locate(&Role::NoteInput, self.wait.control)
            .await
            .map_err(|e| e.to_string())?;

        let first = attempt
            .target
            .display_name
            .as_deref()
            .and_then(note::first_name);
        let text = note::personalize(template, first.as_deref());
        self.driver
            .type_text(input, &text)
            .await
            .map_err(|e| e.to_string())?;
        tokio::time::sleep(self.wait.settle).await;

        let send = locator
            .locate(&Role::SendInvite)
            .await
            .map_err(|e| e.to_string())?;
        // The send control sits under the modal's focus trap; the forced
        // channel is the reliable one here.
        self.driver
            .click_forced(send)
            .await
            .map_err(|e| e.to_string())?;
        tokio::time::sleep(self.wait.settle).await;
        Ok(())
    }

    async fn send_without_note(&self, locator: &Locator<'_>) -> Result<(), String> {
        let send = locator
            .wait_locate(&Role::SendWithoutNote, self.wait.control)
            .await
            .map_err(|e| e.to_string())?;
        actions::activate(self.driver, send)
            .await
            .map_err(|e| e.to_string())?;
        tokio::time::sleep(self.wait.settle).await;
        Ok(())
    }

    /// Post-submit success re-check. For a search-feed target the original
    /// anchor is authoritative; for a detail-page target the control is
    /// re-queried at the same location.
    async fn invite_control_still_present(
        &self,
        attempt: &ConnectionAttempt,
        locator: &Locator<'_>,
    ) -> bool {
        if let Some(anchor) = attempt.target.invite_anchor {
            return self.driver.is_attached(anchor).await.unwrap_or(false);
        }
        locator.present(&Role::ConnectButton).await
    }

    async fn clear_sticky_header(&self, el: ElementHandle) {
        let _ = self.driver.scroll_into_view(el).await;
        let _ = self.driver.scroll_by(0, STICKY_HEADER_OFFSET).await;
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Process targets from the supplier until a halt condition fires. Always
/// produces a report; mid-run faults become `HaltReason::FatalError`, they
/// never panic or propagate.
pub async fn run(
    driver: &dyn DriverPort,
    supplier: &mut dyn TargetSupplier,
    cfg: &RunConfig,
) -> RunReport {
    let guard = LimitGuard::new(cfg.limit);
    let workflow = InvitationWorkflow::new(driver, cfg);
    let mut report = RunReport::new();

    loop {
        // Cancellation is cooperative and checked between attempts.
        if guard.limit_reached(report.sent) {
            report.halt(HaltReason::LimitReached);
            break;
        }
        if guard.platform_exhausted(driver).await {
            report.halt(HaltReason::PlatformRateLimited);
            break;
        }

        let target = match supplier.next_target().await {
            Ok(Some(t)) => t,
            Ok(None) => {
                report.halt(HaltReason::ExhaustedTargets);
                break;
            }
            Err(e) => {
                warn!("target supply failed mid-run: {e}");
                report.halt(HaltReason::FatalError);
                break;
            }
        };

        let address = target.address.clone();
        let attempt = workflow.attempt(target, &guard).await;
        let status = attempt.status();
        match status {
            AttemptStatus::Confirmed => info!("invitation sent to {address}"),
            AttemptStatus::RateLimited => warn!("platform invitation ceiling hit at {address}"),
            _ => info!(
                "{address}: {:?} ({})",
                status,
                attempt.reason.as_deref().unwrap_or("-")
            ),
        }
        report.absorb(attempt);

        if status == AttemptStatus::RateLimited {
            report.halt(HaltReason::PlatformRateLimited);
            break;
        }

        pace(cfg.wait.settle).await;
    }

    info!("run complete: {}", report.summary());
    report
}

/// Human-ish pause between attempts: the settle window plus a random slice
/// of it.
async fn pace(settle: Duration) {
    let base = settle.as_millis() as u64;
    let jitter = if base == 0 {
        0
    } else {
        let dist = match Uniform::new(0u64, base) {
            Ok(d) => d,
            Err(_) => return,
        };
        dist.sample(&mut rand::rng())
    };
    tokio::time::sleep(Duration::from_millis(base + jitter)).await;
}
