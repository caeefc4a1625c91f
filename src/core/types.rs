//! Domain model: targets, attempts, and the run report.

use crate::driver::ElementHandle;
use serde::Serialize;

/// Where a target came from. Search-feed candidates carry a live invite
/// anchor from the results surface; explicit-list targets are opened by
/// address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SourceHint {
    SearchResult,
    ExplicitList,
}

/// One profile to attempt. Identity is the address; the display name is
/// best-effort and only used for note personalization.
#[derive(Clone, Debug)]
pub struct TargetProfile {
    pub address: String,
    pub display_name: Option<String>,
    pub source: SourceHint,
    /// Invite control already resolved on the results surface, when the
    /// target was harvested from a search page. Stale after pagination.
    pub invite_anchor: Option<ElementHandle>,
}

impl TargetProfile {
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: None,
            source: SourceHint::ExplicitList,
            invite_anchor: None,
        }
    }
}

/// Lifecycle of one attempt. Transitions are monotonic — an attempt never
/// regresses to an earlier state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AttemptStatus {
    Pending,
    Resolving,
    Inviting,
    ComposingNote,
    Submitted,
    Confirmed,
    Skipped,
    Failed,
    RateLimited,
}

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptStatus::Confirmed
                | AttemptStatus::Skipped
                | AttemptStatus::Failed
                | AttemptStatus::RateLimited
        )
    }

    /// Ordering used to enforce monotonic transitions. Terminal states share
    /// the top rank; only one of them is ever reached.
    fn rank(self) -> u8 {
        match self {
            AttemptStatus::Pending => 0,
            AttemptStatus::Resolving => 1,
            AttemptStatus::Inviting => 2,
            AttemptStatus::ComposingNote => 3,
            AttemptStatus::Submitted => 4,
            AttemptStatus::Confirmed
            | AttemptStatus::Skipped
            | AttemptStatus::Failed
            | AttemptStatus::RateLimited => 5,
        }
    }
}

/// One target's journey through the invitation workflow.
#[derive(Clone, Debug)]
pub struct ConnectionAttempt {
    pub target: TargetProfile,
    status: AttemptStatus,
    pub reason: Option<String>,
}

impl ConnectionAttempt {
    pub fn new(target: TargetProfile) -> Self {
        Self {
            target,
            status: AttemptStatus::Pending,
            reason: None,
        }
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    /// Advance to `next`. Regressions and transitions out of a terminal state
    /// are ignored (and flagged in debug builds) so a late stage can never
    /// rewrite an already-settled outcome.
    pub fn advance(&mut self, next: AttemptStatus) {
        if self.status.is_terminal() || next.rank() < self.status.rank() {
            debug_assert!(
                false,
                "non-monotonic attempt transition {:?} -> {:?}",
                self.status, next
            );
            return;
        }
        self.status = next;
    }

    pub fn settle(&mut self, terminal: AttemptStatus, reason: Option<String>) {
        debug_assert!(terminal.is_terminal());
        self.advance(terminal);
        if self.reason.is_none() {
            self.reason = reason;
        }
    }
}

/// Why a run stopped. All of these are expected terminations, not errors —
/// they are reported, never raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum HaltReason {
    LimitReached,
    ExhaustedTargets,
    PlatformRateLimited,
    FatalError,
}

/// Aggregated per-run outcome. Invariants: `sent <= attempted` and
/// `sent <= requested limit` (the guard stops the run at the limit).
#[derive(Debug, Default)]
pub struct RunReport {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub halt_reason: Option<HaltReason>,
    /// Per-target outcomes in supplier yield order.
    pub outcomes: Vec<ConnectionAttempt>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished attempt into the tallies. The attempt must be in a
    /// terminal state; it is not mutated afterwards.
    pub fn absorb(&mut self, attempt: ConnectionAttempt) {
        debug_assert!(attempt.status().is_terminal());
        self.attempted += 1;
        match attempt.status() {
            AttemptStatus::Confirmed => self.sent += 1,
            AttemptStatus::Failed => self.failed += 1,
            AttemptStatus::Skipped => self.skipped += 1,
            // RateLimited halts the run; it is neither a failure nor a skip.
            _ => {}
        }
        self.outcomes.push(attempt);
    }

    pub fn halt(&mut self, reason: HaltReason) {
        if self.halt_reason.is_none() {
            self.halt_reason = Some(reason);
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "attempted={} sent={} failed={} skipped={} halt={:?}",
            self.attempted, self.sent, self.failed, self.skipped, self.halt_reason
        )
    }
}
