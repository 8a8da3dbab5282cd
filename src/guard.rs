//! Typed-keyword confirmation for irreversible actions.
//!
//! The guard is a two-phase protocol: the presentation layer collects a
//! free-text input, the guard compares it against the expected keyword, and
//! only an exact match lets the protected action run. Rejections mutate
//! nothing and the user may resubmit indefinitely.

use thiserror::Error;

/// Keyword protecting single-goal deletion.
pub const DELETE_KEYWORD: &str = "削除";
/// Keyword protecting the whole-app reset.
pub const RESET_KEYWORD: &str = "リセット";

/// Why a confirmation input was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("Confirmation input is empty")]
    EmptyInput,
    #[error("Confirmation input does not match the expected keyword")]
    Mismatch,
}

/// Outcome of comparing one confirmation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Confirmed,
    Rejected(RejectReason),
}

/// Outcome of a guarded action: either it ran, or the input was rejected
/// and nothing happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    Done(T),
    Rejected(RejectReason),
}

impl<T> Guarded<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// Confirmation gate for one destructive action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestructiveGuard {
    keyword: String,
}

impl DestructiveGuard {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Compare a submitted input against the expected keyword.
    ///
    /// The input is trimmed, then matched exactly; prefixes, case variants
    /// and empty submissions are all rejections.
    pub fn decide(&self, input: &str) -> GuardDecision {
        let input = input.trim();
        if input.is_empty() {
            return GuardDecision::Rejected(RejectReason::EmptyInput);
        }
        if input != self.keyword {
            return GuardDecision::Rejected(RejectReason::Mismatch);
        }
        GuardDecision::Confirmed
    }
}

/// Run `action` exactly once iff `input` confirms the guard.
///
/// The action is the only fallible part; rejection short-circuits before it
/// is invoked, so no side effect can leak from a failed confirmation.
pub fn run_guarded<T, E>(
    guard: &DestructiveGuard,
    input: &str,
    action: impl FnOnce() -> Result<T, E>,
) -> Result<Guarded<T>, E> {
    match guard.decide(input) {
        GuardDecision::Confirmed => Ok(Guarded::Done(action()?)),
        GuardDecision::Rejected(reason) => Ok(Guarded::Rejected(reason)),
    }
}
