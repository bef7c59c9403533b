//! Terminal events reported by the coordinators

use gwc_types::Provider;

/// How an attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// The remote service confirmed the authorization
    Succeeded,

    /// The attempt failed; carries the sanitized, user-safe message
    Failed(String),

    /// The user aborted the attempt (explicit cancel or closed popup)
    Cancelled,
}

/// One terminal transition of one attempt
///
/// Exactly one event is emitted per attempt, no matter how many signals
/// race to end it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowEvent {
    pub provider: Provider,
    pub outcome: FlowOutcome,
}

impl FlowEvent {
    pub fn is_success(&self) -> bool {
        self.outcome == FlowOutcome::Succeeded
    }
}
