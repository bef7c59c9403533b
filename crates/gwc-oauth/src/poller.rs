//! Status poller
//!
//! Repeatedly queries an attempt's status at a fixed interval until a
//! terminal status arrives or the attempt is deactivated. Reports at most
//! once.

use gwc_api::FlowService;
use gwc_types::FlowStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Terminal result observed by the poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollSignal {
    Completed,
    Failed { error: Option<String> },
    Cancelled { error: Option<String> },
}

/// Polls `FlowService::status` for one attempt
///
/// The first check fires after one full interval, and checks stay strictly
/// periodic while the status is `pending`. The `active` flag is re-evaluated
/// before every tick; deactivation exits silently without reporting.
///
/// A transport error from the status call is reported as a terminal failure
/// rather than retried, so a broken attempt cannot stay pending forever.
pub struct StatusPoller {
    service: Arc<dyn FlowService>,
    state: String,
    interval: Duration,
    active: Arc<AtomicBool>,
}

impl StatusPoller {
    pub fn new(
        service: Arc<dyn FlowService>,
        state: impl Into<String>,
        interval: Duration,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            service,
            state: state.into(),
            interval,
            active,
        }
    }

    /// Run until a terminal status, a status error, or deactivation
    ///
    /// Returns `None` only when the attempt was deactivated mid-flight.
    pub async fn run(self) -> Option<PollSignal> {
        loop {
            tokio::time::sleep(self.interval).await;

            if !self.active.load(Ordering::SeqCst) {
                debug!("Attempt {} deactivated, poller exiting", self.state);
                return None;
            }

            match self.service.status(&self.state).await {
                Ok(response) => match response.status {
                    FlowStatus::Pending => continue,
                    FlowStatus::Completed => {
                        debug!("Attempt {} completed", self.state);
                        return Some(PollSignal::Completed);
                    }
                    FlowStatus::Failed => {
                        return Some(PollSignal::Failed {
                            error: response.error,
                        });
                    }
                    FlowStatus::Cancelled => {
                        return Some(PollSignal::Cancelled {
                            error: response.error,
                        });
                    }
                },
                Err(e) => {
                    warn!("Status poll for attempt {} failed: {}", self.state, e);
                    return Some(PollSignal::Failed {
                        error: Some(e.to_string()),
                    });
                }
            }
        }
    }
}
