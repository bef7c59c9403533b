//! Device-code flow coordinator
//!
//! `idle → polling → (success | error | expired)`, with `retry` discarding
//! the old attempt and starting fresh. No popup is involved; the user opens
//! the verification URL themselves and enters the user code, while this
//! coordinator polls the attempt's status until a terminal state or the
//! server-supplied expiry.

use gwc_api::FlowService;
use gwc_types::{AuthError, AuthResult, FlowKind, Provider};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::events::{FlowEvent, FlowOutcome};
use crate::poller::{PollSignal, StatusPoller};
use crate::security::sanitize_error;

/// Fallback attempt lifetime when the server omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: u64 = 900;

/// Fallback poll interval when the server omits `interval`
const DEFAULT_INTERVAL_SECS: u64 = 5;

/// How long the success state stays visible before auto-reset
const SUCCESS_DISPLAY: Duration = Duration::from_secs(2);

/// Delay between teardown and restart on retry
const RETRY_DELAY: Duration = Duration::from_millis(100);

const EXPIRED_MESSAGE: &str = "Authorization code has expired";

/// Tunable intervals and defaults for the coordinator
#[derive(Debug, Clone)]
pub struct DeviceCoordinatorConfig {
    pub default_expires_in_secs: u64,
    pub default_interval_secs: u64,
    pub success_display: Duration,
    pub retry_delay: Duration,
}

impl Default for DeviceCoordinatorConfig {
    fn default() -> Self {
        Self {
            default_expires_in_secs: DEFAULT_EXPIRES_IN_SECS,
            default_interval_secs: DEFAULT_INTERVAL_SECS,
            success_display: SUCCESS_DISPLAY,
            retry_delay: RETRY_DELAY,
        }
    }
}

/// Where the coordinator is in the device-flow lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFlowStatus {
    Idle,
    Polling,
    Success,
    Error,
    Expired,
}

/// Observable state of the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFlowSnapshot {
    pub status: DeviceFlowStatus,
    pub provider: Option<Provider>,

    /// Short code the user enters at the verification URL
    pub user_code: Option<String>,
    pub verification_url: Option<String>,

    /// Attempt lifetime in seconds
    pub expires_in: u64,

    pub error: Option<String>,

    /// Correlation id of the active attempt
    pub state: Option<String>,
}

impl Default for DeviceFlowSnapshot {
    fn default() -> Self {
        Self {
            status: DeviceFlowStatus::Idle,
            provider: None,
            user_code: None,
            verification_url: None,
            expires_in: 0,
            error: None,
            state: None,
        }
    }
}

/// One in-flight attempt and everything it owns
struct DeviceAttempt {
    provider: Provider,
    state: String,

    /// Single-fire latch shared by the poller, the expiry timer, and cancel
    completed: Arc<AtomicBool>,

    /// Poller predicate
    active: Arc<AtomicBool>,

    /// Guards the best-effort remote cancel (at most once per attempt)
    cancel_sent: Arc<AtomicBool>,

    /// Done signal every spawned task selects on
    done_tx: watch::Sender<bool>,
}

struct Inner {
    service: Arc<dyn FlowService>,
    config: DeviceCoordinatorConfig,
    attempt: Mutex<Option<DeviceAttempt>>,
    snapshot_tx: watch::Sender<DeviceFlowSnapshot>,
    events_tx: broadcast::Sender<FlowEvent>,
}

/// Coordinates device-code flows, one attempt at a time
pub struct DeviceFlowCoordinator {
    inner: Arc<Inner>,
}

impl DeviceFlowCoordinator {
    pub fn new(service: Arc<dyn FlowService>) -> Self {
        Self::with_config(service, DeviceCoordinatorConfig::default())
    }

    pub fn with_config(service: Arc<dyn FlowService>, config: DeviceCoordinatorConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(DeviceFlowSnapshot::default());
        let (events_tx, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(Inner {
                service,
                config,
                attempt: Mutex::new(None),
                snapshot_tx,
                events_tx,
            }),
        }
    }

    /// Watch the observable state; updated on every transition
    pub fn watch_state(&self) -> watch::Receiver<DeviceFlowSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Subscribe to terminal events (exactly one per attempt)
    pub fn subscribe_events(&self) -> broadcast::Receiver<FlowEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Current state snapshot
    pub fn snapshot(&self) -> DeviceFlowSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Whether a non-terminal attempt is active
    pub fn is_active(&self) -> bool {
        self.inner.attempt.lock().is_some()
    }

    /// Start a device flow for a provider
    ///
    /// Expects a device-kind response carrying a user code and a
    /// verification URL; anything else is a start failure. A pre-existing
    /// attempt is torn down first.
    pub async fn start_device_flow(&self, provider: Provider) -> AuthResult<()> {
        let inner = &self.inner;

        inner.teardown_current();
        inner.set_snapshot(DeviceFlowSnapshot {
            status: DeviceFlowStatus::Polling,
            provider: Some(provider),
            ..Default::default()
        });

        info!("Starting device flow for provider {}", provider);

        let response = match inner.service.start(provider, None).await {
            Ok(r) => r,
            Err(e) => return inner.fail_start(provider, e),
        };

        if let Some(kind) = response.flow_type {
            if kind != FlowKind::Device {
                return inner.fail_start(
                    provider,
                    AuthError::UnexpectedFlowKind(kind.to_string()),
                );
            }
        }

        let user_code = match response.user_code {
            Some(c) => c,
            None => {
                return inner.fail_start(
                    provider,
                    AuthError::MalformedResponse("invalid device flow response".to_string()),
                )
            }
        };
        // Some providers return the verification page as auth_url
        let verification_url = match response.auth_url.or(response.verification_url) {
            Some(u) => u,
            None => {
                return inner.fail_start(
                    provider,
                    AuthError::MalformedResponse("invalid device flow response".to_string()),
                )
            }
        };

        let state = response.state.clone();
        let expires_in = response
            .expires_in
            .unwrap_or(inner.config.default_expires_in_secs);
        let interval = response
            .interval
            .unwrap_or(inner.config.default_interval_secs);

        let active = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = watch::channel(false);

        {
            let mut guard = inner.attempt.lock();
            *guard = Some(DeviceAttempt {
                provider,
                state: state.clone(),
                completed: Arc::new(AtomicBool::new(false)),
                active: Arc::clone(&active),
                cancel_sent: Arc::new(AtomicBool::new(false)),
                done_tx,
            });
        }

        inner.set_snapshot(DeviceFlowSnapshot {
            status: DeviceFlowStatus::Polling,
            provider: Some(provider),
            user_code: Some(user_code.clone()),
            verification_url: Some(verification_url),
            expires_in,
            error: None,
            state: Some(state.clone()),
        });

        debug!(
            "Device flow polling for {} (state {}, code {}, expires in {}s)",
            provider, state, user_code, expires_in
        );

        Self::spawn_poll_driver(
            Arc::clone(inner),
            provider,
            state.clone(),
            active,
            Duration::from_secs(interval),
            done_rx.clone(),
        );
        Self::spawn_expiry_timer(
            Arc::clone(inner),
            provider,
            state,
            Duration::from_secs(expires_in),
            done_rx,
        );

        Ok(())
    }

    /// Cancel the active attempt and reset to idle
    ///
    /// Safe to call in any state; a second call after a terminal outcome
    /// makes no additional remote calls.
    pub async fn cancel(&self) {
        if let Some(attempt) = self.inner.latch_any() {
            info!(
                "Cancelling device flow for {} (state {})",
                attempt.provider, attempt.state
            );
            self.inner.best_effort_cancel(&attempt).await;
            self.inner.release(&attempt);
            self.inner.emit(attempt.provider, FlowOutcome::Cancelled);
        }

        self.inner.set_snapshot(DeviceFlowSnapshot::default());
    }

    /// Clear a terminal state back to idle
    pub async fn reset(&self) {
        self.cancel().await;
    }

    /// Discard a failed or expired attempt and start over with the same
    /// provider after a short delay
    pub async fn retry(&self) -> AuthResult<()> {
        let (status, provider) = {
            let snapshot = self.inner.snapshot_tx.borrow();
            (snapshot.status, snapshot.provider)
        };

        if !matches!(status, DeviceFlowStatus::Error | DeviceFlowStatus::Expired) {
            return Err(AuthError::Internal(
                "retry is only valid after an error or expiry".to_string(),
            ));
        }
        let provider = provider.ok_or_else(|| {
            AuthError::Internal("no provider recorded for retry".to_string())
        })?;

        self.cancel().await;
        tokio::time::sleep(self.inner.config.retry_delay).await;
        self.start_device_flow(provider).await
    }

    fn spawn_poll_driver(
        inner: Arc<Inner>,
        provider: Provider,
        state: String,
        active: Arc<AtomicBool>,
        interval: Duration,
        mut done_rx: watch::Receiver<bool>,
    ) {
        let poller = StatusPoller::new(Arc::clone(&inner.service), state.clone(), interval, active);

        tokio::spawn(async move {
            tokio::select! {
                _ = done_rx.changed() => {}
                signal = poller.run() => match signal {
                    Some(PollSignal::Completed) => inner.handle_success(provider, &state),
                    Some(PollSignal::Failed { error }) => {
                        let raw = error.unwrap_or_else(|| "Device flow failed".to_string());
                        inner
                            .handle_failure(provider, &state, sanitize_error(&raw))
                            .await;
                    }
                    Some(PollSignal::Cancelled { error }) => {
                        let raw = error.unwrap_or_else(|| "Device flow cancelled".to_string());
                        inner
                            .handle_failure(provider, &state, sanitize_error(&raw))
                            .await;
                    }
                    None => {}
                },
            }
        });
    }

    /// Server-supplied expiry, independent of the poller
    fn spawn_expiry_timer(
        inner: Arc<Inner>,
        provider: Provider,
        state: String,
        expires_in: Duration,
        mut done_rx: watch::Receiver<bool>,
    ) {
        tokio::spawn(async move {
            tokio::select! {
                _ = done_rx.changed() => {}
                _ = tokio::time::sleep(expires_in) => {
                    inner.handle_expired(provider, &state).await;
                }
            }
        });
    }
}

impl Inner {
    fn set_snapshot(&self, snapshot: DeviceFlowSnapshot) {
        self.snapshot_tx.send_replace(snapshot);
    }

    fn emit(&self, provider: Provider, outcome: FlowOutcome) {
        let _ = self.events_tx.send(FlowEvent { provider, outcome });
    }

    fn fail_start(&self, provider: Provider, err: AuthError) -> AuthResult<()> {
        let message = err.to_string();
        warn!("Device flow start failed for {}: {}", provider, message);
        self.snapshot_tx.send_modify(|s| {
            s.status = DeviceFlowStatus::Error;
            s.error = Some(message.clone());
        });
        self.emit(provider, FlowOutcome::Failed(message));
        Err(err)
    }

    fn latch(&self, state: &str) -> Option<DeviceAttempt> {
        let mut guard = self.attempt.lock();
        match guard.as_ref() {
            Some(attempt) if attempt.state == state => {
                let won = attempt
                    .completed
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok();
                if won {
                    guard.take()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn latch_any(&self) -> Option<DeviceAttempt> {
        let mut guard = self.attempt.lock();
        match guard.as_ref() {
            Some(attempt) => {
                let won = attempt
                    .completed
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok();
                if won {
                    guard.take()
                } else {
                    None
                }
            }
            None => None,
        }
    }

    fn release(&self, attempt: &DeviceAttempt) {
        attempt.active.store(false, Ordering::SeqCst);
        let _ = attempt.done_tx.send(true);
    }

    async fn best_effort_cancel(&self, attempt: &DeviceAttempt) {
        let first = attempt
            .cancel_sent
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if !first {
            return;
        }

        if let Err(e) = self.service.cancel(&attempt.state).await {
            debug!(
                "Best-effort cancel of attempt {} failed: {}",
                attempt.state, e
            );
        }
    }

    fn handle_success(&self, provider: Provider, state: &str) {
        let Some(attempt) = self.latch(state) else {
            return;
        };

        info!("Device flow for {} completed (state {})", provider, state);

        self.release(&attempt);
        self.snapshot_tx.send_modify(|s| {
            s.status = DeviceFlowStatus::Success;
            s.error = None;
        });
        self.emit(provider, FlowOutcome::Succeeded);

        // Leave the success visible briefly, then return to idle unless a
        // new attempt has replaced the snapshot in the meantime.
        let snapshot_tx = self.snapshot_tx.clone();
        let display = self.config.success_display;
        let state = state.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(display).await;
            snapshot_tx.send_modify(|s| {
                if s.status == DeviceFlowStatus::Success && s.state.as_deref() == Some(&state) {
                    *s = DeviceFlowSnapshot::default();
                }
            });
        });
    }

    async fn handle_failure(&self, provider: Provider, state: &str, message: String) {
        let Some(attempt) = self.latch(state) else {
            return;
        };

        warn!("Device flow for {} failed: {}", provider, message);

        self.best_effort_cancel(&attempt).await;
        self.release(&attempt);
        self.snapshot_tx.send_modify(|s| {
            s.status = DeviceFlowStatus::Error;
            s.error = Some(message.clone());
        });
        self.emit(provider, FlowOutcome::Failed(message));
    }

    async fn handle_expired(&self, provider: Provider, state: &str) {
        let Some(attempt) = self.latch(state) else {
            return;
        };

        warn!("Device flow for {} expired (state {})", provider, state);

        self.best_effort_cancel(&attempt).await;
        self.release(&attempt);
        self.snapshot_tx.send_modify(|s| {
            s.status = DeviceFlowStatus::Expired;
            s.error = Some(EXPIRED_MESSAGE.to_string());
        });
        self.emit(provider, FlowOutcome::Failed(EXPIRED_MESSAGE.to_string()));
    }

    /// Implicit teardown when a new flow supersedes the current one
    fn teardown_current(&self) {
        let taken = self.attempt.lock().take();
        if let Some(attempt) = taken {
            debug!("Tearing down superseded device attempt {}", attempt.state);
            attempt.completed.store(true, Ordering::SeqCst);
            self.release(&attempt);
        }
        self.set_snapshot(DeviceFlowSnapshot::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_default_is_idle() {
        let snapshot = DeviceFlowSnapshot::default();
        assert_eq!(snapshot.status, DeviceFlowStatus::Idle);
        assert_eq!(snapshot.expires_in, 0);
        assert!(snapshot.user_code.is_none());
    }

    #[test]
    fn test_config_defaults() {
        let config = DeviceCoordinatorConfig::default();
        assert_eq!(config.default_expires_in_secs, 900);
        assert_eq!(config.default_interval_secs, 5);
        assert_eq!(config.success_display, Duration::from_secs(2));
        assert_eq!(config.retry_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&DeviceFlowStatus::Polling).unwrap(),
            "\"polling\""
        );
        assert_eq!(
            serde_json::to_string(&DeviceFlowStatus::Expired).unwrap(),
            "\"expired\""
        );
    }
}
