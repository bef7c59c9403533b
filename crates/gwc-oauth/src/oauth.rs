//! OAuth flow coordinator
//!
//! Orchestrates one redirect/popup authorization attempt at a time:
//! `idle → starting → awaiting_authorization → (succeeded | failed | cancelled)`.
//!
//! Four independent signals can end an attempt: a terminal status from the
//! poller, a completion message from the popup, the wall-clock timeout, and
//! the user (explicit cancel or closing the popup). The first to arrive wins
//! a single-fire latch; everything after it is a no-op. Every terminal path
//! walks the same teardown: deactivate the poller, signal all tasks done,
//! close the popup, clear the correlation registry entry, reset the
//! observable state.

use chrono::{DateTime, Utc};
use gwc_api::FlowService;
use gwc_types::{AuthError, AuthResult, CallbackMessage, CallbackStatus, FlowKind, Provider};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{FlowEvent, FlowOutcome};
use crate::poller::{PollSignal, StatusPoller};
use crate::registry::StateRegistry;
use crate::security::{sanitize_error, validate_auth_url};
use crate::transport::{BrowserTransport, PopupHandle};

/// Default flow timeout (5 minutes)
const FLOW_TIMEOUT: Duration = Duration::from_secs(300);

/// Default status poll interval
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default popup close-check interval
const CLOSE_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Tunable intervals for the coordinator
#[derive(Debug, Clone)]
pub struct OAuthCoordinatorConfig {
    pub poll_interval: Duration,
    pub flow_timeout: Duration,
    pub close_check_interval: Duration,
}

impl Default for OAuthCoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            flow_timeout: FLOW_TIMEOUT,
            close_check_interval: CLOSE_CHECK_INTERVAL,
        }
    }
}

/// Observable state of the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthFlowSnapshot {
    /// An attempt is starting or awaiting authorization
    pub is_loading: bool,

    /// Sanitized message from the most recent failure
    pub error: Option<String>,

    /// Correlation id of the active attempt
    pub state: Option<String>,
}

/// One in-flight attempt and everything it owns
struct ActiveAttempt {
    provider: Provider,
    state: String,
    attempt_id: Uuid,
    started_at: DateTime<Utc>,

    /// Single-fire latch; the first terminal signal to flip it wins
    completed: Arc<AtomicBool>,

    /// Poller predicate, re-checked before every tick
    active: Arc<AtomicBool>,

    /// Guards the best-effort remote cancel (at most once per attempt)
    cancel_sent: Arc<AtomicBool>,

    popup: Arc<dyn PopupHandle>,

    /// Done signal every spawned task selects on
    done_tx: watch::Sender<bool>,
}

struct Inner {
    service: Arc<dyn FlowService>,
    transport: Arc<dyn BrowserTransport>,
    registry: Arc<StateRegistry>,
    config: OAuthCoordinatorConfig,
    attempt: Mutex<Option<ActiveAttempt>>,
    snapshot_tx: watch::Sender<OAuthFlowSnapshot>,
    events_tx: broadcast::Sender<FlowEvent>,
}

/// Coordinates redirect/popup OAuth flows, one attempt at a time
pub struct OAuthFlowCoordinator {
    inner: Arc<Inner>,
}

impl OAuthFlowCoordinator {
    pub fn new(service: Arc<dyn FlowService>, transport: Arc<dyn BrowserTransport>) -> Self {
        Self::with_config(service, transport, OAuthCoordinatorConfig::default())
    }

    pub fn with_config(
        service: Arc<dyn FlowService>,
        transport: Arc<dyn BrowserTransport>,
        config: OAuthCoordinatorConfig,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(OAuthFlowSnapshot::default());
        let (events_tx, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(Inner {
                service,
                transport,
                registry: Arc::new(StateRegistry::new()),
                config,
                attempt: Mutex::new(None),
                snapshot_tx,
                events_tx,
            }),
        }
    }

    /// Watch the observable state; updated on every transition
    pub fn watch_state(&self) -> watch::Receiver<OAuthFlowSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Subscribe to terminal events (exactly one per attempt)
    pub fn subscribe_events(&self) -> broadcast::Receiver<FlowEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Current state snapshot
    pub fn snapshot(&self) -> OAuthFlowSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Correlation registry for in-flight attempts
    pub fn registry(&self) -> Arc<StateRegistry> {
        Arc::clone(&self.inner.registry)
    }

    /// Whether a non-terminal attempt is active
    pub fn is_active(&self) -> bool {
        self.inner.attempt.lock().is_some()
    }

    /// Start a flow for a provider
    ///
    /// Any pre-existing non-terminal attempt is torn down first. Start
    /// failures (rejected start, wrong flow kind, untrusted URL, blocked
    /// popup) are returned synchronously and no pollable attempt is created.
    pub async fn start_flow(
        &self,
        provider: Provider,
        project_id: Option<String>,
    ) -> AuthResult<()> {
        let inner = &self.inner;

        inner.teardown_current();
        inner.set_snapshot(OAuthFlowSnapshot {
            is_loading: true,
            error: None,
            state: None,
        });

        info!("Starting OAuth flow for provider {}", provider);

        let response = match inner.service.start(provider, project_id).await {
            Ok(r) => r,
            Err(e) => return inner.fail_start(provider, e),
        };

        if response.flow_type == Some(FlowKind::Device) {
            return inner.fail_start(
                provider,
                AuthError::UnexpectedFlowKind(
                    "device flow not supported in popup mode".to_string(),
                ),
            );
        }

        let raw_url = match response.auth_url.as_deref() {
            Some(u) => u,
            None => return inner.fail_start(provider, AuthError::InvalidAuthUrl),
        };
        let url = match validate_auth_url(provider, raw_url) {
            Ok(u) => u,
            Err(e) => return inner.fail_start(provider, e),
        };

        let state = response.state.clone();
        inner.registry.store(state.clone(), provider);

        // Subscribe before opening so a fast completion cannot slip past
        let messages = inner.transport.subscribe();

        let popup = match inner.transport.open(&url) {
            Some(p) => p,
            None => {
                inner.registry.remove(&state);
                return inner.fail_start(provider, AuthError::PopupBlocked);
            }
        };

        let active = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = watch::channel(false);
        let attempt_id = Uuid::new_v4();

        {
            let mut guard = inner.attempt.lock();
            *guard = Some(ActiveAttempt {
                provider,
                state: state.clone(),
                attempt_id,
                started_at: Utc::now(),
                completed: Arc::new(AtomicBool::new(false)),
                active: Arc::clone(&active),
                cancel_sent: Arc::new(AtomicBool::new(false)),
                popup: Arc::clone(&popup),
                done_tx,
            });
        }

        inner.set_snapshot(OAuthFlowSnapshot {
            is_loading: true,
            error: None,
            state: Some(state.clone()),
        });

        debug!(
            "OAuth flow {} awaiting authorization for {} (state {})",
            attempt_id, provider, state
        );

        Self::spawn_message_listener(
            Arc::clone(inner),
            provider,
            state.clone(),
            messages,
            done_rx.clone(),
        );
        Self::spawn_close_watcher(
            Arc::clone(inner),
            provider,
            state.clone(),
            popup,
            done_rx.clone(),
        );
        Self::spawn_poll_driver(
            Arc::clone(inner),
            provider,
            state.clone(),
            active,
            done_rx.clone(),
        );
        Self::spawn_timeout(Arc::clone(inner), provider, state, done_rx);

        Ok(())
    }

    /// Cancel the active attempt
    ///
    /// Safe to call in any state, including idle (no-op) and after a
    /// terminal outcome (no additional remote calls).
    pub async fn cancel_flow(&self) {
        let Some(attempt) = self.inner.latch_any() else {
            return;
        };

        info!(
            "Cancelling OAuth flow for {} (state {})",
            attempt.provider, attempt.state
        );

        self.inner.best_effort_cancel(&attempt).await;
        self.inner.release(&attempt);
        self.inner.set_snapshot(OAuthFlowSnapshot::default());
        self.inner.emit(attempt.provider, FlowOutcome::Cancelled);
    }

    /// Listens for completion messages posted back from the popup, accepting
    /// only those bearing the attempt's own correlation id.
    fn spawn_message_listener(
        inner: Arc<Inner>,
        provider: Provider,
        state: String,
        mut messages: broadcast::Receiver<CallbackMessage>,
        mut done_rx: watch::Receiver<bool>,
    ) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = done_rx.changed() => break,
                    received = messages.recv() => match received {
                        Ok(message) => {
                            if message.state != state {
                                debug!(
                                    "Ignoring completion signal with mismatched state {}",
                                    message.state
                                );
                                continue;
                            }
                            match message.status {
                                CallbackStatus::Success => {
                                    inner.handle_success(provider, &state);
                                }
                                CallbackStatus::Error => {
                                    let raw =
                                        message.error.as_deref().unwrap_or("OAuth error");
                                    inner
                                        .handle_failure(provider, &state, sanitize_error(raw))
                                        .await;
                                }
                            }
                            break;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Completion channel lagged by {} messages", skipped);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }

    /// Detects the user closing the popup without completing the flow.
    /// Closure has no event, so the handle is polled at a short interval.
    fn spawn_close_watcher(
        inner: Arc<Inner>,
        provider: Provider,
        state: String,
        popup: Arc<dyn PopupHandle>,
        mut done_rx: watch::Receiver<bool>,
    ) {
        let interval = inner.config.close_check_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = done_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {
                        if popup.is_closed() {
                            inner.handle_user_abort(provider, &state).await;
                            break;
                        }
                    }
                }
            }
        });
    }

    fn spawn_poll_driver(
        inner: Arc<Inner>,
        provider: Provider,
        state: String,
        active: Arc<AtomicBool>,
        mut done_rx: watch::Receiver<bool>,
    ) {
        let poller = StatusPoller::new(
            Arc::clone(&inner.service),
            state.clone(),
            inner.config.poll_interval,
            active,
        );

        tokio::spawn(async move {
            tokio::select! {
                _ = done_rx.changed() => {}
                signal = poller.run() => match signal {
                    Some(PollSignal::Completed) => inner.handle_success(provider, &state),
                    Some(PollSignal::Failed { error }) => {
                        let raw = error.unwrap_or_else(|| "OAuth failed".to_string());
                        inner
                            .handle_failure(provider, &state, sanitize_error(&raw))
                            .await;
                    }
                    Some(PollSignal::Cancelled { error }) => {
                        let raw = error.unwrap_or_else(|| "OAuth cancelled".to_string());
                        inner
                            .handle_failure(provider, &state, sanitize_error(&raw))
                            .await;
                    }
                    None => {}
                },
            }
        });
    }

    /// Wall-clock timeout protecting against an abandoned popup
    fn spawn_timeout(
        inner: Arc<Inner>,
        provider: Provider,
        state: String,
        mut done_rx: watch::Receiver<bool>,
    ) {
        let timeout = inner.config.flow_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = done_rx.changed() => {}
                _ = tokio::time::sleep(timeout) => {
                    inner
                        .handle_failure(provider, &state, AuthError::Timeout.to_string())
                        .await;
                }
            }
        });
    }
}

impl Inner {
    fn set_snapshot(&self, snapshot: OAuthFlowSnapshot) {
        self.snapshot_tx.send_replace(snapshot);
    }

    fn emit(&self, provider: Provider, outcome: FlowOutcome) {
        let _ = self.events_tx.send(FlowEvent { provider, outcome });
    }

    /// Report a start failure: no attempt exists, so no teardown is needed
    fn fail_start(&self, provider: Provider, err: AuthError) -> AuthResult<()> {
        let message = err.to_string();
        warn!("OAuth start failed for {}: {}", provider, message);
        self.set_snapshot(OAuthFlowSnapshot {
            is_loading: false,
            error: Some(message.clone()),
            state: None,
        });
        self.emit(provider, FlowOutcome::Failed(message));
        Err(err)
    }

    /// Take the attempt if it matches `state` and the latch has not fired.
    /// Returns `None` when another signal already won the race.
    fn latch(&self, state: &str) -> Option<ActiveAttempt> {
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

    /// Take the attempt regardless of state (explicit cancel path)
    fn latch_any(&self) -> Option<ActiveAttempt> {
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

    /// Walk the attempt's resources: stop the poller, wake every task, close
    /// the popup, drop the registry entry. Idempotent by construction since
    /// the attempt can only be taken out once.
    fn release(&self, attempt: &ActiveAttempt) {
        attempt.active.store(false, Ordering::SeqCst);
        attempt.popup.close();
        let _ = attempt.done_tx.send(true);
        self.registry.remove(&attempt.state);

        debug!(
            "Released attempt {} after {}s",
            attempt.attempt_id,
            Utc::now()
                .signed_duration_since(attempt.started_at)
                .num_seconds()
        );
    }

    async fn best_effort_cancel(&self, attempt: &ActiveAttempt) {
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

        info!("OAuth flow for {} completed (state {})", provider, state);

        self.release(&attempt);
        self.registry.clear_all();
        self.set_snapshot(OAuthFlowSnapshot::default());
        self.emit(provider, FlowOutcome::Succeeded);
    }

    async fn handle_failure(&self, provider: Provider, state: &str, message: String) {
        let Some(attempt) = self.latch(state) else {
            return;
        };

        warn!("OAuth flow for {} failed: {}", provider, message);

        self.best_effort_cancel(&attempt).await;
        self.release(&attempt);
        self.set_snapshot(OAuthFlowSnapshot {
            is_loading: false,
            error: Some(message.clone()),
            state: None,
        });
        self.emit(provider, FlowOutcome::Failed(message));
    }

    async fn handle_user_abort(&self, provider: Provider, state: &str) {
        let Some(attempt) = self.latch(state) else {
            return;
        };

        info!(
            "OAuth flow for {} cancelled, popup closed by user (state {})",
            provider, state
        );

        self.best_effort_cancel(&attempt).await;
        self.release(&attempt);
        self.set_snapshot(OAuthFlowSnapshot::default());
        self.emit(provider, FlowOutcome::Cancelled);
    }

    /// Implicit teardown when a new flow supersedes the current one.
    /// Local only: the superseded attempt emits no event and no remote
    /// cancel.
    fn teardown_current(&self) {
        let taken = self.attempt.lock().take();
        if let Some(attempt) = taken {
            debug!("Tearing down superseded attempt {}", attempt.state);
            attempt.completed.store(true, Ordering::SeqCst);
            self.release(&attempt);
        }
        self.set_snapshot(OAuthFlowSnapshot::default());
    }
}
