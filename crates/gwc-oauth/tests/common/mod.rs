//! Shared mocks for coordinator integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use gwc_api::FlowService;
use gwc_oauth::{BrowserTransport, PopupHandle};
use gwc_types::{
    AuthError, AuthResult, CallbackMessage, FlowKind, FlowStatus, FlowStatusResponse, Provider,
    StartFlowResponse, StartStatus,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

/// Flow service with a programmable start template and status script.
/// When the status script runs dry, further polls return `pending`.
pub struct MockFlowService {
    start_template: Mutex<Option<Result<StartFlowResponse, String>>>,
    statuses: Mutex<VecDeque<Result<FlowStatusResponse, String>>>,
    pub start_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
}

impl MockFlowService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_template: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            start_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
        })
    }

    pub fn with_oauth_start(state: &str, auth_url: &str) -> Arc<Self> {
        let service = Self::new();
        service.set_start(Ok(oauth_response(state, auth_url)));
        service
    }

    pub fn with_device_start(
        state: &str,
        user_code: &str,
        verification_url: &str,
        expires_in: u64,
        interval: u64,
    ) -> Arc<Self> {
        let service = Self::new();
        service.set_start(Ok(device_response(
            state,
            user_code,
            verification_url,
            expires_in,
            interval,
        )));
        service
    }

    pub fn set_start(&self, template: Result<StartFlowResponse, String>) {
        *self.start_template.lock() = Some(template);
    }

    pub fn push_status(&self, status: FlowStatus, error: Option<&str>) {
        self.statuses.lock().push_back(Ok(FlowStatusResponse {
            status,
            error: error.map(str::to_string),
        }));
    }

    pub fn push_status_error(&self, message: &str) {
        self.statuses.lock().push_back(Err(message.to_string()));
    }
}

#[async_trait]
impl FlowService for MockFlowService {
    async fn start(
        &self,
        _provider: Provider,
        _project_id: Option<String>,
    ) -> AuthResult<StartFlowResponse> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        match self.start_template.lock().clone() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(AuthError::ServiceUnreachable(message)),
            None => Err(AuthError::Internal("no start template set".to_string())),
        }
    }

    async fn status(&self, _state: &str) -> AuthResult<FlowStatusResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        match self.statuses.lock().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(AuthError::ServiceUnreachable(message)),
            None => Ok(FlowStatusResponse {
                status: FlowStatus::Pending,
                error: None,
            }),
        }
    }

    async fn cancel(&self, _state: &str) -> AuthResult<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn oauth_response(state: &str, auth_url: &str) -> StartFlowResponse {
    StartFlowResponse {
        status: StartStatus::Ok,
        flow_type: Some(FlowKind::OAuth),
        auth_url: Some(auth_url.to_string()),
        state: state.to_string(),
        id: format!("flow-{}", state),
        error: None,
        code_verifier: None,
        code_challenge: None,
        user_code: None,
        verification_url: None,
        expires_in: None,
        interval: None,
    }
}

pub fn device_response(
    state: &str,
    user_code: &str,
    verification_url: &str,
    expires_in: u64,
    interval: u64,
) -> StartFlowResponse {
    StartFlowResponse {
        status: StartStatus::Ok,
        flow_type: Some(FlowKind::Device),
        auth_url: None,
        state: state.to_string(),
        id: format!("flow-{}", state),
        error: None,
        code_verifier: None,
        code_challenge: None,
        user_code: Some(user_code.to_string()),
        verification_url: Some(verification_url.to_string()),
        expires_in: Some(expires_in),
        interval: Some(interval),
    }
}

/// Popup whose closure is driven by the test
#[derive(Default)]
pub struct MockPopup {
    closed: AtomicBool,
}

impl MockPopup {
    /// Simulate the user closing the window
    pub fn user_close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl PopupHandle for MockPopup {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Transport that records opened URLs and lets tests inject completion
/// messages
pub struct MockTransport {
    messages: broadcast::Sender<CallbackMessage>,
    opened_urls: Mutex<Vec<String>>,
    last_popup: Mutex<Option<Arc<MockPopup>>>,
    block_popups: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let (messages, _) = broadcast::channel(16);
        Arc::new(Self {
            messages,
            opened_urls: Mutex::new(Vec::new()),
            last_popup: Mutex::new(None),
            block_popups: AtomicBool::new(false),
        })
    }

    /// Make every subsequent `open` fail, as a popup blocker would
    pub fn block_popups(&self) {
        self.block_popups.store(true, Ordering::SeqCst);
    }

    /// Post a completion message to all listeners
    pub fn send(&self, message: CallbackMessage) {
        let _ = self.messages.send(message);
    }

    /// Handle of the most recently opened popup
    pub fn popup(&self) -> Arc<MockPopup> {
        self.last_popup
            .lock()
            .clone()
            .expect("no popup was opened")
    }

    pub fn opened_count(&self) -> usize {
        self.opened_urls.lock().len()
    }
}

impl BrowserTransport for MockTransport {
    fn open(&self, url: &Url) -> Option<Arc<dyn PopupHandle>> {
        if self.block_popups.load(Ordering::SeqCst) {
            return None;
        }

        self.opened_urls.lock().push(url.to_string());
        let popup = Arc::new(MockPopup::default());
        *self.last_popup.lock() = Some(Arc::clone(&popup));
        Some(popup)
    }

    fn subscribe(&self) -> broadcast::Receiver<CallbackMessage> {
        self.messages.subscribe()
    }
}
