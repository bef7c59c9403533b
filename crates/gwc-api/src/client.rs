//! Remote flow service contract and HTTP implementation

use async_trait::async_trait;
use gwc_types::{
    AuthError, AuthResult, FlowStatusResponse, Provider, StartFlowRequest, StartFlowResponse,
    StartStatus,
};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ApiConfig;

/// Remote flow service consumed by the coordinators
///
/// `status` is an idempotent read and safe to call repeatedly. `cancel` is
/// best-effort; callers log failures instead of surfacing them as fatal.
#[async_trait]
pub trait FlowService: Send + Sync {
    /// Start a flow for a provider, returning the correlation id plus either
    /// an authorization URL (oauth) or a user code and verification URL
    /// (device).
    async fn start(
        &self,
        provider: Provider,
        project_id: Option<String>,
    ) -> AuthResult<StartFlowResponse>;

    /// Fetch the current status of an attempt by correlation id
    ///
    /// An unknown correlation id is reported as `AuthError::UnknownAttempt`,
    /// distinct from a server-reported `failed` status.
    async fn status(&self, state: &str) -> AuthResult<FlowStatusResponse>;

    /// Request cancellation of an attempt by correlation id
    async fn cancel(&self, state: &str) -> AuthResult<()>;
}

/// HTTP implementation of [`FlowService`] over the management API
pub struct HttpFlowService {
    http: reqwest::Client,
    base_url: String,
}

impl HttpFlowService {
    /// Create a new client from configuration
    pub fn new(config: &ApiConfig) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AuthError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn transport_error(err: reqwest::Error) -> AuthError {
    AuthError::ServiceUnreachable(err.to_string())
}

#[async_trait]
impl FlowService for HttpFlowService {
    async fn start(
        &self,
        provider: Provider,
        project_id: Option<String>,
    ) -> AuthResult<StartFlowResponse> {
        debug!("Starting {} flow for provider {}", provider.kind(), provider);

        let request = StartFlowRequest {
            provider,
            project_id,
        };

        let response = self
            .http
            .post(self.endpoint("oauth/start"))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::BAD_REQUEST => {
                return Err(AuthError::UnsupportedProvider(provider.to_string()));
            }
            status if !status.is_success() => {
                return Err(AuthError::ServiceUnreachable(format!(
                    "unexpected response status: {}",
                    status
                )));
            }
            _ => {}
        }

        let body: StartFlowResponse = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        if body.status == StartStatus::Error {
            let message = body.error.unwrap_or_else(|| "unknown error".to_string());
            warn!("Flow start rejected for {}: {}", provider, message);
            return Err(AuthError::StartRejected(message));
        }

        Ok(body)
    }

    async fn status(&self, state: &str) -> AuthResult<FlowStatusResponse> {
        let response = self
            .http
            .get(self.endpoint(&format!("oauth/status/{}", state)))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(AuthError::UnknownAttempt(state.to_string())),
            status if !status.is_success() => Err(AuthError::ServiceUnreachable(format!(
                "unexpected response status: {}",
                status
            ))),
            _ => response
                .json()
                .await
                .map_err(|e| AuthError::MalformedResponse(e.to_string())),
        }
    }

    async fn cancel(&self, state: &str) -> AuthResult<()> {
        let response = self
            .http
            .post(self.endpoint(&format!("oauth/cancel/{}", state)))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(AuthError::ServiceUnreachable(format!(
                "cancel returned status: {}",
                response.status()
            )));
        }

        debug!("Requested cancellation of attempt {}", state);
        Ok(())
    }
}
