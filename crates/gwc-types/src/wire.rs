//! Wire formats for the management API and the cross-context completion signal

use serde::{Deserialize, Serialize};

use crate::provider::{FlowKind, Provider};

/// Message type tag carried by every cross-context completion signal
pub const CALLBACK_MESSAGE_TYPE: &str = "oauth-callback";

/// Request body for `POST /oauth/start`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartFlowRequest {
    pub provider: Provider,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Top-level outcome of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartStatus {
    Ok,
    Error,
}

/// Response body for `POST /oauth/start`
///
/// `state` is the correlation id for the attempt: every status poll,
/// cancellation, and completion signal is matched against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartFlowResponse {
    pub status: StartStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_type: Option<FlowKind>,

    /// Authorization URL (oauth kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,

    /// Correlation id / anti-forgery state for this attempt
    pub state: String,

    /// Server-side attempt id
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// Short user code to enter out-of-band (device kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,

    /// URL the user visits to enter the code (device kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_url: Option<String>,

    /// Attempt lifetime in seconds (device kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// Suggested poll interval in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
}

/// Server-authoritative status of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl FlowStatus {
    /// Whether no further automatic transition occurs from this status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FlowStatus::Pending)
    }
}

/// Response body for `GET /oauth/status/{state}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStatusResponse {
    pub status: FlowStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body for `POST /oauth/cancel/{state}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub status: String,
}

/// Completion outcome carried by a cross-context message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    Success,
    Error,
}

/// Completion signal posted back from the opened authorization context
///
/// Must carry the correlation id (`state`); receivers reject messages whose
/// state does not match the active attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackMessage {
    #[serde(rename = "type")]
    pub kind: String,

    pub provider: String,

    pub state: String,

    pub status: CallbackStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallbackMessage {
    /// Build a success signal for the given attempt
    pub fn success(provider: Provider, state: impl Into<String>) -> Self {
        Self {
            kind: CALLBACK_MESSAGE_TYPE.to_string(),
            provider: provider.as_str().to_string(),
            state: state.into(),
            status: CallbackStatus::Success,
            error: None,
        }
    }

    /// Build an error signal for the given attempt
    pub fn error(provider: Provider, state: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind: CALLBACK_MESSAGE_TYPE.to_string(),
            provider: provider.as_str().to_string(),
            state: state.into(),
            status: CallbackStatus::Error,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_response_oauth_kind() {
        let json = r#"{
            "status": "ok",
            "flow_type": "oauth",
            "auth_url": "https://claude.ai/authorize?state=abc123",
            "state": "abc123",
            "id": "flow-1"
        }"#;

        let resp: StartFlowResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, StartStatus::Ok);
        assert_eq!(resp.flow_type, Some(FlowKind::OAuth));
        assert_eq!(resp.state, "abc123");
        assert!(resp.user_code.is_none());
    }

    #[test]
    fn test_start_response_device_kind() {
        let json = r#"{
            "status": "ok",
            "flow_type": "device",
            "state": "xyz",
            "id": "flow-2",
            "user_code": "ABCD-1234",
            "verification_url": "https://provider/device",
            "expires_in": 900,
            "interval": 5
        }"#;

        let resp: StartFlowResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.flow_type, Some(FlowKind::Device));
        assert_eq!(resp.user_code.as_deref(), Some("ABCD-1234"));
        assert_eq!(resp.expires_in, Some(900));
        assert_eq!(resp.interval, Some(5));
    }

    #[test]
    fn test_status_response() {
        let resp: FlowStatusResponse = serde_json::from_str(r#"{"status": "pending"}"#).unwrap();
        assert_eq!(resp.status, FlowStatus::Pending);
        assert!(!resp.status.is_terminal());

        let resp: FlowStatusResponse =
            serde_json::from_str(r#"{"status": "failed", "error": "user denied"}"#).unwrap();
        assert_eq!(resp.status, FlowStatus::Failed);
        assert!(resp.status.is_terminal());
        assert_eq!(resp.error.as_deref(), Some("user denied"));
    }

    #[test]
    fn test_callback_message_round_trip() {
        let msg = CallbackMessage::success(Provider::Anthropic, "abc123");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"oauth-callback\""));
        assert!(json.contains("\"status\":\"success\""));

        let parsed: CallbackMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.state, "abc123");
        assert_eq!(parsed.status, CallbackStatus::Success);
    }

    #[test]
    fn test_callback_error_message() {
        let msg = CallbackMessage::error(Provider::Codex, "s1", "access_denied");
        assert_eq!(msg.status, CallbackStatus::Error);
        assert_eq!(msg.error.as_deref(), Some("access_denied"));
        assert_eq!(msg.kind, CALLBACK_MESSAGE_TYPE);
    }

    #[test]
    fn test_start_request_omits_missing_project() {
        let req = StartFlowRequest {
            provider: Provider::Claude,
            project_id: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"provider":"claude"}"#);
    }
}
