//! Error types and conversions

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Authorization service unreachable: {0}")]
    ServiceUnreachable(String),

    #[error("Unknown authorization attempt: {0}")]
    UnknownAttempt(String),

    #[error("Authorization could not be started: {0}")]
    StartRejected(String),

    #[error("Unexpected flow type: {0}")]
    UnexpectedFlowKind(String),

    #[error("Invalid OAuth URL")]
    InvalidAuthUrl,

    #[error("Popup blocked. Please allow popups.")]
    PopupBlocked,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("OAuth timeout - please try again")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<AuthError> for String {
    fn from(err: AuthError) -> String {
        err.to_string()
    }
}
