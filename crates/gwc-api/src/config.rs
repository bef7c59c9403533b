//! Client configuration

use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Configuration for the management API client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the management API, without a trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
