//! Upstream provider identifiers and flow-kind dispatch

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AuthError;

/// Which authorization pattern a flow uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowKind {
    /// Redirect-based flow completed in a popup window
    #[serde(rename = "oauth")]
    OAuth,

    /// Device-code flow: user code + verification URL, client polls
    #[serde(rename = "device")]
    Device,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowKind::OAuth => write!(f, "oauth"),
            FlowKind::Device => write!(f, "device"),
        }
    }
}

/// Closed enumeration of upstream services the console can authorize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Claude,
    Anthropic,
    Codex,
    Gemini,
    GeminiCli,
    Antigravity,
    Iflow,
    Qwen,
    Copilot,
    GithubCopilot,
}

impl Provider {
    /// The flow kind this provider is expected to use
    pub fn kind(&self) -> FlowKind {
        match self {
            Provider::Qwen | Provider::Copilot | Provider::GithubCopilot => FlowKind::Device,
            _ => FlowKind::OAuth,
        }
    }

    /// Whether this provider uses the device-code flow
    pub fn is_device(&self) -> bool {
        self.kind() == FlowKind::Device
    }

    /// Wire identifier, as sent to the management API
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::Anthropic => "anthropic",
            Provider::Codex => "codex",
            Provider::Gemini => "gemini",
            Provider::GeminiCli => "gemini-cli",
            Provider::Antigravity => "antigravity",
            Provider::Iflow => "iflow",
            Provider::Qwen => "qwen",
            Provider::Copilot => "copilot",
            Provider::GithubCopilot => "github-copilot",
        }
    }

    /// Human-readable display name
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Claude => "Claude",
            Provider::Anthropic => "Anthropic",
            Provider::Codex => "OpenAI Codex",
            Provider::Gemini | Provider::GeminiCli => "Google Gemini",
            Provider::Antigravity => "Antigravity",
            Provider::Iflow => "iFlow",
            Provider::Qwen => "Qwen",
            Provider::Copilot | Provider::GithubCopilot => "GitHub Copilot",
        }
    }

    /// All known providers
    pub fn all() -> &'static [Provider] {
        &[
            Provider::Claude,
            Provider::Anthropic,
            Provider::Codex,
            Provider::Gemini,
            Provider::GeminiCli,
            Provider::Antigravity,
            Provider::Iflow,
            Provider::Qwen,
            Provider::Copilot,
            Provider::GithubCopilot,
        ]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::all()
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| AuthError::UnsupportedProvider(s.to_string()))
    }
}
