//! Authorization URL validation and error sanitization
//!
//! Two trust boundaries live here. The authorization URL returned by the
//! management API is only opened if it is well-formed, https, and points at a
//! host on the provider's allow-list, so a compromised or buggy server
//! response cannot send the user to an arbitrary page. Error text from the
//! remote party is collapsed to a fixed set of user-safe messages before
//! display.

use gwc_types::{AuthError, AuthResult, Provider};
use url::Url;

/// Trusted authorization hosts per provider
///
/// A returned URL must match one of these hosts exactly or be a subdomain of
/// one. https only, no embedded credentials.
pub fn trusted_hosts(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::Claude | Provider::Anthropic => &["claude.ai", "console.anthropic.com"],
        Provider::Codex => &["auth.openai.com", "platform.openai.com"],
        Provider::Gemini | Provider::GeminiCli | Provider::Antigravity => {
            &["accounts.google.com"]
        }
        Provider::Iflow => &["iflow.cn"],
        Provider::Qwen => &["chat.qwen.ai"],
        Provider::Copilot | Provider::GithubCopilot => &["github.com"],
    }
}

/// Validate an authorization URL against the provider's allow-list
pub fn validate_auth_url(provider: Provider, raw: &str) -> AuthResult<Url> {
    let url = Url::parse(raw).map_err(|_| AuthError::InvalidAuthUrl)?;

    if url.scheme() != "https" {
        return Err(AuthError::InvalidAuthUrl);
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(AuthError::InvalidAuthUrl);
    }

    let host = url.host_str().ok_or(AuthError::InvalidAuthUrl)?;
    let trusted = trusted_hosts(provider)
        .iter()
        .any(|t| host == *t || host.ends_with(&format!(".{}", t)));

    if !trusted {
        return Err(AuthError::InvalidAuthUrl);
    }

    Ok(url)
}

/// User-safe categories for raw provider error text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Denied,
    Expired,
    TimedOut,
    PopupBlocked,
    Network,
    Unknown,
}

impl ErrorCategory {
    /// Fixed display message for this category
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCategory::Denied => "Authorization was denied.",
            ErrorCategory::Expired => "The authorization request expired. Please try again.",
            ErrorCategory::TimedOut => "The authorization timed out. Please try again.",
            ErrorCategory::PopupBlocked => "Popup blocked. Please allow popups for this site.",
            ErrorCategory::Network => "Could not reach the authorization service.",
            ErrorCategory::Unknown => "Authorization failed. Please try again.",
        }
    }
}

/// Map raw error text to a category by known substrings
pub fn categorize(raw: &str) -> ErrorCategory {
    let lower = raw.to_lowercase();

    if lower.contains("access_denied") || lower.contains("denied") {
        ErrorCategory::Denied
    } else if lower.contains("expired") {
        ErrorCategory::Expired
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorCategory::TimedOut
    } else if lower.contains("popup") {
        ErrorCategory::PopupBlocked
    } else if lower.contains("network") || lower.contains("connect") || lower.contains("unreachable")
    {
        ErrorCategory::Network
    } else {
        ErrorCategory::Unknown
    }
}

/// Canonicalize remote error text to a user-safe message
///
/// Raw provider text is never echoed back; unknown input collapses to a
/// generic message.
pub fn sanitize_error(raw: &str) -> String {
    categorize(raw).message().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_provider_url_accepted() {
        let url = validate_auth_url(
            Provider::Anthropic,
            "https://claude.ai/oauth/authorize?state=abc",
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("claude.ai"));

        assert!(validate_auth_url(
            Provider::Codex,
            "https://auth.openai.com/authorize?client_id=x"
        )
        .is_ok());
    }

    #[test]
    fn test_subdomain_of_trusted_host_accepted() {
        assert!(
            validate_auth_url(Provider::Qwen, "https://login.chat.qwen.ai/device").is_ok()
        );
    }

    #[test]
    fn test_http_scheme_rejected() {
        let result = validate_auth_url(Provider::Anthropic, "http://claude.ai/authorize");
        assert!(matches!(result, Err(AuthError::InvalidAuthUrl)));
    }

    #[test]
    fn test_untrusted_host_rejected() {
        let result = validate_auth_url(Provider::Anthropic, "https://evil.example.com/authorize");
        assert!(matches!(result, Err(AuthError::InvalidAuthUrl)));

        // A host merely containing a trusted name is not trusted
        let result = validate_auth_url(Provider::Anthropic, "https://claude.ai.evil.com/a");
        assert!(matches!(result, Err(AuthError::InvalidAuthUrl)));
    }

    #[test]
    fn test_host_allow_list_is_per_provider() {
        // github.com is trusted for Copilot, not for Anthropic
        assert!(validate_auth_url(Provider::Copilot, "https://github.com/login/device").is_ok());
        let result = validate_auth_url(Provider::Anthropic, "https://github.com/login/device");
        assert!(matches!(result, Err(AuthError::InvalidAuthUrl)));
    }

    #[test]
    fn test_embedded_credentials_rejected() {
        let result = validate_auth_url(Provider::Anthropic, "https://user:pw@claude.ai/authorize");
        assert!(matches!(result, Err(AuthError::InvalidAuthUrl)));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            validate_auth_url(Provider::Claude, "not a url"),
            Err(AuthError::InvalidAuthUrl)
        ));
    }

    #[test]
    fn test_categorize_known_substrings() {
        assert_eq!(categorize("access_denied by user"), ErrorCategory::Denied);
        assert_eq!(categorize("token expired"), ErrorCategory::Expired);
        assert_eq!(categorize("request timeout"), ErrorCategory::TimedOut);
        assert_eq!(categorize("connection refused"), ErrorCategory::Network);
        assert_eq!(categorize("ECONNRESET weirdness"), ErrorCategory::Unknown);
    }

    #[test]
    fn test_sanitize_never_echoes_input() {
        let raw = "<script>alert(1)</script> injected provider garbage";
        let sanitized = sanitize_error(raw);
        assert!(!sanitized.contains("script"));
        assert_eq!(sanitized, ErrorCategory::Unknown.message());
    }
}
