use std::time::Duration;

use crate::errors::ClientError;

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "SINTELLI_API_KEY";
/// Environment variable overriding the base URL.
pub const ENV_BASE_URL: &str = "SINTELLI_BASE_URL";

/// Default service endpoint.
pub const DEFAULT_BASE_URL: &str = "https://sintelli.workers.dev";
/// Role sent when the caller does not pick one.
pub const DEFAULT_ROLE: &str = "user";
/// Token budget sent when the caller does not pick one.
pub const DEFAULT_MAX_TOKENS: u32 = 16234;
/// Generation deadline used when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const GENERATE_PATH: &str = "/api/v1/";

/// Connection settings shared by every generation of a client.
#[derive(Clone)]
pub struct ClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL of the service. Trailing slashes are ignored.
    pub base_url: String,
    /// Deadline applied to generations that do not set their own.
    pub default_timeout: Duration,
}

impl ClientConfig {
    /// Creates a config with the default endpoint and the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Builds a config from `SINTELLI_API_KEY` and, when set,
    /// `SINTELLI_BASE_URL`.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = std::env::var(ENV_API_KEY).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(ClientError::Config(format!(
                "missing {ENV_API_KEY} for the Sintelli client"
            )));
        }
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var(ENV_BASE_URL)
            && !base_url.trim().is_empty()
        {
            config.base_url = base_url;
        }
        Ok(config)
    }

    /// Overrides the base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the default generation deadline.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub(crate) fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub(crate) fn has_base_url(&self) -> bool {
        !self.base_url.trim().trim_end_matches('/').is_empty()
    }

    pub(crate) fn generate_url(&self) -> String {
        format!("{}{GENERATE_PATH}", self.base_url.trim().trim_end_matches('/'))
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_url_normalizes_trailing_slashes() {
        for base in [
            "https://example.test",
            "https://example.test/",
            "https://example.test///",
        ] {
            assert_eq!(
                ClientConfig::new("k").base_url(base).generate_url(),
                "https://example.test/api/v1/"
            );
        }
    }

    #[test]
    fn defaults_match_the_service() {
        let config = ClientConfig::new("k");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.default_timeout, DEFAULT_TIMEOUT);
        assert!(config.has_api_key());
    }

    #[test]
    fn blank_key_and_base_url_are_detected() {
        let config = ClientConfig::new("   ").base_url("/");
        assert!(!config.has_api_key());
        assert!(!config.has_base_url());
    }

    #[test]
    fn debug_redacts_the_api_key() {
        let rendered = format!("{:?}", ClientConfig::new("sk-live-123"));
        assert!(!rendered.contains("sk-live-123"));
    }
}
