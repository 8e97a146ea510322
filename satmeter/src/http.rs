//! Shared HTTP client configuration for the mint and gateway clients.

use std::time::Duration;

/// Default user agent sent to mints and gateways.
pub const DEFAULT_USER_AGENT: &str = concat!("satmeter/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// User agent string.
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Some(30),
            connect_timeout_secs: Some(10),
            user_agent: Some(DEFAULT_USER_AGENT.to_owned()),
        }
    }
}

impl HttpClientConfig {
    /// Configuration with the given request timeout and defaults otherwise.
    #[must_use]
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            timeout_secs: Some(timeout_secs),
            ..Self::default()
        }
    }

    /// Build a reqwest client with this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        if let Some(timeout) = self.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }
        if let Some(ref user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }

        builder.build()
    }
}

/// Join a base URL and a path without doubling the slash.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_config_default() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout_secs, Some(30));
        assert!(config.user_agent.as_deref().unwrap().starts_with("satmeter/"));
        assert!(config.build_client().is_ok());
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://mint.example/", "/split"), "https://mint.example/split");
        assert_eq!(join_url("https://mint.example", "check"), "https://mint.example/check");
        assert_eq!(
            join_url("https://gw.example/v1", "balance/refund"),
            "https://gw.example/v1/balance/refund"
        );
    }
}
