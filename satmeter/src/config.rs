//! Configuration file handling.
//!
//! Configuration lives in `~/.satmeter/config.json`. A missing file yields
//! the defaults; unknown fields are ignored so older binaries can read newer
//! files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::HttpClientConfig;

const CONFIG_DIR_NAME: &str = ".satmeter";
const CONFIG_FILE_NAME: &str = "config.json";

/// Default Cashu mint.
pub const DEFAULT_MINT_URL: &str = "https://mint.minibits.cash/Bitcoin";
/// Default metering gateway.
pub const DEFAULT_GATEWAY_URL: &str = "https://api.routstr.com";

/// Error type for configuration handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("config I/O error at {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid JSON for [`MeterConfig`].
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// The configuration could not be rendered as JSON.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The configuration has errors that prevent use.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Which payment provider meters runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Runs are free and nothing is reserved.
    #[default]
    Local,
    /// Runs are paid from the e-cash wallet through the metering gateway.
    Routstr,
}

impl ProviderKind {
    /// Lowercase name as written in the config file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Routstr => "routstr",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Payment provider.
    pub provider: ProviderKind,
    /// Names the wallet database file.
    pub wallet_id: String,
    /// Directory for wallet databases. Defaults to the config directory.
    pub data_dir: Option<PathBuf>,
    /// Home mint base URL.
    pub mint_url: String,
    /// Metering gateway base URL.
    pub gateway_url: String,
    /// Timeout for mint calls.
    pub http_timeout_secs: u64,
    /// Timeout for the refund call. Longer than mint calls because the
    /// gateway may still be settling the run.
    pub refund_timeout_secs: u64,
    /// Budget reserved per run when the caller does not pass one.
    pub default_budget_sats: u64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            wallet_id: "default".to_owned(),
            data_dir: None,
            mint_url: DEFAULT_MINT_URL.to_owned(),
            gateway_url: DEFAULT_GATEWAY_URL.to_owned(),
            http_timeout_secs: 30,
            refund_timeout_secs: 60,
            default_budget_sats: 2000,
        }
    }
}

/// Severity of a [`ConfigIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    /// The configuration cannot be used.
    Error,
    /// Usable, but probably not what was intended.
    Warning,
}

/// A problem found by [`MeterConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    /// Severity.
    pub level: IssueLevel,
    /// Offending field.
    pub field: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl ConfigIssue {
    fn error(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            field,
            message: message.into(),
        }
    }

    fn warning(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.level {
            IssueLevel::Error => "error",
            IssueLevel::Warning => "warning",
        };
        write!(f, "{level}: {}: {}", self.field, self.message)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

impl MeterConfig {
    /// Check the configuration for problems.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.wallet_id.is_empty() {
            issues.push(ConfigIssue::error("wallet_id", "must not be empty"));
        } else if !self
            .wallet_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            issues.push(ConfigIssue::error(
                "wallet_id",
                "may only contain ASCII letters, digits, '-' and '_'",
            ));
        }

        if !is_http_url(&self.mint_url) {
            issues.push(ConfigIssue::error("mint_url", "must be an http(s) URL"));
        } else if self.mint_url.starts_with("http://") {
            issues.push(ConfigIssue::warning("mint_url", "mint is not using TLS"));
        }

        if self.provider == ProviderKind::Routstr {
            if !is_http_url(&self.gateway_url) {
                issues.push(ConfigIssue::error("gateway_url", "must be an http(s) URL"));
            }
            if self.default_budget_sats == 0 {
                issues.push(ConfigIssue::error(
                    "default_budget_sats",
                    "must be greater than zero",
                ));
            }
        }

        if self.http_timeout_secs == 0 {
            issues.push(ConfigIssue::error("http_timeout_secs", "must be greater than zero"));
        }
        if self.refund_timeout_secs == 0 {
            issues.push(ConfigIssue::error(
                "refund_timeout_secs",
                "must be greater than zero",
            ));
        }

        issues
    }

    /// `Err` if [`validate`](Self::validate) reports any error-level issue.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing every error-level issue.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|i| i.level == IssueLevel::Error)
            .map(|i| format!("{}: {}", i.field, i.message))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors.join("; ")))
        }
    }

    /// Directory holding wallet databases.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(config_dir)
    }

    /// Path of this wallet's database, `<data_dir>/<wallet_id>.db`.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir().join(format!("{}.db", self.wallet_id))
    }

    /// HTTP settings for mint calls.
    #[must_use]
    pub fn mint_http(&self) -> HttpClientConfig {
        HttpClientConfig::with_timeout(self.http_timeout_secs)
    }

    /// HTTP settings for the refund call.
    #[must_use]
    pub fn refund_http(&self) -> HttpClientConfig {
        HttpClientConfig::with_timeout(self.refund_timeout_secs)
    }
}

/// `~/.satmeter`, or `./.satmeter` if there is no home directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// `~/.satmeter/config.json`.
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Load configuration from the default path.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_config() -> Result<MeterConfig, ConfigError> {
    load_config_from(&config_path()).await
}

/// Load configuration from `path`. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_config_from(path: &Path) -> Result<MeterConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(MeterConfig::default());
        }
        Err(e) => return Err(ConfigError::io(path, e)),
    };
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Save configuration to the default path.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn save_config(config: &MeterConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_path()).await
}

/// Save configuration to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub async fn save_config_to(config: &MeterConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::io(parent, e))?;
    }
    let content = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| ConfigError::io(path, e))?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

/// Write a default configuration to `path` and return it.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn init_config(path: &Path) -> Result<MeterConfig, ConfigError> {
    let config = MeterConfig::default();
    save_config_to(&config, path).await?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MeterConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.provider, ProviderKind::Local);
        assert_eq!(config.default_budget_sats, 2000);
        assert!(config.ledger_path().ends_with("default.db"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: MeterConfig =
            serde_json::from_str(r#"{"provider":"routstr","wallet_id":"agent-1"}"#).unwrap();
        assert_eq!(config.provider, ProviderKind::Routstr);
        assert_eq!(config.wallet_id, "agent-1");
        assert_eq!(config.mint_url, DEFAULT_MINT_URL);
        assert_eq!(config.refund_timeout_secs, 60);
    }

    #[test]
    fn test_validate_reports_issues() {
        let config = MeterConfig {
            provider: ProviderKind::Routstr,
            wallet_id: "../escape".into(),
            mint_url: "http://localhost:3338".into(),
            gateway_url: "ftp://gateway".into(),
            default_budget_sats: 0,
            ..MeterConfig::default()
        };
        let issues = config.validate();
        let fields: Vec<&str> = issues.iter().map(|i| i.field).collect();
        assert!(fields.contains(&"wallet_id"));
        assert!(fields.contains(&"gateway_url"));
        assert!(fields.contains(&"default_budget_sats"));

        let mint = issues.iter().find(|i| i.field == "mint_url").unwrap();
        assert_eq!(mint.level, IssueLevel::Warning);

        assert!(matches!(config.ensure_valid(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_gateway_ignored_for_local() {
        let config = MeterConfig {
            gateway_url: String::new(),
            ..MeterConfig::default()
        };
        assert!(config.ensure_valid().is_ok());
    }

    #[tokio::test]
    async fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.json")).await.unwrap();
        assert_eq!(config, MeterConfig::default());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = init_config(&path).await.unwrap();
        config.provider = ProviderKind::Routstr;
        config.data_dir = Some(dir.path().to_path_buf());
        save_config_to(&config, &path).await.unwrap();

        let loaded = load_config_from(&path).await.unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.ledger_path(), dir.path().join("default.db"));
    }

    #[tokio::test]
    async fn test_load_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        assert!(matches!(
            load_config_from(&path).await,
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_serialize_error_is_not_reported_as_parse() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let err = ConfigError::Serialize(source);
        assert!(err.to_string().starts_with("failed to serialize config"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
