use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ErrorCode;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid API base URL '{0}'")]
    InvalidUrl(String),
    #[error("invalid timeout '{0}', expected whole seconds")]
    InvalidTimeout(String),
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } | Self::Write { .. } => ErrorCode::FileReadFailed,
            Self::Parse { .. } | Self::InvalidTimeout(_) => ErrorCode::ConfigParseError,
            Self::InvalidUrl(_) | Self::NoConfigDir => ErrorCode::NotConfigured,
        }
    }
}

/// Contents of `<config_dir>/helpdesk/config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub output: Option<String>,
    /// Username override used instead of the profile lookup.
    #[serde(default)]
    pub user: Option<String>,
}

/// Environment overrides, captured once so resolution stays testable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub api_url: Option<String>,
    pub timeout_secs: Option<String>,
    pub format: Option<String>,
}

impl EnvOverrides {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_url: non_empty_var("HELPDESK_API_URL"),
            timeout_secs: non_empty_var("HELPDESK_TIMEOUT_SECS"),
            format: non_empty_var("FORMAT"),
        }
    }
}

/// Effective client settings after file, env and flag layering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    /// Always ends with `/`.
    pub api_url: String,
    pub timeout: Duration,
    pub output: Option<String>,
    pub user: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            output: None,
            user: None,
        }
    }
}

/// `<config_dir>/helpdesk`, or `HELPDESK_CONFIG_DIR` when set.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = non_empty_var("HELPDESK_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|dir| dir.join("helpdesk"))
        .ok_or(ConfigError::NoConfigDir)
}

pub fn load_user_config_from(path: &Path) -> Result<UserConfig, ConfigError> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str::<UserConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_user_config() -> Result<UserConfig, ConfigError> {
    match config_dir() {
        Ok(dir) => load_user_config_from(&dir.join("config.toml")),
        Err(ConfigError::NoConfigDir) => Ok(UserConfig::default()),
        Err(err) => Err(err),
    }
}

/// Layer defaults < config file < environment < command-line flag.
pub fn resolve_client_config(
    file: UserConfig,
    env: &EnvOverrides,
    cli_api_url: Option<&str>,
) -> Result<ClientConfig, ConfigError> {
    let raw_url = cli_api_url
        .map(str::to_string)
        .or_else(|| env.api_url.clone())
        .or(file.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let api_url = normalize_base_url(&raw_url)?;

    let timeout_secs = match env.timeout_secs.as_deref() {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout(raw.to_string()))?,
        None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
    };

    Ok(ClientConfig {
        api_url,
        timeout: Duration::from_secs(timeout_secs.max(1)),
        output: env.format.clone().or(file.output),
        user: file.user,
    })
}

/// Validate an http(s) base URL and make sure it ends with `/`, so relative
/// endpoint paths join under it rather than replacing its last segment.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let parsed =
        reqwest::Url::parse(trimmed).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }
    let mut url = parsed.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    Ok(url)
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
