//! Process-level application state and the stored access token.
//!
//! [`AppState`] is built once at start-up and handed to whatever needs it;
//! nothing in the crate reaches for global state.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::api::{ApiError, TicketApi};
use crate::config::ConfigError;
use crate::model::user::UserProfile;

pub const DEFAULT_ACTIVE_PAGE: &str = "Your work";

/// Category and service picked on the issue-creation screens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSelection {
    pub active_category: Option<String>,
    pub selected_service: Option<String>,
}

impl IssueSelection {
    pub fn set_active_category(&mut self, category: impl Into<String>) {
        self.active_category = Some(category.into());
    }

    pub fn set_selected_service(&mut self, service: impl Into<String>) {
        self.selected_service = Some(service.into());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub current_user: Option<UserProfile>,
    pub issue_selection: IssueSelection,
    /// Navbar marker for the page in view.
    pub active_page: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            current_user: None,
            issue_selection: IssueSelection::default(),
            active_page: DEFAULT_ACTIVE_PAGE.to_string(),
        }
    }
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(user: UserProfile) -> Self {
        Self {
            current_user: Some(user),
            ..Self::default()
        }
    }

    pub fn set_current_user(&mut self, user: UserProfile) {
        self.current_user = Some(user);
    }

    pub fn set_active_page(&mut self, page: impl Into<String>) {
        self.active_page = page.into();
    }

    /// Username of the signed-in user, empty when unknown.
    #[must_use]
    pub fn username(&self) -> &str {
        self.current_user
            .as_ref()
            .map_or("", |user| user.username.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("access token is not a JWT")]
    Malformed,
    #[error("access token payload is not valid base64url JSON")]
    BadPayload,
    #[error("access token carries no user_id claim")]
    MissingUserId,
}

/// Read the `user_id` claim from a JWT without verifying its signature.
///
/// The server verifies the token on every request; the client only needs the
/// id to look up the profile.
pub fn user_id_from_token(token: &str) -> Result<i64, TokenError> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| TokenError::BadPayload)?;
    let claims: Value = serde_json::from_slice(&bytes).map_err(|_| TokenError::BadPayload)?;

    match claims.get("user_id") {
        Some(Value::Number(n)) => n.as_i64().ok_or(TokenError::MissingUserId),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| TokenError::MissingUserId),
        _ => Err(TokenError::MissingUserId),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Resolve the signed-in user from the token's `user_id` claim.
pub fn bootstrap_user(api: &dyn TicketApi, token: &str) -> Result<UserProfile, BootstrapError> {
    let user_id = user_id_from_token(token)?;
    debug!(user_id, "fetching profile");
    let profile = api.fetch_profile(user_id)?;
    info!(username = %profile.username, "signed in");
    Ok(profile)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    access_token: Option<String>,
}

/// Access token persisted in `<config_dir>/helpdesk/credentials.toml`.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self, ConfigError> {
        Ok(Self::at(crate::config::config_dir()?.join("credentials.toml")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        let file: CredentialsFile =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(file.access_token.filter(|t| !t.trim().is_empty()))
    }

    pub fn save(&self, token: &str) -> Result<(), ConfigError> {
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let file = CredentialsFile {
            access_token: Some(token.trim().to_string()),
        };
        let content = toml::to_string(&file).map_err(|e| {
            write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        std::fs::write(&self.path, content).map_err(write_err)?;
        restrict_permissions(&self.path).map_err(write_err)
    }

    /// Remove the stored token. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, ConfigError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ConfigError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// `HELPDESK_TOKEN` wins over the credentials file.
pub fn resolve_token(env_token: Option<String>, store: &TokenStore) -> Result<Option<String>, ConfigError> {
    if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
        return Ok(Some(token.trim().to_string()));
    }
    store.load()
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
