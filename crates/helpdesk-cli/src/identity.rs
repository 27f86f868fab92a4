//! Who the CLI acts as.
//!
//! The resolution chain: `--user` flag > `HELPDESK_USER` env > `user` in
//! `config.toml` > the profile named by the access token's `user_id` claim.
//! Only the last step costs a request.

use helpdesk_core::TicketApi;
use helpdesk_core::model::user::UserProfile;
use helpdesk_core::session::{BootstrapError, bootstrap_user};
use serde::Serialize;
use std::env;

/// Where the username came from, reported by `hd whoami`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    Flag,
    Env,
    Config,
    Token,
}

impl IdentitySource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Flag => "--user flag",
            Self::Env => "HELPDESK_USER",
            Self::Config => "config.toml",
            Self::Token => "access token",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub profile: UserProfile,
    pub source: IdentitySource,
}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

fn resolve_override_with(
    cli_flag: Option<&str>,
    config_user: Option<&str>,
    env: &dyn EnvReader,
) -> Option<(String, IdentitySource)> {
    if let Some(user) = cli_flag.map(str::trim).filter(|u| !u.is_empty()) {
        return Some((user.to_string(), IdentitySource::Flag));
    }

    if let Some(user) = env.get("HELPDESK_USER") {
        return Some((user.trim().to_string(), IdentitySource::Env));
    }

    config_user
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(|u| (u.to_string(), IdentitySource::Config))
}

/// Username override from the first three steps of the chain, if any.
pub fn resolve_override(
    cli_flag: Option<&str>,
    config_user: Option<&str>,
) -> Option<(String, IdentitySource)> {
    resolve_override_with(cli_flag, config_user, &RealEnv)
}

/// Resolve the acting user, falling back to the token's profile.
pub fn resolve_identity(
    cli_flag: Option<&str>,
    config_user: Option<&str>,
    api: &dyn TicketApi,
    token: Option<&str>,
) -> Result<Identity, BootstrapError> {
    if let Some((username, source)) = resolve_override(cli_flag, config_user) {
        return Ok(Identity {
            profile: UserProfile::named(username),
            source,
        });
    }

    let token = token.ok_or(helpdesk_core::ApiError::MissingToken)?;
    let profile = bootstrap_user(api, token)?;
    Ok(Identity {
        profile,
        source: IdentitySource::Token,
    })
}
