use serde::{Deserialize, Serialize};

use super::de_opt_text;

/// Profile of the signed-in user from `details/personal_details/{id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub email: Option<String>,
}

impl UserProfile {
    /// Profile carrying only a username, for overrides without a server lookup.
    #[must_use]
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            first_name: None,
            last_name: None,
            email: None,
        }
    }

    /// First name when known, else the username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.first_name.as_deref().unwrap_or(&self.username)
    }
}
