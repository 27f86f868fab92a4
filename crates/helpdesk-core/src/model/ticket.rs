use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

use super::{ParseEnumError, de_opt_text};

/// Server-assigned ticket number (`ticket_id`), e.g. `SRIA48213307`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TicketId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Ticket status as reported by the server.
///
/// The first six variants form the ordered lifecycle
/// `Open -> Working in Progress -> Waiting for User Response -> Resolved -> Closed -> Canceled`.
/// `Breached` and `Delegated` are set by the server and sit outside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Status {
    #[default]
    Open,
    WorkingInProgress,
    WaitingForUser,
    Resolved,
    Closed,
    Canceled,
    Breached,
    Delegated,
}

impl Status {
    /// Lifecycle statuses in display order.
    pub const LIFECYCLE: [Self; 6] = [
        Self::Open,
        Self::WorkingInProgress,
        Self::WaitingForUser,
        Self::Resolved,
        Self::Closed,
        Self::Canceled,
    ];

    /// Wire representation accepted by `PUT ticket/tickets/{id}/`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::WorkingInProgress => "Working in Progress",
            Self::WaitingForUser => "Waiting for User Response",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
            Self::Canceled => "Canceled",
            Self::Breached => "Breached",
            Self::Delegated => "Delegated",
        }
    }

    /// Human label (the server's display value).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            other => other.as_str(),
        }
    }

    /// Position in the ordered lifecycle, `None` for off-lifecycle statuses.
    #[must_use]
    pub fn lifecycle_position(self) -> Option<usize> {
        Self::LIFECYCLE.iter().position(|s| *s == self)
    }

    /// Whether no further work is expected on the ticket.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed | Self::Canceled)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "open" => Ok(Self::Open),
            "working in progress" | "work in progress" | "in progress" => {
                Ok(Self::WorkingInProgress)
            }
            "waiting for user response" | "waiting for user" => Ok(Self::WaitingForUser),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "breached" => Ok(Self::Breached),
            "delegated" => Ok(Self::Delegated),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Snapshot of a ticket as returned by `GET ticket/tickets/{id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: TicketId,
    #[serde(default)]
    pub summary: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub assignee: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub impact: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub modified_at: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub project: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub product: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub service_domain: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub service_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub solution_grp: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub developer_organization: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub support_team: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub customer_number: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub contact_mode: Option<String>,
    #[serde(default)]
    pub reference_tickets: Vec<Value>,
    /// Fields this client does not model, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Ticket {
    /// Case-insensitive comparison against the assignee's username.
    #[must_use]
    pub fn is_assigned_to(&self, username: &str) -> bool {
        let username = username.trim();
        !username.is_empty()
            && self
                .assignee
                .as_deref()
                .is_some_and(|assignee| assignee.trim().to_lowercase() == username.to_lowercase())
    }
}

/// Entry of `priority_choices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityChoice {
    pub priority_id: i64,
    pub urgency_name: String,
}

/// Dropdown enumerations from `GET ticket/ticket/choices/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketChoices {
    #[serde(default)]
    pub status_choices: Vec<(String, String)>,
    #[serde(default)]
    pub impact_choices: Vec<(String, String)>,
    #[serde(default)]
    pub priority_choices: Vec<PriorityChoice>,
    #[serde(default)]
    pub support_team_choices: Vec<(String, String)>,
}

impl TicketChoices {
    /// Map an impact label (`High`) to its code (`A`).
    #[must_use]
    pub fn impact_code(&self, label: &str) -> Option<&str> {
        self.impact_choices
            .iter()
            .find(|(_, l)| l == label)
            .map(|(code, _)| code.as_str())
    }

    /// Map a priority label (`P1`) to its id.
    #[must_use]
    pub fn priority_id(&self, label: &str) -> Option<i64> {
        self.priority_choices
            .iter()
            .find(|p| p.urgency_name == label)
            .map(|p| p.priority_id)
    }

    /// Support team label for a code (`a` -> `FirstLevel`).
    #[must_use]
    pub fn support_team_label(&self, code: &str) -> Option<&str> {
        self.support_team_choices
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, label)| label.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status_choices.is_empty()
            && self.impact_choices.is_empty()
            && self.priority_choices.is_empty()
            && self.support_team_choices.is_empty()
    }
}

/// Partial update body for `PUT ticket/tickets/{id}/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_grp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl TicketUpdate {
    #[must_use]
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}
