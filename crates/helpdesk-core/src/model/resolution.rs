use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::de_opt_text;
use super::ticket::{Status, TicketId};

/// Resolution record from `resolution/resolutions/{ticketId}/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(default)]
    pub resolution_id: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub resolution_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub incident_based_on: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub incident_category: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub resolution_description: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub resolution_summary: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Enumerations from `resolution/resolution-choices/`, as `(code, label)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionChoices {
    #[serde(default)]
    pub resolution_type_choices: Vec<(String, String)>,
    #[serde(default)]
    pub incident_based_on_choices: Vec<(String, String)>,
    #[serde(default)]
    pub incident_category_choices: Vec<(String, String)>,
}

impl ResolutionChoices {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolution_type_choices.is_empty()
            && self.incident_based_on_choices.is_empty()
            && self.incident_category_choices.is_empty()
    }

    /// Resolve a code or label (any case) to the server's code.
    #[must_use]
    pub fn resolution_type(&self, input: &str) -> Option<&str> {
        lookup(&self.resolution_type_choices, input)
    }

    #[must_use]
    pub fn incident_based_on(&self, input: &str) -> Option<&str> {
        lookup(&self.incident_based_on_choices, input)
    }

    #[must_use]
    pub fn incident_category(&self, input: &str) -> Option<&str> {
        lookup(&self.incident_category_choices, input)
    }
}

fn lookup<'a>(choices: &'a [(String, String)], input: &str) -> Option<&'a str> {
    let needle = input.trim();
    choices
        .iter()
        .find(|(code, label)| code.eq_ignore_ascii_case(needle) || label.eq_ignore_ascii_case(needle))
        .map(|(code, _)| code.as_str())
}

/// Body of `POST resolution/resolutions/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewResolution {
    pub ticket_id: TicketId,
    pub status: Status,
    pub resolution_type: String,
    pub incident_based_on: String,
    pub incident_category: String,
    pub resolution_description: String,
    pub resolution_summary: String,
    /// Profile id when known, else the username.
    pub resolved_by: Value,
    /// RFC 3339 timestamp.
    pub resolved_date: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn choices() -> ResolutionChoices {
        serde_json::from_value(json!({
            "resolution_type_choices": [["fixed", "Fixed"], ["known error", "Known Error"]],
            "incident_based_on_choices": [["none", "None"], ["configuration", "Configuration"]],
            "incident_category_choices": [["none", "None"], ["other", "Other"]]
        }))
        .unwrap()
    }

    #[test]
    fn lookups_accept_code_or_label() {
        let choices = choices();
        assert_eq!(choices.resolution_type("Known Error"), Some("known error"));
        assert_eq!(choices.resolution_type("FIXED"), Some("fixed"));
        assert_eq!(choices.incident_based_on("configuration"), Some("configuration"));
        assert_eq!(choices.incident_category("Other"), Some("other"));
        assert_eq!(choices.resolution_type("magic"), None);
        assert!(!choices.is_empty());
    }

    #[test]
    fn resolution_record_decodes_with_extra_fields() {
        let record: Resolution = serde_json::from_value(json!({
            "resolution_id": 4,
            "resolution_type": "fixed",
            "incident_based_on": "configuration",
            "incident_category": "none",
            "resolution_description": "Replaced the certificate",
            "created_by": "alice",
            "created_at": "2025-03-02T09:00:00Z",
            "is_active": true
        }))
        .unwrap();
        assert_eq!(record.resolution_id, Some(4));
        assert_eq!(record.resolution_summary, None);
        assert_eq!(record.extra.get("is_active"), Some(&json!(true)));
    }

    #[test]
    fn new_resolution_serializes_status_wire_value() {
        let body = serde_json::to_value(NewResolution {
            ticket_id: TicketId::new("SRIA1"),
            status: Status::Resolved,
            resolution_type: "fixed".into(),
            incident_based_on: "none".into(),
            incident_category: "none".into(),
            resolution_description: "notes".into(),
            resolution_summary: String::new(),
            resolved_by: json!(12),
            resolved_date: "2025-03-02T09:00:00Z".into(),
        })
        .unwrap();
        assert_eq!(body["status"], "Resolved");
        assert_eq!(body["ticket_id"], "SRIA1");
        assert_eq!(body["resolved_by"], 12);
    }
}
