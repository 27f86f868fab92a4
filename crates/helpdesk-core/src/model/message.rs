//! Thread entries ("reports" on the wire) and their client-side form.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use super::attachment::{Attachment, RemoteAttachment};
use super::de_opt_text;
use super::ticket::Status;

/// Author shown for entries the server returns without a username.
pub const SYSTEM_AUTHOR: &str = "System";

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));

/// Identity of a thread entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    /// Client-generated id of an optimistic entry.
    Temp(String),
    /// `report_id` assigned by the server.
    Server(i64),
}

impl MessageId {
    #[must_use]
    pub const fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temp(id) => f.write_str(id),
            Self::Server(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    User,
    System,
}

/// One entry of a ticket's message thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub author: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
    pub origin: MessageOrigin,
    /// Set on optimistic entries until the server confirms them.
    pub pending: bool,
}

impl Message {
    /// Entry announcing a status change made by `actor`.
    #[must_use]
    pub fn status_change(id: String, actor: &str, from: Status, to: Status) -> Self {
        Self {
            id: MessageId::Temp(id),
            author: actor.to_string(),
            content: format!("Status changed from {from} to {to} by {actor}"),
            created_at: Some(Utc::now()),
            attachments: Vec::new(),
            origin: MessageOrigin::System,
            pending: false,
        }
    }

    #[must_use]
    pub fn is_from(&self, username: &str) -> bool {
        self.author.to_lowercase() == username.trim().to_lowercase()
    }

    /// Content with markup stripped, for terminal rendering.
    #[must_use]
    pub fn plain_text(&self) -> String {
        plain_text(&self.content)
    }
}

/// `report_attachments[]` entry, also the element type of `ticket/attachments/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: i64,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub file_url: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub uploaded_at: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub ticket: Option<String>,
}

impl From<AttachmentRecord> for RemoteAttachment {
    fn from(record: AttachmentRecord) -> Self {
        Self::from_url(record.id, record.file_url, record.uploaded_at)
    }
}

/// Wire form of a thread entry from `GET ticket/reports/?ticket={id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: i64,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub report_attachments: Vec<AttachmentRecord>,
}

impl From<Report> for Message {
    fn from(report: Report) -> Self {
        let created_at = report
            .created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Self {
            id: MessageId::Server(report.report_id),
            author: report
                .username
                .unwrap_or_else(|| SYSTEM_AUTHOR.to_string()),
            content: report.content.or(report.title).unwrap_or_default(),
            created_at,
            attachments: report
                .report_attachments
                .into_iter()
                .map(|record| Attachment::Remote(record.into()))
                .collect(),
            origin: MessageOrigin::User,
            pending: false,
        }
    }
}

/// Whether compose content carries nothing worth sending.
///
/// Editor placeholders such as `<p><br></p>` count as empty; an inline image
/// counts as content.
#[must_use]
pub fn is_empty_content(html: &str) -> bool {
    let trimmed = html.trim();
    if trimmed.is_empty() || trimmed == "<p><br></p>" || trimmed == "<p></p>" {
        return true;
    }
    if trimmed.to_ascii_lowercase().contains("<img") {
        return false;
    }
    plain_text(trimmed).trim().is_empty()
}

/// Strip tags and decode the handful of entities the editor emits.
#[must_use]
pub fn plain_text(html: &str) -> String {
    let spaced = html
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("</p>", "\n");
    TAG_RE
        .replace_all(&spaced, "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn report_converts_with_attachments() {
        let report: Report = serde_json::from_value(json!({
            "report_id": 41,
            "title": "<p>Rebooted the gateway</p>",
            "username": "alice",
            "created_at": "2025-03-01T10:15:00+05:30",
            "report_attachments": [
                {"id": 3, "file_url": "http://h/media/attachments/log.txt", "uploaded_at": "2025-03-01T10:15:00+05:30"}
            ]
        }))
        .unwrap();

        let message = Message::from(report);
        assert_eq!(message.id, MessageId::Server(41));
        assert_eq!(message.author, "alice");
        assert_eq!(message.content, "<p>Rebooted the gateway</p>");
        assert_eq!(message.origin, MessageOrigin::User);
        assert!(!message.pending);
        assert_eq!(
            message.created_at.map(|t| t.to_rfc3339()),
            Some("2025-03-01T04:45:00+00:00".to_string())
        );
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].name(), "log.txt");
        assert_eq!(message.attachments[0].mime_type(), "text/plain");
    }

    #[test]
    fn report_without_username_is_attributed_to_system() {
        let report: Report = serde_json::from_value(json!({"report_id": 1, "username": null})).unwrap();
        let message = Message::from(report);
        assert_eq!(message.author, SYSTEM_AUTHOR);
        assert_eq!(message.content, "");
        assert_eq!(message.created_at, None);
    }

    #[test]
    fn status_change_message_names_both_ends() {
        let msg = Message::status_change(
            "status-1".into(),
            "alice",
            Status::Open,
            Status::WorkingInProgress,
        );
        assert_eq!(msg.origin, MessageOrigin::System);
        assert!(msg.content.contains("Open"));
        assert!(msg.content.contains("Working in Progress"));
        assert!(msg.content.ends_with("by alice"));
    }

    #[test]
    fn editor_placeholders_are_empty() {
        assert!(is_empty_content(""));
        assert!(is_empty_content("   "));
        assert!(is_empty_content("<p><br></p>"));
        assert!(is_empty_content("<p></p>"));
        assert!(is_empty_content("<p> &nbsp; </p>"));
        assert!(!is_empty_content("<p>hi</p>"));
        assert!(!is_empty_content("<p><img src=\"data:image/png;base64,AAAA\"></p>"));
    }

    #[test]
    fn plain_text_strips_markup() {
        assert_eq!(
            plain_text("<p>One &amp; two</p><p><strong>three</strong></p>"),
            "One & two\nthree"
        );
    }

    #[test]
    fn message_ids_display() {
        assert_eq!(MessageId::Server(5).to_string(), "5");
        assert_eq!(MessageId::Temp("temp-1-x".into()).to_string(), "temp-1-x");
        assert!(MessageId::Temp("t".into()).is_temp());
    }

    proptest! {
        #[test]
        fn visible_text_is_never_empty(word in "[A-Za-z0-9]{1,12}") {
            let html = format!("<p>{word}</p>");
            prop_assert!(!is_empty_content(&html));
            prop_assert!(!is_empty_content(&word));
        }

        #[test]
        fn whitespace_only_is_empty(ws in "[ \t\n]{0,16}") {
            prop_assert!(is_empty_content(&ws));
            let wrapped = format!("<p>{ws}</p>");
            prop_assert!(is_empty_content(&wrapped));
        }
    }
}
