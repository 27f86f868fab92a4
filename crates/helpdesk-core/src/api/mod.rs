//! Network seam between the workspace and the helpdesk server.
//!
//! [`TicketApi`] is the only way the core talks to the server. [`HttpApi`] is
//! the production implementation; tests drive the workspace through stubs.

pub mod endpoints;
mod http;

pub use http::HttpApi;

use std::sync::Arc;

use crate::error::ErrorCode;
use crate::model::attachment::LocalAttachment;
use crate::model::message::{AttachmentRecord, Report};
use crate::model::resolution::{NewResolution, Resolution, ResolutionChoices};
use crate::model::ticket::{Ticket, TicketChoices, TicketId, TicketUpdate};
use crate::model::user::UserProfile;

/// Failure of a single request. Nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never completed (connect, timeout, I/O).
    #[error("{endpoint}: request failed: {message}")]
    Transport { endpoint: String, message: String },
    /// Non-2xx response. `detail` is the server's explanation when it sent one.
    #[error("{endpoint}: server returned {status}{}", detail_suffix(.detail.as_deref()))]
    Status {
        endpoint: String,
        status: u16,
        detail: Option<String>,
    },
    /// 2xx response whose body did not match the expected shape.
    #[error("{endpoint}: unexpected response: {message}")]
    Decode { endpoint: String, message: String },
    /// No bearer token is configured; no request was issued.
    #[error("access token missing")]
    MissingToken,
}

fn detail_suffix(detail: Option<&str>) -> String {
    detail.map(|d| format!(": {d}")).unwrap_or_default()
}

impl ApiError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Transport { .. } => ErrorCode::TransportFailure,
            Self::Status { status: 404, .. } => ErrorCode::TicketNotFound,
            Self::Status { .. } => ErrorCode::ServerRejected,
            Self::Decode { .. } => ErrorCode::UnexpectedResponse,
            Self::MissingToken => ErrorCode::MissingToken,
        }
    }

    /// Text suitable for a notice: the server's detail when present.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Self::Status { status, .. } => format!("Request failed with status {status}"),
            Self::MissingToken => "Access token missing. Please log in.".to_string(),
            Self::Transport { .. } => "Could not reach the helpdesk server".to_string(),
            Self::Decode { .. } => "The server sent an unexpected response".to_string(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A file sent as one multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl From<&LocalAttachment> for FileUpload {
    fn from(local: &LocalAttachment) -> Self {
        Self {
            file_name: local.name.clone(),
            mime_type: local.mime_type.clone(),
            bytes: Arc::clone(&local.bytes),
        }
    }
}

/// `POST ticket/reports/`: JSON for text only, multipart when a file is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    pub ticket: TicketId,
    pub title: String,
    pub attachment: Option<FileUpload>,
}

/// `POST ticket/ticket-comments/` (multipart).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionToUser {
    pub ticket: TicketId,
    pub username: String,
    pub comment: String,
    pub attachments: Vec<FileUpload>,
}

/// Operations the client performs against the server.
///
/// Implementations block until the response arrives and must be shareable
/// across threads so a pending send can be dispatched off the caller's thread.
pub trait TicketApi: Send + Sync {
    fn fetch_ticket(&self, id: &TicketId) -> Result<Ticket, ApiError>;

    /// Returns the server's updated snapshot.
    fn update_ticket(&self, id: &TicketId, update: &TicketUpdate) -> Result<Ticket, ApiError>;

    fn fetch_choices(&self) -> Result<TicketChoices, ApiError>;

    /// Thread entries in server order. A ticket with no entries yields an empty list.
    fn fetch_reports(&self, id: &TicketId) -> Result<Vec<Report>, ApiError>;

    fn post_report(&self, report: &NewReport) -> Result<Report, ApiError>;

    fn fetch_attachments(&self, id: &TicketId) -> Result<Vec<AttachmentRecord>, ApiError>;

    fn post_question(&self, question: &QuestionToUser) -> Result<(), ApiError>;

    /// `None` when no resolution has been recorded.
    fn fetch_resolution(&self, id: &TicketId) -> Result<Option<Resolution>, ApiError>;

    fn fetch_resolution_choices(&self) -> Result<ResolutionChoices, ApiError>;

    fn create_resolution(&self, resolution: &NewResolution) -> Result<Resolution, ApiError>;

    fn fetch_profile(&self, user_id: i64) -> Result<UserProfile, ApiError>;
}
