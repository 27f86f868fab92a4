//! The ticket-resolution workspace.
//!
//! One [`Workspace`] mirrors one ticket: its snapshot, choice lists,
//! attachments and message thread, plus the compose box and staged files.
//! Every mutation goes through `&mut self`, so a front end holds exactly one
//! writer. Network calls that should not block the writer (sends) are split
//! into a local half ([`Workspace::begin_send`]) and a detached half
//! ([`PendingSend::dispatch`]) whose [`SendOutcome`] is applied afterwards.

pub mod inline_images;
pub mod lifetime;
mod loader;
pub mod permissions;
mod resolution;
pub mod send;
pub mod staging;
mod transition;

pub use lifetime::{CancelToken, Lifetime};
pub use loader::{LoadedTicket, load_thread, load_ticket_attachments, load_ticket_detail};
pub use permissions::{Action, ActionSet, Tab, permitted_actions, visible_tabs};
pub use resolution::{AssignmentForm, QuestionDraft, ResolveForm};
pub use send::{OpId, PendingSend, SendOutcome, SendResult, SendState};
pub use staging::{StagingArea, StagingError};

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::api::{ApiError, FileUpload, TicketApi};
use crate::error::ErrorCode;
use crate::model::attachment::{Attachment, LocalAttachment, PreviewUrl, RemoteAttachment};
use crate::model::message::{Message, MessageId, MessageOrigin, Report, is_empty_content};
use crate::model::resolution::{Resolution, ResolutionChoices};
use crate::model::ticket::{Status, Ticket, TicketChoices, TicketId};
use crate::model::user::UserProfile;
use crate::session::AppState;
use inline_images::extract_inline_images;
use send::Upload;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("ticket {0} is not loaded")]
    NotLoaded(TicketId),
    #[error("workspace for ticket {0} is closed")]
    Closed(TicketId),
    #[error("{user} may not {action} on this ticket")]
    NotPermitted { action: Action, user: String },
    #[error("cannot move ticket from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },
    #[error("unknown {field} '{value}'")]
    InvalidChoice { field: &'static str, value: String },
    #[error("nothing to send")]
    EmptyContent,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Staging(#[from] StagingError),
}

impl WorkspaceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotLoaded(_) => ErrorCode::WorkspaceNotLoaded,
            Self::Closed(_) => ErrorCode::WorkspaceClosed,
            Self::NotPermitted { .. } => ErrorCode::ActionNotPermitted,
            Self::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            Self::InvalidChoice { .. } => ErrorCode::InvalidChoice,
            Self::EmptyContent => ErrorCode::EmptyContent,
            Self::Api(err) => err.code(),
            Self::Staging(err) => err.code(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient message for the user, drained by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Loaded,
    Failed(String),
}

#[derive(Debug)]
struct InFlight {
    temp_id: MessageId,
    previews: Vec<PreviewUrl>,
}

/// Local mirror of one ticket for one user.
#[derive(Debug)]
pub struct Workspace {
    ticket_id: TicketId,
    user: UserProfile,
    ticket: Option<Ticket>,
    choices: TicketChoices,
    attachments: Vec<RemoteAttachment>,
    thread: Vec<Message>,
    compose: String,
    staging: StagingArea,
    notices: VecDeque<Notice>,
    load_state: LoadState,
    lifetime: Lifetime,
    in_flight: HashMap<OpId, InFlight>,
    settled: HashMap<OpId, SendState>,
    next_op: u64,
    resolution: Option<Resolution>,
    resolution_choices: ResolutionChoices,
}

impl Workspace {
    #[must_use]
    pub fn new(ticket_id: TicketId, user: UserProfile) -> Self {
        Self {
            ticket_id,
            user,
            ticket: None,
            choices: TicketChoices::default(),
            attachments: Vec::new(),
            thread: Vec::new(),
            compose: String::new(),
            staging: StagingArea::new(),
            notices: VecDeque::new(),
            load_state: LoadState::Idle,
            lifetime: Lifetime::new(),
            in_flight: HashMap::new(),
            settled: HashMap::new(),
            next_op: 1,
            resolution: None,
            resolution_choices: ResolutionChoices::default(),
        }
    }

    /// Workspace for the signed-in user of `app`.
    #[must_use]
    pub fn open(app: &AppState, ticket_id: TicketId) -> Self {
        let user = app
            .current_user
            .clone()
            .unwrap_or_else(|| UserProfile::named(""));
        Self::new(ticket_id, user)
    }

    #[must_use]
    pub const fn ticket_id(&self) -> &TicketId {
        &self.ticket_id
    }

    #[must_use]
    pub const fn user(&self) -> &UserProfile {
        &self.user
    }

    #[must_use]
    pub const fn ticket(&self) -> Option<&Ticket> {
        self.ticket.as_ref()
    }

    #[must_use]
    pub const fn choices(&self) -> &TicketChoices {
        &self.choices
    }

    #[must_use]
    pub fn attachments(&self) -> &[RemoteAttachment] {
        &self.attachments
    }

    #[must_use]
    pub fn thread(&self) -> &[Message] {
        &self.thread
    }

    #[must_use]
    pub fn compose(&self) -> &str {
        &self.compose
    }

    #[must_use]
    pub const fn staging(&self) -> &StagingArea {
        &self.staging
    }

    #[must_use]
    pub fn staged(&self) -> &[LocalAttachment] {
        self.staging.files()
    }

    #[must_use]
    pub const fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    #[must_use]
    pub const fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    #[must_use]
    pub const fn resolution_choices(&self) -> &ResolutionChoices {
        &self.resolution_choices
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifetime.is_ended()
    }

    /// Token that is cancelled when this workspace closes.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.lifetime.token()
    }

    /// Actions the current user may take right now. Empty until loaded.
    #[must_use]
    pub fn permitted_actions(&self) -> ActionSet {
        self.ticket.as_ref().map_or_else(ActionSet::empty, |ticket| {
            permitted_actions(&self.user.username, ticket)
        })
    }

    #[must_use]
    pub fn visible_tabs(&self) -> Vec<Tab> {
        self.ticket.as_ref().map_or_else(
            || vec![Tab::Notes, Tab::RelatedRecords],
            |ticket| visible_tabs(&self.user.username, ticket),
        )
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn set_compose(&mut self, content: impl Into<String>) {
        self.compose = content.into();
    }

    /// Stage a file from disk. Failures also raise an error notice.
    pub fn stage_path(&mut self, path: &Path) -> Result<LocalAttachment, WorkspaceError> {
        self.ensure_open()?;
        let staged = self.staging.stage_path(path).cloned();
        staged.map_err(|error| self.staging_failed(error))
    }

    pub fn stage_bytes(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<LocalAttachment, WorkspaceError> {
        self.ensure_open()?;
        let staged = self.staging.stage_bytes(name, bytes).cloned();
        staged.map_err(|error| self.staging_failed(error))
    }

    pub fn unstage(&mut self, local_id: &str) -> Result<LocalAttachment, WorkspaceError> {
        Ok(self.staging.remove(local_id)?)
    }

    /// Local half of a send.
    ///
    /// Returns `Ok(None)` without touching anything when there is neither
    /// content nor a staged file. Otherwise the optimistic entry is appended,
    /// the compose box and staged list are cleared, and the requests still to
    /// be made are returned.
    pub fn begin_send(&mut self) -> Result<Option<PendingSend>, WorkspaceError> {
        self.ensure_open()?;
        let has_text = !is_empty_content(&self.compose);
        if !has_text && self.staging.is_empty() {
            debug!(ticket = %self.ticket_id, "nothing to send");
            return Ok(None);
        }

        let mut locals = self.staging.take_all();
        let text = if has_text {
            let extraction = extract_inline_images(&self.compose, self.staging.ids_mut());
            locals.extend(extraction.images);
            extraction.html
        } else {
            String::new()
        };

        let op = OpId(self.next_op);
        self.next_op += 1;
        let temp_id = MessageId::Temp(self.staging.next_id("temp"));

        self.thread.push(Message {
            id: temp_id.clone(),
            author: self.user.username.clone(),
            content: std::mem::take(&mut self.compose),
            created_at: Some(chrono::Utc::now()),
            attachments: locals.iter().cloned().map(Attachment::Local).collect(),
            origin: MessageOrigin::User,
            pending: true,
        });

        let previews = locals.iter().map(|l| l.preview_url.clone()).collect();
        let uploads = locals
            .into_iter()
            .map(|local| Upload {
                placeholder: local.placeholder_caption(),
                local_id: local.id,
                file: FileUpload {
                    file_name: local.name,
                    mime_type: local.mime_type,
                    bytes: local.bytes,
                },
            })
            .collect::<Vec<_>>();

        debug!(%op, ticket = %self.ticket_id, files = uploads.len(), "send pending");
        self.in_flight.insert(op, InFlight { temp_id, previews });

        Ok(Some(PendingSend {
            op,
            ticket: self.ticket_id.clone(),
            text,
            uploads,
            token: self.lifetime.token(),
        }))
    }

    /// Settle a send. Outcomes for a closed workspace or an unknown
    /// operation change nothing and report [`SendState::Cancelled`].
    pub fn apply(&mut self, outcome: SendOutcome) -> SendState {
        let SendOutcome { op, result } = outcome;
        if self.lifetime.is_ended() {
            debug!(%op, "dropping outcome for closed workspace");
            return SendState::Cancelled;
        }
        let Some(flight) = self.in_flight.remove(&op) else {
            debug!(%op, "dropping outcome for unknown send");
            return SendState::Cancelled;
        };
        for url in &flight.previews {
            self.staging.release(url);
        }

        let state = match result {
            SendResult::Reconciled(reports) => {
                self.replace_thread(reports.into_iter().map(Message::from).collect());
                SendState::Reconciled
            }
            SendResult::Failed(error) => {
                self.thread.retain(|m| m.id != flight.temp_id);
                warn!(%op, %error, "send failed, rolled back");
                self.notify(
                    NoticeLevel::Error,
                    format!("Failed to send message: {}", error.user_message()),
                );
                SendState::RolledBack
            }
            SendResult::Unconfirmed { uploaded, error } => {
                self.confirm_locally(&flight.temp_id, uploaded);
                warn!(%op, %error, "sent but thread refresh failed");
                self.notify(
                    NoticeLevel::Warning,
                    "Message sent, but the thread could not be refreshed".to_string(),
                );
                SendState::Unconfirmed
            }
            SendResult::Cancelled => {
                self.thread.retain(|m| m.id != flight.temp_id);
                info!(%op, "send cancelled, rolled back");
                SendState::Cancelled
            }
        };
        self.settled.insert(op, state);
        state
    }

    /// Begin, dispatch and apply a send on the calling thread.
    pub fn send(&mut self, api: &dyn TicketApi) -> Result<SendState, WorkspaceError> {
        let Some(pending) = self.begin_send()? else {
            return Ok(SendState::Idle);
        };
        let outcome = pending.dispatch(api);
        Ok(self.apply(outcome))
    }

    #[must_use]
    pub fn send_state(&self, op: OpId) -> SendState {
        if self.in_flight.contains_key(&op) {
            SendState::Pending
        } else {
            self.settled.get(&op).copied().unwrap_or(SendState::Idle)
        }
    }

    /// End the workspace. In-flight sends are cancelled and every preview
    /// handle is revoked.
    pub fn close(&mut self) {
        if self.lifetime.is_ended() {
            return;
        }
        self.lifetime.end();
        for (op, _) in self.in_flight.drain() {
            self.settled.insert(op, SendState::Cancelled);
        }
        let revoked = self.staging.clear();
        info!(ticket = %self.ticket_id, revoked, "workspace closed");
    }

    fn ensure_open(&self) -> Result<(), WorkspaceError> {
        if self.lifetime.is_ended() {
            return Err(WorkspaceError::Closed(self.ticket_id.clone()));
        }
        Ok(())
    }

    fn loaded_ticket(&self) -> Result<&Ticket, WorkspaceError> {
        self.ensure_open()?;
        self.ticket
            .as_ref()
            .ok_or_else(|| WorkspaceError::NotLoaded(self.ticket_id.clone()))
    }

    /// Refuse `action` unless the current user may take it now. Returns the
    /// ticket's current status.
    fn authorize(&self, action: Action) -> Result<Status, WorkspaceError> {
        let ticket = self.loaded_ticket()?;
        if !permitted_actions(&self.user.username, ticket).contains(action) {
            return Err(WorkspaceError::NotPermitted {
                action,
                user: self.user.username.clone(),
            });
        }
        Ok(ticket.status)
    }

    fn notify(&mut self, level: NoticeLevel, text: String) {
        self.notices.push_back(Notice { level, text });
    }

    fn staging_failed(&mut self, error: StagingError) -> WorkspaceError {
        self.notify(NoticeLevel::Error, error.to_string());
        error.into()
    }

    /// Install the server's thread, keeping optimistic entries of sends that
    /// are still in flight at the end.
    fn replace_thread(&mut self, server: Vec<Message>) {
        let in_flight = &self.in_flight;
        let pending: Vec<Message> = self
            .thread
            .drain(..)
            .filter(|m| m.pending && in_flight.values().any(|f| f.temp_id == m.id))
            .collect();
        self.thread = server;
        self.thread.extend(pending);
    }

    fn confirm_locally(&mut self, temp_id: &MessageId, uploaded: Vec<(String, Report)>) {
        let Some(message) = self.thread.iter_mut().find(|m| &m.id == temp_id) else {
            return;
        };
        message.pending = false;
        let mut by_local: HashMap<String, Report> = uploaded.into_iter().collect();
        // Previews are already revoked; unacknowledged local files are dropped.
        message.attachments = std::mem::take(&mut message.attachments)
            .into_iter()
            .filter_map(|attachment| match attachment {
                Attachment::Local(local) => {
                    let record = by_local
                        .remove(&local.id)
                        .and_then(|report| report.report_attachments.into_iter().next())?;
                    Some(Attachment::Remote(local.into_remote(
                        record.id,
                        record.file_url.unwrap_or_default(),
                        record.uploaded_at,
                    )))
                }
                remote @ Attachment::Remote(_) => Some(remote),
            })
            .collect();
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> Workspace {
        Workspace::new(TicketId::new("SRIA1"), UserProfile::named("alice"))
    }

    #[test]
    fn empty_compose_is_a_no_op() {
        let mut ws = workspace();
        ws.set_compose("<p><br></p>");
        assert!(ws.begin_send().unwrap().is_none());
        assert!(ws.thread().is_empty());
        assert_eq!(ws.compose(), "<p><br></p>");
    }

    #[test]
    fn begin_send_inserts_pending_entry_and_clears_inputs() {
        let mut ws = workspace();
        ws.set_compose("hello");
        ws.stage_bytes("a.png", vec![1, 2]).unwrap();
        let pending = ws.begin_send().unwrap().unwrap();

        assert_eq!(ws.send_state(pending.op()), SendState::Pending);
        assert_eq!(pending.upload_count(), 1);
        assert_eq!(ws.compose(), "");
        assert!(ws.staged().is_empty());

        let entry = ws.thread().last().unwrap();
        assert!(entry.pending);
        assert!(entry.id.is_temp());
        assert_eq!(entry.author, "alice");
        assert_eq!(entry.content, "hello");
        assert!(entry.attachments[0].is_local());
        assert_eq!(ws.staging().previews().live_count(), 1);
    }

    #[test]
    fn outcome_after_close_is_ignored() {
        let mut ws = workspace();
        ws.set_compose("hello");
        let pending = ws.begin_send().unwrap().unwrap();
        let op = pending.op();
        ws.close();

        let outcome = SendOutcome {
            op,
            result: SendResult::Reconciled(Vec::new()),
        };
        assert_eq!(ws.apply(outcome), SendState::Cancelled);
        assert_eq!(ws.send_state(op), SendState::Cancelled);
        assert!(matches!(ws.begin_send(), Err(WorkspaceError::Closed(_))));
    }

    #[test]
    fn unknown_operation_is_ignored() {
        let mut ws = workspace();
        let outcome = SendOutcome {
            op: OpId(99),
            result: SendResult::Reconciled(Vec::new()),
        };
        assert_eq!(ws.apply(outcome), SendState::Cancelled);
    }

    #[test]
    fn cancelled_workspace_token_does_not_skip_close() {
        let mut ws = workspace();
        ws.set_compose("hello");
        ws.stage_bytes("a.png", vec![1, 2]).unwrap();
        let pending = ws.begin_send().unwrap().unwrap();
        let op = pending.op();

        ws.cancel_token().cancel();
        assert!(!ws.is_closed());
        ws.close();

        assert!(ws.is_closed());
        assert_eq!(ws.staging().previews().live_count(), 0);
        assert_eq!(ws.send_state(op), SendState::Cancelled);
        assert!(pending.cancel_token().is_cancelled());
    }

    #[test]
    fn unloaded_workspace_offers_nothing() {
        let ws = workspace();
        assert!(ws.permitted_actions().is_empty());
        assert_eq!(ws.visible_tabs(), vec![Tab::Notes, Tab::RelatedRecords]);
        assert!(matches!(
            ws.authorize(Action::StartWork),
            Err(WorkspaceError::NotLoaded(_))
        ));
    }

    #[test]
    fn open_uses_app_user() {
        let app = AppState::with_user(UserProfile::named("bob"));
        let ws = Workspace::open(&app, TicketId::new("SRIA2"));
        assert_eq!(ws.user().username, "bob");
        assert_eq!(ws.ticket_id().as_str(), "SRIA2");
    }

    #[test]
    fn drop_cancels_outstanding_sends() {
        let token;
        {
            let mut ws = workspace();
            ws.set_compose("hi");
            token = ws.begin_send().unwrap().unwrap().token;
        }
        assert!(token.is_cancelled());
    }

    #[test]
    fn error_codes() {
        assert_eq!(WorkspaceError::EmptyContent.code(), ErrorCode::EmptyContent);
        assert_eq!(
            WorkspaceError::Api(ApiError::MissingToken).code(),
            ErrorCode::MissingToken
        );
    }
}
