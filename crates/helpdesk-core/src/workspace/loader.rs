use tracing::{debug, info, warn};

use super::{LoadState, NoticeLevel, Workspace, WorkspaceError};
use crate::api::{ApiError, TicketApi};
use crate::model::attachment::RemoteAttachment;
use crate::model::message::Message;
use crate::model::ticket::{Ticket, TicketChoices, TicketId};

/// Ticket snapshot and the choice lists needed to edit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTicket {
    pub ticket: Ticket,
    pub choices: TicketChoices,
    /// Secondary fetches that failed and were replaced with empty data.
    pub warnings: Vec<String>,
}

/// Fetch the ticket and its choice lists. Only the ticket fetch is fatal.
pub fn load_ticket_detail(api: &dyn TicketApi, id: &TicketId) -> Result<LoadedTicket, ApiError> {
    let ticket = api.fetch_ticket(id)?;
    let mut warnings = Vec::new();
    let choices = api.fetch_choices().unwrap_or_else(|error| {
        warn!(ticket = %id, %error, "choice lists unavailable");
        warnings.push(format!("Could not load choice lists: {}", error.user_message()));
        TicketChoices::default()
    });
    debug!(ticket = %id, status = %ticket.status, "ticket loaded");
    Ok(LoadedTicket {
        ticket,
        choices,
        warnings,
    })
}

/// Thread entries in server order.
pub fn load_thread(api: &dyn TicketApi, id: &TicketId) -> Result<Vec<Message>, ApiError> {
    Ok(api
        .fetch_reports(id)?
        .into_iter()
        .map(Message::from)
        .collect())
}

/// Files attached to `id`. Records the server returns for other tickets are
/// dropped.
pub fn load_ticket_attachments(
    api: &dyn TicketApi,
    id: &TicketId,
) -> Result<Vec<RemoteAttachment>, ApiError> {
    Ok(api
        .fetch_attachments(id)?
        .into_iter()
        .filter(|record| record.ticket.as_deref().map(str::trim) == Some(id.as_str()))
        .map(RemoteAttachment::from)
        .collect())
}

impl Workspace {
    /// Load (or reload) the ticket, its attachments and its thread.
    ///
    /// A failed ticket fetch leaves the workspace in [`LoadState::Failed`]
    /// and returns the error. Failed secondary fetches degrade to empty data
    /// with a warning notice.
    pub fn load(&mut self, api: &dyn TicketApi) -> Result<(), WorkspaceError> {
        self.ensure_open()?;

        let loaded = match load_ticket_detail(api, &self.ticket_id) {
            Ok(loaded) => loaded,
            Err(error) => {
                warn!(ticket = %self.ticket_id, %error, "ticket load failed");
                let message = error.user_message();
                self.ticket = None;
                self.load_state = LoadState::Failed(message.clone());
                self.notify(NoticeLevel::Error, message);
                return Err(error.into());
            }
        };
        self.ticket = Some(loaded.ticket);
        self.choices = loaded.choices;
        for warning in loaded.warnings {
            self.notify(NoticeLevel::Warning, warning);
        }

        match load_ticket_attachments(api, &self.ticket_id) {
            Ok(attachments) => self.attachments = attachments,
            Err(error) => {
                warn!(ticket = %self.ticket_id, %error, "attachments unavailable");
                self.attachments.clear();
                self.notify(
                    NoticeLevel::Warning,
                    format!("Could not load attachments: {}", error.user_message()),
                );
            }
        }

        if self.refresh_thread(api).is_err() {
            self.replace_thread(Vec::new());
        }

        self.load_state = LoadState::Loaded;
        info!(
            ticket = %self.ticket_id,
            entries = self.thread.len(),
            attachments = self.attachments.len(),
            "workspace loaded"
        );
        Ok(())
    }

    /// Replace the thread with the server's, keeping entries of sends still
    /// in flight. Returns the number of entries.
    pub fn refresh_thread(&mut self, api: &dyn TicketApi) -> Result<usize, WorkspaceError> {
        self.ensure_open()?;
        match load_thread(api, &self.ticket_id) {
            Ok(messages) => {
                self.replace_thread(messages);
                Ok(self.thread.len())
            }
            Err(error) => {
                warn!(ticket = %self.ticket_id, %error, "thread unavailable");
                self.notify(
                    NoticeLevel::Warning,
                    format!("Could not load messages: {}", error.user_message()),
                );
                Err(error.into())
            }
        }
    }
}
