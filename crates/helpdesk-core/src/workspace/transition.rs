use tracing::{info, warn};

use super::{Action, NoticeLevel, Workspace, WorkspaceError};
use crate::api::TicketApi;
use crate::model::message::Message;
use crate::model::ticket::{Status, Ticket, TicketUpdate};

impl Workspace {
    /// Move an assigned ticket to Working in Progress.
    pub fn start_work(&mut self, api: &dyn TicketApi) -> Result<(), WorkspaceError> {
        self.authorize(Action::StartWork)?;
        self.transition_to(api, Status::WorkingInProgress)
    }

    /// PUT the new status. On success the ticket is replaced by the server's
    /// snapshot and one system entry is appended; on failure nothing changes.
    pub(crate) fn transition_to(
        &mut self,
        api: &dyn TicketApi,
        to: Status,
    ) -> Result<(), WorkspaceError> {
        let from = self.loaded_ticket()?.status;
        if from == to {
            return Err(WorkspaceError::InvalidTransition { from, to });
        }

        match api.update_ticket(&self.ticket_id, &TicketUpdate::status(to)) {
            Ok(updated) => {
                let now = self.record_status_change(from, updated);
                self.notify(NoticeLevel::Success, format!("Status updated to {now}"));
                Ok(())
            }
            Err(error) => {
                warn!(ticket = %self.ticket_id, %from, %to, %error, "status change failed");
                self.notify(
                    NoticeLevel::Error,
                    format!("Failed to update status: {}", error.user_message()),
                );
                Err(error.into())
            }
        }
    }

    /// Install `updated` and, when its status differs from `from`, announce
    /// it in the thread. Returns the status the server reported.
    pub(crate) fn record_status_change(&mut self, from: Status, updated: Ticket) -> Status {
        let to = updated.status;
        self.ticket = Some(updated);
        if from == to {
            return to;
        }
        let id = self.staging.next_id("status");
        let entry = Message::status_change(id, &self.user.username, from, to);
        self.thread.push(entry);
        info!(ticket = %self.ticket_id, %from, %to, by = %self.user.username, "status changed");
        to
    }
}
