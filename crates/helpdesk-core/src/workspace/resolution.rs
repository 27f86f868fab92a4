//! Assignee workflows beyond plain messaging: asking the requester a
//! question, resolving, and editing assignment fields.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{info, warn};

use super::{Action, NoticeLevel, Workspace, WorkspaceError};
use crate::api::{FileUpload, QuestionToUser, TicketApi};
use crate::model::message::is_empty_content;
use crate::model::resolution::{NewResolution, ResolutionChoices};
use crate::model::ticket::{Status, TicketUpdate};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionDraft {
    pub comment: String,
    pub attachments: Vec<FileUpload>,
}

/// Fields of the resolve form. Codes or labels are accepted for the three
/// classification fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveForm {
    pub resolution_type: String,
    pub incident_based_on: String,
    pub incident_category: String,
    pub description: String,
    pub summary: String,
}

/// Assignment edit. Unset fields keep the ticket's current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentForm {
    pub assignee: Option<String>,
    pub solution_group: Option<String>,
    pub support_organization: Option<String>,
    pub status: Option<Status>,
    /// Impact label (`High`) or code (`A`).
    pub impact: Option<String>,
    /// Priority label (`P1`).
    pub priority: Option<String>,
}

impl Workspace {
    /// Post a question to the requester, then move the ticket to
    /// Waiting for User Response.
    pub fn ask_question(
        &mut self,
        api: &dyn TicketApi,
        draft: QuestionDraft,
    ) -> Result<(), WorkspaceError> {
        self.authorize(Action::QuestionToUser)?;
        if is_empty_content(&draft.comment) && draft.attachments.is_empty() {
            return Err(WorkspaceError::EmptyContent);
        }

        let question = QuestionToUser {
            ticket: self.ticket_id.clone(),
            username: self.user.username.clone(),
            comment: draft.comment,
            attachments: draft.attachments,
        };
        if let Err(error) = api.post_question(&question) {
            warn!(ticket = %self.ticket_id, %error, "question not sent");
            self.notify(
                NoticeLevel::Error,
                format!("Failed to send question: {}", error.user_message()),
            );
            return Err(error.into());
        }
        self.notify(NoticeLevel::Success, "Question sent to user".to_string());
        self.transition_to(api, Status::WaitingForUser)
    }

    /// Mark the ticket Resolved and record how it was resolved.
    pub fn resolve(&mut self, api: &dyn TicketApi, form: ResolveForm) -> Result<(), WorkspaceError> {
        let current = self.loaded_ticket()?.status;
        if current.is_terminal() {
            return Err(WorkspaceError::InvalidTransition {
                from: current,
                to: Status::Resolved,
            });
        }
        self.authorize(Action::Resolve)?;

        let choices = &self.resolution_choices;
        let resolution_type = pick(
            choices,
            "resolution type",
            &form.resolution_type,
            ResolutionChoices::resolution_type,
        )?;
        let incident_based_on = pick(
            choices,
            "incident based on",
            &form.incident_based_on,
            ResolutionChoices::incident_based_on,
        )?;
        let incident_category = pick(
            choices,
            "incident category",
            &form.incident_category,
            ResolutionChoices::incident_category,
        )?;

        self.transition_to(api, Status::Resolved)?;

        let record = NewResolution {
            ticket_id: self.ticket_id.clone(),
            status: Status::Resolved,
            resolution_type,
            incident_based_on,
            incident_category,
            resolution_description: form.description,
            resolution_summary: form.summary,
            resolved_by: self
                .user
                .id
                .map_or_else(|| Value::String(self.user.username.clone()), Value::from),
            resolved_date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        match api.create_resolution(&record) {
            Ok(saved) => {
                info!(ticket = %self.ticket_id, "resolution recorded");
                self.resolution = Some(saved);
                self.notify(NoticeLevel::Success, "Ticket resolved".to_string());
                Ok(())
            }
            Err(error) => {
                warn!(ticket = %self.ticket_id, %error, "resolution record not saved");
                self.notify(
                    NoticeLevel::Error,
                    format!(
                        "Ticket resolved, but the resolution details were not saved: {}",
                        error.user_message()
                    ),
                );
                Err(error.into())
            }
        }
    }

    /// Fetch the resolution choice lists and, for a resolved ticket, its
    /// resolution record. Either may fail without affecting the other.
    pub fn load_resolution_info(&mut self, api: &dyn TicketApi) -> Result<(), WorkspaceError> {
        let status = self.loaded_ticket()?.status;

        match api.fetch_resolution_choices() {
            Ok(choices) => self.resolution_choices = choices,
            Err(error) => {
                warn!(%error, "resolution choices unavailable");
                self.notify(
                    NoticeLevel::Warning,
                    format!("Could not load resolution choices: {}", error.user_message()),
                );
            }
        }

        if status != Status::Resolved {
            return Ok(());
        }
        match api.fetch_resolution(&self.ticket_id) {
            Ok(resolution) => {
                self.resolution = resolution;
                Ok(())
            }
            Err(error) => {
                warn!(ticket = %self.ticket_id, %error, "resolution unavailable");
                self.notify(
                    NoticeLevel::Warning,
                    format!("Could not load resolution: {}", error.user_message()),
                );
                Err(error.into())
            }
        }
    }

    /// Save assignment fields. Impact and priority must map through the
    /// loaded choice lists; nothing is sent otherwise.
    pub fn save_assignment(
        &mut self,
        api: &dyn TicketApi,
        form: AssignmentForm,
    ) -> Result<(), WorkspaceError> {
        let from = self.authorize(Action::Assign)?;
        if form.priority.is_some() {
            self.authorize(Action::ChangePriority)?;
        }
        let ticket = self.loaded_ticket()?;

        let impact = match form.impact.as_deref() {
            Some(label) => Some(self.impact_code(label).ok_or_else(|| {
                WorkspaceError::InvalidChoice {
                    field: "impact",
                    value: label.to_string(),
                }
            })?),
            None => ticket.impact.as_deref().and_then(|l| self.impact_code(l)),
        };
        let priority = match form.priority.as_deref() {
            Some(label) => Some(self.choices.priority_id(label.trim()).ok_or_else(|| {
                WorkspaceError::InvalidChoice {
                    field: "priority",
                    value: label.to_string(),
                }
            })?),
            None => ticket
                .priority
                .as_deref()
                .and_then(|l| self.choices.priority_id(l)),
        };

        let to = form.status.unwrap_or(from);
        let update = TicketUpdate {
            status: Some(to),
            assignee: form.assignee.or_else(|| ticket.assignee.clone()),
            solution_grp: form.solution_group.or_else(|| ticket.solution_grp.clone()),
            developer_organization: form
                .support_organization
                .or_else(|| ticket.developer_organization.clone()),
            impact,
            priority,
        };

        match api.update_ticket(&self.ticket_id, &update) {
            Ok(updated) => {
                self.record_status_change(from, updated);
                self.notify(NoticeLevel::Success, "Ticket updated".to_string());
                Ok(())
            }
            Err(error) => {
                warn!(ticket = %self.ticket_id, %error, "assignment not saved");
                self.notify(
                    NoticeLevel::Error,
                    format!("Failed to update ticket: {}", error.user_message()),
                );
                Err(error.into())
            }
        }
    }

    /// Impact code for a label, or the input itself when it already is a code.
    fn impact_code(&self, input: &str) -> Option<String> {
        let input = input.trim();
        self.choices
            .impact_code(input)
            .or_else(|| {
                self.choices
                    .impact_choices
                    .iter()
                    .find(|(code, _)| code == input)
                    .map(|(code, _)| code.as_str())
            })
            .map(str::to_string)
    }
}

/// Map a form value through a choice list. Without loaded choices the value
/// is passed through as typed.
fn pick(
    choices: &ResolutionChoices,
    field: &'static str,
    input: &str,
    lookup: for<'a> fn(&'a ResolutionChoices, &str) -> Option<&'a str>,
) -> Result<String, WorkspaceError> {
    let input = input.trim();
    if choices.is_empty() {
        return Ok(input.to_string());
    }
    lookup(choices, input)
        .map(str::to_string)
        .ok_or_else(|| WorkspaceError::InvalidChoice {
            field,
            value: input.to_string(),
        })
}
