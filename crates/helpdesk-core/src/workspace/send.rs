//! Network half of an optimistic send.
//!
//! [`Workspace::begin_send`](super::Workspace::begin_send) does the local
//! insert and hands back a [`PendingSend`]. Dispatching it borrows nothing
//! from the workspace, so it may run on another thread; the resulting
//! [`SendOutcome`] is fed back through
//! [`Workspace::apply`](super::Workspace::apply).

use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use super::lifetime::CancelToken;
use crate::api::{ApiError, FileUpload, NewReport, TicketApi};
use crate::model::message::Report;
use crate::model::ticket::TicketId;

/// Where one send operation is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendState {
    Idle,
    Pending,
    /// Thread replaced by the server's list.
    Reconciled,
    /// A request failed; the optimistic entry was removed.
    RolledBack,
    /// Everything was posted but the refetch failed. The optimistic entry
    /// stays until the next refresh.
    Unconfirmed,
    /// The send was cancelled, or the workspace closed before the outcome
    /// was applied.
    Cancelled,
}

impl SendState {
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Idle | Self::Pending)
    }
}

/// Identity of a send within one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OpId(pub(crate) u64);

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send-{}", self.0)
    }
}

/// One file of a send, with the caption used when it does not carry the text.
#[derive(Debug, Clone)]
pub(crate) struct Upload {
    pub local_id: String,
    pub file: FileUpload,
    pub placeholder: &'static str,
}

/// Requests still to be made for a send whose optimistic entry is already
/// in the thread.
#[derive(Debug)]
pub struct PendingSend {
    pub(crate) op: OpId,
    pub(crate) ticket: TicketId,
    /// Empty when the compose content had nothing but attachments.
    pub(crate) text: String,
    pub(crate) uploads: Vec<Upload>,
    pub(crate) token: CancelToken,
}

impl PendingSend {
    #[must_use]
    pub const fn op(&self) -> OpId {
        self.op
    }

    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.len()
    }

    /// Token for abandoning this send alone. Cancelling it stops dispatch
    /// before its next request; the workspace stays open.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Post every file, then the text if no file carried it, then refetch
    /// the thread. Requests are made one at a time and the first failure
    /// ends the send. Cancellation is checked before each request.
    #[must_use]
    pub fn dispatch(self, api: &dyn TicketApi) -> SendOutcome {
        let Self {
            op,
            ticket,
            text,
            uploads,
            token,
        } = self;
        let finish = |result| SendOutcome { op, result };

        let mut text_carried = text.is_empty();
        let mut uploaded = Vec::with_capacity(uploads.len());
        for upload in uploads {
            if token.is_cancelled() {
                return finish(SendResult::Cancelled);
            }
            let title = if text_carried {
                upload.placeholder.to_string()
            } else {
                text_carried = true;
                text.clone()
            };
            debug!(%op, file = %upload.file.file_name, "uploading attachment");
            let report = NewReport {
                ticket: ticket.clone(),
                title,
                attachment: Some(upload.file),
            };
            match api.post_report(&report) {
                Ok(posted) => uploaded.push((upload.local_id, posted)),
                Err(error) => return finish(SendResult::Failed(error)),
            }
        }

        if !text_carried {
            if token.is_cancelled() {
                return finish(SendResult::Cancelled);
            }
            let report = NewReport {
                ticket: ticket.clone(),
                title: text,
                attachment: None,
            };
            if let Err(error) = api.post_report(&report) {
                return finish(SendResult::Failed(error));
            }
        }

        if token.is_cancelled() {
            return finish(SendResult::Cancelled);
        }
        match api.fetch_reports(&ticket) {
            Ok(reports) => {
                info!(%op, ticket = %ticket, entries = reports.len(), "send reconciled");
                finish(SendResult::Reconciled(reports))
            }
            Err(error) => finish(SendResult::Unconfirmed { uploaded, error }),
        }
    }
}

/// Result of [`PendingSend::dispatch`], to be applied to the workspace.
#[derive(Debug)]
pub struct SendOutcome {
    pub op: OpId,
    pub result: SendResult,
}

#[derive(Debug)]
pub enum SendResult {
    /// The server's thread after the send.
    Reconciled(Vec<Report>),
    Failed(ApiError),
    /// Posts succeeded, refetch failed. `uploaded` pairs each local
    /// attachment id with the entry the server created for it.
    Unconfirmed {
        uploaded: Vec<(String, Report)>,
        error: ApiError,
    },
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::AttachmentRecord;
    use crate::model::resolution::{NewResolution, Resolution, ResolutionChoices};
    use crate::model::ticket::{Ticket, TicketChoices, TicketUpdate};
    use crate::model::user::UserProfile;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        posts: Mutex<Vec<NewReport>>,
        post_results: Mutex<VecDeque<Result<Report, ApiError>>>,
        fetch_result: Mutex<Option<Result<Vec<Report>, ApiError>>>,
        cancel_after_first_post: Option<CancelToken>,
    }

    fn report(id: i64) -> Report {
        Report {
            report_id: id,
            title: None,
            content: Some(format!("entry {id}")),
            username: Some("alice".into()),
            created_at: None,
            report_attachments: Vec::new(),
        }
    }

    fn rejected() -> ApiError {
        ApiError::Status {
            endpoint: "ticket/reports/".into(),
            status: 400,
            detail: Some("bad file".into()),
        }
    }

    impl TicketApi for Recorder {
        fn post_report(&self, report: &NewReport) -> Result<Report, ApiError> {
            self.posts.lock().unwrap().push(report.clone());
            if let Some(token) = &self.cancel_after_first_post {
                token.cancel();
            }
            self.post_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(report_stub()))
        }

        fn fetch_reports(&self, _id: &TicketId) -> Result<Vec<Report>, ApiError> {
            self.fetch_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn fetch_ticket(&self, _id: &TicketId) -> Result<Ticket, ApiError> {
            unimplemented!()
        }
        fn update_ticket(&self, _id: &TicketId, _u: &TicketUpdate) -> Result<Ticket, ApiError> {
            unimplemented!()
        }
        fn fetch_choices(&self) -> Result<TicketChoices, ApiError> {
            unimplemented!()
        }
        fn fetch_attachments(&self, _id: &TicketId) -> Result<Vec<AttachmentRecord>, ApiError> {
            unimplemented!()
        }
        fn post_question(&self, _q: &crate::api::QuestionToUser) -> Result<(), ApiError> {
            unimplemented!()
        }
        fn fetch_resolution(&self, _id: &TicketId) -> Result<Option<Resolution>, ApiError> {
            unimplemented!()
        }
        fn fetch_resolution_choices(&self) -> Result<ResolutionChoices, ApiError> {
            unimplemented!()
        }
        fn create_resolution(&self, _r: &NewResolution) -> Result<Resolution, ApiError> {
            unimplemented!()
        }
        fn fetch_profile(&self, _id: i64) -> Result<UserProfile, ApiError> {
            unimplemented!()
        }
    }

    fn report_stub() -> Report {
        report(0)
    }

    fn upload(id: &str, name: &str, placeholder: &'static str) -> Upload {
        Upload {
            local_id: id.into(),
            file: FileUpload {
                file_name: name.into(),
                mime_type: "image/png".into(),
                bytes: Arc::from(vec![1_u8, 2, 3]),
            },
            placeholder,
        }
    }

    fn pending(text: &str, uploads: Vec<Upload>, token: CancelToken) -> PendingSend {
        PendingSend {
            op: OpId(1),
            ticket: TicketId::new("SRIA1"),
            text: text.into(),
            uploads,
            token,
        }
    }

    #[test]
    fn first_upload_carries_the_text() {
        let api = Recorder::default();
        let send = pending(
            "see attached",
            vec![
                upload("local-1", "a.png", "Attachment"),
                upload("embedded-1", "b.png", "Embedded Image"),
            ],
            CancelToken::new(),
        );
        let outcome = send.dispatch(&api);
        assert!(matches!(outcome.result, SendResult::Reconciled(_)));

        let posts = api.posts.lock().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "see attached");
        assert_eq!(posts[1].title, "Embedded Image");
        assert!(posts.iter().all(|p| p.attachment.is_some()));
    }

    #[test]
    fn files_only_use_placeholders() {
        let api = Recorder::default();
        pending("", vec![upload("local-1", "a.png", "Attachment")], CancelToken::new())
            .dispatch(&api);
        let posts = api.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Attachment");
    }

    #[test]
    fn text_only_is_posted_as_json_report() {
        let api = Recorder::default();
        *api.fetch_result.lock().unwrap() = Some(Ok(vec![report(7)]));
        let outcome = pending("hello", Vec::new(), CancelToken::new()).dispatch(&api);
        match outcome.result {
            SendResult::Reconciled(reports) => assert_eq!(reports[0].report_id, 7),
            other => panic!("unexpected {other:?}"),
        }
        let posts = api.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].attachment.is_none());
        assert_eq!(posts[0].ticket, TicketId::new("SRIA1"));
    }

    #[test]
    fn first_failure_stops_the_send() {
        let api = Recorder::default();
        api.post_results.lock().unwrap().push_back(Err(rejected()));
        let outcome = pending(
            "x",
            vec![upload("local-1", "a.png", "Attachment"), upload("local-2", "b.png", "Attachment")],
            CancelToken::new(),
        )
        .dispatch(&api);
        assert!(matches!(outcome.result, SendResult::Failed(ApiError::Status { status: 400, .. })));
        assert_eq!(api.posts.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_refetch_is_unconfirmed() {
        let api = Recorder::default();
        api.post_results.lock().unwrap().push_back(Ok(report(11)));
        *api.fetch_result.lock().unwrap() = Some(Err(ApiError::Transport {
            endpoint: "ticket/reports/".into(),
            message: "timed out".into(),
        }));
        let outcome = pending("", vec![upload("local-1", "a.png", "Attachment")], CancelToken::new())
            .dispatch(&api);
        match outcome.result {
            SendResult::Unconfirmed { uploaded, .. } => {
                assert_eq!(uploaded.len(), 1);
                assert_eq!(uploaded[0].0, "local-1");
                assert_eq!(uploaded[0].1.report_id, 11);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cancellation_stops_before_next_request() {
        let token = CancelToken::new();
        let api = Recorder {
            cancel_after_first_post: Some(token.clone()),
            ..Recorder::default()
        };
        let outcome = pending(
            "x",
            vec![upload("local-1", "a.png", "Attachment"), upload("local-2", "b.png", "Attachment")],
            token,
        )
        .dispatch(&api);
        assert!(matches!(outcome.result, SendResult::Cancelled));
        assert_eq!(api.posts.lock().unwrap().len(), 1);
    }

    #[test]
    fn cancelled_before_start_issues_nothing() {
        let api = Recorder::default();
        let token = CancelToken::new();
        token.cancel();
        let outcome = pending("hello", Vec::new(), token).dispatch(&api);
        assert!(matches!(outcome.result, SendResult::Cancelled));
        assert!(api.posts.lock().unwrap().is_empty());
    }

    #[test]
    fn settled_states() {
        assert!(!SendState::Pending.is_settled());
        assert!(SendState::RolledBack.is_settled());
        assert_eq!(OpId(3).to_string(), "send-3");
    }
}
