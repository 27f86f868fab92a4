//! `hd question`: ask the requester something and wait for their reply.

use crate::cmd::start_work::StatusChange;
use crate::context::Context;
use crate::output::fail;
use clap::Args;
use helpdesk_core::api::FileUpload;
use helpdesk_core::workspace::{QuestionDraft, StagingArea, WorkspaceError};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct QuestionArgs {
    /// Ticket number, e.g. SRIA1001.
    pub id: String,

    /// The question for the requester.
    #[arg(short, long)]
    pub comment: String,

    /// Attach a file (repeatable, 10MB each).
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,
}

/// Read every file through the staging size guard.
fn read_files(paths: &[PathBuf]) -> Result<Vec<FileUpload>, WorkspaceError> {
    let mut staging = StagingArea::new();
    for path in paths {
        staging.stage_path(path)?;
    }
    let uploads = staging.files().iter().map(FileUpload::from).collect();
    staging.clear();
    Ok(uploads)
}

/// Execute `hd question <id> --comment ...`.
///
/// Posts the question, then moves the ticket to Waiting for User Response.
///
/// # Errors
///
/// Returns an error if the user is not the assignee, the ticket is not in
/// progress, a file cannot be read, or a request fails.
pub fn run_question(args: &QuestionArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut workspace = ctx.open_workspace(&args.id)?;
    let attachments = read_files(&args.files).map_err(|e| fail(ctx.output, e))?;

    let result = workspace.ask_question(
        &ctx.api,
        QuestionDraft {
            comment: args.comment.clone(),
            attachments,
        },
    );
    let notices = ctx.report_notices(&mut workspace)?;
    result.map_err(|e| fail(ctx.output, e))?;

    StatusChange {
        ticket: workspace.ticket_id().to_string(),
        status: workspace
            .ticket()
            .map(|t| t.status.label().to_string())
            .unwrap_or_default(),
        notices,
    }
    .render(ctx, "Asked the requester about")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_are_read_with_mime_from_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screen.png");
        std::fs::write(&path, [1_u8, 2, 3]).unwrap();

        let uploads = read_files(&[path]).unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].file_name, "screen.png");
        assert_eq!(uploads[0].mime_type, "image/png");
        assert_eq!(&*uploads[0].bytes, &[1, 2, 3]);
    }

    #[test]
    fn missing_file_is_a_staging_error() {
        let err = read_files(&[PathBuf::from("/definitely/not/here.txt")]).unwrap_err();
        assert!(matches!(err, WorkspaceError::Staging(_)));
    }
}
