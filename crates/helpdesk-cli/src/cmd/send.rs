//! `hd send`: post a note (text and/or files) to a ticket's thread.

use crate::cmd::thread::ThreadEntry;
use crate::context::Context;
use crate::output::{CliError, fail, render_error, render_mode};
use clap::{ArgGroup, Args};
use helpdesk_core::error::ErrorCode;
use helpdesk_core::workspace::{Notice, SendState};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("content")
        .required(true)
        .multiple(true)
        .args(["message", "html", "files"])
))]
pub struct SendArgs {
    /// Ticket number, e.g. SRIA1001.
    pub id: String,

    /// Plain-text message. Line breaks become paragraphs.
    #[arg(short, long, conflicts_with = "html")]
    pub message: Option<String>,

    /// Message body as HTML. Inline `data:` images are uploaded as files.
    #[arg(long)]
    pub html: Option<String>,

    /// Attach a file (repeatable, 10MB each).
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct SendReport {
    pub ticket: String,
    pub op: String,
    pub state: SendState,
    pub files: usize,
    pub messages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<ThreadEntry>,
    pub notices: Vec<Notice>,
}

/// Escape plain text and wrap each line in a paragraph, the shape the
/// web editor produces.
pub fn text_to_html(text: &str) -> String {
    text.lines()
        .map(|line| {
            let escaped = line
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;");
            if escaped.trim().is_empty() {
                "<p><br></p>".to_string()
            } else {
                format!("<p>{escaped}</p>")
            }
        })
        .collect()
}

/// Execute `hd send <id>`.
///
/// The note is inserted optimistically, uploaded one request per file, and
/// the thread is then re-read from the server.
///
/// # Errors
///
/// Returns an error if the ticket cannot be loaded, a file cannot be staged,
/// or the server rejects any part of the send.
pub fn run_send(args: &SendArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut workspace = ctx.open_workspace(&args.id)?;

    let compose = match (&args.html, &args.message) {
        (Some(html), _) => html.clone(),
        (None, Some(text)) => text_to_html(text),
        (None, None) => String::new(),
    };
    workspace.set_compose(compose);
    for path in &args.files {
        if let Err(err) = workspace.stage_path(path) {
            ctx.report_notices(&mut workspace)?;
            return Err(fail(ctx.output, err));
        }
    }

    let Some(pending) = workspace.begin_send().map_err(|e| fail(ctx.output, e))? else {
        render_error(
            ctx.output,
            &CliError::with_details(
                "nothing to send",
                "provide message text or at least one --file",
                ErrorCode::EmptyContent,
            ),
        )?;
        anyhow::bail!("nothing to send");
    };

    let op = pending.op();
    let files = pending.upload_count();
    info!(%op, ticket = %workspace.ticket_id(), files, "sending note");
    let outcome = pending.dispatch(&ctx.api);
    let state = workspace.apply(outcome);
    let notices = ctx.report_notices(&mut workspace)?;

    let report = SendReport {
        ticket: workspace.ticket_id().to_string(),
        op: op.to_string(),
        state,
        files,
        messages: workspace.thread().len(),
        last: workspace.thread().last().map(ThreadEntry::from),
        notices,
    };
    render_mode(ctx.output, &report, render_text, render_pretty)?;

    match state {
        SendState::Reconciled | SendState::Unconfirmed => Ok(()),
        other => anyhow::bail!("message not sent ({other:?})"),
    }
}

fn render_text(report: &SendReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}  {}  {}  files={}  messages={}",
        report.ticket,
        report.op,
        state_label(report.state),
        report.files,
        report.messages
    )
}

fn render_pretty(report: &SendReport, w: &mut dyn Write) -> io::Result<()> {
    match report.state {
        SendState::Reconciled => writeln!(
            w,
            "✓ Note sent to {} ({} file(s), {} messages in thread)",
            report.ticket, report.files, report.messages
        ),
        SendState::Unconfirmed => writeln!(
            w,
            "✓ Note sent to {}; the thread could not be refreshed",
            report.ticket
        ),
        other => writeln!(w, "✗ Note not sent to {} ({})", report.ticket, state_label(other)),
    }
}

const fn state_label(state: SendState) -> &'static str {
    match state {
        SendState::Idle => "idle",
        SendState::Pending => "pending",
        SendState::Reconciled => "reconciled",
        SendState::RolledBack => "rolled_back",
        SendState::Unconfirmed => "unconfirmed",
        SendState::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_becomes_escaped_paragraphs() {
        assert_eq!(
            text_to_html("a < b & c\n\nnext"),
            "<p>a &lt; b &amp; c</p><p><br></p><p>next</p>"
        );
    }

    #[test]
    fn empty_text_is_empty_html() {
        assert_eq!(text_to_html(""), "");
    }

    #[test]
    fn text_row_names_state() {
        let report = SendReport {
            ticket: "SRIA1".into(),
            op: "send-1".into(),
            state: SendState::RolledBack,
            files: 2,
            messages: 4,
            last: None,
            notices: Vec::new(),
        };
        let mut buf = Vec::new();
        render_text(&report, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "SRIA1  send-1  rolled_back  files=2  messages=4\n"
        );
    }
}
