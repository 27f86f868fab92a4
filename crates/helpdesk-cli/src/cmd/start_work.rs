use crate::cmd::TicketArgs;
use crate::context::Context;
use crate::output::{fail, render_mode};
use helpdesk_core::workspace::Notice;
use serde::Serialize;
use std::io::Write;

/// Outcome of a command that moved a ticket's status.
#[derive(Debug, Serialize)]
pub struct StatusChange {
    pub ticket: String,
    pub status: String,
    pub notices: Vec<Notice>,
}

impl StatusChange {
    pub fn render(&self, ctx: &Context, verb: &str) -> anyhow::Result<()> {
        render_mode(
            ctx.output,
            self,
            |c, w| writeln!(w, "{}  {}", c.ticket, c.status),
            |c, w| writeln!(w, "✓ {verb} {}: now {}", c.ticket, c.status),
        )
    }
}

/// Execute `hd start-work <id>`: Open (or any non-terminal status) to
/// Working in Progress. Assignee only.
///
/// # Errors
///
/// Returns an error if the user is not the assignee, the ticket is in a
/// terminal status, or the server rejects the update.
pub fn run_start_work(args: &TicketArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut workspace = ctx.open_workspace(&args.id)?;
    let result = workspace.start_work(&ctx.api);
    let notices = ctx.report_notices(&mut workspace)?;
    result.map_err(|e| fail(ctx.output, e))?;

    let status = workspace
        .ticket()
        .map(|t| t.status.label().to_string())
        .unwrap_or_default();
    StatusChange {
        ticket: workspace.ticket_id().to_string(),
        status,
        notices,
    }
    .render(ctx, "Started work on")
}
