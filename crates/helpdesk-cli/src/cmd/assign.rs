//! `hd assign`: edit assignment fields of a ticket.

use crate::context::Context;
use crate::output::{fail, pretty_kv, pretty_section, render_mode};
use clap::{ArgGroup, Args};
use helpdesk_core::model::ticket::{Status, Ticket};
use helpdesk_core::workspace::{AssignmentForm, Notice};
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("fields")
        .required(true)
        .multiple(true)
        .args(["assignee", "group", "org", "status", "impact", "priority"])
))]
pub struct AssignArgs {
    /// Ticket number, e.g. SRIA1001.
    pub id: String,

    /// New assignee username.
    #[arg(long)]
    pub assignee: Option<String>,

    /// Solution group.
    #[arg(long)]
    pub group: Option<String>,

    /// Support organization.
    #[arg(long)]
    pub org: Option<String>,

    /// New status, e.g. "working in progress".
    #[arg(long, value_parser = parse_status)]
    pub status: Option<Status>,

    /// Impact label (High) or code (A).
    #[arg(long)]
    pub impact: Option<String>,

    /// Priority label, e.g. P1.
    #[arg(long)]
    pub priority: Option<String>,
}

fn parse_status(raw: &str) -> Result<Status, String> {
    raw.parse::<Status>().map_err(|e| e.to_string())
}

impl AssignArgs {
    fn form(&self) -> AssignmentForm {
        AssignmentForm {
            assignee: self.assignee.clone(),
            solution_group: self.group.clone(),
            support_organization: self.org.clone(),
            status: self.status,
            impact: self.impact.clone(),
            priority: self.priority.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssignResult<'a> {
    pub ticket: &'a Ticket,
    pub notices: Vec<Notice>,
}

/// Execute `hd assign <id> ...`.
///
/// Unset fields keep the ticket's current values. Impact and priority must
/// match the server's choice lists.
///
/// # Errors
///
/// Returns an error if the user is not the assignee, a value is not a
/// valid choice, or the update is rejected.
pub fn run_assign(args: &AssignArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut workspace = ctx.open_workspace(&args.id)?;
    let result = workspace.save_assignment(&ctx.api, args.form());
    let notices = ctx.report_notices(&mut workspace)?;
    result.map_err(|e| fail(ctx.output, e))?;

    let Some(ticket) = workspace.ticket() else {
        anyhow::bail!("ticket {} is not loaded", workspace.ticket_id());
    };
    render_mode(
        ctx.output,
        &AssignResult { ticket, notices },
        |r, w| {
            writeln!(
                w,
                "{}  {}  {}  {}",
                r.ticket.ticket_id,
                r.ticket.status.as_str(),
                r.ticket.assignee.as_deref().unwrap_or("-"),
                r.ticket.priority.as_deref().unwrap_or("-")
            )
        },
        |r, w| {
            pretty_section(w, &format!("✓ Updated {}", r.ticket.ticket_id))?;
            pretty_kv(w, "Status", r.ticket.status.label())?;
            pretty_kv(w, "Assignee", r.ticket.assignee.as_deref().unwrap_or("-"))?;
            pretty_kv(w, "Group", r.ticket.solution_grp.as_deref().unwrap_or("-"))?;
            pretty_kv(
                w,
                "Organization",
                r.ticket.developer_organization.as_deref().unwrap_or("-"),
            )?;
            pretty_kv(w, "Impact", r.ticket.impact.as_deref().unwrap_or("-"))?;
            pretty_kv(w, "Priority", r.ticket.priority.as_deref().unwrap_or("-"))
        },
    )
}
