//! `hd show`: ticket detail with the actions open to the current user.

use crate::cmd::TicketArgs;
use crate::context::Context;
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};
use helpdesk_core::model::attachment::RemoteAttachment;
use helpdesk_core::model::message::plain_text;
use helpdesk_core::model::resolution::Resolution;
use helpdesk_core::model::ticket::Ticket;
use helpdesk_core::workspace::{Action, Notice, Tab};
use serde::Serialize;
use std::io::{self, Write};
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct ShowTicket<'a> {
    pub ticket: &'a Ticket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_team_label: Option<&'a str>,
    pub actions: Vec<Action>,
    pub tabs: Vec<Tab>,
    pub attachments: &'a [RemoteAttachment],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<&'a Resolution>,
    pub messages: usize,
    pub notices: Vec<Notice>,
}

/// Execute `hd show <id>`.
///
/// # Errors
///
/// Returns an error if the ticket cannot be loaded or output rendering fails.
pub fn run_show(args: &TicketArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut workspace = ctx.open_workspace(&args.id)?;
    let tabs = workspace.visible_tabs();
    if tabs.contains(&Tab::ResolutionInfo) {
        if let Err(err) = workspace.load_resolution_info(&ctx.api) {
            debug!(%err, "resolution info unavailable");
        }
    }
    let notices = ctx.report_notices(&mut workspace)?;

    let Some(ticket) = workspace.ticket() else {
        anyhow::bail!("ticket {} is not loaded", workspace.ticket_id());
    };
    let view = ShowTicket {
        ticket,
        support_team_label: ticket
            .support_team
            .as_deref()
            .and_then(|code| workspace.choices().support_team_label(code)),
        actions: workspace.permitted_actions().iter().collect(),
        tabs,
        attachments: workspace.attachments(),
        resolution: workspace.resolution(),
        messages: workspace.thread().len(),
        notices,
    };

    render_mode(ctx.output, &view, render_text, render_pretty)
}

fn opt(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

fn action_labels(actions: &[Action]) -> String {
    if actions.is_empty() {
        return "(none)".to_string();
    }
    actions
        .iter()
        .map(|a| a.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_text(view: &ShowTicket<'_>, w: &mut dyn Write) -> io::Result<()> {
    let t = view.ticket;
    writeln!(
        w,
        "{}  {}  {}  {}  {}",
        t.ticket_id,
        t.status.as_str(),
        opt(t.assignee.as_deref()),
        opt(t.priority.as_deref()),
        t.summary
    )?;
    writeln!(w, "actions: {}", action_labels(&view.actions))?;
    for attachment in view.attachments {
        writeln!(w, "attachment  {}  {}", attachment.name, attachment.url)?;
    }
    Ok(())
}

fn render_pretty(view: &ShowTicket<'_>, w: &mut dyn Write) -> io::Result<()> {
    let t = view.ticket;
    pretty_section(w, &format!("{}  {}", t.ticket_id, t.summary))?;
    pretty_kv(w, "Status", t.status.label())?;
    pretty_kv(w, "Assignee", opt(t.assignee.as_deref()))?;
    pretty_kv(w, "Priority", opt(t.priority.as_deref()))?;
    pretty_kv(w, "Impact", opt(t.impact.as_deref()))?;
    pretty_kv(
        w,
        "Support team",
        view.support_team_label.unwrap_or_else(|| opt(t.support_team.as_deref())),
    )?;
    pretty_kv(w, "Group", opt(t.solution_grp.as_deref()))?;
    pretty_kv(w, "Organization", opt(t.developer_organization.as_deref()))?;
    pretty_kv(w, "Project", opt(t.project.as_deref()))?;
    pretty_kv(w, "Product", opt(t.product.as_deref()))?;
    pretty_kv(w, "Created by", opt(t.created_by.as_deref()))?;
    pretty_kv(w, "Created", opt(t.created_at.as_deref()))?;
    pretty_kv(w, "Modified", opt(t.modified_at.as_deref()))?;
    pretty_kv(w, "Messages", view.messages.to_string())?;
    pretty_kv(w, "Actions", action_labels(&view.actions))?;

    if let Some(description) = t.description.as_deref().map(plain_text) {
        if !description.is_empty() {
            writeln!(w)?;
            pretty_section(w, "Description")?;
            writeln!(w, "{description}")?;
        }
    }

    if !view.attachments.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Attachments")?;
        for attachment in view.attachments {
            writeln!(w, "  {:<32} {}", attachment.name, attachment.url)?;
        }
    }

    if let Some(resolution) = view.resolution {
        writeln!(w)?;
        pretty_section(w, "Resolution")?;
        pretty_kv(w, "Type", opt(resolution.resolution_type.as_deref()))?;
        pretty_kv(w, "Based on", opt(resolution.incident_based_on.as_deref()))?;
        pretty_kv(w, "Category", opt(resolution.incident_category.as_deref()))?;
        pretty_kv(w, "Summary", opt(resolution.resolution_summary.as_deref()))?;
        pretty_kv(w, "Notes", opt(resolution.resolution_description.as_deref()))?;
    }
    pretty_rule(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> Ticket {
        serde_json::from_value(serde_json::json!({
            "ticket_id": "SRIA1",
            "summary": "Laptop will not boot",
            "status": "Working in Progress",
            "assignee": "alice",
            "priority": "P2"
        }))
        .unwrap()
    }

    #[test]
    fn text_is_one_summary_line_plus_actions() {
        let ticket = ticket();
        let view = ShowTicket {
            ticket: &ticket,
            support_team_label: None,
            actions: vec![Action::QuestionToUser, Action::Resolve],
            tabs: vec![Tab::Notes],
            attachments: &[],
            resolution: None,
            messages: 3,
            notices: Vec::new(),
        };
        let mut buf = Vec::new();
        render_text(&view, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(
            out,
            "SRIA1  Working in Progress  alice  P2  Laptop will not boot\n\
             actions: Question to User, Resolve\n"
        );
    }

    #[test]
    fn pretty_marks_missing_fields() {
        let ticket = ticket();
        let view = ShowTicket {
            ticket: &ticket,
            support_team_label: None,
            actions: Vec::new(),
            tabs: Vec::new(),
            attachments: &[],
            resolution: None,
            messages: 0,
            notices: Vec::new(),
        };
        let mut buf = Vec::new();
        render_pretty(&view, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("Impact:        -"));
        assert!(out.contains("Actions:       (none)"));
    }
}
