//! `hd choices`: the server's dropdown values for assignment and resolution.

use crate::context::Context;
use crate::output::{fail, pretty_section, render_mode};
use helpdesk_core::TicketApi;
use helpdesk_core::model::resolution::ResolutionChoices;
use helpdesk_core::model::ticket::TicketChoices;
use serde::Serialize;
use std::io::{self, Write};
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct ChoiceLists {
    pub ticket: TicketChoices,
    pub resolution: ResolutionChoices,
}

/// Execute `hd choices`.
///
/// The resolution lists are optional; a failure there is logged and the
/// ticket lists are still shown.
///
/// # Errors
///
/// Returns an error if the ticket choices cannot be fetched.
pub fn run_choices(ctx: &Context) -> anyhow::Result<()> {
    let ticket = ctx.api.fetch_choices().map_err(|e| fail(ctx.output, e))?;
    let resolution = ctx.api.fetch_resolution_choices().unwrap_or_else(|err| {
        warn!(%err, "resolution choices unavailable");
        ResolutionChoices::default()
    });

    render_mode(
        ctx.output,
        &ChoiceLists { ticket, resolution },
        render_text,
        render_pretty,
    )
}

fn pairs(w: &mut dyn Write, kind: &str, items: &[(String, String)]) -> io::Result<()> {
    for (code, label) in items {
        writeln!(w, "{kind}  {code}  {label}")?;
    }
    Ok(())
}

fn render_text(lists: &ChoiceLists, w: &mut dyn Write) -> io::Result<()> {
    pairs(w, "status", &lists.ticket.status_choices)?;
    pairs(w, "impact", &lists.ticket.impact_choices)?;
    for p in &lists.ticket.priority_choices {
        writeln!(w, "priority  {}  {}", p.priority_id, p.urgency_name)?;
    }
    pairs(w, "support_team", &lists.ticket.support_team_choices)?;
    pairs(w, "resolution_type", &lists.resolution.resolution_type_choices)?;
    pairs(w, "incident_based_on", &lists.resolution.incident_based_on_choices)?;
    pairs(w, "incident_category", &lists.resolution.incident_category_choices)
}

fn section(w: &mut dyn Write, heading: &str, items: &[(String, String)]) -> io::Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    pretty_section(w, heading)?;
    for (code, label) in items {
        writeln!(w, "  {code:<10} {label}")?;
    }
    writeln!(w)
}

fn render_pretty(lists: &ChoiceLists, w: &mut dyn Write) -> io::Result<()> {
    section(w, "Status", &lists.ticket.status_choices)?;
    section(w, "Impact", &lists.ticket.impact_choices)?;
    if !lists.ticket.priority_choices.is_empty() {
        pretty_section(w, "Priority")?;
        for p in &lists.ticket.priority_choices {
            writeln!(w, "  {:<10} {}", p.priority_id, p.urgency_name)?;
        }
        writeln!(w)?;
    }
    section(w, "Support team", &lists.ticket.support_team_choices)?;
    section(w, "Resolution type", &lists.resolution.resolution_type_choices)?;
    section(w, "Incident based on", &lists.resolution.incident_based_on_choices)?;
    section(w, "Incident category", &lists.resolution.incident_category_choices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::model::ticket::PriorityChoice;

    #[test]
    fn text_lists_every_kind() {
        let lists = ChoiceLists {
            ticket: TicketChoices {
                impact_choices: vec![("A".into(), "High".into())],
                priority_choices: vec![PriorityChoice {
                    priority_id: 1,
                    urgency_name: "P1".into(),
                }],
                ..TicketChoices::default()
            },
            resolution: ResolutionChoices {
                resolution_type_choices: vec![("fixed".into(), "Fixed".into())],
                ..ResolutionChoices::default()
            },
        };
        let mut buf = Vec::new();
        render_text(&lists, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "impact  A  High\npriority  1  P1\nresolution_type  fixed  Fixed\n"
        );
    }
}
