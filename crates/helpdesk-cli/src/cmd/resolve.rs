use crate::cmd::start_work::StatusChange;
use crate::context::Context;
use crate::output::fail;
use clap::Args;
use helpdesk_core::workspace::ResolveForm;
use tracing::debug;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Ticket number, e.g. SRIA1001.
    pub id: String,

    /// Resolution type, code or label (see `hd choices`).
    #[arg(long, visible_alias = "type")]
    pub code: String,

    /// What the incident was based on, code or label.
    #[arg(long)]
    pub based_on: String,

    /// Incident category, code or label.
    #[arg(long)]
    pub category: String,

    /// Resolution description.
    #[arg(long)]
    pub notes: String,

    /// One-line resolution summary.
    #[arg(long, default_value = "")]
    pub summary: String,
}

impl ResolveArgs {
    fn form(&self) -> ResolveForm {
        ResolveForm {
            resolution_type: self.code.clone(),
            incident_based_on: self.based_on.clone(),
            incident_category: self.category.clone(),
            description: self.notes.clone(),
            summary: self.summary.clone(),
        }
    }
}

/// Execute `hd resolve <id> ...`.
///
/// Classification values are checked against the server's resolution
/// choices before anything is sent. The status change goes first; the
/// resolution record is posted only once the ticket is Resolved.
///
/// # Errors
///
/// Returns an error if the user may not resolve the ticket, a value does
/// not match the choice lists, or either request fails.
pub fn run_resolve(args: &ResolveArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut workspace = ctx.open_workspace(&args.id)?;
    if let Err(err) = workspace.load_resolution_info(&ctx.api) {
        debug!(%err, "resolving without resolution info");
    }

    let result = workspace.resolve(&ctx.api, args.form());
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
    .render(ctx, "Resolved")
}
