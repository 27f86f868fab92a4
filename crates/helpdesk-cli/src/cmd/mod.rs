pub mod assign;
pub mod choices;
pub mod completions;
pub mod question;
pub mod resolve;
pub mod send;
pub mod show;
pub mod start_work;
pub mod thread;
pub mod token;
pub mod whoami;

use clap::Args;

/// A command that acts on one ticket.
#[derive(Args, Debug)]
pub struct TicketArgs {
    /// Ticket number, e.g. SRIA1001.
    pub id: String,
}
