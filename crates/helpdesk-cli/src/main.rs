#![forbid(unsafe_code)]

mod cmd;
mod context;
mod identity;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use context::{Context, Globals};
use helpdesk_core::timing;
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "hd",
    author,
    version,
    about = "hd: terminal client for the helpdesk ticketing API",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit request timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Act as this username instead of the token's profile.
    #[arg(long, global = true)]
    user: Option<String>,

    /// API base URL (overrides HELPDESK_API_URL and config.toml).
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Suppress notices on stderr.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn globals(&self) -> Globals {
        Globals {
            json: self.json,
            quiet: self.quiet,
            user: self.user.clone(),
            api_url: self.api_url.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Tickets",
        about = "Show a ticket and the actions open to you",
        after_help = "EXAMPLES:\n    # Ticket detail\n    hd show SRIA1001\n\n    # Machine-readable\n    hd show SRIA1001 --json"
    )]
    Show(cmd::TicketArgs),

    #[command(
        next_help_heading = "Tickets",
        about = "Print a ticket's message thread",
        after_help = "EXAMPLES:\n    hd thread SRIA1001\n\n    # One row per message for scripts\n    FORMAT=text hd thread SRIA1001"
    )]
    Thread(cmd::TicketArgs),

    #[command(
        next_help_heading = "Tickets",
        about = "Post a note with optional attachments",
        after_help = "EXAMPLES:\n    # Text only\n    hd send SRIA1001 -m \"Rebooted the service, please retry\"\n\n    # Text with two files\n    hd send SRIA1001 -m \"Logs attached\" -f app.log -f screen.png\n\n    # Files only\n    hd send SRIA1001 -f report.pdf"
    )]
    Send(cmd::send::SendArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Move an assigned ticket to Working in Progress",
        after_help = "EXAMPLES:\n    hd start-work SRIA1001"
    )]
    StartWork(cmd::TicketArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Ask the requester a question and wait for their response",
        after_help = "EXAMPLES:\n    hd question SRIA1001 --comment \"Which version are you running?\" -f hint.png"
    )]
    Question(cmd::question::QuestionArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Resolve a ticket and record how",
        after_help = "EXAMPLES:\n    hd resolve SRIA1001 --code fixed --based-on user --category hardware \\\n        --notes \"Replaced the power supply\" --summary \"PSU swap\""
    )]
    Resolve(cmd::resolve::ResolveArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Change assignee, group, status, impact or priority",
        after_help = "EXAMPLES:\n    hd assign SRIA1001 --assignee bob\n\n    hd assign SRIA1001 --impact High --priority P1"
    )]
    Assign(cmd::assign::AssignArgs),

    #[command(
        next_help_heading = "Reference",
        about = "List status, impact, priority and resolution choices"
    )]
    Choices,

    #[command(
        next_help_heading = "Account",
        about = "Show the user hd acts as"
    )]
    Whoami,

    #[command(next_help_heading = "Account", about = "Manage the stored access token")]
    Token {
        #[command(subcommand)]
        command: cmd::token::TokenCommand,
    },

    #[command(
        next_help_heading = "Account",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    hd completions zsh > ~/.zfunc/_hd"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("HELPDESK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "helpdesk=debug,info"
        } else {
            "helpdesk=info,warn"
        })
    });

    let format = env::var("HELPDESK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    let globals = cli.globals();
    debug!(?globals, "starting");

    let command_result = match cli.command {
        Commands::Show(ref args) => timing::timed("cmd.show", || {
            cmd::show::run_show(args, &Context::connect(&globals)?)
        }),
        Commands::Thread(ref args) => timing::timed("cmd.thread", || {
            cmd::thread::run_thread(args, &Context::connect(&globals)?)
        }),
        Commands::Send(ref args) => timing::timed("cmd.send", || {
            cmd::send::run_send(args, &Context::connect(&globals)?)
        }),
        Commands::StartWork(ref args) => timing::timed("cmd.start_work", || {
            cmd::start_work::run_start_work(args, &Context::connect(&globals)?)
        }),
        Commands::Question(ref args) => timing::timed("cmd.question", || {
            cmd::question::run_question(args, &Context::connect(&globals)?)
        }),
        Commands::Resolve(ref args) => timing::timed("cmd.resolve", || {
            cmd::resolve::run_resolve(args, &Context::connect(&globals)?)
        }),
        Commands::Assign(ref args) => timing::timed("cmd.assign", || {
            cmd::assign::run_assign(args, &Context::connect(&globals)?)
        }),
        Commands::Choices => timing::timed("cmd.choices", || {
            cmd::choices::run_choices(&Context::connect(&globals)?)
        }),
        Commands::Whoami => timing::timed("cmd.whoami", || {
            cmd::whoami::run_whoami(&Context::connect(&globals)?)
        }),
        Commands::Token { ref command } => {
            timing::timed("cmd.token", || cmd::token::run_token(command, &globals))
        }
        Commands::Completions(ref args) => timing::timed("cmd.completions", || {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command, &mut std::io::stdout())
        }),
    };

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            eprintln!("timing report (json):");
            eprintln!("{}", serde_json::to_string_pretty(&report.to_json())?);
        }
    }

    command_result
}
