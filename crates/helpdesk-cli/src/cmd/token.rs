//! `hd token`: manage the stored access token.

use crate::context::Globals;
use crate::output::{fail, render_success};
use clap::Subcommand;
use helpdesk_core::session::{TokenStore, user_id_from_token};
use tracing::warn;

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    #[command(
        about = "Store an access token",
        after_help = "EXAMPLES:\n    # Save the token from the web client's login\n    hd token set eyJhbGciOi..."
    )]
    Set {
        /// JWT access token.
        token: String,
    },
    #[command(about = "Forget the stored access token")]
    Clear,
}

/// Execute `hd token set|clear`.
///
/// # Errors
///
/// Returns an error if the credentials file cannot be written or removed.
pub fn run_token(command: &TokenCommand, globals: &Globals) -> anyhow::Result<()> {
    let output = globals.early_output();
    let store = TokenStore::default_location().map_err(|e| fail(output, e))?;

    match command {
        TokenCommand::Set { token } => {
            if let Err(err) = user_id_from_token(token) {
                warn!(%err, "stored token has no readable user_id; pass --user to commands");
            }
            store.save(token).map_err(|e| fail(output, e))?;
            render_success(
                output,
                &format!("Token saved to {}", store.path().display()),
            )
        }
        TokenCommand::Clear => {
            let existed = store.clear().map_err(|e| fail(output, e))?;
            render_success(
                output,
                if existed {
                    "Token removed"
                } else {
                    "No token was stored"
                },
            )
        }
    }
}
