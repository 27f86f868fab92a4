//! Per-invocation setup shared by the commands that talk to the server.

use crate::identity::{Identity, resolve_identity};
use crate::output::{CliError, OutputMode, fail, print_notices, render_error, resolve_output_mode};
use helpdesk_core::api::HttpApi;
use helpdesk_core::config::{
    ClientConfig, EnvOverrides, load_user_config, resolve_client_config,
};
use helpdesk_core::error::ErrorCode;
use helpdesk_core::model::ticket::TicketId;
use helpdesk_core::session::{AppState, TokenStore, resolve_token};
use helpdesk_core::workspace::{Notice, Workspace};
use tracing::debug;

/// Global flags that shape every command.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub json: bool,
    pub quiet: bool,
    pub user: Option<String>,
    pub api_url: Option<String>,
}

impl Globals {
    /// Output mode before the config file has been read.
    pub fn early_output(&self) -> OutputMode {
        resolve_output_mode(self.json, EnvOverrides::from_env().format.as_deref())
    }
}

pub struct Context {
    pub output: OutputMode,
    pub quiet: bool,
    pub config: ClientConfig,
    pub api: HttpApi,
    token: Option<String>,
    user_flag: Option<String>,
}

impl Context {
    /// Layer config, resolve the token and build the HTTP client.
    pub fn connect(globals: &Globals) -> anyhow::Result<Self> {
        let early = globals.early_output();
        let env = EnvOverrides::from_env();
        let file = load_user_config().map_err(|e| fail(early, e))?;
        let config = resolve_client_config(file, &env, globals.api_url.as_deref())
            .map_err(|e| fail(early, e))?;
        let output = resolve_output_mode(globals.json, config.output.as_deref());

        let store = TokenStore::default_location().map_err(|e| fail(output, e))?;
        let token = resolve_token(std::env::var("HELPDESK_TOKEN").ok(), &store)
            .map_err(|e| fail(output, e))?;
        let api = HttpApi::new(&config, token.clone()).map_err(|e| fail(output, e))?;
        debug!(api_url = %config.api_url, has_token = token.is_some(), "client configured");

        Ok(Self {
            output,
            quiet: globals.quiet,
            config,
            api,
            token,
            user_flag: globals.user.clone(),
        })
    }

    pub fn identity(&self) -> anyhow::Result<Identity> {
        resolve_identity(
            self.user_flag.as_deref(),
            self.config.user.as_deref(),
            &self.api,
            self.token.as_deref(),
        )
        .map_err(|e| fail(self.output, e))
    }

    /// Open the workspace for `raw_id` and load it. Load notices stay queued
    /// on the workspace for the command to report.
    pub fn open_workspace(&self, raw_id: &str) -> anyhow::Result<Workspace> {
        let id = raw_id.trim();
        if id.is_empty() {
            render_error(
                self.output,
                &CliError::with_details(
                    "ticket id must not be empty",
                    "pass the ticket number, e.g. `hd show SRIA1001`",
                    ErrorCode::TicketNotFound,
                ),
            )?;
            anyhow::bail!("ticket id must not be empty");
        }

        let app = AppState::with_user(self.identity()?.profile);
        let mut workspace = Workspace::open(&app, TicketId::new(id));
        if let Err(err) = workspace.load(&self.api) {
            self.report_notices(&mut workspace)?;
            return Err(fail(self.output, err));
        }
        Ok(workspace)
    }

    /// Drain the workspace's notices, print them for humans and hand them
    /// back for JSON payloads.
    pub fn report_notices(&self, workspace: &mut Workspace) -> std::io::Result<Vec<Notice>> {
        let notices = workspace.drain_notices();
        print_notices(self.output, self.quiet, &notices)?;
        Ok(notices)
    }
}
