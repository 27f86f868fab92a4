//! Shared output layer for pretty/text/JSON parity across `hd` commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its result
//! accordingly: pretty output for people at a terminal, compact text for
//! pipes and scripts, or stable JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--json` flag
//! 2. `FORMAT` env var, then `output` in `config.toml` (`pretty` | `text` | `json`)
//! 3. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use clap::ValueEnum;
use helpdesk_core::api::ApiError;
use helpdesk_core::config::ConfigError;
use helpdesk_core::error::ErrorCode;
use helpdesk_core::session::BootstrapError;
use helpdesk_core::workspace::{Notice, NoticeLevel, WorkspaceError};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<14} {}", format!("{key}:"), value.as_ref())
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (sections, visual framing).
    Pretty,
    /// Token-efficient plain text for scripts and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Core resolution logic, separated from I/O for testability.
///
/// `preference` is the `FORMAT` env value, or the config file's `output`
/// when the env var is unset.
fn resolve_output_mode_inner(json_flag: bool, preference: Option<&str>, is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    // unknown value falls through to TTY detection
    if let Some(mode) = preference.and_then(OutputMode::parse) {
        return mode;
    }

    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from the `--json` flag, the configured
/// preference and TTY detection.
pub fn resolve_output_mode(json_flag: bool, preference: Option<&str>) -> OutputMode {
    resolve_output_mode_inner(json_flag, preference, io::stdout().is_terminal())
}

/// Trait implemented by list rows that render in all modes.
pub trait Renderable {
    /// Render for human consumption.
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Render as a single self-contained JSON object.
    fn render_json(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Render as a single text row, fields in [`Renderable::table_headers`] order.
    fn render_table(&self, w: &mut dyn Write) -> io::Result<()>;

    fn table_headers() -> &'static [&'static str]
    where
        Self: Sized,
    {
        &[]
    }
}

/// Render a list of [`Renderable`] items to `out`.
///
/// JSON mode wraps the items in an array; text mode prints a header row first.
pub fn render_list_to<R: Renderable>(
    items: &[R],
    mode: OutputMode,
    out: &mut dyn Write,
) -> io::Result<()> {
    match mode {
        OutputMode::Pretty => {
            for item in items {
                item.render_human(out)?;
            }
        }
        OutputMode::Text => {
            if !items.is_empty() {
                let headers = R::table_headers();
                if !headers.is_empty() {
                    writeln!(out, "{}", headers.join("  "))?;
                }
            }
            for item in items {
                item.render_table(out)?;
            }
        }
        OutputMode::Json => {
            write!(out, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(out, ",")?;
                }
                writeln!(out)?;
                let mut buf = Vec::new();
                item.render_json(&mut buf)?;
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                out.write_all(&buf)?;
            }
            writeln!(out, "\n]")?;
        }
    }
    Ok(())
}

pub fn render_list<R: Renderable>(items: &[R], mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_list_to(items, mode, &mut out)
}

/// Render a serializable value with explicit pretty/text renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Stable `E####` code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        error_code: ErrorCode,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: Some(error_code.code().to_string()),
        }
    }

    fn coded(message: String, code: ErrorCode) -> Self {
        Self {
            message,
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

impl From<&WorkspaceError> for CliError {
    fn from(err: &WorkspaceError) -> Self {
        match err {
            WorkspaceError::Api(api) => Self::from(api),
            other => Self::coded(other.to_string(), other.code()),
        }
    }
}

impl From<&ApiError> for CliError {
    fn from(err: &ApiError) -> Self {
        Self::coded(err.user_message(), err.code())
    }
}

impl From<&ConfigError> for CliError {
    fn from(err: &ConfigError) -> Self {
        Self::coded(err.to_string(), err.code())
    }
}

impl From<&BootstrapError> for CliError {
    fn from(err: &BootstrapError) -> Self {
        match err {
            BootstrapError::Api(api) => Self::from(api),
            BootstrapError::Token(token) => Self::with_details(
                token.to_string(),
                "Run `hd token set <token>` with a fresh access token, or pass --user.",
                ErrorCode::MissingToken,
            ),
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match error.error_code {
                Some(ref code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

/// Render `error` and turn it into the command's failure.
pub fn fail<E>(mode: OutputMode, error: E) -> anyhow::Error
where
    E: std::error::Error + Send + Sync + 'static,
    for<'a> CliError: From<&'a E>,
{
    let rendered = CliError::from(&error);
    if let Err(io_err) = render_error(mode, &rendered) {
        return io_err;
    }
    anyhow::Error::new(error)
}

/// Render a success message to stdout.
pub fn render_success(mode: OutputMode, message: &str) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "ok": true,
                "message": message,
            });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            writeln!(out, "✓ {message}")?;
        }
    }
    Ok(())
}

/// Print workspace notices to stderr. JSON output carries them in the
/// command's own payload instead.
pub fn print_notices(mode: OutputMode, quiet: bool, notices: &[Notice]) -> io::Result<()> {
    if quiet || mode.is_json() {
        return Ok(());
    }
    let stderr = io::stderr();
    let mut out = stderr.lock();
    for notice in notices {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        writeln!(out, "[{tag}] {}", notice.text)?;
    }
    Ok(())
}
