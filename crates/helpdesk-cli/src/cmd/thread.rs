//! `hd thread`: the ticket's message thread, oldest first.

use crate::cmd::TicketArgs;
use crate::context::Context;
use crate::output::{Renderable, pretty_rule, render_list};
use chrono::{DateTime, Local, Utc};
use helpdesk_core::model::message::{Message, MessageOrigin};
use serde::Serialize;
use std::io::{self, Write};

/// One thread entry as shown by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadEntry {
    pub id: String,
    pub author: String,
    pub origin: MessageOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub pending: bool,
    pub text: String,
    pub attachments: Vec<EntryAttachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryAttachment {
    pub name: String,
    pub url: String,
    pub local: bool,
}

impl From<&Message> for ThreadEntry {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.to_string(),
            author: message.author.clone(),
            origin: message.origin,
            created_at: message.created_at,
            pending: message.pending,
            text: message.plain_text(),
            attachments: message
                .attachments
                .iter()
                .map(|a| EntryAttachment {
                    name: a.name().to_string(),
                    url: a.url().to_string(),
                    local: a.is_local(),
                })
                .collect(),
        }
    }
}

fn local_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || "-".to_string(),
        |ts| ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Single-line form of multi-line message text.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Renderable for ThreadEntry {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let marker = match (self.origin, self.pending) {
            (MessageOrigin::System, _) => " [system]",
            (_, true) => " [sending]",
            _ => "",
        };
        writeln!(w, "{} · {}{}", self.author, local_time(self.created_at), marker)?;
        if !self.text.is_empty() {
            for line in self.text.lines() {
                writeln!(w, "  {line}")?;
            }
        }
        for attachment in &self.attachments {
            writeln!(w, "  📎 {}  {}", attachment.name, attachment.url)?;
        }
        pretty_rule(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let files = self
            .attachments
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(
            w,
            "{}  {}  {}  {}  {}",
            self.id,
            self.author,
            self.created_at
                .map_or_else(|| "-".to_string(), |ts| ts.to_rfc3339()),
            if files.is_empty() { "-" } else { files.as_str() },
            one_line(&self.text)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "author", "created_at", "files", "text"]
    }
}

/// Execute `hd thread <id>`.
///
/// # Errors
///
/// Returns an error if the ticket cannot be loaded or output fails.
pub fn run_thread(args: &TicketArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut workspace = ctx.open_workspace(&args.id)?;
    ctx.report_notices(&mut workspace)?;
    let entries = workspace
        .thread()
        .iter()
        .map(ThreadEntry::from)
        .collect::<Vec<_>>();
    render_list(&entries, ctx.output)?;
    Ok(())
}
