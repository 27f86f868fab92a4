use crate::context::Context;
use crate::identity::Identity;
use crate::output::{pretty_kv, render_mode};
use std::io::Write;

/// Execute `hd whoami`: the user `hd` acts as and where that came from.
///
/// # Errors
///
/// Returns an error if no override is set and the token's profile cannot
/// be fetched.
pub fn run_whoami(ctx: &Context) -> anyhow::Result<()> {
    let identity = ctx.identity()?;
    render_mode(
        ctx.output,
        &identity,
        |i: &Identity, w| writeln!(w, "{}", i.profile.username),
        |i: &Identity, w| {
            pretty_kv(w, "User", &i.profile.username)?;
            pretty_kv(w, "Name", i.profile.display_name())?;
            if let Some(email) = &i.profile.email {
                pretty_kv(w, "Email", email)?;
            }
            pretty_kv(w, "Source", i.source.label())?;
            pretty_kv(w, "Server", &ctx.config.api_url)
        },
    )
}
