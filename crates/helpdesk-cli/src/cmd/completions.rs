use clap::Args;
use clap_complete::{Shell, generate};
use std::io::Write;

/// Arguments for `hd completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `shell` to `out`.
///
/// # Errors
///
/// Returns an error if flushing `out` fails.
pub fn run_completions(
    shell: Shell,
    command: &mut clap::Command,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let bin_name = command.get_name().to_string();
    generate(shell, command, bin_name, out);
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_script_names_the_binary() {
        let mut command = clap::Command::new("hd").subcommand(clap::Command::new("show"));
        let mut buf = Vec::new();
        run_completions(Shell::Bash, &mut command, &mut buf).unwrap();
        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains("_hd()"));
        assert!(script.contains("show"));
    }
}
