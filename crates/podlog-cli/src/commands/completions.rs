use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

use super::CliError;

pub fn run(shell: String) -> Result<(), CliError> {
    let shell: Shell = shell
        .parse()
        .map_err(|_| CliError::UnknownShell(shell.clone()))?;
    let mut cmd = crate::Cli::command();
    generate(shell, &mut cmd, "podlog", &mut io::stdout());
    Ok(())
}
