use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

/// Captured result of one cluster CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A short failure reason: trimmed stderr, or the exit code when stderr is empty.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs the cluster CLI (`oc` or `kubectl`) as a child process.
///
/// Each call owns its child; dropping the future (timeout, cancellation)
/// kills the process.
#[derive(Debug, Clone)]
pub struct CliCommand {
    program: String,
}

impl CliCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run with `args` and capture output. Only spawn/IO failures are `Err`;
    /// a non-zero exit is reported through `CommandOutput::success`.
    pub async fn run(&self, args: &[&str]) -> std::io::Result<CommandOutput> {
        debug!(program = %self.program, ?args, "running cluster command");
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
