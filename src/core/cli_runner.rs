//! Short-lived helper processes: `ollama --version`, `kill`, `taskkill`.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{LmcError, Result};

/// How long a helper process may run.
pub const CLI_TIMEOUT: Duration = Duration::from_secs(10);

/// Captured output of a finished helper process.
#[derive(Debug)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CliOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `program args...` to completion, capturing both streams.
///
/// The child is killed if it outlives `limit`.
///
/// # Errors
///
/// `CliNotFound` when the program is missing, `LocalRuntime` when it cannot
/// be executed or does not finish in time.
pub async fn run_command(program: &str, args: &[&str], limit: Duration) -> Result<CliOutput> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LmcError::CliNotFound {
                name: program.to_string(),
            },
            _ => LmcError::LocalRuntime(format!("failed to run {program}: {e}")),
        })?;

    tracing::trace!(program, ?args, "Spawned helper process");

    let output = tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| {
            LmcError::LocalRuntime(format!(
                "{program} did not finish within {}s",
                limit.as_secs()
            ))
        })?
        .map_err(|e| LmcError::LocalRuntime(format!("{program}: {e}")))?;

    Ok(CliOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_cli_not_found() {
        let err = run_command("lmc-definitely-not-installed", &[], CLI_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, LmcError::CliNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let output = run_command("sh", &["-c", "echo out; echo err >&2; exit 3"], CLI_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let err = run_command("sleep", &["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, LmcError::LocalRuntime(msg) if msg.contains("did not finish")));
    }
}
