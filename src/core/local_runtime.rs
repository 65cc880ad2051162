//! Local model runtime control.
//!
//! Detects the `ollama` binary, checks whether its server answers, and
//! starts or stops a server spawned by lmc. The pid of a spawned server is
//! kept in a file so a later invocation can stop it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tokio::process::Command;

use super::cli_runner::{CLI_TIMEOUT, run_command};
use crate::error::{LmcError, Result};
use crate::providers::OllamaClient;

/// Binary looked up on `PATH`.
pub const BINARY: &str = "ollama";

/// How long `start` waits for the server to answer.
pub const START_WAIT: Duration = Duration::from_secs(15);

const POLL_INTERVAL: Duration = Duration::from_millis(500);

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+(?:\.\d+)?(?:[-+][\w.]+)?)").unwrap());

/// Result of looking for the runtime binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Installation {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Server status as reported by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation: Option<Installation>,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_pid: Option<u32>,
}

/// What `start` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    AlreadyRunning { version: String },
    Started { pid: u32, version: String },
}

/// Controls a local Ollama server.
#[derive(Debug)]
pub struct LocalRuntime {
    binary: String,
    client: OllamaClient,
    pid_file: PathBuf,
    start_wait: Duration,
}

impl LocalRuntime {
    #[must_use]
    pub fn new(client: OllamaClient, pid_file: PathBuf) -> Self {
        Self {
            binary: BINARY.to_string(),
            client,
            pid_file,
            start_wait: START_WAIT,
        }
    }

    /// Use another binary name or path.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    #[must_use]
    pub const fn with_start_wait(mut self, wait: Duration) -> Self {
        self.start_wait = wait;
        self
    }

    #[must_use]
    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Locate the binary on `PATH` and ask it for its version.
    ///
    /// # Errors
    ///
    /// `CliNotFound` when the binary is not installed.
    pub async fn check_installed(&self) -> Result<Installation> {
        let path = which::which(&self.binary).map_err(|_| LmcError::CliNotFound {
            name: self.binary.clone(),
        })?;

        let version = match run_command(&self.binary, &["--version"], CLI_TIMEOUT).await {
            Ok(output) => extract_version(&format!("{}{}", output.stdout, output.stderr)),
            Err(err) => {
                tracing::debug!(error = %err, "Version check failed");
                None
            }
        };

        Ok(Installation { path, version })
    }

    /// Server version when the server answers.
    pub async fn ping(&self) -> Option<String> {
        self.client.ping().await
    }

    /// Installation, reachability and managed pid in one report.
    pub async fn status(&self) -> RuntimeStatus {
        let (installation, server_version) =
            tokio::join!(self.check_installed(), self.client.ping());
        RuntimeStatus {
            installation: installation.ok(),
            running: server_version.is_some(),
            server_version,
            base_url: self.client.base_url().to_string(),
            managed_pid: read_pid(&self.pid_file),
        }
    }

    /// Spawn `ollama serve` unless a server already answers, then wait for it.
    ///
    /// # Errors
    ///
    /// `CliNotFound` when the binary is missing, `LocalRuntime` when it cannot
    /// be spawned or never answers.
    pub async fn start(&self) -> Result<StartOutcome> {
        if let Some(version) = self.ping().await {
            tracing::info!(%version, "Ollama already running");
            return Ok(StartOutcome::AlreadyRunning { version });
        }

        let path = which::which(&self.binary).map_err(|_| LmcError::CliNotFound {
            name: self.binary.clone(),
        })?;

        let child = Command::new(&path)
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LmcError::LocalRuntime(format!("failed to start {}: {e}", self.binary)))?;
        let pid = child
            .id()
            .ok_or_else(|| LmcError::LocalRuntime("server exited immediately".to_string()))?;

        write_pid(&self.pid_file, pid)?;
        tracing::info!(pid, path = %path.display(), "Spawned Ollama server");

        let deadline = tokio::time::Instant::now() + self.start_wait;
        loop {
            if let Some(version) = self.ping().await {
                return Ok(StartOutcome::Started { pid, version });
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(LmcError::LocalRuntime(format!(
                    "server started (pid {pid}) but did not answer within {}s",
                    self.start_wait.as_secs()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Stop the server spawned by `start`.
    ///
    /// Returns `false` when no spawned server is recorded.
    ///
    /// # Errors
    ///
    /// `LocalRuntime` when the process cannot be signalled.
    pub async fn stop(&self) -> Result<bool> {
        let Some(pid) = read_pid(&self.pid_file) else {
            return Ok(false);
        };

        let pid_arg = pid.to_string();
        let output = if cfg!(windows) {
            run_command("taskkill", &["/PID", &pid_arg, "/F"], CLI_TIMEOUT).await?
        } else {
            run_command("kill", &[&pid_arg], CLI_TIMEOUT).await?
        };

        remove_pid(&self.pid_file)?;
        if output.success() {
            tracing::info!(pid, "Stopped Ollama server");
            Ok(true)
        } else {
            // Already gone: the stale pid file is cleaned up either way.
            tracing::warn!(pid, stderr = %output.stderr.trim(), "Could not signal Ollama server");
            Ok(false)
        }
    }
}

/// First version-looking token in `output`.
#[must_use]
pub fn extract_version(output: &str) -> Option<String> {
    VERSION_RE
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn write_pid(path: &Path, pid: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, pid.to_string())?;
    Ok(())
}

fn remove_pid(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Endpoint;
    use crate::test_utils::TestDir;

    fn runtime(dir: &TestDir) -> LocalRuntime {
        // Nothing listens on port 9; pings fail fast.
        let client = OllamaClient::with_endpoint(Endpoint::new(
            "http://127.0.0.1:9",
            Duration::from_secs(1),
        ))
        .unwrap();
        LocalRuntime::new(client, dir.file_path("ollama.pid"))
    }

    #[test]
    fn extracts_versions() {
        assert_eq!(
            extract_version("ollama version is 0.5.7"),
            Some("0.5.7".to_string())
        );
        assert_eq!(extract_version("client 0.1.32-rc1\n"), Some("0.1.32-rc1".to_string()));
        assert_eq!(extract_version("no version here"), None);
    }

    #[test]
    fn pid_file_round_trip() {
        let dir = TestDir::new();
        let path = dir.file_path("run/ollama.pid");
        write_pid(&path, 4242).unwrap();
        assert_eq!(read_pid(&path), Some(4242));
        remove_pid(&path).unwrap();
        assert_eq!(read_pid(&path), None);
        remove_pid(&path).unwrap();
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let dir = TestDir::new();
        let runtime = runtime(&dir).with_binary("lmc-definitely-not-installed");
        let err = runtime.check_installed().await.unwrap_err();
        assert!(matches!(err, LmcError::CliNotFound { .. }));

        let err = runtime.start().await.unwrap_err();
        assert!(matches!(err, LmcError::CliNotFound { .. }));
    }

    #[tokio::test]
    async fn stop_without_spawned_server_is_noop() {
        let dir = TestDir::new();
        assert!(!runtime(&dir).stop().await.unwrap());
    }

    #[tokio::test]
    async fn status_reports_unreachable_server() {
        let dir = TestDir::new();
        let status = runtime(&dir).with_binary("lmc-definitely-not-installed").status().await;
        assert!(!status.running);
        assert!(status.installation.is_none());
        assert_eq!(status.base_url, "http://127.0.0.1:9");
    }
}
