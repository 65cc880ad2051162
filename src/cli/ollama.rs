//! Local Ollama server commands.

use std::time::Duration;

use serde_json::json;

use crate::cli::args::OllamaCommand;
use crate::cli::context::AppContext;
use crate::cli::emit;
use crate::core::local_runtime::{RuntimeStatus, StartOutcome};
use crate::error::Result;
use crate::render::human;

/// Execute an ollama subcommand.
///
/// # Errors
///
/// Returns an error when the binary is missing, the server cannot be
/// started, or a spawned server cannot be signalled.
pub async fn execute(ctx: &AppContext, cmd: &OllamaCommand) -> Result<()> {
    let runtime = ctx.local_runtime()?;
    match cmd {
        OllamaCommand::Status => {
            let status = runtime.status().await;
            emit(ctx, "ollama status", &status, |s: &RuntimeStatus, no_color| {
                human::render_runtime_status(s, no_color)
            })
        }
        OllamaCommand::Start { wait } => {
            let outcome = runtime
                .with_start_wait(Duration::from_secs(*wait))
                .start()
                .await?;
            emit(ctx, "ollama start", &outcome, |o: &StartOutcome, no_color| {
                human::render_start_outcome(o, no_color)
            })
        }
        OllamaCommand::Stop => {
            let stopped = runtime.stop().await?;
            let data = json!({ "stopped": stopped });
            emit(ctx, "ollama stop", &data, |_, _| {
                if stopped {
                    "Stopped Ollama server\n".to_string()
                } else {
                    "No server started by lmc is running\n".to_string()
                }
            })
        }
    }
}
