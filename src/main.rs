//! lmc - LLM Compare
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use lmc::cli::{AppContext, Cli, Commands};
use lmc::core::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(&logging::LogSettings::resolve(
        cli.log_level.as_deref(),
        cli.json_output,
        cli.verbose,
    ));

    let format = cli.effective_format();
    let no_color = cli.no_color;
    let pretty = cli.pretty;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            let error_output = lmc::render::error::render_error_full(&e, format, no_color, pretty);
            eprintln!("{error_output}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(mut cli: Cli) -> lmc::Result<()> {
    let Some(command) = cli.command.take() else {
        print_quickstart();
        return Ok(());
    };

    // Completions must work without a readable config.
    if let Commands::Completions { shell } = command {
        lmc::cli::print_completions(shell);
        return Ok(());
    }

    let ctx = AppContext::from_cli(&cli)?;
    tracing::debug!(format = ?ctx.format(), "Resolved configuration");
    lmc::cli::dispatch(&ctx, command).await
}

/// Print quickstart help when no command is given.
fn print_quickstart() {
    println!(
        r#"lmc - LLM Compare

Run one prompt against several models and compare the answers.

USAGE:
    lmc [OPTIONS] <COMMAND>

COMMANDS:
    compare       Send a prompt to up to four models
    search        Compare web search results across providers
    chat          Chat with a single model
    models        List available models
    prompts       Manage system prompts by category
    user-prompts  Manage saved user prompts
    sessions      Browse saved comparisons
    keys          Manage API keys
    ollama        Control the local Ollama server

QUICK START:
    lmc keys set openrouter sk-or-...                      # Store an API key
    lmc compare -m openai/gpt-4o -m ollama:llama3 "Hi"    # Compare two models
    lmc compare -m openai/gpt-4o --augment tavily "News?"  # Add web context
    lmc search "rust async runtimes"                       # Compare search results
    lmc sessions list                                      # Past comparisons

ROBOT MODE:
    lmc compare --json ...        # JSON output
    lmc search --format md ...    # Markdown output

For more help: lmc --help
"#
    );
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
}
