//! CLI argument parsing and command dispatch.

pub mod args;
pub mod chat;
pub mod compare;
pub mod context;
pub mod input;
pub mod keys;
pub mod models;
pub mod ollama;
pub mod prompts;
pub mod search;
pub mod sessions;
pub mod user_prompts;

use clap::CommandFactory;
use clap_complete::Shell;
use serde::Serialize;

pub use args::{Cli, Commands, OutputFormat};
pub use context::AppContext;

use crate::error::Result;
use crate::render;

/// Run a parsed command.
///
/// # Errors
///
/// Whatever the command returns.
pub async fn dispatch(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Compare(args) => compare::execute(ctx, &args).await,
        Commands::Search(args) => search::execute(ctx, &args).await,
        Commands::Chat(args) => chat::execute(ctx, &args).await,
        Commands::Models(args) => models::execute(ctx, &args).await,
        Commands::Prompts(cmd) => prompts::execute(ctx, &cmd),
        Commands::UserPrompts(cmd) => user_prompts::execute(ctx, &cmd),
        Commands::Sessions(cmd) => sessions::execute(ctx, &cmd),
        Commands::Keys(cmd) => keys::execute(ctx, &cmd),
        Commands::Ollama(cmd) => ollama::execute(ctx, &cmd).await,
        Commands::Completions { shell } => {
            print_completions(shell);
            Ok(())
        }
    }
}

/// Write a completion script for `shell` to stdout.
pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "lmc", &mut std::io::stdout());
}

/// Print `data` in the context's output format.
pub(crate) fn emit<T: Serialize>(
    ctx: &AppContext,
    command: &str,
    data: &T,
    human: impl FnOnce(&T, bool) -> String,
) -> Result<()> {
    let output = render::render_with(command, data, ctx.format(), ctx.pretty(), ctx.no_color(), human)?;
    print!("{output}");
    Ok(())
}
