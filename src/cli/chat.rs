//! Chat command implementation.
//!
//! `--message` sends one turn and exits; otherwise turns are read from stdin
//! until `/exit` or end of input.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::args::{ChatArgs, ModelSpec};
use crate::cli::context::AppContext;
use crate::core::chat::{ChatSession, ChatTurn};
use crate::error::Result;
use crate::providers::ChatClient;
use crate::render::{self, human};
use crate::util::env::stdin_is_tty;
use crate::util::image::{encode_image, encode_images};

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Exit,
    Clear,
    Image(PathBuf),
    Message(String),
    Empty,
}

impl ReplInput {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => Self::Empty,
            "/exit" | "/quit" => Self::Exit,
            "/clear" => Self::Clear,
            _ => match line.strip_prefix("/image ") {
                Some(path) if !path.trim().is_empty() => Self::Image(PathBuf::from(path.trim())),
                _ => Self::Message(line.to_string()),
            },
        }
    }
}

/// Execute the chat command.
///
/// # Errors
///
/// Returns an error for a missing credential, bad images, or a failed
/// single-message turn. In the interactive loop turn errors are printed
/// and the loop continues.
pub async fn execute(ctx: &AppContext, args: &ChatArgs) -> Result<()> {
    let client = ctx.chat_client(args.model.backend)?;
    let images = encode_images(&args.prompt_args.images)?;
    let system_prompt = ctx.system_prompt(&args.prompt_args)?;

    let mut session = ChatSession::new(Arc::clone(&client), &args.model.model_id)
        .with_augmenter(ctx.augmenter(&args.prompt_args)?)
        .with_temperature(ctx.temperature(&args.prompt_args))
        .with_max_tokens(ctx.max_tokens(&args.prompt_args));
    if let Some((name, vision)) = lookup_model(client.as_ref(), &args.model).await {
        session = session.with_name(name).with_vision(Some(vision));
    }

    match &args.message {
        Some(message) => {
            session.send(message, &system_prompt, images).await?;
            print_last_turn(ctx, &session)
        }
        None => repl(ctx, &mut session, &system_prompt, images).await,
    }
}

/// Display name and vision support from the backend's listing.
async fn lookup_model(client: &dyn ChatClient, spec: &ModelSpec) -> Option<(String, bool)> {
    match client.list_models().await {
        Ok(models) => models
            .into_iter()
            .find(|m| m.id == spec.model_id)
            .map(|m| (m.name, m.supports_vision)),
        Err(err) => {
            tracing::debug!(error = %err, "Model listing unavailable");
            None
        }
    }
}

fn print_last_turn(ctx: &AppContext, session: &ChatSession) -> Result<()> {
    let Some(turn) = session.history().last() else {
        return Ok(());
    };
    let output = render::render_with(
        "chat",
        turn,
        ctx.format(),
        ctx.pretty(),
        ctx.no_color(),
        |t: &ChatTurn, no_color| human::render_chat_turn(t, no_color),
    )?;
    print!("{output}");
    Ok(())
}

async fn repl(
    ctx: &AppContext,
    session: &mut ChatSession,
    system_prompt: &str,
    mut pending_images: Vec<String>,
) -> Result<()> {
    let interactive = stdin_is_tty();
    if interactive {
        eprintln!(
            "Chatting with {} (/image PATH to attach, /clear to reset, /exit to quit)",
            session.model_name()
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match ReplInput::parse(&line) {
            ReplInput::Empty => {}
            ReplInput::Exit => break,
            ReplInput::Clear => {
                session.clear();
                pending_images.clear();
                eprintln!("History cleared.");
            }
            ReplInput::Image(path) => match encode_image(&path) {
                Ok(image) => {
                    pending_images.push(image);
                    eprintln!("Attached {} to the next message.", path.display());
                }
                Err(err) => eprintln!("{}", render::error::render_error(&err, ctx.format(), ctx.no_color())),
            },
            ReplInput::Message(message) => {
                let images = std::mem::take(&mut pending_images);
                tokio::select! {
                    sent = session.send(&message, system_prompt, images) => match sent {
                        Ok(_) => print_last_turn(ctx, session)?,
                        Err(err) => {
                            tracing::debug!(error = %err, "Chat turn failed");
                            eprintln!("{}", render::error::render_error(&err, ctx.format(), ctx.no_color()));
                        }
                    },
                    _ = tokio::signal::ctrl_c() => eprintln!("\nCancelled."),
                }
            }
        }
    }
    tracing::info!(turns = session.history().len(), "Chat ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repl_commands() {
        assert_eq!(ReplInput::parse("  "), ReplInput::Empty);
        assert_eq!(ReplInput::parse("/exit"), ReplInput::Exit);
        assert_eq!(ReplInput::parse("/quit\n"), ReplInput::Exit);
        assert_eq!(ReplInput::parse("/clear"), ReplInput::Clear);
        assert_eq!(
            ReplInput::parse("/image  cat.png "),
            ReplInput::Image(PathBuf::from("cat.png"))
        );
        assert_eq!(
            ReplInput::parse(" hello there "),
            ReplInput::Message("hello there".to_string())
        );
    }

    #[test]
    fn bare_image_command_is_a_message() {
        assert_eq!(
            ReplInput::parse("/image"),
            ReplInput::Message("/image".to_string())
        );
    }
}
