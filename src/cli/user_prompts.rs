//! Saved user prompt commands.

use serde_json::json;

use crate::cli::args::UserPromptsCommand;
use crate::cli::context::AppContext;
use crate::cli::{emit, input};
use crate::error::{LmcError, Result};
use crate::render::human;
use crate::storage::UserPrompt;

/// Execute a user-prompts subcommand.
///
/// # Errors
///
/// Returns an error for blank or duplicate input, unknown ids, or a store
/// that cannot be written.
pub fn execute(ctx: &AppContext, cmd: &UserPromptsCommand) -> Result<()> {
    let mut store = ctx.user_prompt_store()?;
    match cmd {
        UserPromptsCommand::List { category } => {
            let prompts = store.list(category.as_deref());
            emit(ctx, "user-prompts list", &prompts, |prompts, no_color| {
                human::render_user_prompts(prompts, no_color)
            })
        }
        UserPromptsCommand::Show { id } => {
            let prompt = store.get(*id).ok_or_else(|| not_found(*id))?;
            emit(ctx, "user-prompts show", prompt, |p: &UserPrompt, _| {
                format!("{}\n\n{}\n", p.title, p.content.trim_end())
            })
        }
        UserPromptsCommand::Add {
            title,
            content,
            file,
            category,
        } => {
            let content = input::text_from(content.as_deref(), file.as_deref(), "prompt content")?;
            if store.exists(&content) {
                return Err(LmcError::InvalidInput(
                    "a prompt with the same content is already saved".to_string(),
                ));
            }
            let prompt = store.create(title, &content, category)?;
            emit(ctx, "user-prompts add", &prompt, |p: &UserPrompt, _| {
                format!("Saved prompt {} ({})\n", p.id, p.title)
            })
        }
        UserPromptsCommand::Delete { id } => {
            if !store.delete(*id)? {
                return Err(not_found(*id));
            }
            let data = json!({ "id": id, "deleted": true });
            emit(ctx, "user-prompts delete", &data, |_, _| format!("Deleted prompt {id}\n"))
        }
    }
}

fn not_found(id: u64) -> LmcError {
    LmcError::NotFound {
        what: "user prompt".to_string(),
        id: id.to_string(),
    }
}
