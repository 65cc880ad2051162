//! System prompt commands.

use serde::Serialize;
use serde_json::json;

use crate::cli::args::PromptsCommand;
use crate::cli::context::AppContext;
use crate::cli::{emit, input};
use crate::error::{LmcError, Result};
use crate::render::human;
use crate::storage::PromptStore;

/// One row of `prompts list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEntry {
    pub category: String,
    pub is_default: bool,
    pub customized: bool,
}

/// Execute a prompts subcommand.
///
/// # Errors
///
/// Returns an error for blank input, unreadable files, or a store that
/// cannot be written.
pub fn execute(ctx: &AppContext, cmd: &PromptsCommand) -> Result<()> {
    let mut store = ctx.prompt_store()?;
    match cmd {
        PromptsCommand::List => {
            let entries = category_entries(&store);
            emit(ctx, "prompts list", &entries, |entries, no_color| {
                let rows: Vec<_> = entries
                    .iter()
                    .map(|e| (e.category.clone(), e.is_default, e.customized))
                    .collect();
                human::render_prompt_categories(&rows, no_color)
            })
        }
        PromptsCommand::Show { category } => {
            if !store.contains(category) {
                tracing::warn!(category = %category, "Unknown prompt category, showing 'other'");
            }
            let data = json!({ "category": category, "prompt": store.get(category) });
            emit(ctx, "prompts show", &data, |data, _| {
                format!("{}\n", data["prompt"].as_str().unwrap_or_default().trim_end())
            })
        }
        PromptsCommand::Set {
            category,
            text,
            file,
        } => {
            let text = input::text_from(text.as_deref(), file.as_deref(), "prompt")?;
            store.set(category, &text)?;
            let data = json!({ "category": category.trim(), "saved": true });
            emit(ctx, "prompts set", &data, |_, _| {
                format!("Saved prompt for '{}'\n", category.trim())
            })
        }
        PromptsCommand::Delete { category } => {
            if PromptStore::is_default(category.trim()) {
                return Err(LmcError::InvalidInput(format!(
                    "'{}' is a built-in category and cannot be deleted",
                    category.trim()
                )));
            }
            if !store.delete(category)? {
                return Err(LmcError::NotFound {
                    what: "prompt category".to_string(),
                    id: category.clone(),
                });
            }
            let data = json!({ "category": category.trim(), "deleted": true });
            emit(ctx, "prompts delete", &data, |_, _| {
                format!("Deleted category '{}'\n", category.trim())
            })
        }
        PromptsCommand::Import { path } => {
            let imported = store.import(path)?;
            let data = json!({ "path": path, "imported": imported });
            emit(ctx, "prompts import", &data, |_, _| {
                format!("Imported {imported} prompt(s) from {}\n", path.display())
            })
        }
        PromptsCommand::Export { path } => {
            let exported = store.export(path)?;
            let data = json!({ "path": path, "exported": exported });
            emit(ctx, "prompts export", &data, |_, _| {
                format!("Exported {exported} prompt(s) to {}\n", path.display())
            })
        }
    }
}

/// Categories in list order with their built-in and override flags.
#[must_use]
pub fn category_entries(store: &PromptStore) -> Vec<CategoryEntry> {
    store
        .list_categories()
        .into_iter()
        .map(|category| CategoryEntry {
            is_default: PromptStore::is_default(&category),
            customized: store.is_customized(&category),
            category,
        })
        .collect()
}
