//! API key commands.

use serde_json::json;

use crate::cli::args::KeysCommand;
use crate::cli::context::AppContext;
use crate::cli::{emit, input};
use crate::core::provider::credential_provider;
use crate::error::Result;
use crate::render::human;
use crate::storage::{CredentialStore, KeyStatus, mask_key};

/// Execute a keys subcommand.
///
/// # Errors
///
/// Returns an error for an unknown provider, an empty key, or a credential
/// store failure.
pub fn execute(ctx: &AppContext, cmd: &KeysCommand) -> Result<()> {
    match cmd {
        KeysCommand::Set { provider, value } => {
            let provider = credential_provider(provider)?;
            let value = match value {
                Some(value) => value.clone(),
                None => input::read_piped_stdin()?.unwrap_or_default(),
            };
            ctx.credentials.set_key(provider, value.trim())?;
            tracing::info!(provider, store = ctx.credentials.name(), "Stored API key");

            let masked = mask_key(value.trim());
            let data = json!({
                "provider": provider,
                "store": ctx.credentials.name(),
                "masked": masked,
            });
            emit(ctx, "keys set", &data, |_, _| {
                format!("Saved {provider} key {masked} ({})\n", ctx.credentials.name())
            })
        }
        KeysCommand::Show => {
            let status = ctx.credentials.status()?;
            emit(ctx, "keys show", &status, |s: &Vec<KeyStatus>, no_color| {
                human::render_keys(s, no_color)
            })
        }
    }
}
