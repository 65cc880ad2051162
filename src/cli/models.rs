//! Models command implementation.

use std::collections::BTreeMap;

use crate::cli::args::ModelsArgs;
use crate::cli::context::AppContext;
use crate::core::models::ModelInfo;
use crate::core::provider::ChatBackend;
use crate::error::Result;
use crate::render::{self, human};

/// Execute the models command.
///
/// An explicitly requested backend must answer; when both are listed, a
/// backend without a key or a server is skipped with a warning.
///
/// # Errors
///
/// Returns an error for an unknown backend name or when the requested
/// backend cannot be listed.
pub async fn execute(ctx: &AppContext, args: &ModelsArgs) -> Result<()> {
    let backends = match &args.backend {
        Some(name) => vec![ChatBackend::from_cli_name(name)?],
        None => ChatBackend::ALL.to_vec(),
    };
    let explicit = args.backend.is_some();

    let mut listing = BTreeMap::new();
    for backend in backends {
        let models = match list_backend(ctx, backend).await {
            Ok(models) => models,
            Err(err) if !explicit => {
                tracing::warn!(backend = %backend, error = %err, "Skipping backend");
                continue;
            }
            Err(err) => return Err(err),
        };
        let models = filter_models(models, args.vision, args.filter.as_deref());
        listing.insert(backend.display_name().to_string(), models);
    }

    let output = render::render_with(
        "models",
        &listing,
        ctx.format(),
        ctx.pretty(),
        ctx.no_color(),
        |l: &BTreeMap<String, Vec<ModelInfo>>, no_color| human::render_models(l, no_color),
    )?;
    print!("{output}");
    Ok(())
}

async fn list_backend(ctx: &AppContext, backend: ChatBackend) -> Result<Vec<ModelInfo>> {
    let client = ctx.chat_client(backend)?;
    client.list_models().await
}

/// Keep vision models when asked, then match `term` against id and name.
#[must_use]
pub fn filter_models(models: Vec<ModelInfo>, vision_only: bool, term: Option<&str>) -> Vec<ModelInfo> {
    let term = term.map(str::to_lowercase);
    models
        .into_iter()
        .filter(|m| !vision_only || m.supports_vision)
        .filter(|m| {
            term.as_deref().is_none_or(|t| {
                m.id.to_lowercase().contains(t) || m.name.to_lowercase().contains(t)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_test_model;

    fn models() -> Vec<ModelInfo> {
        let mut claude = make_test_model("anthropic/claude-3.5-sonnet", true);
        claude.name = "Claude 3.5 Sonnet".to_string();
        vec![
            make_test_model("openai/gpt-4o", true),
            make_test_model("meta-llama/llama-3-8b", false),
            claude,
        ]
    }

    #[test]
    fn vision_filter() {
        let ids: Vec<_> = filter_models(models(), true, None)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["openai/gpt-4o", "anthropic/claude-3.5-sonnet"]);
    }

    #[test]
    fn term_matches_id_or_name_case_insensitively() {
        assert_eq!(filter_models(models(), false, Some("LLAMA")).len(), 1);
        assert_eq!(filter_models(models(), false, Some("sonnet")).len(), 1);
        assert!(filter_models(models(), true, Some("llama")).is_empty());
        assert_eq!(filter_models(models(), false, None).len(), 3);
    }
}
