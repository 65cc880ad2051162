//! Search command implementation.

use crate::cli::args::SearchArgs;
use crate::cli::context::AppContext;
use crate::core::models::SearchOptions;
use crate::core::provider::SearchProvider;
use crate::error::{LmcError, Result};
use crate::render;

/// Execute the search command.
///
/// # Errors
///
/// Returns an error for an empty query. Unknown names, providers without
/// a key and failed searches become warnings or empty columns instead.
pub async fn execute(ctx: &AppContext, args: &SearchArgs) -> Result<()> {
    let query = args.query.join(" ");
    if query.trim().is_empty() {
        return Err(LmcError::InvalidInput("search query is empty".to_string()));
    }
    let providers = provider_names(&args.providers);
    let options = SearchOptions {
        country: args
            .country
            .clone()
            .or_else(|| ctx.resolved.config.general.country.clone()),
        max_results: args.max_results,
    };

    let comparator = ctx.search_comparator()?;
    let comparison = comparator.compare(&query, &providers, &options).await;

    let output = render::render_search(&comparison, ctx.format(), ctx.pretty(), ctx.no_color())?;
    print!("{output}");
    Ok(())
}

/// Provider names from the command line, or all four.
#[must_use]
pub fn provider_names(names: &[String]) -> Vec<String> {
    if names.is_empty() {
        return SearchProvider::ALL
            .iter()
            .map(|p| p.cli_name().to_string())
            .collect();
    }
    names.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_all_providers() {
        assert_eq!(
            provider_names(&[]),
            vec!["perplexity", "brave", "tavily", "exa"]
        );
    }

    #[test]
    fn explicit_names_pass_through() {
        let names = ["brave".to_string(), "bing".to_string()];
        assert_eq!(provider_names(&names), names.to_vec());
    }
}
