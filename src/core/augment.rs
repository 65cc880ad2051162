//! Internet augmentation of user prompts.
//!
//! Three mutually exclusive modes: no augmentation, search context from one
//! search provider appended to the user message, or the hosted backend's
//! online model variant.

use std::collections::HashMap;
use std::sync::Arc;

use super::models::SearchOptions;
use super::provider::SearchProvider;
use crate::error::{LmcError, Result};
use crate::providers::{CONTEXT_RESULTS, ChatClient, SearchClient, format_search_context};

/// How a prompt is enriched with live web data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Augmentation {
    #[default]
    None,
    /// Search once, append the formatted results to the user message.
    Context(SearchProvider),
    /// Ask the backend for its web-search model variant.
    Online,
}

impl Augmentation {
    /// Parse `none`, `online`, or a search provider name.
    ///
    /// # Errors
    ///
    /// `InvalidProvider` for anything else.
    pub fn from_arg(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "off" => Ok(Self::None),
            "online" | "openrouter" => Ok(Self::Online),
            other => SearchProvider::from_cli_name(other).map(Self::Context),
        }
    }

    /// Name used in config and CLI.
    #[must_use]
    pub const fn as_arg(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Context(p) => p.cli_name(),
            Self::Online => "online",
        }
    }
}

impl std::fmt::Display for Augmentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Applies an [`Augmentation`] mode.
#[derive(Clone, Default)]
pub struct Augmenter {
    mode: Augmentation,
    search: HashMap<SearchProvider, Arc<dyn SearchClient>>,
    country: Option<String>,
}

impl std::fmt::Debug for Augmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Augmenter")
            .field("mode", &self.mode)
            .field("search", &self.search.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Augmenter {
    #[must_use]
    pub fn new(mode: Augmentation) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Register a search client; the last one per provider wins.
    #[must_use]
    pub fn with_search_client(mut self, client: Arc<dyn SearchClient>) -> Self {
        self.search.insert(client.provider(), client);
        self
    }

    #[must_use]
    pub fn with_country(mut self, country: Option<String>) -> Self {
        self.country = country;
        self
    }

    #[must_use]
    pub const fn mode(&self) -> Augmentation {
        self.mode
    }

    /// Whether model ids are rewritten to their online variants.
    #[must_use]
    pub const fn is_online(&self) -> bool {
        matches!(self.mode, Augmentation::Online)
    }

    /// Context block to append to `query`; empty unless in context mode.
    ///
    /// # Errors
    ///
    /// `AugmentationFailed` when the provider has no client or the search fails.
    pub async fn context_for(&self, query: &str) -> Result<String> {
        let Augmentation::Context(provider) = self.mode else {
            return Ok(String::new());
        };

        let client = self
            .search
            .get(&provider)
            .ok_or_else(|| LmcError::AugmentationFailed {
                provider: provider.display_name().to_string(),
                reason: format!("{} API key not configured", provider.display_name()),
            })?;

        let options = SearchOptions {
            country: self.country.clone(),
            max_results: u32::try_from(CONTEXT_RESULTS).unwrap_or(5),
        };

        let hits = client.search(query, &options).await.map_err(|err| {
            LmcError::AugmentationFailed {
                provider: provider.display_name().to_string(),
                reason: err.to_string(),
            }
        })?;

        tracing::info!(provider = %provider, hits = hits.len(), "Fetched search context");
        Ok(format_search_context(&hits))
    }

    /// Model id to send: the online variant in online mode.
    ///
    /// # Errors
    ///
    /// `OnlineUnsupported` when the backend has no online variant.
    pub fn model_id(&self, client: &dyn ChatClient, model_id: &str) -> Result<String> {
        if self.is_online() {
            client.online_model_id(model_id)
        } else {
            Ok(model_id.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes() {
        assert_eq!(Augmentation::from_arg("none").unwrap(), Augmentation::None);
        assert_eq!(Augmentation::from_arg("Online").unwrap(), Augmentation::Online);
        assert_eq!(
            Augmentation::from_arg("tavily").unwrap(),
            Augmentation::Context(SearchProvider::Tavily)
        );
        assert!(Augmentation::from_arg("google").is_err());
    }

    #[test]
    fn display_round_trips() {
        for mode in [
            Augmentation::None,
            Augmentation::Online,
            Augmentation::Context(SearchProvider::Exa),
        ] {
            assert_eq!(Augmentation::from_arg(&mode.to_string()).unwrap(), mode);
        }
    }

    #[tokio::test]
    async fn no_context_outside_context_mode() {
        assert_eq!(Augmenter::new(Augmentation::None).context_for("q").await.unwrap(), "");
        assert_eq!(Augmenter::new(Augmentation::Online).context_for("q").await.unwrap(), "");
    }

    #[tokio::test]
    async fn missing_client_fails_augmentation() {
        let augmenter = Augmenter::new(Augmentation::Context(SearchProvider::Brave));
        let err = augmenter.context_for("q").await.unwrap_err();
        assert!(matches!(err, LmcError::AugmentationFailed { .. }));
        assert!(err.to_string().contains("Brave API key not configured"));
    }
}
