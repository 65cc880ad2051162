//! Provider identities.
//!
//! Two chat backends (hosted OpenRouter, local Ollama) and four web search
//! providers. Search providers are listed in the order their results are
//! merged.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LmcError, Result};

// =============================================================================
// Chat Backends
// =============================================================================

/// Where a comparison slot sends its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatBackend {
    OpenRouter,
    Ollama,
}

impl ChatBackend {
    /// All backends in display order.
    pub const ALL: &'static [Self] = &[Self::OpenRouter, Self::Ollama];

    /// CLI name for this backend.
    #[must_use]
    pub const fn cli_name(self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::Ollama => "ollama",
        }
    }

    /// Display name for human output.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OpenRouter => "OpenRouter",
            Self::Ollama => "Ollama",
        }
    }

    /// Parse from CLI argument.
    pub fn from_cli_name(name: &str) -> Result<Self> {
        let lower = name.to_lowercase();
        Self::ALL
            .iter()
            .find(|b| b.cli_name() == lower)
            .copied()
            .ok_or_else(|| LmcError::InvalidProvider(name.to_string()))
    }

    /// Whether calls need an API key.
    #[must_use]
    pub const fn requires_credential(self) -> bool {
        matches!(self, Self::OpenRouter)
    }

    /// Whether the backend has a web-search ("online") model variant.
    #[must_use]
    pub const fn supports_online(self) -> bool {
        matches!(self, Self::OpenRouter)
    }

    /// Default timeout for one generation request.
    #[must_use]
    pub const fn default_timeout(self) -> Duration {
        match self {
            Self::OpenRouter => Duration::from_secs(30),
            // Local generation on CPU is slow
            Self::Ollama => Duration::from_secs(60),
        }
    }
}

impl std::fmt::Display for ChatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// =============================================================================
// Search Providers
// =============================================================================

/// Web search providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    Perplexity,
    Brave,
    Tavily,
    Exa,
}

impl SearchProvider {
    /// All search providers, in merge order.
    pub const ALL: &'static [Self] = &[Self::Perplexity, Self::Brave, Self::Tavily, Self::Exa];

    /// CLI name for this provider.
    #[must_use]
    pub const fn cli_name(self) -> &'static str {
        match self {
            Self::Perplexity => "perplexity",
            Self::Brave => "brave",
            Self::Tavily => "tavily",
            Self::Exa => "exa",
        }
    }

    /// Display name for human output and warnings.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Perplexity => "Perplexity",
            Self::Brave => "Brave",
            Self::Tavily => "Tavily",
            Self::Exa => "Exa",
        }
    }

    /// Parse from CLI argument.
    pub fn from_cli_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|p| p.cli_name() == lower)
            .copied()
            .ok_or_else(|| LmcError::InvalidProvider(name.to_string()))
    }

    /// Default timeout for one search request.
    #[must_use]
    pub const fn default_timeout(self) -> Duration {
        Duration::from_secs(15)
    }
}

impl std::fmt::Display for SearchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Every provider name a credential can be stored under.
pub const CREDENTIAL_PROVIDERS: &[&str] = &["openrouter", "tavily", "perplexity", "brave", "exa"];

/// Environment variable consulted before the key store.
#[must_use]
pub fn env_var_for(provider: &str) -> Option<&'static str> {
    match provider.to_lowercase().as_str() {
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "tavily" => Some("TAVILY_API_KEY"),
        "perplexity" => Some("PERPLEXITY_API_KEY"),
        "brave" => Some("BRAVE_API_KEY"),
        "exa" => Some("EXA_API_KEY"),
        _ => None,
    }
}

/// Validate a provider name used with the key store.
pub fn credential_provider(name: &str) -> Result<&'static str> {
    let lower = name.trim().to_lowercase();
    CREDENTIAL_PROVIDERS
        .iter()
        .find(|p| **p == lower)
        .copied()
        .ok_or_else(|| LmcError::InvalidProvider(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_round_trips_cli_name() {
        for backend in ChatBackend::ALL {
            assert_eq!(ChatBackend::from_cli_name(backend.cli_name()).unwrap(), *backend);
        }
        assert_eq!(
            ChatBackend::from_cli_name("OpenRouter").unwrap(),
            ChatBackend::OpenRouter
        );
        assert!(ChatBackend::from_cli_name("anthropic").is_err());
    }

    #[test]
    fn search_provider_merge_order() {
        let names: Vec<_> = SearchProvider::ALL.iter().map(|p| p.cli_name()).collect();
        assert_eq!(names, vec!["perplexity", "brave", "tavily", "exa"]);
    }

    #[test]
    fn search_provider_parse_is_case_insensitive() {
        assert_eq!(
            SearchProvider::from_cli_name(" Brave ").unwrap(),
            SearchProvider::Brave
        );
        assert!(SearchProvider::from_cli_name("google").is_err());
    }

    #[test]
    fn only_openrouter_needs_a_key_and_goes_online() {
        assert!(ChatBackend::OpenRouter.requires_credential());
        assert!(!ChatBackend::Ollama.requires_credential());
        assert!(ChatBackend::OpenRouter.supports_online());
        assert!(!ChatBackend::Ollama.supports_online());
    }

    #[test]
    fn timeouts() {
        assert_eq!(ChatBackend::OpenRouter.default_timeout(), Duration::from_secs(30));
        assert_eq!(ChatBackend::Ollama.default_timeout(), Duration::from_secs(60));
        assert_eq!(SearchProvider::Exa.default_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn env_vars_for_credentials() {
        for provider in CREDENTIAL_PROVIDERS {
            assert!(env_var_for(provider).is_some(), "{provider}");
        }
        assert_eq!(env_var_for("ollama"), None);
        assert_eq!(credential_provider("BRAVE").unwrap(), "brave");
        assert!(credential_provider("ollama").is_err());
    }
}
