//! Provider adapters.
//!
//! One submodule per external service. Chat backends implement
//! [`ChatClient`], search providers implement [`SearchClient`], and the
//! hosted backend also implements [`CostLookup`] for deferred billing.

pub mod brave;
pub mod exa;
pub mod ollama;
pub mod openrouter;
pub mod perplexity;
pub mod tavily;

use std::sync::LazyLock;
use std::time::Duration;

use futures::future::BoxFuture;
use regex::Regex;

use crate::core::models::{
    ChatMessage, CostInfo, ModelInfo, ProviderResponse, SearchHit, SearchOptions, SendOptions,
};
use crate::core::provider::{ChatBackend, SearchProvider};
use crate::core::retry::RetryPolicy;
use crate::error::{LmcError, Result};

pub use brave::BraveClient;
pub use exa::ExaClient;
pub use ollama::OllamaClient;
pub use openrouter::OpenRouterClient;
pub use perplexity::PerplexityClient;
pub use tavily::TavilyClient;

// =============================================================================
// Client Seams
// =============================================================================

/// A chat completion backend.
pub trait ChatClient: Send + Sync {
    /// Which backend this client talks to.
    fn backend(&self) -> ChatBackend;

    /// Send a conversation and return the normalized response.
    fn send<'a>(
        &'a self,
        model_id: &'a str,
        messages: &'a [ChatMessage],
        options: &'a SendOptions,
    ) -> BoxFuture<'a, Result<ProviderResponse>>;

    /// List the models this backend offers.
    fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelInfo>>>;

    /// Model id of the web-search ("online") variant of `model_id`.
    ///
    /// # Errors
    ///
    /// `OnlineUnsupported` unless the backend has online variants.
    fn online_model_id(&self, model_id: &str) -> Result<String> {
        let _ = model_id;
        Err(LmcError::OnlineUnsupported {
            provider: self.backend().display_name().to_string(),
        })
    }
}

/// A web search provider.
pub trait SearchClient: Send + Sync {
    /// Which provider this client talks to.
    fn provider(&self) -> SearchProvider;

    /// Run a query; hits are ranked from 1 in provider order.
    fn search<'a>(
        &'a self,
        query: &'a str,
        options: &'a SearchOptions,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>>;
}

/// Confirmed billing lookup by generation handle.
pub trait CostLookup: Send + Sync {
    fn lookup<'a>(&'a self, generation_handle: &'a str) -> BoxFuture<'a, Result<CostInfo>>;
}

// =============================================================================
// Endpoint Settings
// =============================================================================

/// Where and how a client sends its requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Endpoint {
    /// Endpoint with the default retry policy.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Join a path onto the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Reject empty API keys before any request is built.
pub(crate) fn require_key(provider: &str, api_key: String) -> Result<String> {
    if api_key.trim().is_empty() {
        return Err(LmcError::MissingCredential {
            provider: provider.to_string(),
        });
    }
    Ok(api_key)
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Most search results folded into augmentation context.
pub const CONTEXT_RESULTS: usize = 5;

/// Render search hits as a context block appended to a user prompt.
///
/// Uses the first five hits; no hits yields an empty string.
#[must_use]
pub fn format_search_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = hits
        .iter()
        .take(CONTEXT_RESULTS)
        .enumerate()
        .map(|(i, hit)| format!("[Source {}]: {}\n{}", i + 1, hit.title, hit.snippet))
        .collect();

    format!(
        "\n\n--- Internet Search Context ---\n{}\n--- End of Context ---",
        parts.join("\n\n")
    )
}

static DATA_URL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:image/[a-zA-Z0-9.+-]+;base64,").unwrap());

/// Strip a `data:image/...;base64,` prefix, leaving the raw payload.
#[must_use]
pub fn strip_data_url_prefix(image: &str) -> &str {
    DATA_URL_PREFIX
        .find(image)
        .map_or(image, |m| &image[m.end()..])
}

/// Fail when images are attached for a model declared text-only.
///
/// # Errors
///
/// `ImagesUnsupported` when `vision` is `Some(false)` and images are present.
pub fn ensure_images_allowed(model_id: &str, options: &SendOptions) -> Result<()> {
    if !options.images.is_empty() && options.vision == Some(false) {
        return Err(LmcError::ImagesUnsupported {
            model: model_id.to_string(),
        });
    }
    Ok(())
}

/// Index of the message images attach to: the last one, if it is a user turn.
pub(crate) fn image_target(messages: &[ChatMessage]) -> Option<usize> {
    use crate::core::models::ChatRole;
    messages
        .len()
        .checked_sub(1)
        .filter(|&i| messages[i].role == ChatRole::User)
}

/// All message contents joined by newlines, for token estimation.
pub(crate) fn prompt_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Elapsed milliseconds, saturating.
pub(crate) fn elapsed_ms(started: tokio::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
