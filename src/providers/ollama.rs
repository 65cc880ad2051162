//! Ollama local chat backend.
//!
//! Text-only single-turn prompts go through `POST /api/generate` with the
//! system prompt folded into one prompt string. Multi-turn conversations and
//! image prompts use `POST /api/chat`. Local generation is free, so cost is
//! always zero and token counts come from the estimate heuristic.

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::{
    ChatClient, Endpoint, elapsed_ms, ensure_images_allowed, image_target, prompt_text,
    strip_data_url_prefix,
};
use crate::core::http::{LOOKUP_TIMEOUT, build_client, is_connect_error, send_json, send_with_retry};
use crate::core::models::{ChatMessage, ChatRole, CostInfo, ModelInfo, ProviderResponse, SendOptions};
use crate::core::pricing::estimate_usage;
use crate::core::provider::ChatBackend;
use crate::error::{LmcError, Result};

/// Default local server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Timeout for the liveness probe.
pub const PING_TIMEOUT: Duration = Duration::from_secs(3);

const PROVIDER: &str = "Ollama";
const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_NUM_PREDICT: u32 = 8000;
const SHOW_TIMEOUT: Duration = Duration::from_secs(3);

/// Model families that accept images.
const VISION_FAMILIES: &[&str] = &["llava", "bakllava", "minicpm-v"];

/// Name fragments that suggest a vision model when `/api/show` is unavailable.
const VISION_KEYWORDS: &[&str] = &["llava", "bakllava", "minicpm-v", "vision"];

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: ChatRole,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
    done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ShowResponse {
    details: Option<ShowDetails>,
}

#[derive(Debug, Deserialize)]
struct ShowDetails {
    #[serde(default)]
    families: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(default)]
    version: String,
}

// =============================================================================
// Client
// =============================================================================

/// Ollama client. Needs no credential.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    endpoint: Endpoint,
    ping_timeout: Duration,
}

/// Fold a system prompt and a user turn into one completion prompt.
#[must_use]
pub fn single_prompt(system_prompt: Option<&str>, user_message: &str) -> String {
    match system_prompt.filter(|s| !s.trim().is_empty()) {
        Some(system) => format!("{system}\n\nUser: {user_message}\n\nAssistant:"),
        None => user_message.to_string(),
    }
}

/// `[system?, user]` with no other turns.
fn as_single_turn(messages: &[ChatMessage]) -> Option<(Option<&str>, &str)> {
    match messages {
        [user] if user.role == ChatRole::User => Some((None, user.content.as_str())),
        [system, user] if system.role == ChatRole::System && user.role == ChatRole::User => {
            Some((Some(system.content.as_str()), user.content.as_str()))
        }
        _ => None,
    }
}

/// Vision support from reported families, case-insensitive.
fn families_support_vision(families: &[String]) -> bool {
    families
        .iter()
        .any(|f| VISION_FAMILIES.contains(&f.to_lowercase().as_str()))
}

/// Vision support guessed from the model name.
fn name_suggests_vision(name: &str) -> bool {
    let lower = name.to_lowercase();
    VISION_KEYWORDS.iter().any(|k| lower.contains(k))
}

impl OllamaClient {
    /// Client against the default local server.
    ///
    /// # Errors
    ///
    /// Client construction failure.
    pub fn new() -> Result<Self> {
        Self::with_endpoint(Endpoint::new(
            DEFAULT_BASE_URL,
            ChatBackend::Ollama.default_timeout(),
        ))
    }

    /// Client against a custom endpoint.
    ///
    /// # Errors
    ///
    /// Client construction failure.
    pub fn with_endpoint(endpoint: Endpoint) -> Result<Self> {
        Ok(Self {
            http: build_client(endpoint.timeout)?,
            endpoint,
            ping_timeout: PING_TIMEOUT,
        })
    }

    #[must_use]
    pub const fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Base URL of the server.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }

    fn options(options: &SendOptions) -> GenerateOptions {
        GenerateOptions {
            temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            num_predict: options.max_tokens.unwrap_or(DEFAULT_NUM_PREDICT),
        }
    }

    async fn complete(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        options: &SendOptions,
    ) -> Result<ProviderResponse> {
        ensure_images_allowed(model_id, options)?;

        let started = tokio::time::Instant::now();
        let single = as_single_turn(messages).filter(|_| options.images.is_empty());
        let result = match single {
            Some((system, user)) => {
                let prompt = single_prompt(system, user);
                self.generate(model_id, &prompt, options)
                    .await
                    .map(|(content, reason)| (prompt, content, reason))
            }
            None => self
                .chat(model_id, messages, options)
                .await
                .map(|(content, reason)| (prompt_text(messages), content, reason)),
        };

        let (prompt, content, finish_reason) = result.map_err(|err| {
            if is_connect_error(&err) {
                LmcError::Network {
                    provider: PROVIDER.to_string(),
                    message: "Cannot connect to Ollama - Please ensure Ollama is running"
                        .to_string(),
                }
            } else {
                err
            }
        })?;
        let latency_ms = elapsed_ms(started);
        let usage = estimate_usage(&prompt, &content);

        tracing::debug!(model = model_id, latency_ms, "Ollama request succeeded");

        Ok(ProviderResponse::new(
            content,
            Some(usage),
            None,
            latency_ms,
            finish_reason.clone(),
            CostInfo::provisional(usage, Some(latency_ms), finish_reason),
        ))
    }

    async fn generate(
        &self,
        model_id: &str,
        prompt: &str,
        options: &SendOptions,
    ) -> Result<(String, Option<String>)> {
        let url = self.endpoint.url("/api/generate");
        let body = json!({
            "model": model_id,
            "prompt": prompt,
            "stream": false,
            "options": Self::options(options),
        });
        tracing::debug!(model = model_id, "Calling Ollama generate");

        let response: GenerateResponse =
            send_with_retry(PROVIDER, &self.endpoint.retry, self.endpoint.timeout, || {
                self.http.post(&url).json(&body)
            })
            .await?;
        Ok((response.response, response.done_reason))
    }

    async fn chat(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        options: &SendOptions,
    ) -> Result<(String, Option<String>)> {
        let target = image_target(messages).filter(|_| !options.images.is_empty());
        let images: Vec<&str> = options
            .images
            .iter()
            .map(|i| strip_data_url_prefix(i))
            .collect();
        let wire: Vec<WireMessage<'_>> = messages
            .iter()
            .enumerate()
            .map(|(i, m)| WireMessage {
                role: m.role,
                content: &m.content,
                images: if Some(i) == target {
                    images.clone()
                } else {
                    Vec::new()
                },
            })
            .collect();

        let url = self.endpoint.url("/api/chat");
        let body = json!({
            "model": model_id,
            "messages": wire,
            "stream": false,
            "options": Self::options(options),
        });
        tracing::debug!(model = model_id, turns = messages.len(), images = images.len(), "Calling Ollama chat");

        let response: ChatResponse =
            send_with_retry(PROVIDER, &self.endpoint.retry, self.endpoint.timeout, || {
                self.http.post(&url).json(&body)
            })
            .await?;
        Ok((response.message.content, response.done_reason))
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let request = self
            .http
            .get(self.endpoint.url("/api/tags"))
            .timeout(LOOKUP_TIMEOUT);
        let tags: TagsResponse = send_json(PROVIDER, LOOKUP_TIMEOUT, request).await?;

        let models = join_all(tags.models.into_iter().map(|m| self.describe(m.name))).await;
        tracing::debug!(count = models.len(), "Loaded Ollama models");
        Ok(models)
    }

    async fn describe(&self, name: String) -> ModelInfo {
        let request = self
            .http
            .post(self.endpoint.url("/api/show"))
            .json(&json!({"name": name}))
            .timeout(SHOW_TIMEOUT);

        let supports_vision = match send_json::<ShowResponse>(PROVIDER, SHOW_TIMEOUT, request).await {
            Ok(show) => show
                .details
                .and_then(|d| d.families)
                .is_some_and(|f| families_support_vision(&f)),
            Err(err) => {
                tracing::debug!(model = %name, error = %err, "Model details unavailable, guessing from name");
                name_suggests_vision(&name)
            }
        };

        ModelInfo {
            id: name.clone(),
            name,
            description: None,
            context_length: None,
            pricing: None,
            supports_vision,
        }
    }

    /// Server version if the server answers within the ping timeout.
    pub async fn ping(&self) -> Option<String> {
        let request = self
            .http
            .get(self.endpoint.url("/api/version"))
            .timeout(self.ping_timeout);
        match send_json::<VersionResponse>(PROVIDER, self.ping_timeout, request).await {
            Ok(v) => Some(v.version),
            Err(err) => {
                tracing::debug!(error = %err, "Ollama ping failed");
                None
            }
        }
    }
}

impl ChatClient for OllamaClient {
    fn backend(&self) -> ChatBackend {
        ChatBackend::Ollama
    }

    fn send<'a>(
        &'a self,
        model_id: &'a str,
        messages: &'a [ChatMessage],
        options: &'a SendOptions,
    ) -> BoxFuture<'a, Result<ProviderResponse>> {
        self.complete(model_id, messages, options).boxed()
    }

    fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelInfo>>> {
        self.fetch_models().boxed()
    }
}
