//! OpenRouter hosted chat backend.
//!
//! - `POST /chat/completions` for generations (bearer auth)
//! - `GET /models` for the model catalogue
//! - `GET /generation?id=` for confirmed billing of a finished generation
//!
//! Online (web-search) variants are addressed as `{model}:online`.

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use std::time::Duration;

use super::{
    ChatClient, CostLookup, Endpoint, elapsed_ms, ensure_images_allowed, image_target, prompt_text,
};
use crate::core::http::{LOOKUP_TIMEOUT, build_client, send_json, send_with_retry};
use crate::core::models::{
    ChatMessage, CostInfo, ModelInfo, ModelPrice, ProviderResponse, SendOptions, Usage,
};
use crate::core::pricing::{ModelPricing, estimate_usage};
use crate::core::provider::ChatBackend;
use crate::error::{LmcError, Result};

/// Public API base.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

const PROVIDER: &str = "OpenRouter";
const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1000;

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    id: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<WireModel>,
}

#[derive(Debug, Deserialize)]
struct WireModel {
    id: String,
    name: Option<String>,
    description: Option<String>,
    context_length: Option<u64>,
    pricing: Option<WirePrice>,
    architecture: Option<Architecture>,
}

/// Prices arrive as decimal strings.
#[derive(Debug, Deserialize)]
struct WirePrice {
    #[serde(default, deserialize_with = "lenient_f64")]
    prompt: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    completion: f64,
}

#[derive(Debug, Deserialize)]
struct Architecture {
    #[serde(default)]
    input_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    data: Option<GenerationData>,
}

#[derive(Debug, Deserialize)]
struct GenerationData {
    tokens_prompt: Option<u64>,
    tokens_completion: Option<u64>,
    native_tokens_prompt: Option<u64>,
    native_tokens_completion: Option<u64>,
    total_cost: Option<f64>,
    model_pricing: Option<GenerationPricing>,
    latency: Option<f64>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationPricing {
    #[serde(default, deserialize_with = "lenient_f64")]
    prompt: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    completion: f64,
}

/// Accept a number or a numeric string; anything else reads as zero.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

// =============================================================================
// Client
// =============================================================================

/// OpenRouter client.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: Client,
    api_key: String,
    endpoint: Endpoint,
    lookup_timeout: Duration,
}

impl OpenRouterClient {
    /// Client against the public API with default timeout and retries.
    ///
    /// # Errors
    ///
    /// `MissingCredential` for an empty key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(
            api_key,
            Endpoint::new(DEFAULT_BASE_URL, ChatBackend::OpenRouter.default_timeout()),
        )
    }

    /// Client against a custom endpoint.
    ///
    /// # Errors
    ///
    /// `MissingCredential` for an empty key, or client construction failure.
    pub fn with_endpoint(api_key: impl Into<String>, endpoint: Endpoint) -> Result<Self> {
        Ok(Self {
            http: build_client(endpoint.timeout)?,
            api_key: super::require_key(PROVIDER, api_key.into())?,
            endpoint,
            lookup_timeout: LOOKUP_TIMEOUT,
        })
    }

    /// Timeout for model listing and generation lookups.
    #[must_use]
    pub const fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    fn completion_body(model_id: &str, messages: &[ChatMessage], options: &SendOptions) -> Value {
        json!({
            "model": model_id,
            "messages": wire_messages(messages, &options.images),
            "temperature": options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": false,
        })
    }

    async fn complete(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        options: &SendOptions,
    ) -> Result<ProviderResponse> {
        ensure_images_allowed(model_id, options)?;

        let body = Self::completion_body(model_id, messages, options);
        let url = self.endpoint.url("/chat/completions");
        tracing::debug!(model = model_id, images = options.images.len(), "Calling OpenRouter");

        let started = tokio::time::Instant::now();
        let response: CompletionResponse =
            send_with_retry(PROVIDER, &self.endpoint.retry, self.endpoint.timeout, || {
                self.http
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
            })
            .await?;
        let latency_ms = elapsed_ms(started);

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LmcError::ParseResponse {
                provider: PROVIDER.to_string(),
                message: "response has no choices".to_string(),
            })?;

        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: if u.total_tokens > 0 {
                    u.total_tokens
                } else {
                    u.prompt_tokens.saturating_add(u.completion_tokens)
                },
            });

        let content = choice.message.content.unwrap_or_default();
        let provisional =
            usage.unwrap_or_else(|| estimate_usage(&prompt_text(messages), &content));

        tracing::debug!(
            model = model_id,
            latency_ms,
            total_tokens = provisional.total_tokens,
            "OpenRouter request succeeded"
        );

        Ok(ProviderResponse::new(
            content,
            usage,
            response.id,
            latency_ms,
            choice.finish_reason.clone(),
            CostInfo::provisional(provisional, Some(latency_ms), choice.finish_reason),
        ))
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint.url("/models");
        let response: ModelsResponse =
            send_with_retry(PROVIDER, &self.endpoint.retry, self.lookup_timeout, || {
                self.http
                    .get(&url)
                    .bearer_auth(&self.api_key)
                    .timeout(self.lookup_timeout)
            })
            .await?;

        tracing::debug!(count = response.data.len(), "Loaded OpenRouter models");
        Ok(response.data.into_iter().map(model_info).collect())
    }

    async fn fetch_generation(&self, generation_handle: &str) -> Result<CostInfo> {
        let request = self
            .http
            .get(self.endpoint.url("/generation"))
            .query(&[("id", generation_handle)])
            .bearer_auth(&self.api_key)
            .timeout(self.lookup_timeout);
        let response: GenerationResponse =
            send_json(PROVIDER, self.lookup_timeout, request).await?;

        let data = response.data.ok_or_else(|| LmcError::ParseResponse {
            provider: PROVIDER.to_string(),
            message: "no generation data returned".to_string(),
        })?;
        Ok(confirmed_cost(data))
    }
}

impl ChatClient for OpenRouterClient {
    fn backend(&self) -> ChatBackend {
        ChatBackend::OpenRouter
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

    fn online_model_id(&self, model_id: &str) -> Result<String> {
        Ok(online_model_id(model_id))
    }
}

impl CostLookup for OpenRouterClient {
    fn lookup<'a>(&'a self, generation_handle: &'a str) -> BoxFuture<'a, Result<CostInfo>> {
        self.fetch_generation(generation_handle).boxed()
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// `{model}:online`, leaving ids that already carry the suffix alone.
#[must_use]
pub fn online_model_id(model_id: &str) -> String {
    if model_id.ends_with(":online") {
        model_id.to_string()
    } else {
        format!("{model_id}:online")
    }
}

/// Messages as sent on the wire; images turn the last user turn multimodal.
fn wire_messages(messages: &[ChatMessage], images: &[String]) -> Vec<Value> {
    let target = if images.is_empty() {
        None
    } else {
        image_target(messages)
    };

    messages
        .iter()
        .enumerate()
        .map(|(i, message)| {
            if Some(i) == target {
                let mut parts = vec![json!({"type": "text", "text": message.content})];
                parts.extend(
                    images
                        .iter()
                        .map(|url| json!({"type": "image_url", "image_url": {"url": url}})),
                );
                json!({"role": message.role, "content": parts})
            } else {
                json!({"role": message.role, "content": message.content})
            }
        })
        .collect()
}

fn model_info(model: WireModel) -> ModelInfo {
    let supports_vision = model
        .architecture
        .is_some_and(|a| a.input_modalities.iter().any(|m| m == "image"));
    ModelInfo {
        name: model.name.unwrap_or_else(|| model.id.clone()),
        id: model.id,
        description: model.description,
        context_length: model.context_length,
        pricing: model.pricing.map(|p| ModelPrice {
            prompt: p.prompt,
            completion: p.completion,
        }),
        supports_vision,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn confirmed_cost(data: GenerationData) -> CostInfo {
    let prompt = data.tokens_prompt.unwrap_or(0);
    let completion = data.tokens_completion.unwrap_or(0);
    let native = Usage::new(
        data.native_tokens_prompt.unwrap_or(0),
        data.native_tokens_completion.unwrap_or(0),
    );
    let pricing = data
        .model_pricing
        .map_or_else(ModelPricing::default, |p| ModelPricing::new(p.prompt, p.completion));

    pricing.confirmed_cost(
        Usage::new(prompt, completion),
        native,
        data.total_cost.unwrap_or(0.0),
        data.latency.filter(|l| *l >= 0.0).map(|l| l.round() as u64),
        data.finish_reason,
    )
}
