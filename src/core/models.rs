//! Core data models.
//!
//! Requests, responses, cost records and comparison slots shared by the
//! provider adapters, the orchestrators and the renderers.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::provider::{ChatBackend, SearchProvider};
use crate::error::ErrorKind;

// =============================================================================
// Messages
// =============================================================================

/// Chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A single-turn prompt, built fresh for every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub model_id: String,
    pub system_prompt: String,
    pub user_message: String,
    pub images: Vec<String>,
}

impl ProviderRequest {
    /// Ordered messages: the system prompt (when non-empty) then the user turn.
    #[must_use]
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(&self.system_prompt));
        }
        messages.push(ChatMessage::user(&self.user_message));
        messages
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    /// Image attachments as `data:image/...;base64,` URLs.
    pub images: Vec<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// `Some(false)` declares the model text-only.
    pub vision: Option<bool>,
}

// =============================================================================
// Usage and Cost
// =============================================================================

/// Token counts for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    #[must_use]
    pub const fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }
}

/// Cost of one call, provisional until confirmed by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostInfo {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub input_cost: f64,
    pub output_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    pub confirmed: bool,
}

impl CostInfo {
    /// Unconfirmed zero-cost record built from token counts.
    #[must_use]
    pub fn provisional(usage: Usage, latency_ms: Option<u64>, finish_reason: Option<String>) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
            total_cost: 0.0,
            input_cost: 0.0,
            output_cost: 0.0,
            latency_ms,
            finish_reason,
            confirmed: false,
        }
    }
}

/// Shared cost cell for one response.
///
/// The only mutator is [`SharedCost::replace`]; readers always see either
/// the old or the new record, never a mix.
#[derive(Debug, Clone, Default)]
pub struct SharedCost(Arc<RwLock<CostInfo>>);

impl SharedCost {
    #[must_use]
    pub fn new(cost: CostInfo) -> Self {
        Self(Arc::new(RwLock::new(cost)))
    }

    /// Snapshot of the current record.
    #[must_use]
    pub fn get(&self) -> CostInfo {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Swap in a new record.
    pub fn replace(&self, cost: CostInfo) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = cost;
    }
}

impl Serialize for SharedCost {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

/// Normalized chat response.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_handle: Option<String>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    pub cost: SharedCost,
}

impl ProviderResponse {
    /// Build a response; the generation handle can only be set here.
    #[must_use]
    pub fn new(
        content: String,
        usage: Option<Usage>,
        generation_handle: Option<String>,
        latency_ms: u64,
        finish_reason: Option<String>,
        cost: CostInfo,
    ) -> Self {
        Self {
            content,
            usage,
            generation_handle,
            latency_ms,
            finish_reason,
            cost: SharedCost::new(cost),
        }
    }

    /// Provider id used to look up confirmed billing.
    #[must_use]
    pub fn generation_handle(&self) -> Option<&str> {
        self.generation_handle.as_deref()
    }
}

// =============================================================================
// Comparison Slots
// =============================================================================

/// Highest slot index.
pub const MAX_SLOTS: u8 = 4;

/// Lifecycle of a slot within one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    #[default]
    Pending,
    Loading,
    Success,
    Error,
}

impl SlotState {
    /// Whether the slot has reached a final state.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// One comparison output position.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSlot {
    pub slot_index: u8,
    pub model_id: String,
    pub model_name: String,
    pub backend: ChatBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision: Option<bool>,
    pub state: SlotState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ProviderResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub web_search: bool,
}

impl ComparisonSlot {
    /// New pending slot; the display name defaults to the model id.
    #[must_use]
    pub fn new(slot_index: u8, backend: ChatBackend, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        Self {
            slot_index,
            model_name: model_id.clone(),
            model_id,
            backend,
            vision: None,
            state: SlotState::Pending,
            response: None,
            error_message: None,
            error_kind: None,
            web_search: false,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    #[must_use]
    pub const fn with_vision(mut self, vision: bool) -> Self {
        self.vision = Some(vision);
        self
    }
}

/// Payload of a progress event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotUpdateData {
    Loading,
    Success { content: String, cost: CostInfo },
    Error { kind: ErrorKind, message: String },
    CostUpdated { cost: CostInfo },
}

/// Progress event emitted for every slot transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotUpdate {
    pub slot_index: u8,
    pub state: SlotState,
    pub data: SlotUpdateData,
}

// =============================================================================
// Search
// =============================================================================

/// One search result as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// 1-based position in the provider's result list.
    pub rank: u32,
}

/// Results of one search call.
pub type SearchResults = Vec<SearchHit>;

/// Options for a search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Two-letter country code; `None` or `worldwide` means no filter.
    pub country: Option<String>,
    pub max_results: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            country: None,
            max_results: 10,
        }
    }
}

impl SearchOptions {
    /// Country filter to send, if any.
    #[must_use]
    pub fn country_filter(&self) -> Option<&str> {
        self.country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("worldwide"))
    }
}

/// A merged row keyed by normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResultRow {
    pub normalized_url: String,
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Rank per requested provider; `None` when that provider did not return the URL.
    pub ranks: BTreeMap<SearchProvider, Option<u32>>,
}

/// Output of a multi-provider search comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchComparison {
    pub rows: Vec<SearchResultRow>,
    pub warnings: Vec<String>,
}

// =============================================================================
// Model Listing
// =============================================================================

/// Per-token USD prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub prompt: f64,
    pub completion: f64,
}

/// A model offered by a chat backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<ModelPrice>,
    pub supports_vision: bool,
}

// =============================================================================
// Sessions
// =============================================================================

/// One model's answer stored in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub model: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostInfo>,
}

/// A persisted comparison run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub system_prompt: String,
    pub user_prompt: String,
    pub responses: Vec<SessionResponse>,
    pub models: Vec<String>,
}

// =============================================================================
// Robot Output
// =============================================================================

/// Schema version tag for JSON output.
pub const SCHEMA_VERSION: &str = "lmc.v1";

/// Stable JSON envelope for machine consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotOutput<T> {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub data: T,
    pub errors: Vec<String>,
    pub meta: RobotMeta,
}

/// Metadata for robot output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotMeta {
    pub format: String,
    pub runtime: String,
}

impl<T> RobotOutput<T> {
    /// Create a new robot output envelope.
    pub fn new(command: impl Into<String>, data: T) -> Self {
        Self::with_errors(command, data, Vec::new())
    }

    /// Create with errors (warnings, failed slots).
    pub fn with_errors(command: impl Into<String>, data: T, errors: Vec<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            command: command.into(),
            data,
            errors,
            meta: RobotMeta {
                format: "json".to_string(),
                runtime: "cli".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_messages_skip_blank_system_prompt() {
        let request = ProviderRequest {
            model_id: "m".to_string(),
            system_prompt: "  ".to_string(),
            user_message: "hi".to_string(),
            images: Vec::new(),
        };
        assert_eq!(request.to_messages(), vec![ChatMessage::user("hi")]);

        let request = ProviderRequest {
            system_prompt: "be brief".to_string(),
            ..request
        };
        assert_eq!(
            request.to_messages(),
            vec![ChatMessage::system("be brief"), ChatMessage::user("hi")]
        );
    }

    #[test]
    fn shared_cost_replace_is_visible_to_clones() {
        let cost = SharedCost::new(CostInfo::provisional(Usage::new(10, 5), Some(120), None));
        let reader = cost.clone();
        assert!(!reader.get().confirmed);

        cost.replace(CostInfo {
            total_cost: 0.0007,
            confirmed: true,
            ..CostInfo::default()
        });

        let seen = reader.get();
        assert!(seen.confirmed);
        assert!((seen.total_cost - 0.0007).abs() < f64::EPSILON);
        // Wholesale replacement: old token counts are gone.
        assert_eq!(seen.input_tokens, 0);
    }

    #[test]
    fn provisional_cost_is_zero_and_unconfirmed() {
        let cost = CostInfo::provisional(Usage::new(12, 30), Some(850), Some("stop".to_string()));
        assert_eq!(cost.total_tokens, 42);
        assert!(cost.total_cost.abs() < f64::EPSILON);
        assert!(!cost.confirmed);
        assert_eq!(cost.latency_ms, Some(850));
    }

    #[test]
    fn response_serializes_cost_snapshot() {
        let response = ProviderResponse::new(
            "hello".to_string(),
            Some(Usage::new(1, 2)),
            Some("gen-1".to_string()),
            10,
            None,
            CostInfo::provisional(Usage::new(1, 2), None, None),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["generation_handle"], "gen-1");
        assert_eq!(json["cost"]["total_tokens"], 3);
        assert_eq!(response.generation_handle(), Some("gen-1"));
    }

    #[test]
    fn slot_builder_defaults_name_to_id() {
        let slot = ComparisonSlot::new(2, ChatBackend::Ollama, "llama3:8b");
        assert_eq!(slot.model_name, "llama3:8b");
        assert_eq!(slot.state, SlotState::Pending);
        let slot = slot.with_name("Llama 3").with_vision(false);
        assert_eq!(slot.model_name, "Llama 3");
        assert_eq!(slot.vision, Some(false));
    }

    #[test]
    fn country_filter_ignores_worldwide() {
        let mut options = SearchOptions::default();
        assert_eq!(options.country_filter(), None);
        options.country = Some("Worldwide".to_string());
        assert_eq!(options.country_filter(), None);
        options.country = Some("US".to_string());
        assert_eq!(options.country_filter(), Some("US"));
    }

    #[test]
    fn ranks_serialize_with_provider_keys() {
        let mut ranks = BTreeMap::new();
        ranks.insert(SearchProvider::Brave, Some(3));
        ranks.insert(SearchProvider::Perplexity, None);
        let row = SearchResultRow {
            normalized_url: "https://example.com/a".to_string(),
            url: "https://www.example.com/a/".to_string(),
            title: "A".to_string(),
            snippet: String::new(),
            ranks,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["ranks"]["brave"], 3);
        assert!(json["ranks"]["perplexity"].is_null());
    }

    #[test]
    fn robot_output_envelope() {
        let output = RobotOutput::new("compare", vec![1, 2]);
        assert_eq!(output.schema_version, SCHEMA_VERSION);
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["command"], "compare");
        assert!(json["generatedAt"].is_string());
        assert_eq!(json["errors"].as_array().unwrap().len(), 0);
    }
}
