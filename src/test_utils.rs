//! In-process fakes for the provider seams, plus fixtures.
//!
//! ```rust,ignore
//! use lmc::test_utils::*;
//!
//! let client = MockChatClient::new(ChatBackend::OpenRouter)
//!     .with_reply("openai/gpt-4o", MockReply::text("Hello"));
//! let dir = TestDir::new();
//! dir.create_file("config.toml", &make_test_config_toml());
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::core::models::{
    ChatMessage, ComparisonSlot, CostInfo, ModelInfo, ProviderResponse, SearchHit, SearchOptions,
    SendOptions, Session, SessionResponse, Usage,
};
use crate::core::pricing::estimate_usage;
use crate::core::provider::{ChatBackend, SearchProvider};
use crate::error::{LmcError, Result};
use crate::providers::{ChatClient, CostLookup, SearchClient};

// =============================================================================
// Mock Chat Client
// =============================================================================

/// Builds the error a mock should fail with. Errors are not `Clone`.
pub type ErrorFactory = Arc<dyn Fn() -> LmcError + Send + Sync>;

/// What a mock returns for one model.
#[derive(Clone)]
pub enum MockReply {
    Content {
        content: String,
        usage: Option<Usage>,
        generation_handle: Option<String>,
    },
    Fail(ErrorFactory),
}

impl MockReply {
    /// Plain text reply with estimated usage and no generation handle.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Content {
            content: content.into(),
            usage: None,
            generation_handle: None,
        }
    }

    /// Reply carrying reported usage and a generation handle.
    #[must_use]
    pub fn billed(content: impl Into<String>, usage: Usage, handle: impl Into<String>) -> Self {
        Self::Content {
            content: content.into(),
            usage: Some(usage),
            generation_handle: Some(handle.into()),
        }
    }

    /// Fail with a freshly built error on every call.
    #[must_use]
    pub fn fail(factory: impl Fn() -> LmcError + Send + Sync + 'static) -> Self {
        Self::Fail(Arc::new(factory))
    }
}

/// One call seen by a mock chat client.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub options: SendOptions,
}

/// Scripted [`ChatClient`].
///
/// Replies are keyed by model id; an `:online` suffix is ignored for the
/// lookup. Unknown models fail with a provider error.
pub struct MockChatClient {
    backend: ChatBackend,
    replies: HashMap<String, MockReply>,
    models: Vec<ModelInfo>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockChatClient {
    #[must_use]
    pub fn new(backend: ChatBackend) -> Self {
        Self {
            backend,
            replies: HashMap::new(),
            models: Vec::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_reply(mut self, model_id: impl Into<String>, reply: MockReply) -> Self {
        self.replies.insert(model_id.into(), reply);
        self
    }

    #[must_use]
    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = models;
        self
    }

    /// Sleep this long before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn respond(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        options: &SendOptions,
    ) -> Result<ProviderResponse> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                model_id: model_id.to_string(),
                messages: messages.to_vec(),
                options: options.clone(),
            });

        crate::providers::ensure_images_allowed(model_id, options)?;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let key = model_id.strip_suffix(":online").unwrap_or(model_id);
        match self.replies.get(key) {
            Some(MockReply::Content {
                content,
                usage,
                generation_handle,
            }) => {
                let prompt = messages
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                let effective = usage.unwrap_or_else(|| estimate_usage(&prompt, content));
                Ok(ProviderResponse::new(
                    content.clone(),
                    Some(effective),
                    generation_handle.clone(),
                    5,
                    Some("stop".to_string()),
                    CostInfo::provisional(effective, Some(5), Some("stop".to_string())),
                ))
            }
            Some(MockReply::Fail(factory)) => Err(factory()),
            None => Err(LmcError::ProviderApi {
                provider: self.backend.display_name().to_string(),
                status_code: Some(404),
                message: format!("model {model_id} not found"),
            }),
        }
    }
}

impl ChatClient for MockChatClient {
    fn backend(&self) -> ChatBackend {
        self.backend
    }

    fn send<'a>(
        &'a self,
        model_id: &'a str,
        messages: &'a [ChatMessage],
        options: &'a SendOptions,
    ) -> BoxFuture<'a, Result<ProviderResponse>> {
        self.respond(model_id, messages, options).boxed()
    }

    fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelInfo>>> {
        let models = self.models.clone();
        async move { Ok(models) }.boxed()
    }

    fn online_model_id(&self, model_id: &str) -> Result<String> {
        if self.backend.supports_online() {
            Ok(format!("{model_id}:online"))
        } else {
            Err(LmcError::OnlineUnsupported {
                provider: self.backend.display_name().to_string(),
            })
        }
    }
}

// =============================================================================
// Mock Search Client
// =============================================================================

/// Scripted [`SearchClient`] returning fixed hits or a fixed failure.
pub struct MockSearchClient {
    provider: SearchProvider,
    hits: Vec<SearchHit>,
    failure: Option<ErrorFactory>,
    calls: AtomicU32,
    last_options: Mutex<Option<SearchOptions>>,
}

impl MockSearchClient {
    #[must_use]
    pub fn new(provider: SearchProvider, hits: Vec<SearchHit>) -> Self {
        Self {
            provider,
            hits,
            failure: None,
            calls: AtomicU32::new(0),
            last_options: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn failing(
        provider: SearchProvider,
        factory: impl Fn() -> LmcError + Send + Sync + 'static,
    ) -> Self {
        Self {
            failure: Some(Arc::new(factory)),
            ..Self::new(provider, Vec::new())
        }
    }

    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn last_options(&self) -> Option<SearchOptions> {
        self.last_options
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SearchClient for MockSearchClient {
    fn provider(&self) -> SearchProvider {
        self.provider
    }

    fn search<'a>(
        &'a self,
        _query: &'a str,
        options: &'a SearchOptions,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_options
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(options.clone());
        let result = match &self.failure {
            Some(factory) => Err(factory()),
            None => Ok(self.hits.clone()),
        };
        async move { result }.boxed()
    }
}

// =============================================================================
// Mock Cost Lookup
// =============================================================================

/// [`CostLookup`] that fails a set number of times before confirming.
pub struct MockCostLookup {
    cost: CostInfo,
    failures: u32,
    calls: AtomicU32,
}

impl MockCostLookup {
    /// Confirms `total_cost` on the first call.
    #[must_use]
    pub fn confirming(total_cost: f64) -> Self {
        Self {
            cost: CostInfo {
                total_cost,
                confirmed: true,
                ..CostInfo::default()
            },
            failures: 0,
            calls: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub const fn with_failures(mut self, failures: u32) -> Self {
        self.failures = failures;
        self
    }

    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CostLookup for MockCostLookup {
    fn lookup<'a>(&'a self, generation_handle: &'a str) -> BoxFuture<'a, Result<CostInfo>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if n < self.failures {
            Err(LmcError::ProviderApi {
                provider: "OpenRouter".to_string(),
                status_code: Some(404),
                message: format!("generation {generation_handle} not found"),
            })
        } else {
            Ok(self.cost.clone())
        };
        async move { result }.boxed()
    }
}

// =============================================================================
// Test Data Factories
// =============================================================================

/// Search hit with a title and snippet derived from the URL.
#[must_use]
pub fn make_test_hit(url: &str, rank: u32) -> SearchHit {
    SearchHit {
        title: format!("Title for {url}"),
        url: url.to_string(),
        snippet: format!("Snippet for {url}"),
        rank,
    }
}

/// Pending slot for `model_id` on `backend`.
#[must_use]
pub fn make_test_slot(slot_index: u8, backend: ChatBackend, model_id: &str) -> ComparisonSlot {
    ComparisonSlot::new(slot_index, backend, model_id)
}

/// Model listing entry.
#[must_use]
pub fn make_test_model(id: &str, supports_vision: bool) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        name: id.to_string(),
        description: None,
        context_length: Some(8192),
        pricing: None,
        supports_vision,
    }
}

/// Session with two responses at a fixed timestamp.
#[must_use]
pub fn make_test_session(id: u64, user_prompt: &str) -> Session {
    Session {
        id,
        timestamp: Utc
            .timestamp_millis_opt(i64::try_from(id).unwrap_or(0))
            .single()
            .unwrap_or_else(Utc::now),
        system_prompt: "You are an expert writer.".to_string(),
        user_prompt: user_prompt.to_string(),
        responses: vec![
            SessionResponse {
                model: "GPT-4o".to_string(),
                content: "First answer".to_string(),
                cost: None,
            },
            SessionResponse {
                model: "llama3:8b".to_string(),
                content: "Second answer".to_string(),
                cost: None,
            },
        ],
        models: vec!["GPT-4o".to_string(), "llama3:8b".to_string()],
    }
}

/// Sample config TOML content.
#[must_use]
pub fn make_test_config_toml() -> String {
    r#"[general]
default_category = "coding"
augmentation = "none"
temperature = 0.5

[retry]
max_retries = 1
base_delay_ms = 10

[reconcile]
warmup_secs = 1
attempts = 2
interval_secs = 1

[timeouts]
chat_secs = 20
search_secs = 5

[output]
format = "human"
color = false
pretty = false
"#
    .to_string()
}

// =============================================================================
// Scratch Directories
// =============================================================================

/// A temporary lmc root; point `AppPaths::with_root` at [`TestDir::path`].
///
/// Panics on I/O failure, which is what a test wants.
pub struct TestDir(tempfile::TempDir);

impl TestDir {
    #[must_use]
    pub fn new() -> Self {
        Self(tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.0.path()
    }

    #[must_use]
    pub fn file_path(&self, relative: &str) -> PathBuf {
        self.path().join(relative)
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn create_file(&self, relative: &str, content: &str) {
        let path = self.file_path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|e| panic!("{}: {e}", parent.display()));
        }
        fs::write(&path, content).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
    }

    /// # Errors
    ///
    /// The file is missing or unreadable.
    pub fn read_file(&self, relative: &str) -> io::Result<String> {
        fs::read_to_string(self.file_path(relative))
    }

    #[must_use]
    pub fn file_exists(&self, relative: &str) -> bool {
        self.file_path(relative).is_file()
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Costs are sums of small fractions; compare them with a tolerance.
#[macro_export]
macro_rules! assert_float_eq {
    ($left:expr, $right:expr) => {
        $crate::assert_float_eq!($left, $right, 1e-12)
    };
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (left, right): (f64, f64) = ($left, $right);
        assert!(
            (left - right).abs() < $epsilon,
            "{left} and {right} differ by more than {}",
            $epsilon
        );
    }};
}

#[must_use]
pub fn has_ansi_codes(text: &str) -> bool {
    text.contains("\x1b[")
}
