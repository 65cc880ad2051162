//! Multi-slot comparison runs.
//!
//! One prompt fans out to up to four model slots concurrently. The prompt is
//! augmented once before dispatch, every slot transition is reported through
//! a progress callback, and successful hosted slots get a background cost
//! reconciliation after the run settles.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;

use super::augment::Augmenter;
use super::models::{
    ComparisonSlot, MAX_SLOTS, ProviderRequest, ProviderResponse, SendOptions, SlotState,
    SlotUpdate, SlotUpdateData,
};
use super::provider::ChatBackend;
use super::reconcile::CostReconciler;
use crate::error::{ErrorKind, LmcError, Result};
use crate::providers::ChatClient;

/// Receives every slot transition.
pub type ProgressCallback = Arc<dyn Fn(SlotUpdate) + Send + Sync>;

/// Progress callback that ignores everything.
#[must_use]
pub fn no_progress() -> ProgressCallback {
    Arc::new(|_| {})
}

/// Drives comparison runs.
#[derive(Default)]
pub struct ComparisonOrchestrator {
    chat: HashMap<ChatBackend, Arc<dyn ChatClient>>,
    augmenter: Augmenter,
    reconciler: Option<Arc<CostReconciler>>,
    images: Vec<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

impl std::fmt::Debug for ComparisonOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonOrchestrator")
            .field("backends", &self.chat.keys().collect::<Vec<_>>())
            .field("augmenter", &self.augmenter)
            .field("images", &self.images.len())
            .finish_non_exhaustive()
    }
}

impl ComparisonOrchestrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the client for its backend.
    #[must_use]
    pub fn with_chat_client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.chat.insert(client.backend(), client);
        self
    }

    #[must_use]
    pub fn with_augmenter(mut self, augmenter: Augmenter) -> Self {
        self.augmenter = augmenter;
        self
    }

    /// Reconcile hosted costs after each run.
    #[must_use]
    pub fn with_reconciler(mut self, reconciler: Arc<CostReconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    /// Images attached to the user turn of every slot.
    #[must_use]
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Run one comparison.
    ///
    /// Returns the settled slots in input order. Reconciliation keeps
    /// running after this returns; confirmed costs arrive through
    /// `on_progress` and the slots' shared cost cells.
    ///
    /// # Errors
    ///
    /// `InvalidSlots` for bad slot input, `AugmentationFailed` when the
    /// search context cannot be fetched. Provider failures are recorded on
    /// their slot instead.
    pub async fn run(
        &self,
        slots: Vec<ComparisonSlot>,
        system_prompt: &str,
        user_message: &str,
        on_progress: ProgressCallback,
    ) -> Result<Vec<ComparisonSlot>> {
        validate_slots(&slots)?;
        if slots.is_empty() {
            return Ok(slots);
        }

        let context = self.augmenter.context_for(user_message).await?;
        let user_message = format!("{user_message}{context}");

        tracing::info!(
            slots = slots.len(),
            augmentation = %self.augmenter.mode(),
            images = self.images.len(),
            "Starting comparison"
        );

        let runs = slots.into_iter().map(|mut slot| {
            let on_progress = Arc::clone(&on_progress);
            let user_message = user_message.as_str();
            async move {
                slot.state = SlotState::Loading;
                on_progress(SlotUpdate {
                    slot_index: slot.slot_index,
                    state: SlotState::Loading,
                    data: SlotUpdateData::Loading,
                });
                self.run_slot(&mut slot, system_prompt, user_message).await;
                on_progress(settled_update(&slot));
                slot
            }
        });
        let settled = join_all(runs).await;

        let succeeded = settled.iter().filter(|s| s.state == SlotState::Success).count();
        tracing::info!(
            succeeded,
            failed = settled.len() - succeeded,
            "Comparison settled"
        );

        self.start_reconciliation(&settled, &on_progress);
        Ok(settled)
    }

    async fn run_slot(&self, slot: &mut ComparisonSlot, system_prompt: &str, user_message: &str) {
        match self.dispatch(slot, system_prompt, user_message).await {
            Ok(response) => {
                slot.state = SlotState::Success;
                slot.response = Some(response);
            }
            Err(err) => {
                tracing::debug!(
                    slot = slot.slot_index,
                    model = %slot.model_id,
                    error = %err,
                    "Slot failed"
                );
                slot.state = SlotState::Error;
                slot.error_kind = Some(err.kind());
                slot.error_message = Some(err.to_string());
            }
        }
    }

    async fn dispatch(
        &self,
        slot: &mut ComparisonSlot,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<ProviderResponse> {
        let client = self.client_for(slot.backend)?;
        let model_id = self.augmenter.model_id(client.as_ref(), &slot.model_id)?;
        slot.web_search = self.augmenter.is_online();

        let request = ProviderRequest {
            model_id,
            system_prompt: system_prompt.to_string(),
            user_message: user_message.to_string(),
            images: self.images.clone(),
        };
        let options = SendOptions {
            images: request.images.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            vision: slot.vision,
        };

        tracing::debug!(slot = slot.slot_index, model = %request.model_id, "Dispatching slot");
        client
            .send(&request.model_id, &request.to_messages(), &options)
            .await
    }

    fn client_for(&self, backend: ChatBackend) -> Result<&Arc<dyn ChatClient>> {
        self.chat.get(&backend).ok_or_else(|| match backend {
            ChatBackend::OpenRouter => LmcError::MissingCredential {
                provider: backend.display_name().to_string(),
            },
            ChatBackend::Ollama => {
                LmcError::LocalRuntime("Ollama client is not configured".to_string())
            }
        })
    }

    fn start_reconciliation(&self, slots: &[ComparisonSlot], on_progress: &ProgressCallback) {
        let Some(reconciler) = &self.reconciler else {
            return;
        };

        for slot in slots {
            if slot.state != SlotState::Success {
                continue;
            }
            let Some(response) = &slot.response else {
                continue;
            };
            let Some(handle) = response.generation_handle() else {
                continue;
            };

            let cost = response.cost.clone();
            let on_progress = Arc::clone(on_progress);
            let slot_index = slot.slot_index;
            reconciler.reconcile(handle, move |confirmed| {
                cost.replace(confirmed.clone());
                on_progress(SlotUpdate {
                    slot_index,
                    state: SlotState::Success,
                    data: SlotUpdateData::CostUpdated { cost: confirmed },
                });
            });
        }
    }
}

fn settled_update(slot: &ComparisonSlot) -> SlotUpdate {
    let data = match (&slot.response, &slot.error_kind) {
        (Some(response), _) => SlotUpdateData::Success {
            content: response.content.clone(),
            cost: response.cost.get(),
        },
        (None, kind) => SlotUpdateData::Error {
            kind: kind.clone().unwrap_or(ErrorKind::ProviderError(String::new())),
            message: slot.error_message.clone().unwrap_or_default(),
        },
    };
    SlotUpdate {
        slot_index: slot.slot_index,
        state: slot.state,
        data,
    }
}

/// Reject more than four slots, out-of-range indices and duplicates.
///
/// # Errors
///
/// `InvalidSlots` describing the first problem found.
pub fn validate_slots(slots: &[ComparisonSlot]) -> Result<()> {
    if slots.len() > usize::from(MAX_SLOTS) {
        return Err(LmcError::InvalidSlots(format!(
            "at most {MAX_SLOTS} slots are allowed, got {}",
            slots.len()
        )));
    }

    let mut seen = HashSet::new();
    for slot in slots {
        if !(1..=MAX_SLOTS).contains(&slot.slot_index) {
            return Err(LmcError::InvalidSlots(format!(
                "slot index {} is outside 1..={MAX_SLOTS}",
                slot.slot_index
            )));
        }
        if !seen.insert(slot.slot_index) {
            return Err(LmcError::InvalidSlots(format!(
                "slot {} is used more than once",
                slot.slot_index
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::augment::Augmentation;
    use crate::core::models::Usage;
    use crate::core::provider::SearchProvider;
    use crate::core::reconcile::ReconcileSchedule;
    use crate::test_utils::*;
    use std::sync::Mutex;
    use std::time::Duration;

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<SlotUpdate>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |update| sink.lock().unwrap().push(update));
        (callback, seen)
    }

    fn hosted() -> Arc<MockChatClient> {
        Arc::new(
            MockChatClient::new(ChatBackend::OpenRouter)
                .with_reply("a", MockReply::text("answer a"))
                .with_reply("b", MockReply::billed("answer b", Usage::new(10, 20), "gen-b"))
                .with_reply(
                    "down",
                    MockReply::fail(|| LmcError::ServerError {
                        provider: "OpenRouter".to_string(),
                        status_code: 503,
                        message: "unavailable".to_string(),
                    }),
                ),
        )
    }

    #[test]
    fn rejects_bad_slot_sets() {
        let dup = vec![
            make_test_slot(1, ChatBackend::Ollama, "a"),
            make_test_slot(1, ChatBackend::Ollama, "b"),
        ];
        assert!(matches!(validate_slots(&dup), Err(LmcError::InvalidSlots(_))));

        let out_of_range = vec![make_test_slot(5, ChatBackend::Ollama, "a")];
        assert!(validate_slots(&out_of_range).is_err());

        let zero = vec![make_test_slot(0, ChatBackend::Ollama, "a")];
        assert!(validate_slots(&zero).is_err());

        let five: Vec<_> = (1..=5)
            .map(|i| make_test_slot(i, ChatBackend::Ollama, "a"))
            .collect();
        assert!(validate_slots(&five).is_err());

        let four: Vec<_> = (1..=4)
            .map(|i| make_test_slot(i, ChatBackend::Ollama, "a"))
            .collect();
        assert!(validate_slots(&four).is_ok());
    }

    #[tokio::test]
    async fn every_slot_settles() {
        let orchestrator = ComparisonOrchestrator::new().with_chat_client(hosted());
        let slots = vec![
            make_test_slot(1, ChatBackend::OpenRouter, "a"),
            make_test_slot(2, ChatBackend::OpenRouter, "down"),
            make_test_slot(3, ChatBackend::Ollama, "llama3"),
        ];
        let (callback, seen) = recorder();

        let settled = orchestrator.run(slots, "sys", "hi", callback).await.unwrap();

        assert_eq!(settled.len(), 3);
        assert!(settled.iter().all(|s| s.state.is_settled()));
        assert_eq!(settled[0].state, SlotState::Success);
        assert_eq!(settled[1].error_kind, Some(ErrorKind::ServerError));
        // No Ollama client registered.
        assert_eq!(settled[2].state, SlotState::Error);

        let updates = seen.lock().unwrap();
        let loading = updates
            .iter()
            .filter(|u| u.data == SlotUpdateData::Loading)
            .count();
        assert_eq!(loading, 3);
        assert_eq!(updates.len(), 6);
    }

    #[tokio::test]
    async fn empty_run_returns_nothing() {
        let orchestrator = ComparisonOrchestrator::new();
        let settled = orchestrator
            .run(Vec::new(), "", "hi", no_progress())
            .await
            .unwrap();
        assert!(settled.is_empty());
    }

    #[tokio::test]
    async fn context_failure_aborts_before_dispatch() {
        let client = hosted();
        let search = Arc::new(MockSearchClient::failing(SearchProvider::Tavily, || {
            LmcError::Timeout {
                provider: "Tavily".to_string(),
                seconds: 15,
            }
        }));
        let orchestrator = ComparisonOrchestrator::new()
            .with_chat_client(client.clone())
            .with_augmenter(
                Augmenter::new(Augmentation::Context(SearchProvider::Tavily))
                    .with_search_client(search),
            );

        let err = orchestrator
            .run(
                vec![make_test_slot(1, ChatBackend::OpenRouter, "a")],
                "",
                "hi",
                no_progress(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AugmentationFailed);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn context_is_appended_for_every_slot() {
        let client = hosted();
        let search = Arc::new(MockSearchClient::new(
            SearchProvider::Exa,
            vec![make_test_hit("https://example.com", 1)],
        ));
        let orchestrator = ComparisonOrchestrator::new()
            .with_chat_client(client.clone())
            .with_augmenter(
                Augmenter::new(Augmentation::Context(SearchProvider::Exa))
                    .with_search_client(search.clone()),
            );

        orchestrator
            .run(
                vec![
                    make_test_slot(1, ChatBackend::OpenRouter, "a"),
                    make_test_slot(2, ChatBackend::OpenRouter, "b"),
                ],
                "sys",
                "question",
                no_progress(),
            )
            .await
            .unwrap();

        assert_eq!(search.calls(), 1);
        for call in client.calls() {
            let user = &call.messages.last().unwrap().content;
            assert!(user.starts_with("question"));
            assert!(user.contains("--- Internet Search Context ---"));
        }
    }

    #[tokio::test]
    async fn online_mode_tags_hosted_and_fails_local() {
        let client = hosted();
        let local = Arc::new(
            MockChatClient::new(ChatBackend::Ollama).with_reply("llama3", MockReply::text("hi")),
        );
        let orchestrator = ComparisonOrchestrator::new()
            .with_chat_client(client.clone())
            .with_chat_client(local.clone())
            .with_augmenter(Augmenter::new(Augmentation::Online));

        let settled = orchestrator
            .run(
                vec![
                    make_test_slot(1, ChatBackend::OpenRouter, "a"),
                    make_test_slot(2, ChatBackend::Ollama, "llama3"),
                ],
                "",
                "hi",
                no_progress(),
            )
            .await
            .unwrap();

        assert_eq!(client.calls()[0].model_id, "a:online");
        assert!(settled[0].web_search);
        assert_eq!(settled[1].state, SlotState::Error);
        assert!(local.calls().is_empty());
    }

    #[tokio::test]
    async fn images_rejected_for_text_only_slot() {
        let orchestrator = ComparisonOrchestrator::new()
            .with_chat_client(hosted())
            .with_images(vec!["data:image/png;base64,AAAA".to_string()]);

        let settled = orchestrator
            .run(
                vec![
                    make_test_slot(1, ChatBackend::OpenRouter, "a").with_vision(false),
                    make_test_slot(2, ChatBackend::OpenRouter, "b").with_vision(true),
                ],
                "",
                "describe",
                no_progress(),
            )
            .await
            .unwrap();

        assert_eq!(settled[0].state, SlotState::Error);
        assert_eq!(settled[1].state, SlotState::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn reconciliation_replaces_cost_after_run() {
        let lookup = Arc::new(MockCostLookup::confirming(0.0007));
        let reconciler = Arc::new(CostReconciler::new(lookup.clone(), ReconcileSchedule::default()));
        let orchestrator = ComparisonOrchestrator::new()
            .with_chat_client(hosted())
            .with_reconciler(Arc::clone(&reconciler));
        let (callback, seen) = recorder();

        let settled = orchestrator
            .run(
                vec![
                    make_test_slot(1, ChatBackend::OpenRouter, "a"),
                    make_test_slot(2, ChatBackend::OpenRouter, "b"),
                ],
                "",
                "hi",
                callback,
            )
            .await
            .unwrap();

        // Only the slot with a generation handle is reconciled.
        assert_eq!(reconciler.pending(), 1);
        let cost = settled[1].response.as_ref().unwrap().cost.clone();
        assert!(!cost.get().confirmed);

        tokio::time::sleep(Duration::from_secs(11)).await;
        reconciler.wait_all().await;

        assert!(cost.get().confirmed);
        crate::assert_float_eq!(cost.get().total_cost, 0.0007);
        assert_eq!(settled[1].response.as_ref().unwrap().content, "answer b");
        assert_eq!(lookup.calls(), 1);
        assert!(seen.lock().unwrap().iter().any(|u| u.slot_index == 2
            && matches!(u.data, SlotUpdateData::CostUpdated { .. })));
    }
}
