//! Multi-turn chat with a single model.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::augment::Augmenter;
use super::models::{ChatMessage, CostInfo, ProviderResponse, SendOptions};
use crate::error::{LmcError, Result};
use crate::providers::ChatClient;

/// One exchange kept in history.
///
/// `user` is the message as typed; any search context sent with it is not
/// stored.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
    pub model: String,
    pub cost: CostInfo,
    pub timestamp: DateTime<Utc>,
    pub has_images: bool,
}

/// Conversation state for one model on one backend.
pub struct ChatSession {
    client: Arc<dyn ChatClient>,
    model_id: String,
    model_name: String,
    vision: Option<bool>,
    augmenter: Augmenter,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    history: Vec<ChatTurn>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("backend", &self.client.backend())
            .field("model_id", &self.model_id)
            .field("turns", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    #[must_use]
    pub fn new(client: Arc<dyn ChatClient>, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        Self {
            client,
            model_name: model_id.clone(),
            model_id,
            vision: None,
            augmenter: Augmenter::default(),
            temperature: None,
            max_tokens: None,
            history: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    #[must_use]
    pub const fn with_vision(mut self, vision: Option<bool>) -> Self {
        self.vision = vision;
        self
    }

    #[must_use]
    pub fn with_augmenter(mut self, augmenter: Augmenter) -> Self {
        self.augmenter = augmenter;
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

    #[must_use]
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Forget every previous turn.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// `[system, (user, assistant)*, user]` for the next turn.
    #[must_use]
    pub fn build_messages(&self, system_prompt: &str, message: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() * 2 + 2);
        if !system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        for turn in &self.history {
            messages.push(ChatMessage::user(&turn.user));
            messages.push(ChatMessage::assistant(&turn.assistant));
        }
        messages.push(ChatMessage::user(message));
        messages
    }

    /// Send one user turn; images attach to this turn only.
    ///
    /// The turn is added to history only when the model answers.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty message, `AugmentationFailed` when the
    /// search context cannot be fetched, or the provider error.
    pub async fn send(
        &mut self,
        message: &str,
        system_prompt: &str,
        images: Vec<String>,
    ) -> Result<ProviderResponse> {
        if message.trim().is_empty() {
            return Err(LmcError::InvalidInput("message is empty".to_string()));
        }

        let context = self.augmenter.context_for(message).await?;
        let model_id = self.augmenter.model_id(self.client.as_ref(), &self.model_id)?;
        let messages = self.build_messages(system_prompt, &format!("{message}{context}"));
        let has_images = !images.is_empty();
        let options = SendOptions {
            images,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            vision: self.vision,
        };

        tracing::debug!(
            model = %model_id,
            turn = self.history.len() + 1,
            images = has_images,
            "Sending chat turn"
        );
        let response = self.client.send(&model_id, &messages, &options).await?;

        self.history.push(ChatTurn {
            user: message.to_string(),
            assistant: response.content.clone(),
            model: self.model_name.clone(),
            cost: response.cost.get(),
            timestamp: Utc::now(),
            has_images,
        });
        Ok(response)
    }
}
