//! Core data models, orchestration and provider infrastructure.

pub mod augment;
pub mod chat;
pub mod cli_runner;
pub mod comparison;
pub mod http;
pub mod local_runtime;
pub mod logging;
pub mod models;
pub mod pricing;
pub mod provider;
pub mod reconcile;
pub mod retry;
pub mod search;

pub use augment::{Augmentation, Augmenter};
pub use chat::{ChatSession, ChatTurn};
pub use comparison::{ComparisonOrchestrator, ProgressCallback, no_progress, validate_slots};
pub use local_runtime::{Installation, LocalRuntime, RuntimeStatus, StartOutcome};
pub use models::{
    ChatMessage, ChatRole, ComparisonSlot, CostInfo, ModelInfo, ModelPrice, ProviderRequest,
    ProviderResponse, RobotOutput, SearchComparison, SearchHit, SearchOptions, SearchResultRow,
    SendOptions, Session, SessionResponse, SharedCost, SlotState, SlotUpdate, SlotUpdateData,
    Usage,
};
pub use pricing::{ModelPricing, TokenCostBreakdown, estimate_tokens, estimate_usage};
pub use provider::{ChatBackend, SearchProvider};
pub use reconcile::{CostReconciler, ReconcileHandle, ReconcileSchedule};
pub use retry::RetryPolicy;
pub use search::{SearchComparator, normalize_url};
