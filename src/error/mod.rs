//! Every failure lmc can report.
//!
//! Each [`LmcError`] carries a stable code such as `LMC-N001` whose letter
//! names its [`ErrorCategory`], an [`ExitCode`], and a [`FixSuggestion`].
//! Comparison slots keep only the reduced [`ErrorKind`].

pub mod suggestions;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use suggestions::FixSuggestion;

// =============================================================================
// Error Categories
// =============================================================================

/// Coarse grouping; the letter in every error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or rejected API keys.
    Authentication,
    /// Timeouts and connection failures.
    Network,
    /// Config parse errors, invalid values, invalid input.
    Configuration,
    /// Provider-side rejections (rate limits, 5xx, API errors).
    Provider,
    /// Missing binaries, local runtime issues.
    Environment,
    /// I/O, serialization, unclassified.
    Internal,
}

impl ErrorCategory {
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Authentication => "Authentication error",
            Self::Network => "Network error",
            Self::Configuration => "Configuration error",
            Self::Provider => "Provider error",
            Self::Environment => "Environment error",
            Self::Internal => "Internal error",
        }
    }

    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Authentication => "A",
            Self::Network => "N",
            Self::Configuration => "C",
            Self::Provider => "P",
            Self::Environment => "E",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// User-facing error kinds
// =============================================================================

/// The small set of failure kinds a comparison slot can end in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    NetworkError,
    RateLimited,
    ServerError,
    ProviderError(String),
    MissingCredential,
    AugmentationFailed,
}

impl ErrorKind {
    /// Short label used in human output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NetworkError => "network error",
            Self::RateLimited => "rate limited",
            Self::ServerError => "server error",
            Self::ProviderError(_) => "provider error",
            Self::MissingCredential => "missing credential",
            Self::AugmentationFailed => "augmentation failed",
        }
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    GeneralError = 1,
    /// Required binary (ollama) not found
    BinaryNotFound = 2,
    /// Bad config or bad input
    ParseError = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for lmc operations.
#[derive(Error, Debug)]
pub enum LmcError {
    // ==========================================================================
    // Authentication errors
    // ==========================================================================
    /// No API key stored for the provider.
    #[error("{provider} API key not configured")]
    MissingCredential { provider: String },

    /// An API key was supplied but is unusable (e.g. empty).
    #[error("invalid credential for {provider}: {reason}")]
    InvalidCredential { provider: String, reason: String },

    // ==========================================================================
    // Network errors
    // ==========================================================================
    /// Request timed out.
    #[error("request to {provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    /// Connection failure or other transport error.
    #[error("network error talking to {provider}: {message}")]
    Network { provider: String, message: String },

    // ==========================================================================
    // Provider errors
    // ==========================================================================
    /// HTTP 429.
    #[error("rate limited by {provider}: {message}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
        message: String,
    },

    /// HTTP 5xx.
    #[error("{provider} server error (HTTP {status_code}): {message}")]
    ServerError {
        provider: String,
        status_code: u16,
        message: String,
    },

    /// Provider rejected the request; message comes from the response body.
    #[error("{provider}: {message}")]
    ProviderApi {
        provider: String,
        status_code: Option<u16>,
        message: String,
    },

    /// Response body did not have the expected shape.
    #[error("failed to parse {provider} response: {message}")]
    ParseResponse { provider: String, message: String },

    /// Images were attached for a model declared text-only.
    #[error("model {model} does not accept images")]
    ImagesUnsupported { model: String },

    /// Online (web-search) model variant requested on a backend without one.
    #[error("{provider} does not support online models")]
    OnlineUnsupported { provider: String },

    /// Search context could not be fetched; the run was aborted.
    #[error("internet augmentation via {provider} failed: {reason}")]
    AugmentationFailed { provider: String, reason: String },

    // ==========================================================================
    // Configuration / input errors
    // ==========================================================================
    /// config.toml is not valid TOML.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// A config or environment value is out of range.
    #[error("invalid config value for '{key}': {message}")]
    ConfigInvalid {
        key: String,
        value: String,
        message: String,
    },

    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown chat backend or search provider name.
    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    /// Slot list rejected before dispatch.
    #[error("invalid slots: {0}")]
    InvalidSlots(String),

    /// Missing or malformed command input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Image attachment rejected.
    #[error("invalid image {path}: {reason}")]
    InvalidImage { path: String, reason: String },

    /// Stored record not found (session, prompt, ...).
    #[error("{what} not found: {id}")]
    NotFound { what: String, id: String },

    // ==========================================================================
    // Environment errors
    // ==========================================================================
    /// A helper binary such as `ollama` is not on PATH.
    #[error("CLI tool not found: {name}")]
    CliNotFound { name: String },

    /// Local model runtime failed to start, stop or answer.
    #[error("local runtime error: {0}")]
    LocalRuntime(String),

    /// Secret storage backend failed.
    #[error("keyring error: {0}")]
    Keyring(String),

    // ==========================================================================
    // Internal errors
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything not worth its own variant.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LmcError {
    /// Map error to process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::CliNotFound { .. } => ExitCode::BinaryNotFound,

            Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::Config(_)
            | Self::InvalidProvider(_)
            | Self::InvalidSlots(_)
            | Self::InvalidInput(_)
            | Self::InvalidImage { .. }
            | Self::InvalidCredential { .. }
            | Self::MissingCredential { .. }
            | Self::ParseResponse { .. } => ExitCode::ParseError,

            Self::Timeout { .. } => ExitCode::Timeout,

            Self::Network { .. }
            | Self::RateLimited { .. }
            | Self::ServerError { .. }
            | Self::ProviderApi { .. }
            | Self::ImagesUnsupported { .. }
            | Self::OnlineUnsupported { .. }
            | Self::AugmentationFailed { .. }
            | Self::NotFound { .. }
            | Self::LocalRuntime(_)
            | Self::Keyring(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingCredential { .. } | Self::InvalidCredential { .. } => {
                ErrorCategory::Authentication
            }

            Self::Timeout { .. } | Self::Network { .. } => ErrorCategory::Network,

            Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::Config(_)
            | Self::InvalidProvider(_)
            | Self::InvalidSlots(_)
            | Self::InvalidInput(_)
            | Self::InvalidImage { .. }
            | Self::NotFound { .. } => ErrorCategory::Configuration,

            Self::RateLimited { .. }
            | Self::ServerError { .. }
            | Self::ProviderApi { .. }
            | Self::ParseResponse { .. }
            | Self::ImagesUnsupported { .. }
            | Self::OnlineUnsupported { .. }
            | Self::AugmentationFailed { .. } => ErrorCategory::Provider,

            Self::CliNotFound { .. } | Self::LocalRuntime(_) | Self::Keyring(_) => {
                ErrorCategory::Environment
            }

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Stable across releases; scripts match on it.
    ///
    /// Format: `LMC-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            // Authentication errors (A001-A099)
            Self::MissingCredential { .. } => "LMC-A001",
            Self::InvalidCredential { .. } => "LMC-A002",

            // Network errors (N001-N099)
            Self::Timeout { .. } => "LMC-N001",
            Self::Network { .. } => "LMC-N002",

            // Configuration errors (C001-C099)
            Self::ConfigParse { .. } => "LMC-C001",
            Self::ConfigInvalid { .. } => "LMC-C002",
            Self::Config(_) => "LMC-C003",
            Self::InvalidProvider(_) => "LMC-C010",
            Self::InvalidSlots(_) => "LMC-C011",
            Self::InvalidInput(_) => "LMC-C013",
            Self::InvalidImage { .. } => "LMC-C012",
            Self::NotFound { .. } => "LMC-C020",

            // Provider errors (P001-P099)
            Self::RateLimited { .. } => "LMC-P001",
            Self::ServerError { .. } => "LMC-P002",
            Self::ProviderApi { .. } => "LMC-P003",
            Self::ParseResponse { .. } => "LMC-P004",
            Self::ImagesUnsupported { .. } => "LMC-P010",
            Self::OnlineUnsupported { .. } => "LMC-P011",
            Self::AugmentationFailed { .. } => "LMC-P020",

            // Environment errors (E001-E099)
            Self::CliNotFound { .. } => "LMC-E001",
            Self::LocalRuntime(_) => "LMC-E002",
            Self::Keyring(_) => "LMC-E003",

            // Internal errors (X001-X099)
            Self::Io(_) => "LMC-X001",
            Self::Json(_) => "LMC-X002",
            Self::Other(_) => "LMC-X099",
        }
    }

    /// Returns whether a provider call that failed this way should be retried.
    ///
    /// Timeouts, transport failures and 5xx responses are transient. Rate
    /// limits are reported, not retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Network { .. } | Self::ServerError { .. }
        )
    }

    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::MissingCredential { provider }
            | Self::InvalidCredential { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Network { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::ServerError { provider, .. }
            | Self::ProviderApi { provider, .. }
            | Self::ParseResponse { provider, .. }
            | Self::OnlineUnsupported { provider }
            | Self::AugmentationFailed { provider, .. } => Some(provider),
            Self::InvalidProvider(p) => Some(p),
            _ => None,
        }
    }

    /// Reduce to the user-facing kind stored on a failed slot.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Network { .. } => ErrorKind::NetworkError,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::MissingCredential { .. } => ErrorKind::MissingCredential,
            Self::AugmentationFailed { .. } => ErrorKind::AugmentationFailed,
            Self::ProviderApi { message, .. } => ErrorKind::ProviderError(message.clone()),
            other => ErrorKind::ProviderError(other.to_string()),
        }
    }

    /// How to recover from this error.
    ///
    /// ```
    /// use lmc::error::LmcError;
    ///
    /// let err = LmcError::MissingCredential { provider: "Tavily".to_string() };
    /// assert_eq!(err.fix().runnable(), Some("lmc keys set tavily <api-key>"));
    /// ```
    #[must_use]
    pub fn fix(&self) -> FixSuggestion {
        match self {
            Self::MissingCredential { provider } => suggestions::missing_credential(provider),
            Self::InvalidCredential { provider, reason } => {
                suggestions::invalid_credential(provider, reason)
            }
            Self::Timeout { provider, seconds } => suggestions::timeout(provider, *seconds),
            Self::Network { provider, message } => suggestions::network(provider, message),
            Self::RateLimited {
                provider,
                retry_after,
                message,
            } => suggestions::rate_limited(provider, *retry_after, message),
            Self::ServerError {
                provider,
                status_code,
                message,
            } => suggestions::server_error(provider, *status_code, message),
            Self::ProviderApi {
                provider,
                status_code,
                message,
            } => suggestions::provider_api(provider, *status_code, message),
            Self::ParseResponse { provider, message } => FixSuggestion::because(format!(
                "The {provider} response did not match the expected shape: {message}. \
                 The provider API may have changed."
            ))
            .run(format!("lmc --verbose models --backend {}", provider.to_lowercase())),
            Self::ImagesUnsupported { model } => suggestions::images_unsupported(model),
            Self::OnlineUnsupported { provider } => FixSuggestion::because(format!(
                "{provider} has no web-search model variant. Use a search provider \
                 for context instead, e.g. `--augment tavily`."
            ))
            .run("lmc compare --augment none ..."),
            Self::AugmentationFailed { provider, reason } => {
                suggestions::augmentation_failed(provider, reason)
            }
            Self::ConfigParse { path, message } => suggestions::config_parse(path, message),
            Self::ConfigInvalid {
                key,
                value,
                message,
            } => FixSuggestion::because(format!("'{value}' is not valid for {key}: {message}"))
                .run(format!("# Fix '{key}' in the config file")),
            Self::Config(msg) => {
                FixSuggestion::because(format!("Configuration error: {msg}")).run("lmc --help")
            }
            Self::InvalidProvider(name) => suggestions::invalid_provider(name),
            Self::InvalidSlots(msg) => {
                FixSuggestion::because(format!("{msg}. A comparison takes between one and four models."))
                    .run("lmc compare -m openrouter:openai/gpt-4o-mini -m ollama:llama3 ...")
            }
            Self::InvalidInput(msg) => {
                FixSuggestion::because(format!("{msg}. Check the command usage.")).run("lmc help")
            }
            Self::InvalidImage { path, reason } => FixSuggestion::because(format!(
                "The image at {path} was rejected: {reason}. Supported types are png, \
                 jpeg, webp and gif up to 20 MB."
            ))
            .run(format!("file {path}")),
            Self::NotFound { what, .. } => FixSuggestion::because(format!(
                "No {what} with that id. List existing entries to find the right one."
            ))
            .run(format!("lmc {what}s list")),
            Self::CliNotFound { name } => suggestions::cli_not_found(name),
            Self::LocalRuntime(msg) => suggestions::local_runtime(msg),
            Self::Keyring(msg) => FixSuggestion::because(format!(
                "The system keyring could not be used: {msg}. Set \
                 `credential_backend = \"file\"` in the config to store keys in a file."
            ))
            .run("lmc keys set <provider> <key>"),
            Self::Io(err) => FixSuggestion::because(format!("I/O error: {err}."))
                .run("# Check file permissions and disk space"),
            Self::Json(err) => FixSuggestion::because(format!(
                "A stored JSON file could not be read: {err}."
            ))
            .run("# Inspect or remove the file under the lmc data directory"),
            Self::Other(err) => FixSuggestion::because(format!("Unexpected error: {err}."))
                .run("lmc --verbose ..."),
        }
    }
}

/// Result type alias for lmc operations.
pub type Result<T> = std::result::Result<T, LmcError>;

// =============================================================================
// Tests
// =============================================================================
