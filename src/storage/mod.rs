//! Storage for configuration, credentials, prompts and sessions.

pub mod config;
pub mod credentials;
pub mod json_file;
pub mod paths;
pub mod prompts;
pub mod sessions;
pub mod user_prompts;

pub use config::{
    Config, ConfigSource, ConfigSources, ENV_CONFIG, ENV_FORMAT, ENV_MAX_RETRIES, ENV_NO_COLOR,
    ENV_NO_COLOR_STD, ENV_PRETTY, ENV_TIMEOUT, ENV_VERBOSE, ResolvedConfig,
};
pub use credentials::{
    CredentialStore, EnvCredentialStore, FileCredentialStore, KeyStatus, KeyringCredentialStore,
    LayeredCredentialStore, MemoryCredentialStore, mask_key,
};
pub use paths::AppPaths;
pub use prompts::{DEFAULT_CATEGORIES, PromptStore};
pub use sessions::SessionStore;
pub use user_prompts::{UserPrompt, UserPromptStore};
