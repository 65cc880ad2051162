//! Shared command context.
//!
//! Builds stores and provider clients from the resolved configuration and
//! the credential store. Providers without a key are simply absent.

use std::sync::Arc;
use std::time::Duration;

use crate::cli::args::{Cli, OutputFormat, PromptArgs};
use crate::core::augment::{Augmentation, Augmenter};
use crate::core::local_runtime::LocalRuntime;
use crate::core::provider::{ChatBackend, SearchProvider};
use crate::core::reconcile::CostReconciler;
use crate::core::search::SearchComparator;
use crate::error::{LmcError, Result};
use crate::providers::{
    BraveClient, ChatClient, Endpoint, ExaClient, OllamaClient, OpenRouterClient,
    PerplexityClient, SearchClient, TavilyClient,
};
use crate::storage::{
    AppPaths, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    LayeredCredentialStore, PromptStore, ResolvedConfig, SessionStore, UserPromptStore,
};

/// Everything a command needs besides its own arguments.
pub struct AppContext {
    pub resolved: ResolvedConfig,
    pub paths: AppPaths,
    pub credentials: LayeredCredentialStore,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("paths", &self.paths)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Resolve configuration and open the configured credential store.
    ///
    /// # Errors
    ///
    /// Invalid config file or environment overrides.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let resolved = ResolvedConfig::resolve(cli)?;
        let paths = AppPaths::new();
        let store: Box<dyn CredentialStore> =
            match resolved.config.general.credential_backend.as_str() {
                "keyring" => Box::new(KeyringCredentialStore),
                _ => Box::new(FileCredentialStore::new(paths.credentials_file())),
            };
        tracing::debug!(store = store.name(), "Opened credential store");
        Ok(Self::with_parts(resolved, paths, LayeredCredentialStore::new(store)))
    }

    #[must_use]
    pub const fn with_parts(
        resolved: ResolvedConfig,
        paths: AppPaths,
        credentials: LayeredCredentialStore,
    ) -> Self {
        Self {
            resolved,
            paths,
            credentials,
        }
    }

    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.resolved.format
    }

    #[must_use]
    pub const fn pretty(&self) -> bool {
        self.resolved.pretty
    }

    /// Whether output should be plain text.
    #[must_use]
    pub fn no_color(&self) -> bool {
        self.resolved.no_color || !crate::util::env::color_enabled(atty::Stream::Stdout)
    }

    // =========================================================================
    // Stores
    // =========================================================================

    /// # Errors
    ///
    /// Unreadable prompts file.
    pub fn prompt_store(&self) -> Result<PromptStore> {
        PromptStore::load(self.paths.prompts_file())
    }

    /// # Errors
    ///
    /// Unreadable user prompts file.
    pub fn user_prompt_store(&self) -> Result<UserPromptStore> {
        UserPromptStore::load(self.paths.user_prompts_file())
    }

    /// # Errors
    ///
    /// Unreadable sessions file.
    pub fn session_store(&self) -> Result<SessionStore> {
        SessionStore::load(self.paths.sessions_file())
    }

    // =========================================================================
    // Clients
    // =========================================================================

    fn endpoint(&self, base_url: &str, timeout: Duration) -> Endpoint {
        Endpoint::new(base_url, timeout).with_retry(self.resolved.config.retry.policy())
    }

    /// OpenRouter client, or `None` when no key is configured.
    ///
    /// # Errors
    ///
    /// Credential store failure or client construction failure.
    pub fn openrouter(&self) -> Result<Option<Arc<OpenRouterClient>>> {
        let Some(key) = self.credentials.get_key("openrouter")? else {
            return Ok(None);
        };
        let config = &self.resolved.config;
        let client = OpenRouterClient::with_endpoint(
            key,
            self.endpoint(&config.endpoints.openrouter, config.timeouts.chat()),
        )?
        .with_lookup_timeout(config.timeouts.lookup());
        Ok(Some(Arc::new(client)))
    }

    /// Ollama client against the configured server.
    ///
    /// # Errors
    ///
    /// Client construction failure.
    pub fn ollama(&self) -> Result<OllamaClient> {
        let config = &self.resolved.config;
        Ok(OllamaClient::with_endpoint(
            self.endpoint(&config.endpoints.ollama, config.timeouts.ollama()),
        )?
        .with_ping_timeout(config.timeouts.ping()))
    }

    /// Search client for `provider`, or `None` when no key is configured.
    ///
    /// # Errors
    ///
    /// Credential store failure or client construction failure.
    pub fn search_client(&self, provider: SearchProvider) -> Result<Option<Arc<dyn SearchClient>>> {
        let Some(key) = self.credentials.get_key(provider.cli_name())? else {
            return Ok(None);
        };
        let config = &self.resolved.config;
        let timeout = config.timeouts.search();
        let endpoints = &config.endpoints;
        let client: Arc<dyn SearchClient> = match provider {
            SearchProvider::Perplexity => Arc::new(PerplexityClient::with_endpoint(
                key,
                self.endpoint(&endpoints.perplexity, timeout),
            )?),
            SearchProvider::Brave => Arc::new(BraveClient::with_endpoint(
                key,
                self.endpoint(&endpoints.brave, timeout),
            )?),
            SearchProvider::Tavily => Arc::new(TavilyClient::with_endpoint(
                key,
                self.endpoint(&endpoints.tavily, timeout),
            )?),
            SearchProvider::Exa => Arc::new(ExaClient::with_endpoint(
                key,
                self.endpoint(&endpoints.exa, timeout),
            )?),
        };
        Ok(Some(client))
    }

    /// Comparator holding a client for every configured search provider.
    ///
    /// # Errors
    ///
    /// Credential store failure or client construction failure.
    pub fn search_comparator(&self) -> Result<SearchComparator> {
        let mut comparator = SearchComparator::new();
        for &provider in SearchProvider::ALL {
            if let Some(client) = self.search_client(provider)? {
                comparator = comparator.with_client(client);
            }
        }
        Ok(comparator)
    }

    /// Confirmed-cost reconciler backed by OpenRouter.
    #[must_use]
    pub fn reconciler(&self, client: Arc<OpenRouterClient>) -> Arc<CostReconciler> {
        Arc::new(CostReconciler::new(
            client,
            self.resolved.config.reconcile.schedule(),
        ))
    }

    /// # Errors
    ///
    /// Client construction failure.
    pub fn local_runtime(&self) -> Result<LocalRuntime> {
        Ok(LocalRuntime::new(self.ollama()?, self.paths.ollama_pid_file()))
    }

    // =========================================================================
    // Prompt settings
    // =========================================================================

    /// Augmentation from `--augment`, falling back to the config file.
    ///
    /// # Errors
    ///
    /// Unknown mode name.
    pub fn augmentation(&self, args: &PromptArgs) -> Result<Augmentation> {
        match &args.augment {
            Some(mode) => Augmentation::from_arg(mode),
            None => self.resolved.config.augmentation(),
        }
    }

    /// Country from `--country`, falling back to the config file.
    #[must_use]
    pub fn country(&self, args: &PromptArgs) -> Option<String> {
        args.country
            .clone()
            .or_else(|| self.resolved.config.general.country.clone())
    }

    /// Augmenter for the requested mode. A context provider without a key
    /// yields an augmenter that fails with `AugmentationFailed` when used.
    ///
    /// # Errors
    ///
    /// Unknown mode name or credential store failure.
    pub fn augmenter(&self, args: &PromptArgs) -> Result<Augmenter> {
        let mode = self.augmentation(args)?;
        let mut augmenter = Augmenter::new(mode).with_country(self.country(args));
        if let Augmentation::Context(provider) = mode
            && let Some(client) = self.search_client(provider)?
        {
            augmenter = augmenter.with_search_client(client);
        }
        Ok(augmenter)
    }

    /// System prompt: `--system` text, else the `--category` prompt, else
    /// the configured default category.
    ///
    /// # Errors
    ///
    /// Unreadable prompts file.
    pub fn system_prompt(&self, args: &PromptArgs) -> Result<String> {
        if let Some(text) = &args.system {
            return Ok(text.clone());
        }
        let category = args
            .category
            .as_deref()
            .unwrap_or(&self.resolved.config.general.default_category);
        let store = self.prompt_store()?;
        if !store.contains(category) {
            tracing::warn!(category, "Unknown prompt category, using 'other'");
        }
        Ok(store.get(category))
    }

    #[must_use]
    pub fn temperature(&self, args: &PromptArgs) -> Option<f64> {
        args.temperature.or(self.resolved.config.general.temperature)
    }

    #[must_use]
    pub fn max_tokens(&self, args: &PromptArgs) -> Option<u32> {
        args.max_tokens.or(self.resolved.config.general.max_tokens)
    }

    /// Client for a single chat backend.
    ///
    /// # Errors
    ///
    /// `MissingCredential` for OpenRouter without a key, or construction
    /// failure.
    pub fn chat_client(&self, backend: ChatBackend) -> Result<Arc<dyn ChatClient>> {
        Ok(match backend {
            ChatBackend::OpenRouter => self.require_openrouter()?,
            ChatBackend::Ollama => Arc::new(self.ollama()?),
        })
    }

    /// OpenRouter client, failing when no key is configured.
    ///
    /// # Errors
    ///
    /// `MissingCredential` without a key.
    pub fn require_openrouter(&self) -> Result<Arc<OpenRouterClient>> {
        self.openrouter()?.ok_or_else(|| LmcError::MissingCredential {
            provider: "OpenRouter".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Config, ConfigSources, MemoryCredentialStore};
    use crate::test_utils::TestDir;

    fn context(dir: &TestDir, keys: &[(&'static str, &'static str)]) -> AppContext {
        let resolved = ResolvedConfig {
            config: Config::default(),
            format: OutputFormat::Human,
            no_color: true,
            verbose: false,
            pretty: false,
            sources: ConfigSources::default(),
        };
        let store = MemoryCredentialStore::with_keys(keys.iter().copied()).unwrap();
        AppContext::with_parts(
            resolved,
            AppPaths::with_root(dir.path()),
            LayeredCredentialStore::new(Box::new(store)),
        )
    }

    #[test]
    fn system_prompt_precedence() {
        let dir = TestDir::new();
        let ctx = context(&dir, &[]);
        let explicit = PromptArgs {
            system: Some("Be brief.".to_string()),
            category: Some("coding".to_string()),
            ..PromptArgs::default()
        };
        assert_eq!(ctx.system_prompt(&explicit).unwrap(), "Be brief.");

        let by_category = PromptArgs {
            category: Some("coding".to_string()),
            ..PromptArgs::default()
        };
        assert!(ctx.system_prompt(&by_category).unwrap().contains("software engineer"));

        let default = ctx.system_prompt(&PromptArgs::default()).unwrap();
        assert_eq!(default, ctx.prompt_store().unwrap().get("writing"));
    }

    #[test]
    fn settings_fall_back_to_config() {
        let dir = TestDir::new();
        let mut ctx = context(&dir, &[]);
        ctx.resolved.config.general.temperature = Some(0.3);
        ctx.resolved.config.general.augmentation = "brave".to_string();

        let args = PromptArgs::default();
        assert_eq!(ctx.temperature(&args), Some(0.3));
        assert_eq!(
            ctx.augmentation(&args).unwrap(),
            Augmentation::Context(SearchProvider::Brave)
        );

        let args = PromptArgs {
            temperature: Some(1.1),
            augment: Some("none".to_string()),
            ..PromptArgs::default()
        };
        assert_eq!(ctx.temperature(&args), Some(1.1));
        assert_eq!(ctx.augmentation(&args).unwrap(), Augmentation::None);
    }

    #[test]
    fn clients_only_for_configured_keys() {
        let dir = TestDir::new();
        let ctx = context(&dir, &[("brave", "bsa-key"), ("openrouter", "sk-or-key")]);
        assert!(ctx.openrouter().unwrap().is_some());
        assert!(ctx.search_client(SearchProvider::Brave).unwrap().is_some());
        assert!(
            ctx.search_comparator()
                .unwrap()
                .configured()
                .contains(&SearchProvider::Brave)
        );
    }
}
