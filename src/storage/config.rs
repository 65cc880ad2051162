//! `config.toml` plus environment and flag overrides.
//!
//! Each setting is taken from the first layer that provides it: CLI flag,
//! environment, config file, built-in default. The one exception is
//! `--format`, which `LMC_FORMAT` overrides unless `--json` is given.
//!
//! - `LMC_FORMAT`: Output format (human, json, md)
//! - `LMC_TIMEOUT`: Chat and search timeout in seconds
//! - `LMC_MAX_RETRIES`: Retries after the first attempt
//! - `LMC_NO_COLOR` or `NO_COLOR`: Disable colors
//! - `LMC_VERBOSE`: Enable verbose output (1, true, yes)
//! - `LMC_PRETTY`: Pretty-print JSON output (1, true, yes)
//! - `LMC_CONFIG`: Override config file path

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::cli::args::{Cli, OutputFormat};
use crate::core::augment::Augmentation;
use crate::core::reconcile::ReconcileSchedule;
use crate::core::retry::RetryPolicy;
use crate::error::{LmcError, Result};
use crate::providers::{brave, exa, ollama, openrouter, perplexity, tavily};

pub const ENV_FORMAT: &str = "LMC_FORMAT";
/// Seconds; applies to both chat and search calls.
pub const ENV_TIMEOUT: &str = "LMC_TIMEOUT";
pub const ENV_MAX_RETRIES: &str = "LMC_MAX_RETRIES";
pub const ENV_NO_COLOR: &str = "LMC_NO_COLOR";
/// Honoured when set to anything, including the empty string.
pub const ENV_NO_COLOR_STD: &str = "NO_COLOR";
pub const ENV_VERBOSE: &str = "LMC_VERBOSE";
pub const ENV_PRETTY: &str = "LMC_PRETTY";
pub const ENV_CONFIG: &str = "LMC_CONFIG";

const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_RETRIES: u32 = 10;

// =============================================================================
// Layered Resolution
// =============================================================================

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    Cli,
    Env,
    ConfigFile,
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cli => "CLI flag",
            Self::Env => "environment variable",
            Self::ConfigFile => "config file",
            Self::Default => "default",
        })
    }
}

/// First layer that yields a value wins; `fallback` is the default layer.
fn pick<T>(
    layers: impl IntoIterator<Item = (ConfigSource, Option<T>)>,
    fallback: T,
) -> (T, ConfigSource) {
    layers
        .into_iter()
        .find_map(|(source, value)| value.map(|v| (v, source)))
        .unwrap_or((fallback, ConfigSource::Default))
}

fn env_flag(var: &str) -> Option<bool> {
    let raw = std::env::var(var).ok()?;
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on").then_some(true)
}

fn env_number<T: std::str::FromStr>(var: &str, expected: &str) -> Result<Option<T>> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| LmcError::ConfigInvalid {
            key: var.to_string(),
            value: raw.clone(),
            message: format!("expected {expected}"),
        })
}

/// Where each resolved value came from, logged at debug level.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub format: ConfigSource,
    pub timeout: ConfigSource,
    pub max_retries: ConfigSource,
    pub no_color: ConfigSource,
    pub verbose: ConfigSource,
    pub pretty: ConfigSource,
}

/// Config file merged with environment overrides and global CLI flags.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub format: OutputFormat,
    pub no_color: bool,
    pub verbose: bool,
    pub pretty: bool,
    pub sources: ConfigSources,
}

impl ResolvedConfig {
    /// Load the config file and resolve against it.
    ///
    /// # Errors
    ///
    /// Unparseable config file, or any value out of range.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        Self::resolve_with(cli, Config::load_from(&Self::config_path())?)
    }

    /// Resolve against an already loaded config file.
    ///
    /// # Errors
    ///
    /// Malformed environment override, or any value out of range.
    pub fn resolve_with(cli: &Cli, mut config: Config) -> Result<Self> {
        let timeout_source = match env_number::<u64>(ENV_TIMEOUT, "a whole number of seconds")? {
            Some(secs) => {
                config.timeouts.chat_secs = secs;
                config.timeouts.search_secs = secs;
                ConfigSource::Env
            }
            None => ConfigSource::ConfigFile,
        };
        let retries_source = match env_number::<u32>(ENV_MAX_RETRIES, "a non-negative integer")? {
            Some(n) => {
                config.retry.max_retries = n;
                ConfigSource::Env
            }
            None => ConfigSource::ConfigFile,
        };
        config.validate()?;

        // `--json` outranks LMC_FORMAT, which outranks an explicit `--format`.
        // clap defaults `--format` to human, so only a non-default value counts.
        let format_env = std::env::var(ENV_FORMAT)
            .ok()
            .map(|raw| Self::parse_format(&raw))
            .transpose()?;
        let format_file = config.output.format.as_deref().map(Self::parse_format).transpose()?;
        let (format, format_source) = pick(
            [
                (ConfigSource::Cli, cli.json.then_some(OutputFormat::Json)),
                (ConfigSource::Env, format_env),
                (ConfigSource::Cli, (cli.format != OutputFormat::Human).then_some(cli.format)),
                (ConfigSource::ConfigFile, format_file),
            ],
            OutputFormat::Human,
        );

        let no_color_env =
            env_flag(ENV_NO_COLOR).or_else(|| std::env::var_os(ENV_NO_COLOR_STD).map(|_| true));
        let (no_color, no_color_source) = pick(
            [
                (ConfigSource::Cli, cli.no_color.then_some(true)),
                (ConfigSource::Env, no_color_env),
                (ConfigSource::ConfigFile, (!config.output.color).then_some(true)),
            ],
            false,
        );
        let (verbose, verbose_source) = pick(
            [
                (ConfigSource::Cli, cli.verbose.then_some(true)),
                (ConfigSource::Env, env_flag(ENV_VERBOSE)),
            ],
            false,
        );
        let (pretty, pretty_source) = pick(
            [
                (ConfigSource::Cli, cli.pretty.then_some(true)),
                (ConfigSource::Env, env_flag(ENV_PRETTY)),
                (ConfigSource::ConfigFile, config.output.pretty.then_some(true)),
            ],
            false,
        );

        let sources = ConfigSources {
            format: format_source,
            timeout: timeout_source,
            max_retries: retries_source,
            no_color: no_color_source,
            verbose: verbose_source,
            pretty: pretty_source,
        };
        tracing::debug!(
            format = %sources.format,
            timeout = %sources.timeout,
            retries = %sources.max_retries,
            no_color = %sources.no_color,
            "Configuration sources"
        );

        Ok(Self {
            config,
            format,
            no_color,
            verbose,
            pretty,
            sources,
        })
    }

    /// Config file in effect; `LMC_CONFIG` overrides the default location.
    #[must_use]
    pub fn config_path() -> PathBuf {
        std::env::var_os(ENV_CONFIG)
            .filter(|v| !v.is_empty())
            .map_or_else(|| AppPaths::new().config_file(), PathBuf::from)
    }

    /// # Errors
    ///
    /// `Config` for anything but human, json, md or markdown.
    pub fn parse_format(s: &str) -> Result<OutputFormat> {
        match s.trim().to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Md),
            _ => Err(LmcError::Config(format!(
                "Invalid format '{s}'. Valid formats: human, json, md"
            ))),
        }
    }
}

// =============================================================================
// Config File
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub retry: RetryConfig,
    pub reconcile: ReconcileConfig,
    pub timeouts: TimeoutsConfig,
    pub endpoints: EndpointsConfig,
    pub output: OutputConfig,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// System prompt category used when none is given.
    pub default_category: String,
    /// Augmentation mode: none, online, or a search provider.
    pub augmentation: String,
    /// Sampling temperature sent to the models.
    pub temperature: Option<f64>,
    /// Maximum tokens generated per answer.
    pub max_tokens: Option<u32>,
    /// Country for search calls (two-letter code or "worldwide").
    pub country: Option<String>,
    /// Where API keys live: file or keyring.
    pub credential_backend: String,
}

/// Retry policy for provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    pub base_delay_ms: u64,
}

/// Confirmed-cost polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub warmup_secs: u64,
    pub attempts: u32,
    pub interval_secs: u64,
}

/// Per-call timeouts in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub chat_secs: u64,
    pub ollama_secs: u64,
    pub search_secs: u64,
    pub lookup_secs: u64,
    pub ping_secs: u64,
}

/// Base URLs for every external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub openrouter: String,
    pub ollama: String,
    pub tavily: String,
    pub perplexity: String,
    pub brave: String,
    pub exa: String,
}

/// Output formatting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format (human, json, md).
    pub format: Option<String>,
    /// Whether to use colors in output.
    pub color: bool,
    /// Whether to pretty-print JSON output.
    pub pretty: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_category: "writing".to_string(),
            augmentation: "none".to_string(),
            temperature: None,
            max_tokens: None,
            country: None,
            credential_backend: "file".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: crate::core::retry::DEFAULT_MAX_RETRIES,
            base_delay_ms: 1000,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            warmup_secs: 10,
            attempts: 8,
            interval_secs: 5,
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            chat_secs: 30,
            ollama_secs: 60,
            search_secs: 15,
            lookup_secs: 10,
            ping_secs: 3,
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            openrouter: openrouter::DEFAULT_BASE_URL.to_string(),
            ollama: ollama::DEFAULT_BASE_URL.to_string(),
            tavily: tavily::DEFAULT_BASE_URL.to_string(),
            perplexity: perplexity::DEFAULT_BASE_URL.to_string(),
            brave: brave::DEFAULT_BASE_URL.to_string(),
            exa: exa::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: None,
            color: true,
            pretty: false,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }
}

impl ReconcileConfig {
    #[must_use]
    pub const fn schedule(&self) -> ReconcileSchedule {
        ReconcileSchedule {
            warmup: Duration::from_secs(self.warmup_secs),
            attempts: self.attempts,
            interval: Duration::from_secs(self.interval_secs),
        }
    }
}

impl TimeoutsConfig {
    #[must_use]
    pub const fn chat(&self) -> Duration {
        Duration::from_secs(self.chat_secs)
    }

    #[must_use]
    pub const fn ollama(&self) -> Duration {
        Duration::from_secs(self.ollama_secs)
    }

    #[must_use]
    pub const fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }

    #[must_use]
    pub const fn lookup(&self) -> Duration {
        Duration::from_secs(self.lookup_secs)
    }

    #[must_use]
    pub const fn ping(&self) -> Duration {
        Duration::from_secs(self.ping_secs)
    }

    fn entries(&self) -> [(&'static str, u64); 5] {
        [
            ("timeouts.chat_secs", self.chat_secs),
            ("timeouts.ollama_secs", self.ollama_secs),
            ("timeouts.search_secs", self.search_secs),
            ("timeouts.lookup_secs", self.lookup_secs),
            ("timeouts.ping_secs", self.ping_secs),
        ]
    }
}

impl Config {
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| LmcError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Parsed augmentation mode.
    ///
    /// # Errors
    ///
    /// `InvalidProvider` for an unknown mode name.
    pub fn augmentation(&self) -> Result<Augmentation> {
        Augmentation::from_arg(&self.general.augmentation)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// `ConfigInvalid` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, value: String, message: &str| LmcError::ConfigInvalid {
            key: key.to_string(),
            value,
            message: message.to_string(),
        };

        if let Some(format) = &self.output.format
            && !["human", "json", "md"].contains(&format.as_str())
        {
            return Err(invalid(
                "output.format",
                format.clone(),
                "valid formats: human, json, md",
            ));
        }

        for (key, secs) in self.timeouts.entries() {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                return Err(invalid(
                    key,
                    secs.to_string(),
                    &format!("must be between 1 and {MAX_TIMEOUT_SECS} seconds"),
                ));
            }
        }

        if self.retry.max_retries > MAX_RETRIES {
            return Err(invalid(
                "retry.max_retries",
                self.retry.max_retries.to_string(),
                &format!("must be at most {MAX_RETRIES}"),
            ));
        }

        if self.reconcile.attempts == 0 {
            return Err(invalid("reconcile.attempts", "0".to_string(), "must be at least 1"));
        }

        if Augmentation::from_arg(&self.general.augmentation).is_err() {
            return Err(invalid(
                "general.augmentation",
                self.general.augmentation.clone(),
                "valid modes: none, online, perplexity, brave, tavily, exa",
            ));
        }

        if let Some(t) = self.general.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(invalid(
                "general.temperature",
                t.to_string(),
                "must be between 0 and 2",
            ));
        }

        if !["file", "keyring"].contains(&self.general.credential_backend.as_str()) {
            return Err(invalid(
                "general.credential_backend",
                self.general.credential_backend.clone(),
                "valid backends: file, keyring",
            ));
        }

        Ok(())
    }
}
