//! What to do about each error: runnable commands first, then the reason.

use std::time::Duration;

use serde::Serialize;

use crate::core::provider::env_var_for;

/// How to recover from an error.
///
/// Commands starting with `#` are advice, not something to paste into a shell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixSuggestion {
    pub commands: Vec<String>,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevention: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,
}

impl FixSuggestion {
    #[must_use]
    pub fn because(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn run(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    #[must_use]
    pub fn avoid(mut self, prevention: impl Into<String>) -> Self {
        self.prevention = Some(prevention.into());
        self
    }

    #[must_use]
    pub fn docs(mut self, url: Option<impl Into<String>>) -> Self {
        self.doc_url = url.map(Into::into);
        self
    }

    /// First command that can actually be run.
    #[must_use]
    pub fn runnable(&self) -> Option<&str> {
        self.commands
            .iter()
            .map(String::as_str)
            .find(|c| !c.starts_with('#'))
    }
}

/// Where to get an API key for a provider.
#[must_use]
pub fn key_page_for(provider: &str) -> Option<&'static str> {
    match provider.to_lowercase().as_str() {
        "openrouter" => Some("https://openrouter.ai/keys"),
        "tavily" => Some("https://app.tavily.com"),
        "perplexity" => Some("https://www.perplexity.ai/settings/api"),
        "brave" => Some("https://api-dashboard.search.brave.com"),
        "exa" => Some("https://dashboard.exa.ai"),
        _ => None,
    }
}

pub(super) fn missing_credential(provider: &str) -> FixSuggestion {
    let name = provider.to_lowercase();
    let fix = FixSuggestion::because(format!(
        "No API key is stored for {provider}. Keys are read from the environment \
         first, then from the key store."
    ))
    .run(format!("lmc keys set {name} <api-key>"))
    .docs(key_page_for(&name));
    match env_var_for(&name) {
        Some(var) => fix.run(format!("export {var}=\"...\"")),
        None => fix,
    }
}

pub(super) fn invalid_credential(provider: &str, reason: &str) -> FixSuggestion {
    FixSuggestion::because(format!("The credential for {provider} cannot be used: {reason}."))
        .run(format!("lmc keys set {} <api-key>", provider.to_lowercase()))
}

pub(super) fn timeout(provider: &str, seconds: u64) -> FixSuggestion {
    FixSuggestion::because(format!(
        "{provider} did not respond within {seconds}s, even after retrying. \
         Large models and long prompts can take a while."
    ))
    .run(format!("LMC_TIMEOUT={} lmc compare ...", seconds * 2))
    .run("# Or raise [timeouts] in the config file")
    .avoid("Lower max_tokens for long answers.")
}

pub(super) fn network(provider: &str, message: &str) -> FixSuggestion {
    if provider.eq_ignore_ascii_case("ollama") {
        return local_runtime(message);
    }
    FixSuggestion::because(format!("Could not reach {provider}: {message}."))
        .run("# Check your internet connection")
}

pub(super) fn rate_limited(
    provider: &str,
    retry_after: Option<Duration>,
    message: &str,
) -> FixSuggestion {
    let (command, when) = retry_after.map_or_else(
        || ("# Wait before retrying".to_string(), "Wait before retrying.".to_string()),
        |d| {
            let secs = d.as_secs();
            (
                format!("sleep {secs} && lmc compare ..."),
                format!("Try again in {secs} seconds."),
            )
        },
    );
    FixSuggestion::because(format!("{provider} rate limited the request: {message}. {when}"))
        .run(command)
        .avoid("Free-tier models have low request quotas; rate limits are never retried.")
}

pub(super) fn server_error(provider: &str, status_code: u16, message: &str) -> FixSuggestion {
    FixSuggestion::because(format!(
        "{provider} returned HTTP {status_code} after all retries: {message}. \
         This is usually transient on the provider's side."
    ))
    .run("# Retry in a few minutes")
    .avoid("Increase [retry] max_retries in the config file.")
}

pub(super) fn provider_api(provider: &str, status_code: Option<u16>, message: &str) -> FixSuggestion {
    let name = provider.to_lowercase();
    let status = status_code.map(|c| format!(" (HTTP {c})")).unwrap_or_default();
    let fix = FixSuggestion::because(format!(
        "The {provider} API rejected the request{status}: {message}"
    ));
    let fix = if matches!(status_code, Some(401 | 403)) {
        fix.run(format!("lmc keys set {name} <api-key>"))
    } else {
        fix
    };
    fix.run(format!("lmc models --backend {name}"))
}

pub(super) fn images_unsupported(model: &str) -> FixSuggestion {
    FixSuggestion::because(format!(
        "{model} is a text-only model, so the attached images would be dropped. \
         Pick a model with vision support or remove --image."
    ))
    .run("lmc models --vision")
}

pub(super) fn augmentation_failed(provider: &str, reason: &str) -> FixSuggestion {
    FixSuggestion::because(format!(
        "Search context from {provider} could not be fetched ({reason}), so no model was called."
    ))
    .run(format!("lmc search --provider {} \"test\"", provider.to_lowercase()))
    .run("lmc compare --augment none ...")
}

pub(super) fn config_parse(path: &str, message: &str) -> FixSuggestion {
    FixSuggestion::because(format!("{path} is not valid TOML: {message}"))
        .run(format!("$EDITOR {path}"))
}

pub(super) fn invalid_provider(name: &str) -> FixSuggestion {
    FixSuggestion::because(format!(
        "Unknown provider: '{name}'. Chat backends are openrouter and ollama; \
         search providers are perplexity, brave, tavily and exa."
    ))
    .run("lmc compare --help")
    .run("lmc search --help")
}

pub(super) fn cli_not_found(name: &str) -> FixSuggestion {
    let fix = FixSuggestion::because(format!("The {name} binary is not installed or not in PATH."));
    if name.eq_ignore_ascii_case("ollama") {
        fix.run("curl -fsSL https://ollama.com/install.sh | sh")
            .run("# Or on macOS: brew install ollama")
            .docs(Some("https://ollama.com/download"))
    } else {
        fix.run(format!("# Install {name} and make sure it is on PATH"))
    }
}

pub(super) fn local_runtime(message: &str) -> FixSuggestion {
    FixSuggestion::because(format!("The local Ollama server is not usable: {message}."))
        .run("lmc ollama start")
        .run("ollama serve")
        .avoid("Check `lmc ollama status` before comparing local models.")
}
