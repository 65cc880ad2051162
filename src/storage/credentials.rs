//! API key storage.
//!
//! Keys are opaque strings stored per provider name. Environment variables
//! (`OPENROUTER_API_KEY`, ...) are consulted before the configured store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::core::provider::{CREDENTIAL_PROVIDERS, credential_provider, env_var_for};
use crate::error::{LmcError, Result};

/// Keyring service name.
pub const KEYRING_SERVICE: &str = "lmc";

/// Where a provider's key lives.
pub trait CredentialStore: Send + Sync {
    /// Short name shown by `keys show`.
    fn name(&self) -> &'static str;

    /// Stored key for `provider`, if any.
    ///
    /// # Errors
    ///
    /// Backend failures other than "no such key".
    fn get_key(&self, provider: &str) -> Result<Option<String>>;

    /// Store `value` for `provider`.
    ///
    /// # Errors
    ///
    /// `InvalidCredential` for an empty value, or a backend failure.
    fn set_key(&self, provider: &str, value: &str) -> Result<()>;
}

fn validated(provider: &str, value: &str) -> Result<(&'static str, String)> {
    let provider = credential_provider(provider)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(LmcError::InvalidCredential {
            provider: provider.to_string(),
            reason: "key must not be empty".to_string(),
        });
    }
    Ok((provider, value.to_string()))
}

// =============================================================================
// File
// =============================================================================

/// JSON object mapping provider name to key.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, keys: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(keys)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get_key(&self, provider: &str) -> Result<Option<String>> {
        let provider = credential_provider(provider)?;
        Ok(self
            .read_all()?
            .remove(provider)
            .filter(|v| !v.trim().is_empty()))
    }

    fn set_key(&self, provider: &str, value: &str) -> Result<()> {
        let (provider, value) = validated(provider, value)?;
        let mut keys = self.read_all()?;
        keys.insert(provider.to_string(), value);
        self.write_all(&keys)?;
        tracing::debug!(provider, path = %self.path.display(), "Stored API key");
        Ok(())
    }
}

// =============================================================================
// Environment
// =============================================================================

/// Read-only view of the `*_API_KEY` environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialStore;

impl CredentialStore for EnvCredentialStore {
    fn name(&self) -> &'static str {
        "env"
    }

    fn get_key(&self, provider: &str) -> Result<Option<String>> {
        let provider = credential_provider(provider)?;
        Ok(env_var_for(provider)
            .and_then(|var| std::env::var(var).ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    fn set_key(&self, provider: &str, _value: &str) -> Result<()> {
        let provider = credential_provider(provider)?;
        Err(LmcError::Config(format!(
            "cannot store keys in the environment; export {} instead",
            env_var_for(provider).unwrap_or("the variable")
        )))
    }
}

// =============================================================================
// Keyring
// =============================================================================

/// System keyring, one entry per provider under the `lmc` service.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringCredentialStore;

impl KeyringCredentialStore {
    fn entry(provider: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, provider).map_err(|e| LmcError::Keyring(e.to_string()))
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn get_key(&self, provider: &str) -> Result<Option<String>> {
        let provider = credential_provider(provider)?;
        match Self::entry(provider)?.get_password() {
            Ok(value) => Ok(Some(value).filter(|v| !v.trim().is_empty())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(LmcError::Keyring(e.to_string())),
        }
    }

    fn set_key(&self, provider: &str, value: &str) -> Result<()> {
        let (provider, value) = validated(provider, value)?;
        Self::entry(provider)?
            .set_password(&value)
            .map_err(|e| LmcError::Keyring(format!("failed to store key: {e}")))
    }
}

// =============================================================================
// Memory
// =============================================================================

/// In-process store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    keys: Mutex<BTreeMap<String, String>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-filled store.
    ///
    /// # Errors
    ///
    /// Fails on an unknown provider or empty key.
    pub fn with_keys<'a>(keys: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let store = Self::new();
        for (provider, value) in keys {
            store.set_key(provider, value)?;
        }
        Ok(store)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get_key(&self, provider: &str) -> Result<Option<String>> {
        let provider = credential_provider(provider)?;
        Ok(self
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider)
            .cloned())
    }

    fn set_key(&self, provider: &str, value: &str) -> Result<()> {
        let (provider, value) = validated(provider, value)?;
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider.to_string(), value);
        Ok(())
    }
}

// =============================================================================
// Layered
// =============================================================================

/// Environment first, then the configured store; writes go to the store.
pub struct LayeredCredentialStore {
    env: EnvCredentialStore,
    store: Box<dyn CredentialStore>,
}

impl std::fmt::Debug for LayeredCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredCredentialStore")
            .field("store", &self.store.name())
            .finish()
    }
}

/// Status line for one provider in `keys show`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyStatus {
    pub provider: String,
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked: Option<String>,
}

impl LayeredCredentialStore {
    #[must_use]
    pub fn new(store: Box<dyn CredentialStore>) -> Self {
        Self {
            env: EnvCredentialStore,
            store,
        }
    }

    /// Key and the name of the layer it came from.
    ///
    /// # Errors
    ///
    /// Backend failures from the configured store.
    pub fn lookup(&self, provider: &str) -> Result<Option<(String, &'static str)>> {
        if let Some(key) = self.env.get_key(provider)? {
            return Ok(Some((key, self.env.name())));
        }
        Ok(self
            .store
            .get_key(provider)?
            .map(|key| (key, self.store.name())))
    }

    /// One status entry per credential provider.
    ///
    /// # Errors
    ///
    /// Backend failures from the configured store.
    pub fn status(&self) -> Result<Vec<KeyStatus>> {
        CREDENTIAL_PROVIDERS
            .iter()
            .map(|provider| {
                let found = self.lookup(provider)?;
                Ok(KeyStatus {
                    provider: (*provider).to_string(),
                    configured: found.is_some(),
                    masked: found.as_ref().map(|(key, _)| mask_key(key)),
                    source: found.map(|(_, source)| source.to_string()),
                })
            })
            .collect()
    }
}

impl CredentialStore for LayeredCredentialStore {
    fn name(&self) -> &'static str {
        self.store.name()
    }

    fn get_key(&self, provider: &str) -> Result<Option<String>> {
        Ok(self.lookup(provider)?.map(|(key, _)| key))
    }

    fn set_key(&self, provider: &str, value: &str) -> Result<()> {
        self.store.set_key(provider, value)
    }
}

/// Show the last four characters only.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{tail}", "*".repeat(8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDir;

    #[test]
    fn file_store_round_trip() {
        let dir = TestDir::new();
        let store = FileCredentialStore::new(dir.file_path("config/credentials.json"));

        assert_eq!(store.get_key("brave").unwrap(), None);
        store.set_key("Brave", "  bsa-123  ").unwrap();
        assert_eq!(store.get_key("brave").unwrap().as_deref(), Some("bsa-123"));

        store.set_key("exa", "exa-1").unwrap();
        let raw = dir.read_file("config/credentials.json").unwrap();
        assert!(raw.contains("\"brave\""));
        assert!(raw.contains("\"exa\""));
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TestDir::new();
        let store = FileCredentialStore::new(dir.file_path("credentials.json"));
        store.set_key("openrouter", "sk-or-1").unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn empty_values_and_unknown_providers_rejected() {
        let store = MemoryCredentialStore::new();
        assert!(matches!(
            store.set_key("tavily", "   "),
            Err(LmcError::InvalidCredential { .. })
        ));
        assert!(matches!(
            store.set_key("google", "k"),
            Err(LmcError::InvalidProvider(_))
        ));
    }

    #[test]
    fn layered_store_writes_to_inner() {
        let layered = LayeredCredentialStore::new(Box::new(
            MemoryCredentialStore::with_keys([("perplexity", "pplx-1")]).unwrap(),
        ));
        layered.set_key("exa", "exa-key-123456").unwrap();

        let status = layered.status().unwrap();
        assert_eq!(status.len(), CREDENTIAL_PROVIDERS.len());
        let exa = status.iter().find(|s| s.provider == "exa").unwrap();
        assert!(exa.configured);
        assert_eq!(exa.masked.as_deref(), Some("********3456"));
    }

    #[test]
    fn env_store_is_read_only() {
        assert!(EnvCredentialStore.set_key("brave", "x").is_err());
    }

    #[test]
    fn masks_keys() {
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(mask_key("sk-or-v1-abcdef"), "********cdef");
    }
}
