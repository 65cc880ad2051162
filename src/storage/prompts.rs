//! System prompts by category.
//!
//! Four built-in categories ship with the binary. Saved prompts live in a
//! JSON object (`category -> text`) layered over them, so a saved `coding`
//! entry overrides the built-in one and any other key adds a category.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::json_file;
use crate::error::{LmcError, Result};

/// Built-in categories in display order.
pub const DEFAULT_CATEGORIES: [&str; 4] = ["writing", "seo", "coding", "other"];

/// Category used when a lookup misses.
pub const FALLBACK_CATEGORY: &str = "other";

/// Built-in prompt text for a category.
#[must_use]
pub fn default_prompt(category: &str) -> Option<&'static str> {
    match category {
        "writing" => Some(include_str!("default_prompts/writing.md")),
        "seo" => Some(include_str!("default_prompts/seo.md")),
        "coding" => Some(include_str!("default_prompts/coding.md")),
        "other" => Some(include_str!("default_prompts/other.md")),
        _ => None,
    }
}

/// JSON-backed system prompt store.
#[derive(Debug, Clone)]
pub struct PromptStore {
    path: PathBuf,
    saved: BTreeMap<String, String>,
}

impl PromptStore {
    /// Load saved prompts from `path`; a missing file means built-ins only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let saved: BTreeMap<String, String> = json_file::read_or_default(&path)?;
        let saved = saved
            .into_iter()
            .filter(|(category, text)| !category.trim().is_empty() && !text.trim().is_empty())
            .collect();
        Ok(Self { path, saved })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prompt for `category`, falling back to `other` for unknown names.
    #[must_use]
    pub fn get(&self, category: &str) -> String {
        let category = category.trim();
        self.lookup(category)
            .or_else(|| self.lookup(FALLBACK_CATEGORY))
            .unwrap_or_default()
            .to_string()
    }

    fn lookup(&self, category: &str) -> Option<&str> {
        self.saved
            .get(category)
            .map(String::as_str)
            .or_else(|| default_prompt(category))
    }

    /// Whether `category` has a prompt (saved or built-in).
    #[must_use]
    pub fn contains(&self, category: &str) -> bool {
        self.lookup(category.trim()).is_some()
    }

    /// Save `text` for `category`, creating the category if needed.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank category or text, or a write failure.
    pub fn set(&mut self, category: &str, text: &str) -> Result<()> {
        let category = category.trim();
        if category.is_empty() {
            return Err(LmcError::InvalidInput("category must not be empty".to_string()));
        }
        if text.trim().is_empty() {
            return Err(LmcError::InvalidInput(format!(
                "prompt for '{category}' must not be empty"
            )));
        }
        self.saved.insert(category.to_string(), text.to_string());
        self.save()?;
        tracing::debug!(category, "Saved system prompt");
        Ok(())
    }

    /// Remove a custom category. Built-in categories are never removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn delete(&mut self, category: &str) -> Result<bool> {
        let category = category.trim();
        if Self::is_default(category) {
            return Ok(false);
        }
        if self.saved.remove(category).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Built-in categories first, then custom ones alphabetically.
    #[must_use]
    pub fn list_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> =
            DEFAULT_CATEGORIES.iter().map(ToString::to_string).collect();
        categories.extend(
            self.saved
                .keys()
                .filter(|c| !Self::is_default(c))
                .cloned(),
        );
        categories
    }

    /// Every category with its effective prompt.
    #[must_use]
    pub fn get_all(&self) -> BTreeMap<String, String> {
        self.list_categories()
            .into_iter()
            .map(|category| {
                let text = self.get(&category);
                (category, text)
            })
            .collect()
    }

    #[must_use]
    pub fn is_default(category: &str) -> bool {
        DEFAULT_CATEGORIES.contains(&category)
    }

    /// Whether a built-in category has been overridden.
    #[must_use]
    pub fn is_customized(&self, category: &str) -> bool {
        Self::is_default(category) && self.saved.contains_key(category)
    }

    /// Merge a `category -> text` JSON object; blank entries are skipped.
    ///
    /// Returns the number of prompts imported.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON object of strings.
    pub fn import(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let incoming: BTreeMap<String, String> = serde_json::from_str(&content)?;

        let mut imported = 0;
        for (category, text) in incoming {
            let category = category.trim();
            if category.is_empty() || text.trim().is_empty() {
                tracing::debug!(category, "Skipping blank prompt on import");
                continue;
            }
            self.saved.insert(category.to_string(), text);
            imported += 1;
        }
        if imported > 0 {
            self.save()?;
        }
        tracing::info!(imported, path = %path.display(), "Imported system prompts");
        Ok(imported)
    }

    /// Write every effective prompt to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn export(&self, path: &Path) -> Result<usize> {
        let all = self.get_all();
        json_file::write_atomic(path, &all)?;
        Ok(all.len())
    }

    fn save(&self) -> Result<()> {
        json_file::write_atomic(&self.path, &self.saved)
    }
}
