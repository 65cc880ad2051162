//! Saved user prompts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::json_file::{self, next_id};
use crate::error::{LmcError, Result};

/// A reusable user prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPrompt {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// JSON array of saved prompts, in creation order.
#[derive(Debug, Clone)]
pub struct UserPromptStore {
    path: PathBuf,
    prompts: Vec<UserPrompt>,
}

impl UserPromptStore {
    /// Load saved prompts from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let prompts = json_file::read_or_default(&path)?;
        Ok(Self { path, prompts })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save a new prompt.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank title or content, or a write failure.
    pub fn create(&mut self, title: &str, content: &str, category: &str) -> Result<UserPrompt> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LmcError::InvalidInput("title must not be empty".to_string()));
        }
        if content.trim().is_empty() {
            return Err(LmcError::InvalidInput("prompt content must not be empty".to_string()));
        }
        let category = match category.trim() {
            "" => "other",
            c => c,
        };

        let now = Utc::now();
        let prompt = UserPrompt {
            id: next_id(now, self.prompts.iter().map(|p| p.id)),
            title: title.to_string(),
            content: content.to_string(),
            category: category.to_string(),
            created_at: now,
        };
        self.prompts.push(prompt.clone());
        self.save()?;
        tracing::debug!(id = prompt.id, category, "Saved user prompt");
        Ok(prompt)
    }

    /// Saved prompts, optionally restricted to one category.
    #[must_use]
    pub fn list(&self, category: Option<&str>) -> Vec<&UserPrompt> {
        self.prompts
            .iter()
            .filter(|p| category.is_none_or(|c| p.category.eq_ignore_ascii_case(c.trim())))
            .collect()
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<&UserPrompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    /// Whether a prompt with exactly this content is already saved.
    #[must_use]
    pub fn exists(&self, content: &str) -> bool {
        self.prompts.iter().any(|p| p.content == content)
    }

    /// Remove a prompt; `false` when no prompt has that id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn delete(&mut self, id: u64) -> Result<bool> {
        let before = self.prompts.len();
        self.prompts.retain(|p| p.id != id);
        if self.prompts.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> Result<()> {
        json_file::write_atomic(&self.path, &self.prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDir;

    fn store(dir: &TestDir) -> UserPromptStore {
        UserPromptStore::load(dir.file_path("data/user-prompts.json")).unwrap()
    }

    #[test]
    fn create_list_and_reload() {
        let dir = TestDir::new();
        let mut prompts = store(&dir);
        let first = prompts.create("Refactor", "Refactor this function", "coding").unwrap();
        let second = prompts.create("Title ideas", "Give me ten titles", "").unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(second.category, "other");

        let reloaded = store(&dir);
        assert_eq!(reloaded.list(None).len(), 2);
        assert_eq!(reloaded.list(Some("CODING")).len(), 1);
        assert_eq!(reloaded.get(first.id).unwrap().title, "Refactor");
        assert!(reloaded.exists("Give me ten titles"));
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let dir = TestDir::new();
        let mut prompts = store(&dir);
        let prompt = prompts.create("t", "c", "seo").unwrap();
        assert!(prompts.delete(prompt.id).unwrap());
        assert!(!prompts.delete(prompt.id).unwrap());
        assert!(store(&dir).list(None).is_empty());
    }

    #[test]
    fn blank_fields_rejected() {
        let dir = TestDir::new();
        let mut prompts = store(&dir);
        assert!(prompts.create(" ", "c", "x").is_err());
        assert!(prompts.create("t", "\n", "x").is_err());
        assert!(!dir.file_exists("data/user-prompts.json"));
    }
}
