//! Saved comparison sessions.
//!
//! Every completed `compare` run is stored as an immutable [`Session`] in a
//! single JSON array. Ids are creation times in milliseconds, bumped past
//! any existing id so two runs in the same millisecond stay distinct.

use std::path::{Path, PathBuf};

use chrono::Utc;

use super::json_file::{self, next_id};
use crate::core::models::{Session, SessionResponse};
use crate::error::Result;

/// JSON-backed session history.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    sessions: Vec<Session>,
}

impl SessionStore {
    /// Load sessions from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sessions = json_file::read_or_default(&path)?;
        Ok(Self { path, sessions })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a run. The model list is taken from the responses.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn create(
        &mut self,
        system_prompt: &str,
        user_prompt: &str,
        responses: Vec<SessionResponse>,
    ) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: next_id(now, self.sessions.iter().map(|s| s.id)),
            timestamp: now,
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            models: responses.iter().map(|r| r.model.clone()).collect(),
            responses,
        };
        self.sessions.push(session.clone());
        self.save()?;
        tracing::info!(id = session.id, models = session.models.len(), "Saved session");
        Ok(session)
    }

    /// All sessions, newest first.
    #[must_use]
    pub fn list(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.iter().collect();
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        sessions
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Remove a session; `false` when no session has that id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn delete(&mut self, id: u64) -> Result<bool> {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        if self.sessions.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Sessions whose user prompt, model names or answers contain `term`
    /// (case-insensitive), newest first.
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<&Session> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.list();
        }
        self.list()
            .into_iter()
            .filter(|s| {
                s.user_prompt.to_lowercase().contains(&term)
                    || s.models.iter().any(|m| m.to_lowercase().contains(&term))
                    || s
                        .responses
                        .iter()
                        .any(|r| r.content.to_lowercase().contains(&term))
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn save(&self) -> Result<()> {
        json_file::write_atomic(&self.path, &self.sessions)
    }
}
