//! lmc - LLM Compare
//!
//! Send one prompt to several models side by side (hosted through OpenRouter
//! or local through Ollama), compare web search results across providers,
//! and keep prompts and past comparisons on disk.

// deny, not forbid: env-mutating tests opt back in with #[allow(unsafe_code)].
#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod core;
pub mod error;
pub mod providers;
pub mod render;
pub mod storage;
pub mod util;

/// Fakes and fixtures; the `test-utils` feature exposes them to `tests/`.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ExitCode, LmcError, Result};

#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::*;
