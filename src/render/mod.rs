//! Output rendering for human and robot modes.

pub mod error;
pub mod human;
pub mod robot;

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::core::models::{ComparisonSlot, SearchComparison, Session};
use crate::error::Result;

/// Render a comparison run.
pub fn render_comparison(
    slots: &[ComparisonSlot],
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_comparison(slots, no_color)),
        OutputFormat::Json => robot::render_envelope("compare", slots, robot::slot_errors(slots), pretty),
        OutputFormat::Md => Ok(robot::render_comparison_md(slots)),
    }
}

/// Render a search comparison.
pub fn render_search(
    comparison: &SearchComparison,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_search(comparison, no_color)),
        OutputFormat::Json => robot::render_envelope(
            "search",
            &comparison.rows,
            comparison.warnings.clone(),
            pretty,
        ),
        OutputFormat::Md => Ok(robot::render_search_md(comparison)),
    }
}

/// Render a session list.
pub fn render_sessions(
    sessions: &[&Session],
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_session_list(sessions, no_color)),
        OutputFormat::Json => robot::render_envelope("sessions", sessions, vec![], pretty),
        OutputFormat::Md => Ok(robot::render_sessions_md(sessions)),
    }
}

/// Render one session.
pub fn render_session(
    session: &Session,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_session(session, no_color)),
        OutputFormat::Json => robot::render_envelope("sessions show", session, vec![], pretty),
        OutputFormat::Md => Ok(robot::render_session_md(session)),
    }
}

/// Render anything else: the envelope for JSON, the human view otherwise.
///
/// Markdown has no dedicated layout for these commands and falls back to
/// the uncolored human view.
pub fn render_with<T: Serialize>(
    command: &str,
    data: &T,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
    human: impl FnOnce(&T, bool) -> String,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human(data, no_color)),
        OutputFormat::Json => robot::render_envelope(command, data, vec![], pretty),
        OutputFormat::Md => Ok(human(data, true)),
    }
}
