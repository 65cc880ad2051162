//! Robot-mode output (JSON and Markdown).
//!
//! JSON is always wrapped in [`RobotOutput`] so consumers can rely on
//! `schemaVersion`, `command`, `data` and `errors`.

use std::fmt::Write as _;

use serde::Serialize;

use crate::core::models::{ComparisonSlot, RobotOutput, SearchComparison, Session, SlotState};
use crate::error::Result;

/// Render any value as JSON.
pub fn render_json<T: Serialize>(output: &T) -> Result<String> {
    Ok(serde_json::to_string(output)?)
}

/// Render any value as pretty JSON.
pub fn render_json_pretty<T: Serialize>(output: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(output)?)
}

/// Wrap `data` in the robot envelope and serialize it.
pub fn render_envelope<T: Serialize>(
    command: &str,
    data: T,
    errors: Vec<String>,
    pretty: bool,
) -> Result<String> {
    let output = RobotOutput::with_errors(command, data, errors);
    if pretty {
        render_json_pretty(&output)
    } else {
        render_json(&output)
    }
}

/// Error strings for failed slots, as `slot N (model): message`.
#[must_use]
pub fn slot_errors(slots: &[ComparisonSlot]) -> Vec<String> {
    slots
        .iter()
        .filter(|s| s.state == SlotState::Error)
        .map(|s| {
            format!(
                "slot {} ({}): {}",
                s.slot_index,
                s.model_id,
                s.error_message.as_deref().unwrap_or("unknown error")
            )
        })
        .collect()
}

/// Comparison as Markdown, one section per slot.
#[must_use]
pub fn render_comparison_md(slots: &[ComparisonSlot]) -> String {
    let mut out = String::new();
    for slot in slots {
        let _ = writeln!(out, "## {} ({})\n", slot.model_name, slot.backend.cli_name());
        match &slot.response {
            Some(response) if slot.state == SlotState::Success => {
                out.push_str(response.content.trim_end());
                out.push_str("\n\n");
                let cost = response.cost.get();
                let _ = writeln!(out, "- tokens: {}", cost.total_tokens);
                let _ = writeln!(out, "- cost_usd: {:.6}", cost.total_cost);
                let _ = writeln!(out, "- confirmed: {}", cost.confirmed);
                if let Some(ms) = cost.latency_ms {
                    let _ = writeln!(out, "- latency_ms: {ms}");
                }
                if slot.web_search {
                    out.push_str("- web_search: true\n");
                }
            }
            _ => {
                let _ = writeln!(
                    out,
                    "- error: {}",
                    slot.error_message.as_deref().unwrap_or("unknown error")
                );
            }
        }
        out.push('\n');
    }
    out
}

/// Search comparison as a Markdown table.
#[must_use]
pub fn render_search_md(comparison: &SearchComparison) -> String {
    let mut out = String::new();
    for warning in &comparison.warnings {
        let _ = writeln!(out, "> {warning}");
    }
    if !comparison.warnings.is_empty() {
        out.push('\n');
    }

    let Some(first) = comparison.rows.first() else {
        out.push_str("_No results_\n");
        return out;
    };
    let providers: Vec<_> = first.ranks.keys().copied().collect();

    out.push_str("| URL |");
    for provider in &providers {
        let _ = write!(out, " {} |", provider.display_name());
    }
    out.push_str("\n|---|");
    for _ in &providers {
        out.push_str("---|");
    }
    out.push('\n');

    for row in &comparison.rows {
        let _ = write!(out, "| [{}]({}) |", escape_cell(&row.title), row.url);
        for provider in &providers {
            match row.ranks.get(provider).copied().flatten() {
                Some(rank) => {
                    let _ = write!(out, " {rank} |");
                }
                None => out.push_str(" - |"),
            }
        }
        out.push('\n');
    }
    out
}

fn escape_cell(text: &str) -> String {
    let text = if text.is_empty() { "untitled" } else { text };
    text.replace('|', "\\|").replace(['[', ']'], "")
}

/// Sessions as a Markdown list.
#[must_use]
pub fn render_sessions_md(sessions: &[&Session]) -> String {
    let mut out = String::new();
    for session in sessions {
        let _ = writeln!(
            out,
            "- {} ({}): {} [{}]",
            session.id,
            session.timestamp.to_rfc3339(),
            session.user_prompt.lines().next().unwrap_or_default(),
            session.models.join(", ")
        );
    }
    out
}

/// One session as Markdown.
#[must_use]
pub fn render_session_md(session: &Session) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Session {}\n", session.id);
    let _ = writeln!(out, "- timestamp: {}", session.timestamp.to_rfc3339());
    let _ = writeln!(out, "- models: {}\n", session.models.join(", "));
    let _ = writeln!(out, "## Prompt\n\n{}\n", session.user_prompt.trim_end());
    for response in &session.responses {
        let _ = writeln!(out, "## {}\n\n{}\n", response.model, response.content.trim_end());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::SearchResultRow;
    use crate::core::provider::{ChatBackend, SearchProvider};
    use crate::test_utils::{make_test_session, make_test_slot};
    use std::collections::BTreeMap;

    #[test]
    fn envelope_has_stable_fields() {
        let json = render_envelope("search", vec![1, 2], vec!["warn".to_string()], false).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["schemaVersion"], "lmc.v1");
        assert_eq!(parsed["command"], "search");
        assert_eq!(parsed["data"], serde_json::json!([1, 2]));
        assert_eq!(parsed["errors"][0], "warn");
        assert!(!json.contains('\n'));

        let pretty = render_envelope("search", (), vec![], true).unwrap();
        assert!(pretty.contains("\n  "));
    }

    #[test]
    fn slot_errors_only_lists_failures() {
        let ok = make_test_slot(1, ChatBackend::OpenRouter, "a");
        let mut bad = make_test_slot(2, ChatBackend::Ollama, "b");
        bad.state = SlotState::Error;
        bad.error_message = Some("boom".to_string());
        assert_eq!(slot_errors(&[ok, bad]), vec!["slot 2 (b): boom"]);
    }

    #[test]
    fn search_md_table() {
        let comparison = SearchComparison {
            rows: vec![SearchResultRow {
                normalized_url: "https://a.com".to_string(),
                url: "https://a.com".to_string(),
                title: "A | B".to_string(),
                snippet: String::new(),
                ranks: BTreeMap::from([
                    (SearchProvider::Perplexity, None),
                    (SearchProvider::Brave, Some(2)),
                ]),
            }],
            warnings: vec![],
        };
        let md = render_search_md(&comparison);
        assert!(md.starts_with("| URL | Perplexity | Brave |"));
        assert!(md.contains("| [A \\| B](https://a.com) | - | 2 |"));
    }

    #[test]
    fn session_md_lists_responses() {
        let session = make_test_session(42, "Hi");
        let md = render_session_md(&session);
        assert!(md.starts_with("# Session 42"));
        assert!(md.contains("## GPT-4o\n\nFirst answer"));
        assert!(render_sessions_md(&[&session]).contains("Hi [GPT-4o, llama3:8b]"));
    }
}
