//! Human-readable output using `colored`.
//!
//! Every renderer takes `no_color`; when set, no ANSI codes are emitted.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use colored::{ColoredString, Colorize};

use crate::core::chat::ChatTurn;
use crate::core::local_runtime::{RuntimeStatus, StartOutcome};
use crate::core::models::{
    ComparisonSlot, CostInfo, ModelInfo, SearchComparison, Session, SlotState,
};
use crate::core::provider::SearchProvider;
use crate::storage::credentials::KeyStatus;
use crate::storage::user_prompts::UserPrompt;
use crate::util::format::{
    format_category_name, format_cost, format_latency, format_tokens, truncate,
};

const RULE_WIDTH: usize = 60;

/// Apply a style unless color is disabled.
fn paint(text: &str, no_color: bool, style: impl FnOnce(&str) -> ColoredString) -> String {
    if no_color {
        text.to_string()
    } else {
        style(text).to_string()
    }
}

fn heading(text: &str, no_color: bool) -> String {
    let pad = RULE_WIDTH.saturating_sub(text.chars().count() + 4);
    let line = format!("── {text} {}", "─".repeat(pad));
    paint(&line, no_color, |s| s.cyan().bold())
}

fn dim(text: &str, no_color: bool) -> String {
    paint(text, no_color, |s| s.dimmed())
}

// =============================================================================
// Comparison
// =============================================================================

/// One-line cost summary: tokens, price, latency.
fn cost_line(cost: &CostInfo, no_color: bool) -> String {
    let mut parts = vec![format!(
        "{} tokens ({} in / {} out)",
        format_tokens(cost.total_tokens),
        format_tokens(cost.input_tokens),
        format_tokens(cost.output_tokens)
    )];
    let price = format_cost(cost.total_cost);
    parts.push(if cost.confirmed {
        price
    } else {
        format!("{price} (provisional)")
    });
    if let Some(ms) = cost.latency_ms {
        parts.push(format_latency(ms));
    }
    dim(&parts.join(" · "), no_color)
}

/// Render every slot of a comparison run.
#[must_use]
pub fn render_comparison(slots: &[ComparisonSlot], no_color: bool) -> String {
    let mut out = String::new();
    for slot in slots {
        out.push_str(&render_slot(slot, no_color));
        out.push('\n');
    }

    let total: f64 = slots
        .iter()
        .filter_map(|s| s.response.as_ref())
        .map(|r| r.cost.get().total_cost)
        .sum();
    let failed = slots.iter().filter(|s| s.state == SlotState::Error).count();
    let mut summary = format!("{} model(s), total {}", slots.len(), format_cost(total));
    if failed > 0 {
        let _ = write!(summary, ", {failed} failed");
    }
    out.push_str(&dim(&summary, no_color));
    out.push('\n');
    out
}

fn render_slot(slot: &ComparisonSlot, no_color: bool) -> String {
    let mut title = format!("[{}] {} ({})", slot.slot_index, slot.model_name, slot.backend.cli_name());
    if slot.web_search {
        title.push_str(" +web");
    }
    let mut out = heading(&title, no_color);
    out.push('\n');

    match (&slot.state, &slot.response) {
        (SlotState::Success, Some(response)) => {
            out.push_str(response.content.trim_end());
            out.push('\n');
            let _ = writeln!(out, "{}", cost_line(&response.cost.get(), no_color));
        }
        (SlotState::Error, _) => {
            let label = slot.error_kind.as_ref().map_or("error", |k| k.label());
            let message = slot.error_message.as_deref().unwrap_or("unknown error");
            let line = format!("✗ {label}: {message}");
            let _ = writeln!(out, "{}", paint(&line, no_color, |s| s.red()));
        }
        _ => {
            let _ = writeln!(out, "{}", dim("pending", no_color));
        }
    }
    out
}

/// Render one chat turn.
#[must_use]
pub fn render_chat_turn(turn: &ChatTurn, no_color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", paint(&turn.model, no_color, |s| s.green().bold()));
    out.push_str(turn.assistant.trim_end());
    out.push('\n');
    let _ = writeln!(out, "{}", cost_line(&turn.cost, no_color));
    out
}

// =============================================================================
// Search
// =============================================================================

/// Render merged search results as a rank table.
#[must_use]
pub fn render_search(comparison: &SearchComparison, no_color: bool) -> String {
    let mut out = String::new();
    for warning in &comparison.warnings {
        let _ = writeln!(out, "{}", paint(&format!("! {warning}"), no_color, |s| s.yellow()));
    }
    if comparison.rows.is_empty() {
        let _ = writeln!(out, "{}", dim("No results", no_color));
        return out;
    }

    let providers: Vec<SearchProvider> = comparison
        .rows
        .first()
        .map(|row| row.ranks.keys().copied().collect())
        .unwrap_or_default();

    let header: Vec<String> = providers
        .iter()
        .map(|p| format!("{:>10}", p.display_name()))
        .collect();
    let _ = writeln!(
        out,
        "{}",
        paint(&format!("{}  URL", header.join("")), no_color, |s| s.bold())
    );

    for row in &comparison.rows {
        let ranks: String = providers
            .iter()
            .map(|p| match row.ranks.get(p).copied().flatten() {
                Some(rank) => format!("{rank:>10}"),
                None => format!("{:>10}", "-"),
            })
            .collect();
        let _ = writeln!(out, "{ranks}  {}", paint(&row.url, no_color, |s| s.blue()));
        if !row.title.is_empty() {
            let _ = writeln!(out, "{:width$}  {}", "", truncate(&row.title, 70), width = providers.len() * 10);
        }
    }
    out
}

// =============================================================================
// Sessions
// =============================================================================

/// One line per session.
#[must_use]
pub fn render_session_list(sessions: &[&Session], no_color: bool) -> String {
    if sessions.is_empty() {
        return format!("{}\n", dim("No saved sessions", no_color));
    }
    let mut out = String::new();
    for session in sessions {
        let _ = writeln!(
            out,
            "{}  {}  {}  {}",
            paint(&session.id.to_string(), no_color, |s| s.cyan()),
            dim(&session.timestamp.format("%Y-%m-%d %H:%M").to_string(), no_color),
            truncate(session.user_prompt.lines().next().unwrap_or_default(), 50),
            dim(&session.models.join(", "), no_color)
        );
    }
    out
}

/// Full session with every response.
#[must_use]
pub fn render_session(session: &Session, no_color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heading(&format!("Session {}", session.id), no_color));
    let _ = writeln!(out, "{}", dim(&session.timestamp.to_rfc3339(), no_color));
    let _ = writeln!(out, "{} {}", paint("Prompt:", no_color, |s| s.bold()), session.user_prompt);
    if !session.system_prompt.is_empty() {
        let _ = writeln!(
            out,
            "{} {}",
            paint("System:", no_color, |s| s.bold()),
            truncate(&session.system_prompt, 120)
        );
    }
    for response in &session.responses {
        out.push('\n');
        let _ = writeln!(out, "{}", heading(&response.model, no_color));
        out.push_str(response.content.trim_end());
        out.push('\n');
        if let Some(cost) = &response.cost {
            let _ = writeln!(out, "{}", cost_line(cost, no_color));
        }
    }
    out
}

// =============================================================================
// Prompts
// =============================================================================

/// Category list with a marker for customized built-ins.
#[must_use]
pub fn render_prompt_categories(categories: &[(String, bool, bool)], no_color: bool) -> String {
    let mut out = String::new();
    for (category, is_default, customized) in categories {
        let tag = match (is_default, customized) {
            (true, true) => " (built-in, customized)",
            (true, false) => " (built-in)",
            _ => "",
        };
        let _ = writeln!(
            out,
            "{:<12} {}{}",
            paint(category, no_color, |s| s.cyan()),
            format_category_name(category),
            dim(tag, no_color)
        );
    }
    out
}

/// Saved user prompts.
#[must_use]
pub fn render_user_prompts(prompts: &[&UserPrompt], no_color: bool) -> String {
    if prompts.is_empty() {
        return format!("{}\n", dim("No saved prompts", no_color));
    }
    let mut out = String::new();
    for prompt in prompts {
        let _ = writeln!(
            out,
            "{}  {}  {}  {}",
            paint(&prompt.id.to_string(), no_color, |s| s.cyan()),
            dim(&format!("[{}]", prompt.category), no_color),
            paint(&prompt.title, no_color, |s| s.bold()),
            truncate(prompt.content.lines().next().unwrap_or_default(), 50)
        );
    }
    out
}

// =============================================================================
// Keys, Models, Runtime
// =============================================================================

/// Key status table.
#[must_use]
pub fn render_keys(status: &[KeyStatus], no_color: bool) -> String {
    let mut out = String::new();
    for key in status {
        let state = if key.configured {
            paint("configured", no_color, |s| s.green())
        } else {
            paint("missing", no_color, |s| s.red())
        };
        let detail = match (&key.masked, &key.source) {
            (Some(masked), Some(source)) => format!("{masked} ({source})"),
            _ => String::new(),
        };
        let _ = writeln!(out, "{:<12} {state}  {}", key.provider, dim(&detail, no_color));
    }
    out
}

/// Models grouped by backend.
#[must_use]
pub fn render_models(models: &BTreeMap<String, Vec<ModelInfo>>, no_color: bool) -> String {
    let mut out = String::new();
    for (backend, list) in models {
        let _ = writeln!(out, "{}", heading(&format!("{backend} ({})", list.len()), no_color));
        for model in list {
            let mut details = Vec::new();
            if let Some(ctx) = model.context_length {
                details.push(format!("{} ctx", format_tokens(ctx)));
            }
            if let Some(price) = model.pricing {
                details.push(format!(
                    "${:.2}/${:.2} per 1M",
                    price.prompt * 1_000_000.0,
                    price.completion * 1_000_000.0
                ));
            }
            if model.supports_vision {
                details.push("vision".to_string());
            }
            let _ = writeln!(
                out,
                "{}  {}",
                paint(&model.id, no_color, |s| s.cyan()),
                dim(&details.join(" · "), no_color)
            );
        }
    }
    out
}

/// Installation and server state.
#[must_use]
pub fn render_runtime_status(status: &RuntimeStatus, no_color: bool) -> String {
    let mut out = String::new();
    match &status.installation {
        Some(install) => {
            let version = install.version.as_deref().unwrap_or("unknown version");
            let _ = writeln!(
                out,
                "Installed: {} ({version})",
                paint(&install.path.display().to_string(), no_color, |s| s.green())
            );
        }
        None => {
            let _ = writeln!(out, "Installed: {}", paint("no", no_color, |s| s.red()));
        }
    }
    let running = if status.running {
        paint("yes", no_color, |s| s.green())
    } else {
        paint("no", no_color, |s| s.yellow())
    };
    let _ = writeln!(out, "Running:   {running} at {}", status.base_url);
    if let Some(version) = &status.server_version {
        let _ = writeln!(out, "Server:    {version}");
    }
    if let Some(pid) = status.managed_pid {
        let _ = writeln!(out, "Managed:   pid {pid}");
    }
    out
}

#[must_use]
pub fn render_start_outcome(outcome: &StartOutcome, no_color: bool) -> String {
    match outcome {
        StartOutcome::AlreadyRunning { version } => {
            format!("{} (version {version})\n", paint("Already running", no_color, |s| s.green()))
        }
        StartOutcome::Started { pid, version } => format!(
            "{} pid {pid} (version {version})\n",
            paint("Started", no_color, |s| s.green())
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{CostInfo, ProviderResponse, SearchResultRow, Usage};
    use crate::core::provider::ChatBackend;
    use crate::error::ErrorKind;
    use crate::test_utils::{has_ansi_codes, make_test_session, make_test_slot};

    fn success_slot() -> ComparisonSlot {
        let mut slot = make_test_slot(1, ChatBackend::OpenRouter, "openai/gpt-4o");
        let mut cost = CostInfo::provisional(Usage::new(800, 400), Some(2_345), None);
        cost.total_cost = 0.0007;
        cost.confirmed = true;
        slot.state = SlotState::Success;
        slot.response = Some(ProviderResponse::new(
            "Hello there".to_string(),
            Some(Usage::new(800, 400)),
            None,
            2_345,
            None,
            cost,
        ));
        slot
    }

    #[test]
    fn comparison_shows_content_cost_and_errors() {
        let mut failed = make_test_slot(2, ChatBackend::Ollama, "llama3");
        failed.state = SlotState::Error;
        failed.error_kind = Some(ErrorKind::Timeout);
        failed.error_message = Some("request timed out".to_string());

        let out = render_comparison(&[success_slot(), failed], true);
        assert!(out.contains("[1] openai/gpt-4o (openrouter)"));
        assert!(out.contains("Hello there"));
        assert!(out.contains("1.2K tokens"));
        assert!(out.contains("$0.000700"));
        assert!(out.contains("2.3s"));
        assert!(out.contains("✗ timeout: request timed out"));
        assert!(out.contains("1 failed"));
        assert!(!has_ansi_codes(&out));
    }

    #[test]
    fn provisional_cost_is_marked() {
        let mut slot = success_slot();
        let mut cost = slot.response.as_ref().unwrap().cost.get();
        cost.confirmed = false;
        slot.response.as_ref().unwrap().cost.replace(cost);
        slot.web_search = true;
        let out = render_comparison(&[slot], true);
        assert!(out.contains("(provisional)"));
        assert!(out.contains("+web"));
    }

    #[test]
    fn search_table_shows_dash_for_missing_ranks() {
        let comparison = SearchComparison {
            rows: vec![SearchResultRow {
                normalized_url: "https://example.com/a".to_string(),
                url: "https://example.com/a".to_string(),
                title: "Example".to_string(),
                snippet: String::new(),
                ranks: BTreeMap::from([
                    (SearchProvider::Brave, Some(1)),
                    (SearchProvider::Exa, None),
                ]),
            }],
            warnings: vec!["Exa API key not configured".to_string()],
        };
        let out = render_search(&comparison, true);
        assert!(out.contains("! Exa API key not configured"));
        assert!(out.contains("Brave"));
        let row = out.lines().find(|l| l.contains("https://example.com/a")).unwrap();
        assert!(row.contains('1'));
        assert!(row.contains('-'));
    }

    #[test]
    fn session_views() {
        let session = make_test_session(1_700_000_000_000, "Summarize this");
        let list = render_session_list(&[&session], true);
        assert!(list.contains("1700000000000"));
        assert!(list.contains("GPT-4o, llama3:8b"));

        let full = render_session(&session, true);
        assert!(full.contains("Prompt: Summarize this"));
        assert!(full.contains("Second answer"));
        assert_eq!(render_session_list(&[], true), "No saved sessions\n");
    }

    #[test]
    fn keys_show_source_and_mask() {
        let status = vec![
            KeyStatus {
                provider: "brave".to_string(),
                configured: true,
                source: Some("env".to_string()),
                masked: Some("********1234".to_string()),
            },
            KeyStatus {
                provider: "exa".to_string(),
                configured: false,
                source: None,
                masked: None,
            },
        ];
        let out = render_keys(&status, true);
        assert!(out.contains("configured  ********1234 (env)"));
        assert!(out.contains("missing"));
    }

    #[test]
    fn runtime_status_not_installed() {
        let status = RuntimeStatus {
            installation: None,
            running: false,
            server_version: None,
            base_url: "http://localhost:11434".to_string(),
            managed_pid: None,
        };
        let out = render_runtime_status(&status, true);
        assert!(out.contains("Installed: no"));
        assert!(out.contains("Running:   no at http://localhost:11434"));
    }
}
