//! Error rendering for stderr.
//!
//! Human mode prints the message and how to fix it. JSON and Markdown modes
//! print one structured object so scripts can branch on `error_code`.

use colored::Colorize;
use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::{FixSuggestion, LmcError};

/// Render an error for the given format.
#[must_use]
pub fn render_error(error: &LmcError, format: OutputFormat, no_color: bool) -> String {
    render_error_full(error, format, no_color, false)
}

/// Like [`render_error`], honouring `--pretty` for JSON.
#[must_use]
pub fn render_error_full(
    error: &LmcError,
    format: OutputFormat,
    no_color: bool,
    pretty: bool,
) -> String {
    match format {
        OutputFormat::Json => render_error_json(error, pretty),
        // Markdown consumers get readable JSON rather than prose.
        OutputFormat::Md => render_error_json(error, true),
        OutputFormat::Human if no_color || !crate::util::env::color_enabled(atty::Stream::Stderr) => {
            render_plain(error)
        }
        OutputFormat::Human => render_styled(error),
    }
}

#[must_use]
pub fn render_error_json(error: &LmcError, pretty: bool) -> String {
    let report = ErrorReport::new(error);
    let rendered = if pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    };
    rendered.unwrap_or_else(|_| render_plain(error))
}

fn render_styled(error: &LmcError) -> String {
    let fix = error.fix();
    let mut out = format!(
        "{} {}",
        error.to_string().red().bold(),
        format!("[{}]", error.error_code()).dimmed()
    );

    let mut commands = fix.commands.iter();
    if let Some(first) = commands.next() {
        out.push_str(&format!("\n\n{}\n  {}", "How to fix:".bold(), first.cyan()));
        for alt in commands {
            out.push_str(&format!("\n  {} {}", "or".dimmed(), alt.cyan()));
        }
    }
    push_section(&mut out, "Why:".bold().to_string(), Some(&fix.context));
    push_section(&mut out, "Next time:".green().bold().to_string(), fix.prevention.as_ref());
    if let Some(url) = &fix.doc_url {
        out.push_str(&format!("\n\n{} {}", "Docs:".dimmed(), url.underline()));
    }
    out
}

fn push_section(out: &mut String, heading: String, body: Option<&String>) {
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        out.push_str(&format!("\n\n{heading}\n  {body}"));
    }
}

/// Message with code, then the first command worth pasting.
fn render_plain(error: &LmcError) -> String {
    let head = format!("Error [{}]: {error}", error.error_code());
    match error.fix().runnable() {
        Some(cmd) => format!("{head}\nFix: {cmd}"),
        None => head,
    }
}

#[derive(Serialize)]
struct ErrorReport {
    error_code: &'static str,
    category: String,
    message: String,
    is_retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
    fix: FixSuggestion,
}

impl ErrorReport {
    fn new(error: &LmcError) -> Self {
        Self {
            error_code: error.error_code(),
            category: error.category().to_string(),
            message: error.to_string(),
            is_retryable: error.is_retryable(),
            provider: error.provider().map(String::from),
            retry_after_seconds: error.retry_after().map(|d| d.as_secs()),
            fix: error.fix(),
        }
    }
}
