//! Number and text formatting for terminal output.

/// Format a USD cost; sub-cent amounts keep six decimals.
#[must_use]
pub fn format_cost(value: f64) -> String {
    if value == 0.0 {
        "$0.00".to_string()
    } else if value < 0.01 {
        format!("${value:.6}")
    } else {
        format!("${value:.4}")
    }
}

/// Format a token count compactly (`12.5K`, `1.5M`).
#[must_use]
pub fn format_tokens(value: u64) -> String {
    fn format_compact(value: u64, divisor: u64, suffix: &str) -> String {
        let major = value / divisor;
        let minor = (value % divisor) / (divisor / 10);
        format!("{major}.{minor}{suffix}")
    }

    if value >= 1_000_000 {
        format_compact(value, 1_000_000, "M")
    } else if value >= 1_000 {
        format_compact(value, 1_000, "K")
    } else {
        value.to_string()
    }
}

/// Format a latency in milliseconds (`850ms`, `2.3s`).
#[must_use]
pub fn format_latency(ms: u64) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else {
        format!("{}.{}s", ms / 1_000, (ms % 1_000) / 100)
    }
}

/// Title-case a hyphenated key: `my-category` becomes `My Category`.
#[must_use]
pub fn format_category_name(key: &str) -> String {
    key.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cut `text` to at most `max` characters, marking the cut with `...`.
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
