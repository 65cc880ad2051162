//! Structured logging to stderr or a file.
//!
//! Settings come from the global CLI flags, falling back to `LMC_LOG`,
//! `LMC_LOG_FORMAT` and `LMC_LOG_FILE`. `RUST_LOG` replaces the whole
//! filter when set. Logs never go to stdout, which carries command output.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_LEVEL_ENV: &str = "LMC_LOG";
pub const LOG_FORMAT_ENV: &str = "LMC_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "LMC_LOG_FILE";

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Level and message, no timestamps.
    #[default]
    Human,
    /// One JSON object per event.
    Json,
    /// Single line with timestamp and target.
    Compact,
}

impl LogFormat {
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" => Some(Self::Human),
            "json" | "jsonl" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Minimum level for events from this crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" | "verbose" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "critical" => Some(Self::Error),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Combine CLI flags with the environment.
    ///
    /// An unparseable `--log-level` falls back to `LMC_LOG`. `--verbose`
    /// lowers warn/error to debug but leaves an explicit info/trace alone.
    #[must_use]
    pub fn resolve(log_level: Option<&str>, json_output: bool, verbose: bool) -> Self {
        let level = log_level
            .and_then(LogLevel::from_arg)
            .or_else(|| env_value(LOG_LEVEL_ENV).and_then(|v| LogLevel::from_arg(&v)))
            .unwrap_or_default();
        let level = if verbose {
            level.min(LogLevel::Debug)
        } else {
            level
        };

        let format = if json_output {
            LogFormat::Json
        } else {
            env_value(LOG_FORMAT_ENV)
                .and_then(|v| LogFormat::from_arg(&v))
                .unwrap_or_default()
        };

        Self {
            level,
            format,
            file: env_value(LOG_FILE_ENV).map(PathBuf::from),
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("lmc={}", self.level.as_filter())))
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Install the global subscriber. Later calls are no-ops.
///
/// A log file that cannot be opened falls back to stderr.
pub fn init(settings: &LogSettings) {
    let file = settings.file.as_ref().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("lmc: cannot open log file {}: {e}", path.display()))
            .ok()
    });
    let ansi = file.is_none() && atty::is(atty::Stream::Stderr);
    let writer = file.map_or_else(
        || BoxMakeWriter::new(std::io::stderr),
        |f| BoxMakeWriter::new(Mutex::new(f)),
    );

    let builder = tracing_subscriber::fmt()
        .with_env_filter(settings.filter())
        .with_writer(writer)
        .with_ansi(ansi);

    let installed = match settings.format {
        LogFormat::Json => builder
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .try_init(),
        LogFormat::Compact => builder.compact().with_target(true).try_init(),
        LogFormat::Human => builder.with_target(false).without_time().try_init(),
    };
    if installed.is_ok() {
        tracing::debug!(level = settings.level.as_filter(), format = ?settings.format, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[allow(unsafe_code)]
    fn with_env(vars: &[(&str, &str)], f: impl FnOnce()) {
        let _guard = ENV_LOCK.lock().unwrap();
        let prior: Vec<_> = vars.iter().map(|(k, _)| (*k, std::env::var(k).ok())).collect();
        for (key, value) in vars {
            unsafe { std::env::set_var(key, value) };
        }
        f();
        for (key, value) in prior {
            match value {
                Some(v) => unsafe { std::env::set_var(key, v) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }

    #[test]
    fn flag_beats_env() {
        with_env(&[(LOG_LEVEL_ENV, "trace")], || {
            assert_eq!(LogSettings::resolve(Some("error"), false, false).level, LogLevel::Error);
            assert_eq!(LogSettings::resolve(None, false, false).level, LogLevel::Trace);
            assert_eq!(LogSettings::resolve(Some("loud"), false, false).level, LogLevel::Trace);
        });
    }

    #[test]
    fn blank_env_is_ignored() {
        with_env(&[(LOG_LEVEL_ENV, "  "), (LOG_FORMAT_ENV, ""), (LOG_FILE_ENV, " ")], || {
            assert_eq!(LogSettings::resolve(None, false, false), LogSettings::default());
        });
    }

    #[test]
    fn verbose_only_lowers_the_level() {
        with_env(&[(LOG_LEVEL_ENV, "warn")], || {
            assert_eq!(LogSettings::resolve(None, false, true).level, LogLevel::Debug);
            assert_eq!(LogSettings::resolve(Some("trace"), false, true).level, LogLevel::Trace);
        });
    }

    #[test]
    fn json_flag_overrides_env_format() {
        with_env(&[(LOG_FORMAT_ENV, "compact"), (LOG_FILE_ENV, "/tmp/lmc.log")], || {
            let settings = LogSettings::resolve(None, true, false);
            assert_eq!(settings.format, LogFormat::Json);
            assert_eq!(settings.file, Some(PathBuf::from("/tmp/lmc.log")));
            assert_eq!(LogSettings::resolve(None, false, false).format, LogFormat::Compact);
        });
    }

    #[test]
    fn aliases_parse() {
        assert_eq!(LogLevel::from_arg("Verbose"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_arg("critical"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_arg("loud"), None);
        assert_eq!(LogFormat::from_arg("JSONL"), Some(LogFormat::Json));
    }
}
