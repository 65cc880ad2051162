//! Logging initialization smoke tests.

use lmc::core::logging::{self, LogFormat, LogLevel, LogSettings};

#[test]
fn init_is_idempotent_across_formats() {
    for (level, format) in [
        (LogLevel::Debug, LogFormat::Json),
        (LogLevel::Info, LogFormat::Human),
        (LogLevel::Warn, LogFormat::Compact),
    ] {
        logging::init(&LogSettings {
            level,
            format,
            file: None,
        });
    }
    tracing::info!("still logging after repeated init");
}

#[test]
fn unwritable_log_file_falls_back_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    logging::init(&LogSettings {
        level: LogLevel::Info,
        format: LogFormat::Json,
        file: Some(dir.path().join("missing").join("lmc.log")),
    });
    tracing::warn!("logged to stderr");
}
