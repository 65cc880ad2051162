//! Phase-by-phase progress lines for integration tests.
//!
//! Quiet by default. `TEST_LOG_LEVEL=debug` shows phases and requests,
//! `TEST_LOG_JSON=1` switches to JSON lines, and `TEST_LOG_FILE` appends
//! a copy of every line to a file.
#![allow(dead_code)]

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use lmc::core::logging::LogLevel;
use serde_json::json;

struct Sink {
    min_level: LogLevel,
    json: bool,
    file: Option<Mutex<File>>,
}

fn sink() -> &'static Sink {
    static SINK: OnceLock<Sink> = OnceLock::new();
    SINK.get_or_init(|| Sink {
        min_level: std::env::var("TEST_LOG_LEVEL")
            .ok()
            .and_then(|v| LogLevel::from_arg(&v))
            .unwrap_or(LogLevel::Info),
        json: std::env::var("TEST_LOG_JSON").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
        file: std::env::var_os("TEST_LOG_FILE").and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
                .map(Mutex::new)
        }),
    })
}

pub struct TestLogger {
    test: &'static str,
    started: Instant,
    phase: Mutex<&'static str>,
}

impl TestLogger {
    #[must_use]
    pub fn new(test: &'static str) -> Self {
        let log = Self {
            test,
            started: Instant::now(),
            phase: Mutex::new("setup"),
        };
        log.emit(LogLevel::Debug, "started");
        log
    }

    pub fn phase(&self, phase: &'static str) {
        *self.phase.lock().unwrap() = phase;
        self.emit(LogLevel::Debug, "entering phase");
    }

    pub fn http_request(&self, method: &str, url: &str) {
        self.emit(LogLevel::Debug, &format!("{method} {url}"));
    }

    pub fn finish_ok(&self) {
        let ms = self.started.elapsed().as_millis();
        self.emit(LogLevel::Info, &format!("passed in {ms}ms"));
    }

    fn emit(&self, level: LogLevel, message: &str) {
        let sink = sink();
        if level < sink.min_level {
            return;
        }
        let phase = *self.phase.lock().unwrap();
        let line = if sink.json {
            json!({
                "ts": chrono::Utc::now().to_rfc3339(),
                "level": level.as_filter(),
                "test": self.test,
                "phase": phase,
                "message": message,
            })
            .to_string()
        } else {
            format!("[{}] {} ({phase}): {message}", level.as_filter(), self.test)
        };

        eprintln!("{line}");
        if let Some(file) = &sink.file
            && let Ok(mut file) = file.lock()
        {
            let _ = writeln!(file, "{line}");
        }
    }
}
