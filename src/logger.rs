//! Structured log sinks
//!
//! The harness writes every message through a [`Logger`]. The default sink
//! emits one JSON object per line on stdout:
//!
//! ```text
//! {"time":"2024-05-01T12:00:00.000Z","level":"INFO","msg":"Server started"}
//! ```
//!
//! `level` and `msg` are the fields downstream tooling matches on.

use std::io::{self, Write};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

/// Sink for leveled log entries.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, msg: &str);
}

/// Process-wide stdout logger shared by every harness built without an override
static DEFAULT_LOGGER: Lazy<Arc<JsonLogger<io::Stdout>>> =
    Lazy::new(|| Arc::new(JsonLogger::stdout()));

/// Returns the shared stdout JSON logger.
pub fn default_logger() -> Arc<dyn Logger> {
    DEFAULT_LOGGER.clone()
}

/// Install a `tracing` fmt subscriber for [`TracingLogger`] output.
///
/// `RUST_LOG` takes precedence over `level`. Does nothing if a global
/// subscriber is already set.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[derive(Serialize)]
struct Entry<'a> {
    time: String,
    level: &'static str,
    msg: &'a str,
}

fn write_entry<W: Write>(writer: &mut W, level: Level, msg: &str) -> io::Result<()> {
    let entry = Entry {
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        level: level.as_str(),
        msg,
    };
    serde_json::to_writer(&mut *writer, &entry)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Writes JSON lines to any writer.
///
/// Entries more verbose than the minimum level (INFO by default) are dropped.
pub struct JsonLogger<W> {
    writer: Mutex<W>,
    min_level: Level,
}

impl<W: Write + Send> JsonLogger<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            min_level: Level::INFO,
        }
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Consume the logger and hand back the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLogger<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> Logger for JsonLogger<W> {
    fn log(&self, level: Level, msg: &str) {
        // tracing orders levels by verbosity: TRACE > DEBUG > INFO > WARN > ERROR
        if level > self.min_level {
            return;
        }
        let mut writer = self.writer.lock();
        if let Err(e) = write_entry(&mut *writer, level, msg) {
            debug!("Failed to write log entry: {}", e);
        }
    }
}

/// Forwards entries to the active `tracing` subscriber under the `nontest` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, msg: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "nontest", "{}", msg),
            Level::WARN => tracing::warn!(target: "nontest", "{}", msg),
            Level::INFO => tracing::info!(target: "nontest", "{}", msg),
            Level::DEBUG => tracing::debug!(target: "nontest", "{}", msg),
            _ => tracing::trace!(target: "nontest", "{}", msg),
        }
    }
}

/// Captures JSON lines in memory so callers can assert on what was logged.
///
/// Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryLogger {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything logged so far, as raw JSON lines
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    /// Parsed entries, in the order they were logged
    pub fn entries(&self) -> Vec<serde_json::Value> {
        self.contents()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Messages of all entries at `level`
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e["level"] == level.as_str())
            .filter_map(|e| e["msg"].as_str().map(str::to_string))
            .collect()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, msg: &str) {
        let mut buf = self.buf.lock();
        // Writing into a Vec cannot fail
        let _ = write_entry(&mut *buf, level, msg);
    }
}
