//! Diagnostics log sink.
//!
//! Workflow stages record what they did through a [`DiagnosticsLog`] instead of
//! writing to a file directly. [`FileLog`] forwards each record to `tracing`
//! and mirrors it to an append-only file; [`MemoryLog`] keeps records in memory.

use chrono::{SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Sink for workflow log records.
pub trait DiagnosticsLog: Send + Sync {
    fn record(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.record(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.record(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.record(LogLevel::Error, message);
    }
}

/// Forwards records to `tracing` and appends them to a file.
pub struct FileLog {
    path: PathBuf,
    file: Option<Mutex<File>>,
}

impl FileLog {
    /// Open `path` for appending, creating it if needed.
    ///
    /// If the file can't be opened the log still forwards to `tracing`.
    pub fn open(path: &Path) -> Self {
        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Mutex::new(file)),
            Err(e) => {
                warn!(path = %path.display(), "Cannot open diagnostics log, continuing without it: {e}");
                None
            }
        };

        Self {
            path: path.to_path_buf(),
            file,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, level: LogLevel, message: &str) {
        let Some(file) = &self.file else {
            return;
        };

        let line = format_line(level, message);
        let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!(path = %self.path.display(), "Failed to write diagnostics log: {e}");
        }
    }
}

impl DiagnosticsLog for FileLog {
    fn record(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!("{message}"),
            LogLevel::Info => info!("{message}"),
            LogLevel::Warn => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }
        self.append(level, message);
    }
}

/// Format one log file line: `<timestamp> <LEVEL> <message>`.
fn format_line(level: LogLevel, message: &str) -> String {
    format!(
        "{} {:<5} {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        level.as_str(),
        message.replace('\n', " ")
    )
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }

    /// Messages recorded at `level`, in order.
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl DiagnosticsLog for MemoryLog {
    fn record(&self, level: LogLevel, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}
