use std::io::{self, Write};
use std::sync::Mutex;

use tracing::Level;

/// Sink for the messages a migrator emits while it works.
///
/// Each migrator holds its own handle, so swapping the sink on one instance
/// never affects another.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }
}

/// Forwards messages to `tracing`. This is what a new migrator starts with.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!("{message}");
        } else if level == Level::WARN {
            tracing::warn!("{message}");
        } else if level == Level::INFO {
            tracing::info!("{message}");
        } else if level == Level::DEBUG {
            tracing::debug!("{message}");
        } else {
            tracing::trace!("{message}");
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NilLogger;

impl Logger for NilLogger {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Writes one line per message to any writer, dropping messages more
/// verbose than its maximum level (`INFO` unless changed).
pub struct WriterLogger<W> {
    prefix: String,
    max_level: Level,
    writer: Mutex<W>,
}

pub const DEFAULT_PREFIX: &str = "[tidemark] ";

impl WriterLogger<io::Stdout> {
    /// Standard output with the `[tidemark] ` prefix.
    pub fn stdout() -> Self {
        Self::with_prefix(io::stdout(), DEFAULT_PREFIX)
    }
}

impl<W: Write + Send> WriterLogger<W> {
    pub fn new(writer: W) -> Self {
        Self::with_prefix(writer, "")
    }

    pub fn with_prefix(writer: W, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            max_level: Level::INFO,
            writer: Mutex::new(writer),
        }
    }

    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }

    pub fn into_inner(self) -> Option<W> {
        self.writer.into_inner().ok()
    }
}

impl<W: Write + Send> Logger for WriterLogger<W> {
    fn log(&self, level: Level, message: &str) {
        if level > self.max_level {
            return;
        }
        // Write errors are dropped.
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}{message}", self.prefix);
        }
    }
}
