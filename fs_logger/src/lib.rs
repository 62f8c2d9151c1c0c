//! # Logger
//!
//! This crate implements structured logging for filesystem instances.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not text-based or printf-style.
//! Entries are kept in a bounded in-memory log so tests and tools can inspect
//! what an instance did, and every kept entry is also handed to the `log`
//! facade so a host binary can attach whatever logger it likes.

use fs_types::FsInstanceId;
use std::collections::VecDeque;
use std::fmt;

pub use fs_types::LogLevel;

/// Target used when forwarding to the `log` facade
pub const LOG_TARGET: &str = "simfs";

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Source filesystem instance (if known)
    pub source: Option<FsInstanceId>,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            source: None,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Sets the source instance
    pub fn with_source(mut self, source: FsInstanceId) -> Self {
        self.source = Some(source);
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Value of the first field named `key`
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.level)?;
        if let Some(source) = self.source {
            write!(f, " {}", source)?;
        }
        write!(f, " {}", self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

fn facade_level(level: LogLevel) -> log::Level {
    match level {
        LogLevel::Debug => log::Level::Debug,
        LogLevel::Info => log::Level::Info,
        LogLevel::Warn => log::Level::Warn,
        LogLevel::Error => log::Level::Error,
    }
}

/// Bounded in-memory event log
///
/// Entries below `min_level` are dropped. Once `capacity` entries are held the
/// oldest one is evicted for each new entry.
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    min_level: LogLevel,
    entries: VecDeque<LogEntry>,
    evicted: usize,
}

impl EventLog {
    pub fn new(capacity: usize, min_level: LogLevel) -> Self {
        Self {
            capacity,
            min_level,
            entries: VecDeque::with_capacity(capacity),
            evicted: 0,
        }
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Records an entry; returns whether it passed the level filter
    pub fn record(&mut self, entry: LogEntry) -> bool {
        if entry.level < self.min_level {
            return false;
        }

        log::log!(target: LOG_TARGET, facade_level(entry.level), "{}", entry);

        if self.capacity == 0 {
            self.evicted += 1;
            return true;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(entry);
        true
    }

    /// Entries in recording order, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Entries at exactly `level`
    pub fn at_level(&self, level: LogLevel) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |entry| entry.level == level)
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries pushed out by newer ones
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
