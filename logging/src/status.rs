// src/status.rs
//! Low-level fallback channel for the library's own diagnostics.
//!
//! The regular logging pipeline may be mid-reconfiguration when something
//! goes wrong, so failures on the configuration path and in appenders are
//! written here instead: printed to stderr when they pass the status
//! threshold and retained in a bounded ring for inspection.

use crate::error_handling::InternalErrorReport;
use crate::level::Level;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;

/// Environment variable holding the stderr threshold (e.g. `debug`).
pub const STATUS_LEVEL_ENV: &str = "FIBRE_CONTEXT_STATUS";

const MAX_ENTRIES: usize = 200;

static STATUS: Lazy<StatusLogger> = Lazy::new(|| {
  let threshold = std::env::var(STATUS_LEVEL_ENV)
    .ok()
    .and_then(|v| v.parse::<Level>().ok())
    .unwrap_or(Level::Warn);
  StatusLogger::new(threshold)
});

/// A single retained status entry.
#[derive(Debug, Clone)]
pub struct StatusEntry {
  pub level: Level,
  pub message: String,
  pub timestamp: DateTime<Utc>,
}

pub type StatusListener = Arc<dyn Fn(&InternalErrorReport) + Send + Sync>;

pub struct StatusLogger {
  threshold: RwLock<Level>,
  entries: Mutex<VecDeque<StatusEntry>>,
  listeners: RwLock<Vec<StatusListener>>,
}

impl std::fmt::Debug for StatusLogger {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StatusLogger")
      .field("threshold", &*self.threshold.read())
      .field("entries", &self.entries.lock().len())
      .finish()
  }
}

impl StatusLogger {
  fn new(threshold: Level) -> Self {
    Self {
      threshold: RwLock::new(threshold),
      entries: Mutex::new(VecDeque::with_capacity(MAX_ENTRIES)),
      listeners: RwLock::new(Vec::new()),
    }
  }

  /// The process-wide status logger.
  pub fn global() -> &'static StatusLogger {
    &STATUS
  }

  pub fn set_threshold(&self, level: Level) {
    *self.threshold.write() = level;
  }

  pub fn threshold(&self) -> Level {
    *self.threshold.read()
  }

  pub fn log(&self, level: Level, message: impl Into<String>) {
    let entry = StatusEntry {
      level,
      message: message.into(),
      timestamp: Utc::now(),
    };

    if level != Level::Off && level.ordinal() <= self.threshold().ordinal() {
      eprintln!("[fibre_context:{}] {}", level, entry.message);
    }

    let mut entries = self.entries.lock();
    if entries.len() == MAX_ENTRIES {
      entries.pop_front();
    }
    entries.push_back(entry);
  }

  pub fn debug(&self, message: impl Into<String>) {
    self.log(Level::Debug, message);
  }

  pub fn info(&self, message: impl Into<String>) {
    self.log(Level::Info, message);
  }

  pub fn warn(&self, message: impl Into<String>) {
    self.log(Level::Warn, message);
  }

  pub fn error(&self, message: impl Into<String>) {
    self.log(Level::Error, message);
  }

  /// Records an internal failure at ERROR and hands it to every listener.
  pub fn report(&self, report: InternalErrorReport) {
    self.log(Level::Error, report.to_string());
    let listeners = self.listeners.read().clone();
    for listener in listeners {
      listener(&report);
    }
  }

  pub fn add_listener(&self, listener: StatusListener) {
    self.listeners.write().push(listener);
  }

  /// Removes every registered listener.
  pub fn clear_listeners(&self) {
    self.listeners.write().clear();
  }

  /// The most recent entries, oldest first.
  pub fn recent(&self) -> Vec<StatusEntry> {
    self.entries.lock().iter().cloned().collect()
  }

  pub fn clear(&self) {
    self.entries.lock().clear();
  }
}
