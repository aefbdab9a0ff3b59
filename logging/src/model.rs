// src/model.rs

use crate::context;
use crate::level::Level;
use crate::map::StringMap;
use crate::marker::Marker;

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// A call site captured at the logging call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
  pub file: &'static str,
  pub line: u32,
  pub column: u32,
}

impl From<&'static std::panic::Location<'static>> for Location {
  fn from(loc: &'static std::panic::Location<'static>) -> Self {
    Self {
      file: loc.file(),
      line: loc.line(),
      column: loc.column(),
    }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.file, self.line)
  }
}

/// An immutable log event as handed to appenders.
///
/// `context_data` is frozen, so an event can be queued and processed on
/// another thread without observing later changes to the caller's context.
#[derive(Debug, Clone)]
pub struct LogEvent {
  /// Timestamp of when the event was created.
  pub timestamp: DateTime<Utc>,
  pub level: Level,
  /// Name of the logger the call was made on.
  pub logger_name: String,
  /// Fully qualified name of the logging facade that made the call.
  pub fqcn: &'static str,
  pub marker: Option<Marker>,
  /// The formatted message.
  pub message: String,
  /// Rendered error attached to the call, including its source chain.
  pub error: Option<String>,
  pub context_data: Arc<StringMap>,
  /// The thread context stack, bottom first.
  pub context_stack: Vec<String>,
  pub thread_id: Option<String>,
  pub thread_name: Option<String>,
  /// Only captured when the logger requires location.
  pub location: Option<Location>,
}

impl LogEvent {
  /// Creates an event stamped with the current time and thread and with
  /// empty context data.
  pub fn new<S>(level: Level, logger_name: S, message: impl Into<String>) -> Self
  where
    S: Into<String>,
  {
    let current_thread = std::thread::current();
    LogEvent {
      timestamp: Utc::now(),
      level,
      logger_name: logger_name.into(),
      fqcn: crate::logger::FQCN,
      marker: None,
      message: message.into(),
      error: None,
      context_data: context::empty_snapshot(),
      context_stack: Vec::new(),
      thread_id: Some(thread_id_string(current_thread.id())),
      thread_name: current_thread.name().map(str::to_string),
      location: None,
    }
  }
}

/// Extracts the numeric part of a `ThreadId`'s debug output.
pub(crate) fn thread_id_string(id: std::thread::ThreadId) -> String {
  let debug_id = format!("{:?}", id);
  debug_id
    .strip_prefix("ThreadId(")
    .and_then(|s| s.strip_suffix(')'))
    .unwrap_or(&debug_id)
    .to_string()
}

/// Renders an error and its source chain as `outer: cause: root`.
pub(crate) fn render_error(error: &(dyn std::error::Error + 'static)) -> String {
  let mut rendered = error.to_string();
  let mut source = error.source();
  while let Some(cause) = source {
    rendered.push_str(": ");
    rendered.push_str(&cause.to_string());
    source = cause.source();
  }
  rendered
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_event_captures_thread() {
    let handle = std::thread::Builder::new()
      .name("worker-7".to_string())
      .spawn(|| LogEvent::new(Level::Info, "a.b", "hello"))
      .unwrap();
    let event = handle.join().unwrap();
    assert_eq!(event.thread_name.as_deref(), Some("worker-7"));
    let id = event.thread_id.unwrap();
    assert!(id.chars().all(|c| c.is_ascii_digit()), "unexpected id {}", id);
    assert!(event.context_data.is_empty());
  }

  #[test]
  fn render_error_walks_sources() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
    let err = crate::error::Error::ConfigRead(io);
    assert_eq!(
      render_error(&err),
      "Failed to read configuration file: disk gone: disk gone"
    );
  }
}
