// src/appender/memory.rs

use super::Appender;
use crate::error::{Error, Result};
use crate::model::LogEvent;

use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Keeps events in memory. Useful for tests and for inspecting what a
/// configuration routes where.
#[derive(Debug)]
pub struct MemoryAppender {
  name: String,
  events: Mutex<Vec<LogEvent>>,
  started: AtomicBool,
}

impl MemoryAppender {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      events: Mutex::new(Vec::new()),
      started: AtomicBool::new(false),
    }
  }

  pub fn events(&self) -> Vec<LogEvent> {
    self.events.lock().clone()
  }

  /// Drains the recorded events.
  pub fn take(&self) -> Vec<LogEvent> {
    std::mem::take(&mut *self.events.lock())
  }

  pub fn messages(&self) -> Vec<String> {
    self.events.lock().iter().map(|e| e.message.clone()).collect()
  }

  pub fn len(&self) -> usize {
    self.events.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.events.lock().is_empty()
  }

  pub fn clear(&self) {
    self.events.lock().clear();
  }
}

impl Appender for MemoryAppender {
  fn name(&self) -> &str {
    &self.name
  }

  fn append(&self, event: &LogEvent) -> Result<()> {
    if !self.is_started() {
      return Err(Error::AppenderWrite {
        appender_name: self.name.clone(),
        reason: "appender is not started".to_string(),
      });
    }
    self.events.lock().push(event.clone());
    Ok(())
  }

  fn start(&self) -> Result<()> {
    self.started.store(true, Ordering::Release);
    Ok(())
  }

  fn stop(&self, _timeout: Duration) -> bool {
    self.started.store(false, Ordering::Release);
    true
  }

  fn is_started(&self) -> bool {
    self.started.load(Ordering::Acquire)
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}
