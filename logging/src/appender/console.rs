// src/appender/console.rs

use super::Appender;
use crate::encoders::EventFormatter;
use crate::error::{Error, Result};
use crate::model::LogEvent;

use serde::Deserialize;
use std::any::Any;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleTarget {
  #[default]
  Stdout,
  Stderr,
}

/// Writes formatted events to stdout or stderr.
#[derive(Debug)]
pub struct ConsoleAppender {
  name: String,
  target: ConsoleTarget,
  formatter: Box<dyn EventFormatter>,
  started: AtomicBool,
}

impl ConsoleAppender {
  pub fn new(name: impl Into<String>, target: ConsoleTarget, formatter: Box<dyn EventFormatter>) -> Self {
    Self {
      name: name.into(),
      target,
      formatter,
      started: AtomicBool::new(false),
    }
  }

  pub fn target(&self) -> ConsoleTarget {
    self.target
  }

  fn write_error(&self, reason: impl ToString) -> Error {
    Error::AppenderWrite {
      appender_name: self.name.clone(),
      reason: reason.to_string(),
    }
  }
}

impl Appender for ConsoleAppender {
  fn name(&self) -> &str {
    &self.name
  }

  fn append(&self, event: &LogEvent) -> Result<()> {
    if !self.is_started() {
      return Err(self.write_error("appender is not started"));
    }
    let bytes = self.formatter.format_event(event)?;
    let written = match self.target {
      ConsoleTarget::Stdout => io::stdout().lock().write_all(&bytes),
      ConsoleTarget::Stderr => io::stderr().lock().write_all(&bytes),
    };
    written.map_err(|e| self.write_error(e))
  }

  fn start(&self) -> Result<()> {
    self.started.store(true, Ordering::Release);
    Ok(())
  }

  fn stop(&self, _timeout: Duration) -> bool {
    self.started.store(false, Ordering::Release);
    let _ = match self.target {
      ConsoleTarget::Stdout => io::stdout().flush(),
      ConsoleTarget::Stderr => io::stderr().flush(),
    };
    true
  }

  fn is_started(&self) -> bool {
    self.started.load(Ordering::Acquire)
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}
