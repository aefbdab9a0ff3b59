// src/appender/mod.rs
//! Destinations for log events.

mod console;
mod file;
mod memory;

pub use console::{ConsoleAppender, ConsoleTarget};
pub use file::FileAppender;
pub use memory::MemoryAppender;

use crate::error::Result;
use crate::model::LogEvent;

use std::any::Any;
use std::fmt;
use std::time::Duration;

/// A named sink owned by a configuration.
///
/// Appenders are started when their configuration starts and stopped after
/// a newer configuration has taken over. Appending to an appender that is not
/// started is an error.
pub trait Appender: Send + Sync + fmt::Debug {
  fn name(&self) -> &str;

  fn append(&self, event: &LogEvent) -> Result<()>;

  fn start(&self) -> Result<()>;

  /// Releases resources, waiting at most `timeout` for buffered output.
  /// Returns `false` if the appender could not stop in time.
  fn stop(&self, timeout: Duration) -> bool;

  fn is_started(&self) -> bool;

  fn as_any(&self) -> &dyn Any;
}
