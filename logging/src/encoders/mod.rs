// src/encoders/mod.rs
//! Defines strategies for formatting LogEvents into byte streams.

use crate::config::EncoderConfig;
use crate::error::Result;
use crate::model::LogEvent;

pub mod pattern;
pub mod util;

pub use pattern::PatternLayout;

/// Trait for types that can format a `LogEvent` into a byte vector.
pub trait EventFormatter: Send + Sync + std::fmt::Debug + 'static {
  /// Formats the given `LogEvent` into a `Vec<u8>`.
  /// The output should include a trailing newline for line-based sinks.
  fn format_event(&self, event: &LogEvent) -> Result<Vec<u8>>;
}

/// Creates an `EventFormatter` instance based on the processed encoder configuration.
pub(crate) fn new_event_formatter(config: &EncoderConfig) -> Box<dyn EventFormatter> {
  match config {
    EncoderConfig::Pattern { pattern } => Box::new(PatternLayout::new(pattern)),
  }
}
