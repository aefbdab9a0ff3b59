// src/subscriber/log_handler.rs

use crate::error::{Error, Result};
use crate::level::Level;
use crate::model::Location;
use crate::registry::ContextRegistry;

use log::{LevelFilter, Metadata as LogMetadata, Record};
use std::sync::Arc;

/// Facade name recorded on events that arrive through [`LogBridge`].
pub const LOG_FQCN: &str = "fibre_context::subscriber::LogBridge";

/// A `log::Log` implementation that logs each record on the registry's
/// logger named after the record's target.
#[derive(Debug, Clone)]
pub struct LogBridge {
  context: Arc<ContextRegistry>,
}

impl LogBridge {
  pub fn new(context: Arc<ContextRegistry>) -> Self {
    Self { context }
  }

  /// Installs the bridge as the `log` crate's global logger. Level checks
  /// are left to the registry, so the `log` max level is raised to `Trace`.
  pub fn install(context: Arc<ContextRegistry>) -> Result<()> {
    log::set_boxed_logger(Box::new(Self::new(context)))
      .map_err(|e| Error::LogBridgeInit(e.to_string()))?;
    log::set_max_level(LevelFilter::Trace);
    Ok(())
  }
}

impl log::Log for LogBridge {
  fn enabled(&self, metadata: &LogMetadata) -> bool {
    self
      .context
      .get_logger(metadata.target())
      .is_enabled(Level::from(metadata.level()))
  }

  fn log(&self, record: &Record) {
    let logger = self.context.get_logger(record.target());
    let location = match (record.file_static(), record.line()) {
      (Some(file), Some(line)) => Some(Location {
        file,
        line,
        column: 0,
      }),
      _ => None,
    };

    logger
      .at(Level::from(record.level()))
      .fqcn(LOG_FQCN)
      .location(location)
      .log(*record.args());
  }

  fn flush(&self) {
    // Appenders flush when their configuration stops.
  }
}
