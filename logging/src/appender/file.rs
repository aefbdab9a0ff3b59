// src/appender/file.rs

use super::Appender;
use crate::encoders::EventFormatter;
use crate::error::{Error, Result};
use crate::model::LogEvent;

use parking_lot::Mutex;
use std::any::Any;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

/// Appends formatted events to a file through a `tracing_appender`
/// non-blocking writer.
///
/// The file is opened on `start` and the worker guard is held until `stop`,
/// which flushes anything still buffered.
pub struct FileAppender {
  name: String,
  path: PathBuf,
  formatter: Box<dyn EventFormatter>,
  writer: Mutex<Option<(NonBlocking, WorkerGuard)>>,
}

impl std::fmt::Debug for FileAppender {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FileAppender")
      .field("name", &self.name)
      .field("path", &self.path)
      .field("formatter", &self.formatter)
      .field("started", &self.is_started())
      .finish()
  }
}

impl FileAppender {
  pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, formatter: Box<dyn EventFormatter>) -> Self {
    Self {
      name: name.into(),
      path: path.into(),
      formatter,
      writer: Mutex::new(None),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn setup_error(&self, reason: String) -> Error {
    Error::AppenderSetup {
      appender_name: self.name.clone(),
      reason,
    }
  }
}

impl Appender for FileAppender {
  fn name(&self) -> &str {
    &self.name
  }

  fn append(&self, event: &LogEvent) -> Result<()> {
    let bytes = self.formatter.format_event(event)?;
    let mut guard = self.writer.lock();
    let Some((writer, _)) = guard.as_mut() else {
      return Err(Error::AppenderWrite {
        appender_name: self.name.clone(),
        reason: "appender is not started".to_string(),
      });
    };
    writer.write_all(&bytes).map_err(|e| Error::AppenderWrite {
      appender_name: self.name.clone(),
      reason: e.to_string(),
    })
  }

  fn start(&self) -> Result<()> {
    let mut guard = self.writer.lock();
    if guard.is_some() {
      return Ok(());
    }

    if let Some(parent_dir) = self.path.parent() {
      if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
        std::fs::create_dir_all(parent_dir).map_err(|e| {
          self.setup_error(format!("Failed to create directory {:?}: {}", parent_dir, e))
        })?;
      }
    }

    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .map_err(|e| self.setup_error(format!("Failed to open file {:?}: {}", self.path, e)))?;

    let (writer, worker_guard) = NonBlockingBuilder::default().lossy(false).finish(file);
    *guard = Some((writer, worker_guard));
    Ok(())
  }

  fn stop(&self, _timeout: Duration) -> bool {
    // Dropping the guard flushes the worker. It bounds its own wait.
    let taken = self.writer.lock().take();
    drop(taken);
    true
  }

  fn is_started(&self) -> bool {
    self.writer.lock().is_some()
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}
