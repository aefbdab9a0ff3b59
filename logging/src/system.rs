// src/system.rs
//! Process-level ownership of registries.

use crate::logger::NamedLogger;
use crate::registry::ContextRegistry;
use crate::status::StatusLogger;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_CONTEXT_NAME: &str = "default";

static GLOBAL: Lazy<LoggingSystem> = Lazy::new(LoggingSystem::new);

/// Owns the registries of a process, keyed by name.
///
/// Most applications use the instance behind [`LoggingSystem::global`].
/// Components that need logging can also be handed an explicitly
/// constructed system, which keeps tests isolated from each other.
#[derive(Debug, Default)]
pub struct LoggingSystem {
  contexts: RwLock<HashMap<String, Arc<ContextRegistry>>>,
}

impl LoggingSystem {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn global() -> &'static LoggingSystem {
    &GLOBAL
  }

  /// Returns the registry called `name`, creating and starting it if needed.
  pub fn context(&self, name: &str) -> Arc<ContextRegistry> {
    if let Some(context) = self.contexts.read().get(name) {
      return context.clone();
    }
    let context = self
      .contexts
      .write()
      .entry(name.to_string())
      .or_insert_with(|| ContextRegistry::new(name))
      .clone();
    context.start();
    context
  }

  pub fn default_context(&self) -> Arc<ContextRegistry> {
    self.context(DEFAULT_CONTEXT_NAME)
  }

  /// Registers an already built registry under its own name, replacing any
  /// previous one. Returns the replaced registry without stopping it.
  pub fn insert_context(&self, context: Arc<ContextRegistry>) -> Option<Arc<ContextRegistry>> {
    self
      .contexts
      .write()
      .insert(context.name().to_string(), context)
  }

  /// Removes a registry. The caller owns stopping it.
  pub fn remove_context(&self, name: &str) -> Option<Arc<ContextRegistry>> {
    self.contexts.write().remove(name)
  }

  pub fn contexts(&self) -> Vec<Arc<ContextRegistry>> {
    self.contexts.read().values().cloned().collect()
  }

  /// Shorthand for `default_context().get_logger(name)`.
  pub fn logger(&self, name: &str) -> Arc<NamedLogger> {
    self.default_context().get_logger(name)
  }

  /// Stops and removes every registry, sharing `timeout` between them.
  /// Returns `false` if any of them did not stop in time.
  pub fn shutdown(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let contexts: Vec<Arc<ContextRegistry>> = self.contexts.write().drain().map(|(_, c)| c).collect();

    let mut stopped = true;
    for context in contexts {
      stopped &= context.stop_timeout(deadline.saturating_duration_since(Instant::now()));
    }
    if !stopped {
      StatusLogger::global().warn(format!("Logging system did not stop within {:?}", timeout));
    }
    stopped
  }
}
