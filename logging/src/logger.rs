// src/logger.rs
//! Named loggers: the application-facing entry point for log calls.

use crate::binding::ConfigBinding;
use crate::config::{Configuration, LoggerConfig};
use crate::delivery::DeliveryRequest;
use crate::error_handling::{panic_message, InternalErrorReport, InternalErrorSource};
use crate::level::Level;
use crate::marker::Marker;
use crate::message::{Message, MessageFactory};
use crate::model::Location;
use crate::registry::ContextRegistry;
use crate::status::StatusLogger;

use arc_swap::ArcSwap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

/// Facade name recorded on events created through [`NamedLogger`].
pub const FQCN: &str = "fibre_context::logger::NamedLogger";

/// A logger bound to the current configuration of its registry.
///
/// Every call loads the current [`ConfigBinding`] once, runs the filtering
/// cascade against it and, if accepted, delivers through it. The binding is
/// replaced atomically on a level change or a configuration swap; calls in
/// progress finish against the binding they loaded.
pub struct NamedLogger {
  name: String,
  message_factory: Arc<dyn MessageFactory>,
  binding: ArcSwap<ConfigBinding>,
  context: Weak<ContextRegistry>,
}

impl fmt::Debug for NamedLogger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NamedLogger")
      .field("name", &self.name)
      .field("level", &self.level())
      .field("message_factory", &self.message_factory.name())
      .finish()
  }
}

impl NamedLogger {
  pub(crate) fn new(
    name: &str,
    message_factory: Arc<dyn MessageFactory>,
    configuration: Arc<Configuration>,
    context: Weak<ContextRegistry>,
  ) -> Self {
    Self {
      name: name.to_string(),
      binding: ArcSwap::from_pointee(ConfigBinding::new(configuration, name, None)),
      message_factory,
      context,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn message_factory(&self) -> &Arc<dyn MessageFactory> {
    &self.message_factory
  }

  /// The registry that created this logger, if it is still alive.
  pub fn context(&self) -> Option<Arc<ContextRegistry>> {
    self.context.upgrade()
  }

  /// The binding calls are currently evaluated against.
  pub fn binding(&self) -> Arc<ConfigBinding> {
    self.binding.load_full()
  }

  pub fn level(&self) -> Level {
    self.binding.load().level()
  }

  pub fn is_enabled(&self, level: Level) -> bool {
    self.binding.load().filter(level, None, None)
  }

  pub fn is_enabled_for_marker(&self, level: Level, marker: &Marker) -> bool {
    self.binding.load().filter(level, Some(marker), None)
  }

  /// Replaces the binding with one at `level`. `None` takes the parent
  /// logger's current level; later changes to the parent are not followed.
  pub fn set_level(&self, level: Option<Level>) {
    let resolved = match level {
      Some(level) => level,
      None => self.inherited_level(),
    };
    self
      .binding
      .rcu(|current| Arc::new(current.with_level(resolved)));
  }

  /// The logger for the parent of this logger's config, or `None` for the
  /// root logger.
  pub fn parent(&self) -> Option<Arc<NamedLogger>> {
    let parent = self.parent_config()?;
    let context = self.context.upgrade()?;
    Some(context.get_logger_with_factory(parent.name(), self.message_factory.clone()))
  }

  /// Rebinds against `configuration`. Any level set through
  /// [`set_level`](Self::set_level) is replaced by the configured one.
  pub(crate) fn update_configuration(&self, configuration: &Arc<Configuration>) {
    self.binding.store(Arc::new(ConfigBinding::new(
      configuration.clone(),
      &self.name,
      None,
    )));
  }

  fn parent_config(&self) -> Option<Arc<LoggerConfig>> {
    let binding = self.binding.load();
    let config = binding.logger_config();
    if config.name() == self.name {
      config.parent().cloned()
    } else {
      Some(config.clone())
    }
  }

  fn inherited_level(&self) -> Level {
    match self.parent_config() {
      Some(parent) => match self.context.upgrade() {
        Some(context) => context
          .get_logger_with_factory(parent.name(), self.message_factory.clone())
          .level(),
        None => parent.level(),
      },
      None => self.binding.load().logger_config().level(),
    }
  }

  #[track_caller]
  pub fn log(&self, level: Level, message: impl Into<Message>) {
    let location = Location::from(std::panic::Location::caller());
    self.log_message(level, None, None, Some(location), FQCN, message.into());
  }

  /// Formats `pattern` with the logger's message factory, but only once the
  /// call has been accepted.
  #[track_caller]
  pub fn log_args(&self, level: Level, pattern: &str, args: &[&dyn fmt::Display]) {
    let location = Location::from(std::panic::Location::caller());
    let binding = self.binding.load();
    if binding.filter(level, None, Some(pattern)) {
      let message = self.message_factory.new_message(pattern, args);
      self.emit(&binding, level, None, None, Some(location), FQCN, &message);
    }
  }

  #[track_caller]
  pub fn trace(&self, message: impl Into<Message>) {
    self.log(Level::Trace, message)
  }

  #[track_caller]
  pub fn debug(&self, message: impl Into<Message>) {
    self.log(Level::Debug, message)
  }

  #[track_caller]
  pub fn info(&self, message: impl Into<Message>) {
    self.log(Level::Info, message)
  }

  #[track_caller]
  pub fn warn(&self, message: impl Into<Message>) {
    self.log(Level::Warn, message)
  }

  #[track_caller]
  pub fn error(&self, message: impl Into<Message>) {
    self.log(Level::Error, message)
  }

  #[track_caller]
  pub fn fatal(&self, message: impl Into<Message>) {
    self.log(Level::Fatal, message)
  }

  /// Starts a call that carries a marker, an error or an explicit location.
  #[track_caller]
  pub fn at(&self, level: Level) -> LogBuilder<'_> {
    LogBuilder {
      logger: self,
      level,
      marker: None,
      error: None,
      location: Some(Location::from(std::panic::Location::caller())),
      fqcn: FQCN,
    }
  }

  fn log_message(
    &self,
    level: Level,
    marker: Option<&Marker>,
    error: Option<&(dyn std::error::Error + 'static)>,
    location: Option<Location>,
    fqcn: &'static str,
    message: Message,
  ) {
    let binding = self.binding.load();
    if binding.filter(level, marker, Some(message.pattern())) {
      self.emit(&binding, level, marker, error, location, fqcn, &message);
    }
  }

  #[allow(clippy::too_many_arguments)]
  fn emit(
    &self,
    binding: &ConfigBinding,
    level: Level,
    marker: Option<&Marker>,
    error: Option<&(dyn std::error::Error + 'static)>,
    location: Option<Location>,
    fqcn: &'static str,
    message: &Message,
  ) {
    let request = DeliveryRequest {
      logger_name: &self.name,
      fqcn,
      marker,
      level,
      message,
      error,
      location,
    };
    // Appender and logger-filter panics stop here; the global filter
    // catches its own in `ConfigBinding::filter`.
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| binding.deliver(&request))) {
      StatusLogger::global().report(InternalErrorReport::from_message(
        InternalErrorSource::Delivery {
          logger_name: self.name.clone(),
        },
        panic_message(payload.as_ref()),
        None,
      ));
    }
  }
}

/// A log call under construction. See [`NamedLogger::at`].
#[must_use = "a LogBuilder does nothing until `log` or `log_args` is called"]
pub struct LogBuilder<'a> {
  logger: &'a NamedLogger,
  level: Level,
  marker: Option<&'a Marker>,
  error: Option<&'a (dyn std::error::Error + 'static)>,
  location: Option<Location>,
  fqcn: &'static str,
}

impl<'a> LogBuilder<'a> {
  pub fn marker(mut self, marker: &'a Marker) -> Self {
    self.marker = Some(marker);
    self
  }

  pub fn error(mut self, error: &'a (dyn std::error::Error + 'static)) -> Self {
    self.error = Some(error);
    self
  }

  /// Overrides the call site captured by [`NamedLogger::at`]. `None` drops
  /// it.
  pub fn location(mut self, location: impl Into<Option<Location>>) -> Self {
    self.location = location.into();
    self
  }

  /// Records the facade that made the call, for bridges that wrap this
  /// logger.
  pub fn fqcn(mut self, fqcn: &'static str) -> Self {
    self.fqcn = fqcn;
    self
  }

  pub fn log(self, message: impl Into<Message>) {
    self.logger.log_message(
      self.level,
      self.marker,
      self.error,
      self.location,
      self.fqcn,
      message.into(),
    );
  }

  pub fn log_args(self, pattern: &str, args: &[&dyn fmt::Display]) {
    let binding = self.logger.binding.load();
    if binding.filter(self.level, self.marker, Some(pattern)) {
      let message = self.logger.message_factory.new_message(pattern, args);
      self.logger.emit(
        &binding,
        self.level,
        self.marker,
        self.error,
        self.location,
        self.fqcn,
        &message,
      );
    }
  }
}
