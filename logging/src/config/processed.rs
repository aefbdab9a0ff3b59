// src/config/processed.rs

use crate::appender::{Appender, ConsoleAppender, ConsoleTarget, FileAppender, MemoryAppender};
use crate::config::raw::{AppenderConfigRaw, ConfigRaw, FilterConfigRaw, LoggerConfigRaw};
use crate::context::{ContextDataInjector, ThreadContextDataInjector};
use crate::delivery::{new_strategy, DeliveryKind, DeliveryStrategy, DEFAULT_QUEUE_CAPACITY};
use crate::encoders::{self, pattern::DEFAULT_PATTERN};
use crate::error::{Error, Result};
use crate::error_handling::{InternalErrorReport, InternalErrorSource};
use crate::filter::{
  CompositeFilter, ContextMapFilter, Filter, FilterResult, MarkerFilter, ThresholdFilter,
};
use crate::level::Level;
use crate::lifecycle::{LifeCycle, LifeCycleState};
use crate::model::LogEvent;
use crate::status::StatusLogger;

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

pub const ROOT_LOGGER_NAME: &str = "";
pub const DEFAULT_CONFIGURATION_NAME: &str = "fibre_context";
pub const NULL_CONFIGURATION_NAME: &str = "Null";
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// --- Properties ---

/// A name/value pair declared on a logger and added to the context data of
/// its events. Values may reference configuration properties as `${name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
  name: String,
  value: String,
}

impl Property {
  pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      value: value.into(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn value(&self) -> &str {
    &self.value
  }

  pub fn needs_lookup(&self) -> bool {
    self.value.contains("${")
  }
}

// --- Encoders ---

#[derive(Debug, Clone, PartialEq)]
pub enum EncoderConfig {
  Pattern { pattern: String },
}

impl Default for EncoderConfig {
  fn default() -> Self {
    EncoderConfig::Pattern {
      pattern: DEFAULT_PATTERN.to_string(),
    }
  }
}

// --- Logger Configs ---

#[derive(Debug, Clone)]
pub struct AppenderRef {
  pub appender: Arc<dyn Appender>,
  /// Only events at this level or more severe reach the appender.
  pub level: Option<Level>,
}

/// The resolved settings for one configured logger name.
#[derive(Debug)]
pub struct LoggerConfig {
  name: String,
  level: Level,
  explicit_level: Option<Level>,
  additive: bool,
  include_location: bool,
  filter: Option<Arc<dyn Filter>>,
  appender_refs: Vec<AppenderRef>,
  properties: Vec<Property>,
  parent: Option<Arc<LoggerConfig>>,
  delivery: Arc<dyn DeliveryStrategy>,
}

impl LoggerConfig {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_root(&self) -> bool {
    self.name == ROOT_LOGGER_NAME
  }

  /// Effective level, inherited from the nearest configured ancestor when
  /// none was declared.
  pub fn level(&self) -> Level {
    self.level
  }

  pub fn explicit_level(&self) -> Option<Level> {
    self.explicit_level
  }

  pub fn is_additive(&self) -> bool {
    self.additive
  }

  pub fn include_location(&self) -> bool {
    self.include_location
  }

  pub fn filter(&self) -> Option<&Arc<dyn Filter>> {
    self.filter.as_ref()
  }

  pub fn appender_refs(&self) -> &[AppenderRef] {
    &self.appender_refs
  }

  pub fn properties(&self) -> &[Property] {
    &self.properties
  }

  pub fn parent(&self) -> Option<&Arc<LoggerConfig>> {
    self.parent.as_ref()
  }

  pub fn delivery(&self) -> &Arc<dyn DeliveryStrategy> {
    &self.delivery
  }

  /// Routes an event to this config's appenders, then to the parent's when
  /// additive. A `Deny` from this config's filter stops the event here.
  pub fn log_event(&self, event: &LogEvent) {
    if let Some(filter) = &self.filter {
      if filter.filter_event(event) == FilterResult::Deny {
        return;
      }
    }

    for appender_ref in &self.appender_refs {
      if let Some(level) = appender_ref.level {
        if !event.level.is_less_specific_than(level) {
          continue;
        }
      }
      if let Err(e) = appender_ref.appender.append(event) {
        StatusLogger::global().report(InternalErrorReport::new(
          InternalErrorSource::AppenderWrite {
            appender_name: appender_ref.appender.name().to_string(),
          },
          &e,
          Some(format!("logger '{}'", event.logger_name)),
        ));
      }
    }

    if self.additive {
      if let Some(parent) = &self.parent {
        parent.log_event(event);
      }
    }
  }
}

/// Returns the name one segment up, splitting on `.` or `::`.
pub fn parent_logger_name(name: &str) -> Option<&str> {
  let by_path = name.rfind("::");
  let by_dot = name.rfind('.');
  match (by_path, by_dot) {
    (Some(p), Some(d)) if d > p => Some(&name[..d]),
    (Some(p), _) => Some(&name[..p]),
    (None, Some(d)) => Some(&name[..d]),
    (None, None) => None,
  }
}

fn logger_depth(name: &str) -> usize {
  name.split("::").flat_map(|s| s.split('.')).count()
}

// --- Configuration ---

/// Receives reload requests from a configuration, typically the registry
/// that owns it.
pub trait ConfigurationListener: Send + Sync {
  fn on_change(&self, configuration: &Configuration);
}

/// A complete, immutable routing setup: logger configs, appenders, the
/// global filter and the context data injector.
///
/// Only the property table is mutable, so that an owning registry can add
/// its defaults before the configuration is started.
#[derive(Debug)]
pub struct Configuration {
  name: String,
  root: Arc<LoggerConfig>,
  loggers: HashMap<String, Arc<LoggerConfig>>,
  appenders: HashMap<String, Arc<dyn Appender>>,
  filter: Option<Arc<dyn Filter>>,
  properties: RwLock<BTreeMap<String, String>>,
  injector: Arc<dyn ContextDataInjector>,
  strategies: Vec<Arc<dyn DeliveryStrategy>>,
  shutdown_timeout: Duration,
  source: Option<PathBuf>,
  lifecycle: LifeCycle,
  listeners: Mutex<Vec<Weak<dyn ConfigurationListener>>>,
}

impl Configuration {
  pub fn builder(name: impl Into<String>) -> ConfigurationBuilder {
    ConfigurationBuilder::new(name)
  }

  /// Root at `Off`, no appenders. Installed while a registry shuts down.
  pub fn null() -> Self {
    let built = ConfigurationBuilder::new(NULL_CONFIGURATION_NAME)
      .root(LoggerSpec::root().level(Level::Off))
      .build();
    match built {
      Ok(config) => config,
      Err(_) => unreachable_config(NULL_CONFIGURATION_NAME),
    }
  }

  /// Root at `Error` writing to stderr. Used until a real configuration is
  /// installed.
  pub fn default_console() -> Self {
    let console: Arc<dyn Appender> = Arc::new(ConsoleAppender::new(
      "DefaultConsole",
      ConsoleTarget::Stderr,
      encoders::new_event_formatter(&EncoderConfig::default()),
    ));
    let built = ConfigurationBuilder::new("Default")
      .appender(console)
      .root(LoggerSpec::root().level(Level::Error).appender("DefaultConsole"))
      .build();
    match built {
      Ok(config) => config,
      Err(_) => unreachable_config("Default"),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn root_logger_config(&self) -> &Arc<LoggerConfig> {
    &self.root
  }

  /// The config for `name`: its own if declared, otherwise the nearest
  /// declared ancestor's, otherwise the root's.
  pub fn logger_config(&self, name: &str) -> Arc<LoggerConfig> {
    let mut current = Some(name);
    while let Some(candidate) = current {
      if let Some(config) = self.loggers.get(candidate) {
        return config.clone();
      }
      current = parent_logger_name(candidate);
    }
    self.root.clone()
  }

  /// Declared logger configs, root excluded.
  pub fn logger_configs(&self) -> &HashMap<String, Arc<LoggerConfig>> {
    &self.loggers
  }

  pub fn appender(&self, name: &str) -> Option<&Arc<dyn Appender>> {
    self.appenders.get(name)
  }

  /// Looks up an appender by name and concrete type.
  pub fn appender_as<T: 'static>(&self, name: &str) -> Option<&T> {
    self.appenders.get(name)?.as_any().downcast_ref::<T>()
  }

  pub fn appenders(&self) -> &HashMap<String, Arc<dyn Appender>> {
    &self.appenders
  }

  pub fn filter(&self) -> Option<&Arc<dyn Filter>> {
    self.filter.as_ref()
  }

  pub fn injector(&self) -> &Arc<dyn ContextDataInjector> {
    &self.injector
  }

  pub fn shutdown_timeout(&self) -> Duration {
    self.shutdown_timeout
  }

  /// File this configuration was loaded from, if any.
  pub fn source(&self) -> Option<&Path> {
    self.source.as_deref()
  }

  pub fn property(&self, name: &str) -> Option<String> {
    self.properties.read().get(name).cloned()
  }

  pub fn properties(&self) -> BTreeMap<String, String> {
    self.properties.read().clone()
  }

  /// Inserts `name` unless already present. Returns whether it was inserted.
  pub fn put_property_if_absent(&self, name: &str, value: &str) -> bool {
    let mut properties = self.properties.write();
    if properties.contains_key(name) {
      return false;
    }
    properties.insert(name.to_string(), value.to_string());
    true
  }

  /// Replaces `${name}` references with configuration properties. Unknown
  /// names are left as written.
  pub fn substitute(&self, value: &str) -> String {
    if !value.contains("${") {
      return value.to_string();
    }
    let properties = self.properties.read();
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
      out.push_str(&rest[..start]);
      let after = &rest[start + 2..];
      match after.find('}') {
        Some(end) => {
          let key = &after[..end];
          match properties.get(key) {
            Some(resolved) => out.push_str(resolved),
            None => {
              out.push_str("${");
              out.push_str(key);
              out.push('}');
            }
          }
          rest = &after[end + 1..];
        }
        None => {
          out.push_str(&rest[start..]);
          rest = "";
        }
      }
    }
    out.push_str(rest);
    out
  }

  pub fn state(&self) -> LifeCycleState {
    self.lifecycle.state()
  }

  pub fn is_started(&self) -> bool {
    self.lifecycle.is_started()
  }

  /// Starts delivery strategies and appenders. Idempotent once started.
  /// Appender failures are reported and do not prevent startup.
  pub fn start(&self) {
    if !self.lifecycle.begin_start() {
      return;
    }
    for strategy in &self.strategies {
      strategy.start();
    }
    for appender in self.appenders.values() {
      if let Err(e) = appender.start() {
        StatusLogger::global().report(InternalErrorReport::new(
          InternalErrorSource::AppenderLifecycle {
            appender_name: appender.name().to_string(),
          },
          &e,
          Some(format!("starting configuration '{}'", self.name)),
        ));
      }
    }
    self.lifecycle.set(LifeCycleState::Started);
  }

  /// Waits for delivery strategies, then stops appenders, all within
  /// `timeout`. Returns `false` if anything did not finish in time.
  pub fn stop(&self, timeout: Duration) -> bool {
    if !self.lifecycle.begin_stop() {
      return self.lifecycle.is_stopped();
    }
    let deadline = Instant::now() + timeout;
    let remaining = || deadline.saturating_duration_since(Instant::now());

    let mut stopped = true;
    for strategy in &self.strategies {
      stopped &= strategy.before_stop(remaining());
    }
    for appender in self.appenders.values() {
      stopped &= appender.stop(remaining());
    }
    self.lifecycle.set(LifeCycleState::Stopped);

    if !stopped {
      StatusLogger::global().warn(format!(
        "Configuration '{}' did not stop within {:?}",
        self.name, timeout
      ));
    }
    stopped
  }

  pub fn add_listener(&self, listener: Weak<dyn ConfigurationListener>) {
    let mut listeners = self.listeners.lock();
    if !listeners.iter().any(|l| Weak::ptr_eq(l, &listener)) {
      listeners.push(listener);
    }
  }

  pub fn remove_listener(&self, listener: &Weak<dyn ConfigurationListener>) {
    self.listeners.lock().retain(|l| !Weak::ptr_eq(l, listener));
  }

  /// Asks every live listener to reload from this configuration's source.
  pub fn request_reload(&self) {
    let listeners: Vec<Arc<dyn ConfigurationListener>> = {
      let mut guard = self.listeners.lock();
      guard.retain(|l| l.strong_count() > 0);
      guard.iter().filter_map(Weak::upgrade).collect()
    };
    for listener in listeners {
      listener.on_change(self);
    }
  }
}

// The built-in configurations reference only their own appenders.
fn unreachable_config(name: &str) -> Configuration {
  StatusLogger::global().error(format!("Built-in configuration '{}' failed to build", name));
  Configuration {
    name: name.to_string(),
    root: Arc::new(LoggerConfig {
      name: ROOT_LOGGER_NAME.to_string(),
      level: Level::Off,
      explicit_level: Some(Level::Off),
      additive: false,
      include_location: false,
      filter: None,
      appender_refs: Vec::new(),
      properties: Vec::new(),
      parent: None,
      delivery: new_strategy(DeliveryKind::default(), DEFAULT_QUEUE_CAPACITY),
    }),
    loggers: HashMap::new(),
    appenders: HashMap::new(),
    filter: None,
    properties: RwLock::new(BTreeMap::new()),
    injector: Arc::new(ThreadContextDataInjector::new()),
    strategies: Vec::new(),
    shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
    source: None,
    lifecycle: LifeCycle::new(),
    listeners: Mutex::new(Vec::new()),
  }
}

// --- Builder ---

/// Declarative description of one logger config.
#[derive(Debug, Clone)]
pub struct LoggerSpec {
  name: String,
  level: Option<Level>,
  appender_refs: Vec<(String, Option<Level>)>,
  additive: bool,
  include_location: bool,
  delivery: DeliveryKind,
  filter: Option<Arc<dyn Filter>>,
  properties: Vec<Property>,
}

impl LoggerSpec {
  pub fn new(name: impl Into<String>) -> Self {
    let name = name.into();
    let name = if name == "root" {
      ROOT_LOGGER_NAME.to_string()
    } else {
      name
    };
    Self {
      name,
      level: None,
      appender_refs: Vec::new(),
      additive: true,
      include_location: false,
      delivery: DeliveryKind::default(),
      filter: None,
      properties: Vec::new(),
    }
  }

  pub fn root() -> Self {
    Self::new(ROOT_LOGGER_NAME)
  }

  pub fn level(mut self, level: Level) -> Self {
    self.level = Some(level);
    self
  }

  pub fn appender(mut self, name: impl Into<String>) -> Self {
    self.appender_refs.push((name.into(), None));
    self
  }

  pub fn appender_with_level(mut self, name: impl Into<String>, level: Level) -> Self {
    self.appender_refs.push((name.into(), Some(level)));
    self
  }

  pub fn additive(mut self, additive: bool) -> Self {
    self.additive = additive;
    self
  }

  pub fn include_location(mut self, include: bool) -> Self {
    self.include_location = include;
    self
  }

  pub fn delivery(mut self, delivery: DeliveryKind) -> Self {
    self.delivery = delivery;
    self
  }

  pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
    self.filter = Some(filter);
    self
  }

  pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.properties.push(Property::new(name, value));
    self
  }

  fn is_root(&self) -> bool {
    self.name == ROOT_LOGGER_NAME
  }
}

/// Programmatic construction of a [`Configuration`].
#[derive(Debug)]
pub struct ConfigurationBuilder {
  name: String,
  properties: BTreeMap<String, String>,
  filter: Option<Arc<dyn Filter>>,
  appenders: Vec<Arc<dyn Appender>>,
  root: Option<LoggerSpec>,
  loggers: Vec<LoggerSpec>,
  shutdown_timeout: Duration,
  queue_capacity: usize,
  injector: Option<Arc<dyn ContextDataInjector>>,
  source: Option<PathBuf>,
}

impl ConfigurationBuilder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      properties: BTreeMap::new(),
      filter: None,
      appenders: Vec::new(),
      root: None,
      loggers: Vec::new(),
      shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
      queue_capacity: DEFAULT_QUEUE_CAPACITY,
      injector: None,
      source: None,
    }
  }

  pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.properties.insert(name.into(), value.into());
    self
  }

  pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
    self.filter = Some(filter);
    self
  }

  pub fn appender(mut self, appender: Arc<dyn Appender>) -> Self {
    self.appenders.push(appender);
    self
  }

  pub fn root(mut self, spec: LoggerSpec) -> Self {
    self.root = Some(spec);
    self
  }

  /// Adds a logger config. A spec named `root` (or `""`) replaces the root.
  pub fn logger(mut self, spec: LoggerSpec) -> Self {
    if spec.is_root() {
      self.root = Some(spec);
    } else {
      self.loggers.push(spec);
    }
    self
  }

  pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
    self.shutdown_timeout = timeout;
    self
  }

  pub fn queue_capacity(mut self, capacity: usize) -> Self {
    self.queue_capacity = capacity;
    self
  }

  pub fn injector(mut self, injector: Arc<dyn ContextDataInjector>) -> Self {
    self.injector = Some(injector);
    self
  }

  pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
    self.source = Some(path.into());
    self
  }

  pub fn build(self) -> Result<Configuration> {
    // 1. Appenders by name.
    let mut appenders: HashMap<String, Arc<dyn Appender>> = HashMap::new();
    for appender in self.appenders {
      let name = appender.name().to_string();
      if appenders.insert(name.clone(), appender).is_some() {
        return Err(Error::InvalidConfigValue {
          field: format!("appenders.{}", name),
          message: "Appender names must be unique.".to_string(),
        });
      }
    }

    // 2. One strategy instance per kind, shared by the loggers that use it.
    let mut strategies: HashMap<DeliveryKind, Arc<dyn DeliveryStrategy>> = HashMap::new();
    let queue_capacity = self.queue_capacity;
    let mut strategy_for = |kind: DeliveryKind| {
      strategies
        .entry(kind)
        .or_insert_with(|| new_strategy(kind, queue_capacity))
        .clone()
    };

    // 3. Root first, then loggers from shallowest to deepest so every
    // parent exists before its children.
    let root_spec = self.root.unwrap_or_else(|| {
      StatusLogger::global().debug(format!(
        "Configuration '{}' has no root logger, using INFO with no appenders",
        self.name
      ));
      LoggerSpec::root().level(Level::Info)
    });
    let root_level = root_spec.level.unwrap_or(Level::Info);
    let root_delivery = strategy_for(root_spec.delivery);
    let root = Arc::new(build_logger_config(
      root_spec,
      root_level,
      None,
      &appenders,
      root_delivery,
    )?);

    let mut specs = self.loggers;
    specs.sort_by(|a, b| {
      logger_depth(&a.name)
        .cmp(&logger_depth(&b.name))
        .then_with(|| a.name.cmp(&b.name))
    });

    let mut loggers: HashMap<String, Arc<LoggerConfig>> = HashMap::new();
    for spec in specs {
      if loggers.contains_key(&spec.name) {
        return Err(Error::InvalidConfigValue {
          field: format!("loggers.{}", spec.name),
          message: "Logger declared more than once.".to_string(),
        });
      }

      let mut parent = root.clone();
      let mut ancestor = parent_logger_name(&spec.name);
      while let Some(candidate) = ancestor {
        if let Some(found) = loggers.get(candidate) {
          parent = found.clone();
          break;
        }
        ancestor = parent_logger_name(candidate);
      }

      let level = spec.level.unwrap_or(parent.level());
      let name = spec.name.clone();
      let delivery = strategy_for(spec.delivery);
      let config = build_logger_config(spec, level, Some(parent), &appenders, delivery)?;
      loggers.insert(name, Arc::new(config));
    }

    let strategies = strategies.into_values().collect();

    Ok(Configuration {
      name: self.name,
      root,
      loggers,
      appenders,
      filter: self.filter,
      properties: RwLock::new(self.properties),
      injector: self
        .injector
        .unwrap_or_else(|| Arc::new(ThreadContextDataInjector::new())),
      strategies,
      shutdown_timeout: self.shutdown_timeout,
      source: self.source,
      lifecycle: LifeCycle::new(),
      listeners: Mutex::new(Vec::new()),
    })
  }
}

fn build_logger_config(
  spec: LoggerSpec,
  level: Level,
  parent: Option<Arc<LoggerConfig>>,
  appenders: &HashMap<String, Arc<dyn Appender>>,
  delivery: Arc<dyn DeliveryStrategy>,
) -> Result<LoggerConfig> {
  let display_name = if spec.is_root() { "root" } else { spec.name.as_str() };

  let mut appender_refs = Vec::with_capacity(spec.appender_refs.len());
  for (appender_name, ref_level) in &spec.appender_refs {
    let Some(appender) = appenders.get(appender_name) else {
      let mut available: Vec<&String> = appenders.keys().collect();
      available.sort();
      return Err(Error::InvalidConfigValue {
        field: format!("loggers.{}.appenders", display_name),
        message: format!(
          "Logger '{}' refers to undefined appender '{}'. Available appenders: {:?}",
          display_name, appender_name, available
        ),
      });
    };
    appender_refs.push(AppenderRef {
      appender: appender.clone(),
      level: *ref_level,
    });
  }

  Ok(LoggerConfig {
    name: spec.name,
    level,
    explicit_level: spec.level,
    additive: spec.additive,
    include_location: spec.include_location,
    filter: spec.filter,
    appender_refs,
    properties: spec.properties,
    parent,
    delivery,
  })
}

// --- Conversion and Validation Logic ---

/// Processes the raw, deserialized configuration into a builder holding
/// validated appenders, filters and logger specs.
pub fn process_raw_config(raw_config: ConfigRaw) -> Result<ConfigurationBuilder> {
  let name = raw_config
    .name
    .unwrap_or_else(|| DEFAULT_CONFIGURATION_NAME.to_string());
  let mut builder = ConfigurationBuilder::new(name);

  if let Some(timeout) = raw_config.shutdown_timeout {
    builder = builder.shutdown_timeout(timeout);
  }
  if let Some(capacity) = raw_config.queue_capacity {
    if capacity == 0 {
      return Err(Error::InvalidConfigValue {
        field: "queue_capacity".to_string(),
        message: "Queue capacity cannot be zero.".to_string(),
      });
    }
    builder = builder.queue_capacity(capacity);
  }
  for (key, value) in raw_config.properties {
    builder = builder.property(key, value);
  }
  if let Some(raw_filter) = &raw_config.filter {
    builder = builder.filter(process_filter_config_raw(raw_filter, "filter")?);
  }

  // 1. Process Appenders
  let mut appender_names: Vec<String> = raw_config.appenders.keys().cloned().collect();
  appender_names.sort();
  let mut raw_appenders = raw_config.appenders;
  for name in appender_names {
    let Some(raw_appender) = raw_appenders.remove(&name) else {
      continue;
    };
    let encoder = match raw_appender.encoder_config_raw() {
      Some(raw_encoder) => {
        if raw_encoder.pattern.is_empty() {
          return Err(Error::InvalidConfigValue {
            field: format!("appenders.{}.encoder.pattern", name),
            message: "Pattern cannot be empty.".to_string(),
          });
        }
        EncoderConfig::Pattern {
          pattern: raw_encoder.pattern.clone(),
        }
      }
      None => EncoderConfig::default(),
    };

    let appender: Arc<dyn Appender> = match raw_appender {
      AppenderConfigRaw::Console(raw_console) => Arc::new(ConsoleAppender::new(
        name.clone(),
        raw_console.target,
        encoders::new_event_formatter(&encoder),
      )),
      AppenderConfigRaw::File(raw_file) => {
        if raw_file.path.is_empty() {
          return Err(Error::InvalidConfigValue {
            field: format!("appenders.{}.path", name),
            message: "File appender path cannot be empty.".to_string(),
          });
        }
        Arc::new(FileAppender::new(
          name.clone(),
          PathBuf::from(raw_file.path),
          encoders::new_event_formatter(&encoder),
        ))
      }
      AppenderConfigRaw::Memory(_) => Arc::new(MemoryAppender::new(name.clone())),
    };
    builder = builder.appender(appender);
  }

  // 2. Process Loggers
  let mut raw_loggers = raw_config.loggers;
  if !raw_loggers.contains_key("root") {
    StatusLogger::global().info(
      "No 'root' logger defined, adding a default (level: INFO, appenders: none, additive: true).",
    );
    raw_loggers.insert(
      "root".to_string(),
      LoggerConfigRaw {
        level: Some(Level::Info),
        appenders: Vec::new(),
        additive: true,
        include_location: false,
        delivery: None,
        filter: None,
        properties: BTreeMap::new(),
      },
    );
  }

  for (name, raw_logger) in raw_loggers {
    if name.is_empty() {
      return Err(Error::InvalidConfigValue {
        field: "loggers".to_string(),
        message: "Logger names cannot be empty; use 'root'.".to_string(),
      });
    }
    let mut spec = LoggerSpec::new(name.as_str())
      .additive(raw_logger.additive)
      .include_location(raw_logger.include_location)
      .delivery(raw_logger.delivery.unwrap_or_default());
    if let Some(level) = raw_logger.level {
      spec = spec.level(level);
    }
    for appender_ref in &raw_logger.appenders {
      spec = match appender_ref.level() {
        Some(level) => spec.appender_with_level(appender_ref.name(), level),
        None => spec.appender(appender_ref.name()),
      };
    }
    if let Some(raw_filter) = &raw_logger.filter {
      spec = spec.filter(process_filter_config_raw(
        raw_filter,
        &format!("loggers.{}.filter", name),
      )?);
    }
    for (key, value) in raw_logger.properties {
      spec = spec.property(key, value);
    }
    builder = builder.logger(spec);
  }

  Ok(builder)
}

fn process_filter_config_raw(raw: &FilterConfigRaw, field: &str) -> Result<Arc<dyn Filter>> {
  let filter: Arc<dyn Filter> = match raw {
    FilterConfigRaw::Threshold {
      level,
      on_match,
      on_mismatch,
    } => Arc::new(ThresholdFilter::with_results(*level, *on_match, *on_mismatch)),
    FilterConfigRaw::Marker {
      marker,
      on_match,
      on_mismatch,
    } => {
      if marker.is_empty() {
        return Err(Error::InvalidConfigValue {
          field: format!("{}.marker", field),
          message: "Marker name cannot be empty.".to_string(),
        });
      }
      Arc::new(MarkerFilter {
        marker: marker.clone(),
        on_match: *on_match,
        on_mismatch: *on_mismatch,
      })
    }
    FilterConfigRaw::ContextMap {
      key,
      value,
      on_match,
      on_mismatch,
    } => Arc::new(ContextMapFilter {
      key: key.clone(),
      value: value.clone(),
      on_match: *on_match,
      on_mismatch: *on_mismatch,
    }),
    FilterConfigRaw::Composite { filters } => {
      let mut built = Vec::with_capacity(filters.len());
      for (i, child) in filters.iter().enumerate() {
        built.push(process_filter_config_raw(child, &format!("{}.filters[{}]", field, i))?);
      }
      Arc::new(CompositeFilter::new(built))
    }
  };
  Ok(filter)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::level::Level;
  use pretty_assertions::assert_eq;

  fn memory(name: &str) -> Arc<MemoryAppender> {
    let appender = Arc::new(MemoryAppender::new(name));
    appender.start().unwrap();
    appender
  }

  #[test]
  fn parent_names_split_on_both_separators() {
    assert_eq!(parent_logger_name("a.b.c"), Some("a.b"));
    assert_eq!(parent_logger_name("a::b::c"), Some("a::b"));
    assert_eq!(parent_logger_name("a::b.c"), Some("a::b"));
    assert_eq!(parent_logger_name("a.b::c"), Some("a.b"));
    assert_eq!(parent_logger_name("a"), None);
    assert_eq!(logger_depth("a::b.c"), 3);
  }

  #[test]
  fn lookup_walks_up_to_nearest_configured_ancestor() {
    let config = Configuration::builder("t")
      .root(LoggerSpec::root().level(Level::Warn))
      .logger(LoggerSpec::new("app").level(Level::Debug))
      .logger(LoggerSpec::new("app::db::pool"))
      .build()
      .unwrap();

    assert_eq!(config.logger_config("app::http").name(), "app");
    assert_eq!(config.logger_config("app::db::pool::conn").name(), "app::db::pool");
    assert!(config.logger_config("other").is_root());

    // Unset level inherits from the nearest configured ancestor.
    let pool = config.logger_config("app::db::pool");
    assert_eq!(pool.level(), Level::Debug);
    assert_eq!(pool.explicit_level(), None);
    assert_eq!(pool.parent().unwrap().name(), "app");
  }

  #[test]
  fn additivity_controls_parent_appenders() {
    let root_mem = memory("root_mem");
    let db_mem = memory("db_mem");
    let config = Configuration::builder("t")
      .appender(root_mem.clone())
      .appender(db_mem.clone())
      .root(LoggerSpec::root().level(Level::Info).appender("root_mem"))
      .logger(LoggerSpec::new("db").appender("db_mem"))
      .logger(LoggerSpec::new("db::quiet").appender("db_mem").additive(false))
      .build()
      .unwrap();

    config
      .logger_config("db")
      .log_event(&LogEvent::new(Level::Info, "db", "both"));
    config
      .logger_config("db::quiet")
      .log_event(&LogEvent::new(Level::Info, "db::quiet", "own only"));

    assert_eq!(db_mem.messages(), vec!["both", "own only"]);
    assert_eq!(root_mem.messages(), vec!["both"]);
  }

  #[test]
  fn appender_ref_level_and_logger_filter_apply() {
    let mem = memory("mem");
    let config = Configuration::builder("t")
      .appender(mem.clone())
      .root(
        LoggerSpec::root()
          .level(Level::Trace)
          .appender_with_level("mem", Level::Warn)
          .filter(Arc::new(ThresholdFilter::new(Level::Error))),
      )
      .build()
      .unwrap();

    let root = config.root_logger_config();
    root.log_event(&LogEvent::new(Level::Info, "x", "below ref level"));
    root.log_event(&LogEvent::new(Level::Warn, "x", "denied by filter"));
    root.log_event(&LogEvent::new(Level::Error, "x", "kept"));
    assert_eq!(mem.messages(), vec!["kept"]);
  }

  #[test]
  fn rejects_undefined_appender_reference() {
    let result = Configuration::builder("t")
      .root(LoggerSpec::root().appender("missing"))
      .build();
    assert!(matches!(result, Err(Error::InvalidConfigValue { .. })));
  }

  #[test]
  fn properties_and_substitution() {
    let config = Configuration::builder("t")
      .property("env", "prod")
      .build()
      .unwrap();
    assert!(config.put_property_if_absent("hostName", "box-1"));
    assert!(!config.put_property_if_absent("env", "dev"));
    assert_eq!(config.property("env").as_deref(), Some("prod"));
    assert_eq!(
      config.substitute("${env}@${hostName}/${unknown}/${open"),
      "prod@box-1/${unknown}/${open"
    );
  }

  #[test]
  fn null_and_default_configurations() {
    let null = Configuration::null();
    assert_eq!(null.root_logger_config().level(), Level::Off);
    assert!(null.appenders().is_empty());

    let default = Configuration::default_console();
    assert_eq!(default.root_logger_config().level(), Level::Error);
    assert!(default.appender("DefaultConsole").is_some());
  }

  #[test]
  fn start_and_stop_drive_appenders() {
    let mem = Arc::new(MemoryAppender::new("mem"));
    let config = Configuration::builder("t")
      .appender(mem.clone())
      .root(LoggerSpec::root().appender("mem").delivery(DeliveryKind::Queued))
      .build()
      .unwrap();

    assert_eq!(config.state(), LifeCycleState::Initialized);
    config.start();
    config.start();
    assert!(config.is_started());
    assert!(mem.is_started());
    assert!(config.stop(Duration::from_secs(1)));
    assert_eq!(config.state(), LifeCycleState::Stopped);
    assert!(!mem.is_started());
    assert!(config.stop(Duration::from_secs(1)));
  }

  #[test]
  fn stop_while_starting_is_not_reported_as_stopped() {
    let config = Configuration::builder("t").build().unwrap();
    config.lifecycle.set(LifeCycleState::Starting);
    assert!(!config.stop(Duration::from_millis(10)));
    assert_eq!(config.state(), LifeCycleState::Starting);
  }

  #[test]
  fn processes_raw_yaml() {
    let yaml = r#"
properties: { team: storage }
appenders:
  mem: { kind: memory }
loggers:
  root: { level: warn, appenders: [mem] }
  store.engine:
    appenders: [mem]
    additive: false
    properties: { owner: "${team}" }
"#;
    let raw: ConfigRaw = serde_yaml::from_str(yaml).unwrap();
    let config = process_raw_config(raw).unwrap().build().unwrap();
    assert_eq!(config.name(), DEFAULT_CONFIGURATION_NAME);
    assert!(config.appender_as::<MemoryAppender>("mem").is_some());

    let engine = config.logger_config("store.engine.cache");
    assert_eq!(engine.name(), "store.engine");
    assert_eq!(engine.level(), Level::Warn);
    assert!(!engine.is_additive());
    assert_eq!(engine.properties(), &[Property::new("owner", "${team}")]);
    assert_eq!(config.substitute(engine.properties()[0].value()), "storage");
  }

  #[test]
  fn missing_root_gets_info_default() {
    let raw: ConfigRaw = serde_yaml::from_str("version: 1").unwrap();
    let config = process_raw_config(raw).unwrap().build().unwrap();
    assert_eq!(config.root_logger_config().level(), Level::Info);
    assert!(config.root_logger_config().appender_refs().is_empty());
  }
}
