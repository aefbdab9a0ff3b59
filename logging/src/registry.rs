// src/registry.rs
//! The registry that owns loggers and the configuration they are bound to.

use crate::config::{
  Configuration, ConfigurationListener, NULL_CONFIGURATION_NAME, ROOT_LOGGER_NAME,
};
use crate::error::{Error, Result};
use crate::error_handling::{panic_message, InternalErrorReport, InternalErrorSource};
use crate::lifecycle::{LifeCycle, LifeCycleState};
use crate::logger::NamedLogger;
use crate::message::{MessageFactory, ParameterizedMessageFactory};
use crate::status::StatusLogger;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

pub const HOST_NAME_PROPERTY: &str = "hostName";
pub const CONTEXT_NAME_PROPERTY: &str = "contextName";

static HOST_NAME: Lazy<String> = Lazy::new(|| {
  std::env::var("HOSTNAME")
    .or_else(|_| std::env::var("COMPUTERNAME"))
    .ok()
    .filter(|name| !name.is_empty())
    .or_else(|| {
      std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
    })
    .unwrap_or_else(|| "unknown".to_string())
});

/// Notified after a registry has switched configurations.
pub trait ContextChangeListener: Send + Sync {
  fn configuration_changed(&self, previous: &Arc<Configuration>, current: &Arc<Configuration>);
}

type LoggersByFactory = HashMap<&'static str, Arc<NamedLogger>>;

/// Owns a set of named loggers and the configuration they are bound to.
///
/// Log calls never take a lock here: each logger holds its own binding and
/// reads it atomically. Only configuration changes and shutdown serialize on
/// the registry's configuration lock.
pub struct ContextRegistry {
  name: String,
  self_ref: Weak<ContextRegistry>,
  lifecycle: LifeCycle,
  configuration: ArcSwap<Configuration>,
  config_lock: Mutex<()>,
  // Thread currently holding `config_lock`.
  config_owner: Mutex<Option<ThreadId>>,
  config_location: RwLock<Option<PathBuf>>,
  loggers: RwLock<HashMap<String, LoggersByFactory>>,
  default_factory: Arc<dyn MessageFactory>,
  change_listeners: RwLock<Vec<Arc<dyn ContextChangeListener>>>,
  objects: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl fmt::Debug for ContextRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContextRegistry")
      .field("name", &self.name)
      .field("state", &self.lifecycle.state())
      .field("configuration", &self.configuration.load().name())
      .field("loggers", &self.loggers.read().len())
      .finish()
  }
}

impl ContextRegistry {
  /// Creates a registry bound to the default console configuration.
  pub fn new(name: impl Into<String>) -> Arc<Self> {
    Self::build(name.into(), None)
  }

  /// Creates a registry that loads its configuration from `path` on
  /// [`start`](Self::start) and [`reconfigure`](Self::reconfigure).
  pub fn with_config_location(name: impl Into<String>, path: impl Into<PathBuf>) -> Arc<Self> {
    Self::build(name.into(), Some(path.into()))
  }

  fn build(name: String, location: Option<PathBuf>) -> Arc<Self> {
    let initial = Arc::new(Configuration::default_console());
    initial.put_property_if_absent(HOST_NAME_PROPERTY, &HOST_NAME);
    initial.put_property_if_absent(CONTEXT_NAME_PROPERTY, &name);
    initial.start();

    Arc::new_cyclic(|self_ref| Self {
      name,
      self_ref: self_ref.clone(),
      lifecycle: LifeCycle::new(),
      configuration: ArcSwap::new(initial),
      config_lock: Mutex::new(()),
      config_owner: Mutex::new(None),
      config_location: RwLock::new(location),
      loggers: RwLock::new(HashMap::new()),
      default_factory: Arc::new(ParameterizedMessageFactory),
      change_listeners: RwLock::new(Vec::new()),
      objects: RwLock::new(HashMap::new()),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn state(&self) -> LifeCycleState {
    self.lifecycle.state()
  }

  pub fn is_started(&self) -> bool {
    self.lifecycle.is_started()
  }

  pub fn configuration(&self) -> Arc<Configuration> {
    self.configuration.load_full()
  }

  pub fn config_location(&self) -> Option<PathBuf> {
    self.config_location.read().clone()
  }

  pub fn set_config_location(&self, path: impl Into<PathBuf>) {
    *self.config_location.write() = Some(path.into());
  }

  // --- Lifecycle ---

  /// Starts the registry, loading the configuration from its location if
  /// one is set. Does nothing when already started.
  pub fn start(&self) {
    if !self.lifecycle.begin_start() {
      return;
    }
    if self.config_location().is_some() {
      // Failures are reported and leave the current configuration active.
      let _ = self.reconfigure();
    } else if self.configuration.load().name() == NULL_CONFIGURATION_NAME {
      // Restarted after `stop`.
      self.set_configuration(Some(Arc::new(Configuration::default_console())));
    }
    self.lifecycle.set(LifeCycleState::Started);
  }

  /// Starts the registry with `configuration`. Does nothing when already
  /// started.
  pub fn start_with(&self, configuration: Arc<Configuration>) {
    if !self.lifecycle.begin_start() {
      return;
    }
    self.set_configuration(Some(configuration));
    self.lifecycle.set(LifeCycleState::Started);
  }

  /// Stops with the current configuration's shutdown timeout.
  pub fn stop(&self) -> bool {
    let timeout = self.configuration.load().shutdown_timeout();
    self.stop_timeout(timeout)
  }

  /// Binds every logger to the null configuration, then stops the real one
  /// within `timeout`. Returns `false` if it did not stop in time.
  pub fn stop_timeout(&self, timeout: Duration) -> bool {
    if !self.lifecycle.begin_stop() {
      // Already stopped, or another thread is starting or stopping it.
      return self.lifecycle.is_stopped();
    }
    StatusLogger::global().debug(format!("Stopping context '{}'", self.name));

    let guard = self.lock_config();
    let null = Arc::new(Configuration::null());
    null.start();
    let previous = self.configuration.swap(null.clone());
    self.rebind_all(&null);
    previous.remove_listener(&self.listener_ref());
    let stopped = previous.stop(timeout);
    self.lifecycle.set(LifeCycleState::Stopped);
    drop(guard);

    self.fire_configuration_changed(&previous, &null);
    if !stopped {
      StatusLogger::global().report(InternalErrorReport::from_message(
        InternalErrorSource::Lifecycle {
          context_name: self.name.clone(),
        },
        format!("configuration did not stop within {:?}", timeout),
        None,
      ));
    }
    stopped
  }

  // --- Configuration ---

  /// Installs `configuration` and rebinds every logger to it. Returns the
  /// configuration that was replaced.
  ///
  /// `None` is rejected: the error is reported and the current
  /// configuration is returned unchanged.
  pub fn set_configuration(&self, configuration: Option<Arc<Configuration>>) -> Arc<Configuration> {
    let Some(configuration) = configuration else {
      let error = Error::ConfigurationResolution {
        context: self.name.clone(),
        reason: "no configuration was supplied".to_string(),
      };
      StatusLogger::global().report(InternalErrorReport::new(
        InternalErrorSource::Lifecycle {
          context_name: self.name.clone(),
        },
        &error,
        None,
      ));
      return self.configuration.load_full();
    };

    let guard = self.lock_config();
    let previous = self.configuration.load_full();
    if Arc::ptr_eq(&previous, &configuration) {
      return previous;
    }

    configuration.add_listener(self.listener_ref());
    configuration.put_property_if_absent(HOST_NAME_PROPERTY, &HOST_NAME);
    configuration.put_property_if_absent(CONTEXT_NAME_PROPERTY, &self.name);
    configuration.start();

    self.configuration.store(configuration.clone());
    self.rebind_all(&configuration);

    previous.remove_listener(&self.listener_ref());
    previous.stop(previous.shutdown_timeout());
    drop(guard);

    StatusLogger::global().debug(format!(
      "Context '{}' switched from configuration '{}' to '{}'",
      self.name,
      previous.name(),
      configuration.name()
    ));
    self.fire_configuration_changed(&previous, &configuration);
    previous
  }

  /// Reloads the configuration from the remembered location. On failure the
  /// current configuration stays active and the error is reported.
  pub fn reconfigure(&self) -> Result<()> {
    let Some(path) = self.config_location() else {
      return Err(self.resolution_failed("no configuration location is set".to_string()));
    };
    match crate::init::load_configuration(&path) {
      Ok(configuration) => {
        self.set_configuration(Some(configuration));
        Ok(())
      }
      Err(e) => Err(self.resolution_failed(format!("{}: {}", path.display(), e))),
    }
  }

  /// Installs `configuration`, remembering its source (if any) for later
  /// reloads.
  pub fn reconfigure_with(&self, configuration: Arc<Configuration>) -> Arc<Configuration> {
    if let Some(source) = configuration.source() {
      self.set_config_location(source);
    }
    self.set_configuration(Some(configuration))
  }

  /// Rebinds every logger to the current configuration, discarding level
  /// overrides.
  pub fn update_loggers(&self) {
    let _guard = self.lock_config();
    let current = self.configuration.load_full();
    self.rebind_all(&current);
  }

  fn rebind_all(&self, configuration: &Arc<Configuration>) {
    let loggers = self.loggers.read();
    for logger in loggers.values().flat_map(HashMap::values) {
      let outcome = catch_unwind(AssertUnwindSafe(|| logger.update_configuration(configuration)));
      if let Err(payload) = outcome {
        let error = Error::RebindFailed {
          logger: logger.name().to_string(),
          reason: panic_message(payload.as_ref()),
        };
        StatusLogger::global().report(InternalErrorReport::new(
          InternalErrorSource::Rebind {
            logger_name: logger.name().to_string(),
          },
          &error,
          Some(format!("configuration '{}'", configuration.name())),
        ));
      }
    }
  }

  fn resolution_failed(&self, reason: String) -> Error {
    let error = Error::ConfigurationResolution {
      context: self.name.clone(),
      reason,
    };
    StatusLogger::global().report(InternalErrorReport::new(
      InternalErrorSource::ConfigProcessing,
      &error,
      Some(format!("keeping configuration '{}'", self.configuration.load().name())),
    ));
    error
  }

  fn lock_config(&self) -> ConfigGuard<'_> {
    let lock = self.config_lock.lock();
    *self.config_owner.lock() = Some(thread::current().id());
    ConfigGuard {
      _lock: lock,
      owner: &self.config_owner,
    }
  }

  /// True while this thread is inside a configuration change.
  fn changing_on_current_thread(&self) -> bool {
    *self.config_owner.lock() == Some(thread::current().id())
  }

  fn listener_ref(&self) -> Weak<dyn ConfigurationListener> {
    self.self_ref.clone()
  }

  // --- Loggers ---

  pub fn get_logger(&self, name: &str) -> Arc<NamedLogger> {
    self.get_logger_with_factory(name, self.default_factory.clone())
  }

  /// Returns the logger for `name` and the factory's name, creating it on
  /// first use.
  pub fn get_logger_with_factory(
    &self,
    name: &str,
    message_factory: Arc<dyn MessageFactory>,
  ) -> Arc<NamedLogger> {
    let key = message_factory.name();
    {
      let loggers = self.loggers.read();
      if let Some(logger) = loggers.get(name).and_then(|by_factory| by_factory.get(key)) {
        return logger.clone();
      }
    }

    // Created under the write lock so a concurrent rebind cannot miss it.
    let mut loggers = self.loggers.write();
    loggers
      .entry(name.to_string())
      .or_default()
      .entry(key)
      .or_insert_with(|| {
        Arc::new(NamedLogger::new(
          name,
          message_factory,
          self.configuration.load_full(),
          self.self_ref.clone(),
        ))
      })
      .clone()
  }

  pub fn root_logger(&self) -> Arc<NamedLogger> {
    self.get_logger(ROOT_LOGGER_NAME)
  }

  pub fn has_logger(&self, name: &str) -> bool {
    self.loggers.read().contains_key(name)
  }

  pub fn has_logger_with_factory(&self, name: &str, message_factory: &dyn MessageFactory) -> bool {
    self
      .loggers
      .read()
      .get(name)
      .is_some_and(|by_factory| by_factory.contains_key(message_factory.name()))
  }

  pub fn loggers(&self) -> Vec<Arc<NamedLogger>> {
    self
      .loggers
      .read()
      .values()
      .flat_map(|by_factory| by_factory.values().cloned())
      .collect()
  }

  // --- Listeners ---

  pub fn add_change_listener(&self, listener: Arc<dyn ContextChangeListener>) {
    self.change_listeners.write().push(listener);
  }

  pub fn remove_change_listener(&self, listener: &Arc<dyn ContextChangeListener>) {
    self
      .change_listeners
      .write()
      .retain(|l| !Arc::ptr_eq(l, listener));
  }

  fn fire_configuration_changed(&self, previous: &Arc<Configuration>, current: &Arc<Configuration>) {
    let listeners = self.change_listeners.read().clone();
    for listener in listeners {
      if let Err(payload) = catch_unwind(AssertUnwindSafe(|| {
        listener.configuration_changed(previous, current)
      })) {
        StatusLogger::global().report(InternalErrorReport::from_message(
          InternalErrorSource::Lifecycle {
            context_name: self.name.clone(),
          },
          panic_message(payload.as_ref()),
          Some("change listener".to_string()),
        ));
      }
    }
  }

  // --- External objects ---

  /// Stores an object alongside the registry. Returns the previous value.
  pub fn put_object(
    &self,
    key: impl Into<String>,
    value: Arc<dyn Any + Send + Sync>,
  ) -> Option<Arc<dyn Any + Send + Sync>> {
    self.objects.write().insert(key.into(), value)
  }

  pub fn put_object_if_absent(
    &self,
    key: impl Into<String>,
    value: Arc<dyn Any + Send + Sync>,
  ) -> Arc<dyn Any + Send + Sync> {
    self
      .objects
      .write()
      .entry(key.into())
      .or_insert(value)
      .clone()
  }

  pub fn get_object(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
    self.objects.read().get(key).cloned()
  }

  pub fn remove_object(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
    self.objects.write().remove(key)
  }
}

// Clears the owner before the lock is released.
struct ConfigGuard<'a> {
  _lock: MutexGuard<'a, ()>,
  owner: &'a Mutex<Option<ThreadId>>,
}

impl Drop for ConfigGuard<'_> {
  fn drop(&mut self) {
    *self.owner.lock() = None;
  }
}

impl ConfigurationListener for ContextRegistry {
  /// Reloads from the changed configuration's source, if it is still the
  /// active one.
  ///
  /// A request made from inside a configuration change on the same thread,
  /// such as from an appender's `start`, is ignored with a warning; the
  /// configuration lock is not re-entrant.
  fn on_change(&self, configuration: &Configuration) {
    if !std::ptr::eq(&**self.configuration.load(), configuration) {
      return;
    }
    if self.changing_on_current_thread() {
      StatusLogger::global().warn(format!(
        "Configuration '{}' requested a reload while context '{}' is changing configuration; ignored",
        configuration.name(),
        self.name
      ));
      return;
    }
    let Some(source) = configuration.source().map(Path::to_path_buf) else {
      StatusLogger::global().warn(format!(
        "Configuration '{}' requested a reload but has no source",
        configuration.name()
      ));
      return;
    };
    self.set_config_location(source);
    // Failures are reported and leave the current configuration active.
    let _ = self.reconfigure();
  }
}
