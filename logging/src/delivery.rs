// src/delivery.rs
//! Strategies that hand accepted calls to a logger configuration's appenders.
//!
//! A strategy decides how delivery interacts with configuration shutdown:
//! whether the old configuration may be stopped while calls are still in
//! flight and whether appending happens on the calling thread.

use crate::binding::ConfigBinding;
use crate::config::LoggerConfig;
use crate::error::{Error, Result};
use crate::error_handling::{panic_message, InternalErrorReport, InternalErrorSource};
use crate::level::Level;
use crate::marker::Marker;
use crate::message::Message;
use crate::model::{LogEvent, Location};
use crate::status::StatusLogger;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::Deserialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Everything known about a call once it has passed filtering.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryRequest<'a> {
  pub logger_name: &'a str,
  /// Name of the facade that made the call.
  pub fqcn: &'static str,
  pub marker: Option<&'a Marker>,
  pub level: Level,
  pub message: &'a Message,
  pub error: Option<&'a (dyn std::error::Error + 'static)>,
  /// Call site, if the caller captured one.
  pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
  /// Appends on the calling thread. A call racing a configuration swap may
  /// reach appenders that are already stopped.
  Direct,
  #[default]
  AwaitCompletion,
  Queued,
}

impl FromStr for DeliveryKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "direct" => Ok(DeliveryKind::Direct),
      "await_completion" => Ok(DeliveryKind::AwaitCompletion),
      "queued" => Ok(DeliveryKind::Queued),
      other => Err(Error::InvalidConfigValue {
        field: "delivery".to_string(),
        message: format!(
          "Unknown delivery '{}'. Expected 'direct', 'await_completion' or 'queued'.",
          other
        ),
      }),
    }
  }
}

pub trait DeliveryStrategy: Send + Sync + fmt::Debug {
  fn kind(&self) -> DeliveryKind;

  /// Builds the event for `request` and routes it through the binding's
  /// logger configuration. Never fails; errors go to the status logger.
  fn deliver(&self, binding: &ConfigBinding, request: &DeliveryRequest<'_>);

  /// Called when the owning configuration starts.
  fn start(&self) {}

  /// Called before the owning configuration stops its appenders. Returns
  /// `false` if outstanding work did not finish within `timeout`.
  fn before_stop(&self, _timeout: Duration) -> bool {
    true
  }
}

pub(crate) fn new_strategy(kind: DeliveryKind, queue_capacity: usize) -> Arc<dyn DeliveryStrategy> {
  match kind {
    DeliveryKind::Direct => Arc::new(DirectDelivery),
    DeliveryKind::AwaitCompletion => Arc::new(AwaitCompletionDelivery::new()),
    DeliveryKind::Queued => Arc::new(QueuedDelivery::new(queue_capacity)),
  }
}

/// Appends on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectDelivery;

impl DeliveryStrategy for DirectDelivery {
  fn kind(&self) -> DeliveryKind {
    DeliveryKind::Direct
  }

  fn deliver(&self, binding: &ConfigBinding, request: &DeliveryRequest<'_>) {
    let event = binding.create_event(request);
    binding.logger_config().log_event(&event);
  }
}

/// Appends on the calling thread and lets the configuration wait for
/// in-flight calls before its appenders are stopped.
///
/// A call that enters after the configuration began stopping is dropped.
#[derive(Debug, Default)]
pub struct AwaitCompletionDelivery {
  in_flight: Mutex<usize>,
  idle: Condvar,
}

struct InFlight<'a>(&'a AwaitCompletionDelivery);

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    let mut count = self.0.in_flight.lock();
    *count -= 1;
    if *count == 0 {
      self.0.idle.notify_all();
    }
  }
}

impl AwaitCompletionDelivery {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn in_flight(&self) -> usize {
    *self.in_flight.lock()
  }

  fn enter(&self) -> InFlight<'_> {
    *self.in_flight.lock() += 1;
    InFlight(self)
  }
}

impl DeliveryStrategy for AwaitCompletionDelivery {
  fn kind(&self) -> DeliveryKind {
    DeliveryKind::AwaitCompletion
  }

  fn deliver(&self, binding: &ConfigBinding, request: &DeliveryRequest<'_>) {
    let _in_flight = self.enter();
    // Entering takes the counter lock, so a stop that has not yet waited
    // will see this call; one that already waited has left `Started`.
    if !binding.configuration().is_started() {
      return;
    }
    let event = binding.create_event(request);
    binding.logger_config().log_event(&event);
  }

  fn before_stop(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut count = self.in_flight.lock();
    while *count > 0 {
      if self.idle.wait_until(&mut count, deadline).timed_out() {
        return *count == 0;
      }
    }
    true
  }
}

struct QueuedEvent {
  logger_config: Arc<LoggerConfig>,
  event: LogEvent,
}

/// Builds events on the calling thread and appends them on a worker thread.
///
/// When the queue is full, or the worker is not running, the event is
/// appended on the calling thread instead so nothing is lost.
pub struct QueuedDelivery {
  capacity: usize,
  sender: RwLock<Option<Sender<QueuedEvent>>>,
  done: Mutex<Option<Receiver<()>>>,
  full_reported: AtomicBool,
}

impl fmt::Debug for QueuedDelivery {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueuedDelivery")
      .field("capacity", &self.capacity)
      .field("running", &self.sender.read().is_some())
      .finish()
  }
}

impl QueuedDelivery {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity: capacity.max(1),
      sender: RwLock::new(None),
      done: Mutex::new(None),
      full_reported: AtomicBool::new(false),
    }
  }

  pub fn is_running(&self) -> bool {
    self.sender.read().is_some()
  }

  fn run_worker(receiver: Receiver<QueuedEvent>, done: Sender<()>) {
    for item in receiver.iter() {
      let outcome = catch_unwind(AssertUnwindSafe(|| item.logger_config.log_event(&item.event)));
      if let Err(payload) = outcome {
        StatusLogger::global().report(InternalErrorReport::from_message(
          InternalErrorSource::DeliveryQueue,
          panic_message(payload.as_ref()),
          Some(format!("logger '{}'", item.event.logger_name)),
        ));
      }
    }
    let _ = done.send(());
  }
}

impl DeliveryStrategy for QueuedDelivery {
  fn kind(&self) -> DeliveryKind {
    DeliveryKind::Queued
  }

  fn deliver(&self, binding: &ConfigBinding, request: &DeliveryRequest<'_>) {
    let item = QueuedEvent {
      logger_config: binding.logger_config().clone(),
      event: binding.create_event(request),
    };

    let rejected = match self.sender.read().as_ref() {
      Some(sender) => match sender.try_send(item) {
        Ok(()) => None,
        Err(TrySendError::Full(item)) => {
          if !self.full_reported.swap(true, Ordering::Relaxed) {
            StatusLogger::global().warn(format!(
              "Delivery queue is full (capacity {}), appending on the calling thread",
              self.capacity
            ));
          }
          Some(item)
        }
        Err(TrySendError::Disconnected(item)) => Some(item),
      },
      None => Some(item),
    };

    if let Some(item) = rejected {
      item.logger_config.log_event(&item.event);
    }
  }

  fn start(&self) {
    let mut sender = self.sender.write();
    if sender.is_some() {
      return;
    }
    let (tx, rx) = crossbeam_channel::bounded(self.capacity);
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let spawned = std::thread::Builder::new()
      .name("fibre-context-queue".to_string())
      .spawn(move || Self::run_worker(rx, done_tx));
    match spawned {
      Ok(_) => {
        *sender = Some(tx);
        *self.done.lock() = Some(done_rx);
        self.full_reported.store(false, Ordering::Relaxed);
      }
      Err(e) => StatusLogger::global().report(InternalErrorReport::new(
        InternalErrorSource::DeliveryQueue,
        &e,
        Some("spawning queue worker".to_string()),
      )),
    }
  }

  fn before_stop(&self, timeout: Duration) -> bool {
    // Closing the channel lets the worker drain what is queued and exit.
    drop(self.sender.write().take());
    let done = self.done.lock().take();
    match done {
      Some(done) => done.recv_timeout(timeout).is_ok(),
      None => true,
    }
  }
}
