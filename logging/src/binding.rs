// src/binding.rs
//! The per-logger snapshot of configuration state consulted on every call.
//!
//! A [`ConfigBinding`] is immutable. Changing a logger's level or swapping
//! the registry's configuration builds a new binding and publishes it in a
//! single atomic store, so a call observes one binding from start to end.

use crate::config::{Configuration, LoggerConfig, Property};
use crate::context::{self, ThreadContext};
use crate::delivery::DeliveryRequest;
use crate::error_handling::{panic_message, InternalErrorReport, InternalErrorSource};
use crate::filter::{FilterInput, FilterResult};
use crate::level::Level;
use crate::map::StringMap;
use crate::marker::Marker;
use crate::model::{render_error, thread_id_string, LogEvent};
use crate::status::StatusLogger;

use chrono::Utc;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ConfigBinding {
  logger_name: Arc<str>,
  logger_config: Arc<LoggerConfig>,
  configuration: Arc<Configuration>,
  level: Level,
  level_ordinal: u32,
  requires_location: bool,
  properties: Arc<[Property]>,
}

impl ConfigBinding {
  /// Binds `logger_name` to its logger config in `configuration`. The level
  /// is `level` when given, otherwise the logger config's level.
  pub fn new(configuration: Arc<Configuration>, logger_name: &str, level: Option<Level>) -> Self {
    let logger_config = configuration.logger_config(logger_name);
    let level = level.unwrap_or_else(|| logger_config.level());
    let properties: Arc<[Property]> = logger_config
      .properties()
      .iter()
      .map(|p| {
        if p.needs_lookup() {
          Property::new(p.name(), configuration.substitute(p.value()))
        } else {
          p.clone()
        }
      })
      .collect();

    Self {
      logger_name: Arc::from(logger_name),
      requires_location: logger_config.include_location(),
      logger_config,
      configuration,
      level,
      level_ordinal: level.ordinal(),
      properties,
    }
  }

  /// A new binding identical to this one except for its level.
  pub fn with_level(&self, level: Level) -> Self {
    Self {
      level,
      level_ordinal: level.ordinal(),
      ..self.clone()
    }
  }

  pub fn logger_name(&self) -> &str {
    &self.logger_name
  }

  pub fn logger_config(&self) -> &Arc<LoggerConfig> {
    &self.logger_config
  }

  pub fn configuration(&self) -> &Arc<Configuration> {
    &self.configuration
  }

  pub fn level(&self) -> Level {
    self.level
  }

  pub fn requires_location(&self) -> bool {
    self.requires_location
  }

  /// Logger properties with `${name}` references already resolved.
  pub fn properties(&self) -> &[Property] {
    &self.properties
  }

  /// Decides whether a call proceeds to delivery.
  ///
  /// The configuration's global filter runs first: `Accept` and `Deny` are
  /// final, `Neutral` falls through to the level comparison. Calls at
  /// `Off` are never emitted. A filter that panics denies the call.
  pub fn filter(&self, level: Level, marker: Option<&Marker>, message: Option<&str>) -> bool {
    if level == Level::Off {
      return false;
    }
    if let Some(filter) = self.configuration.filter() {
      let input = FilterInput {
        logger_name: &self.logger_name,
        level,
        marker,
        message,
      };
      let result = catch_unwind(AssertUnwindSafe(|| filter.filter(&input))).unwrap_or_else(|payload| {
        StatusLogger::global().report(InternalErrorReport::from_message(
          InternalErrorSource::Filter {
            logger_name: self.logger_name.to_string(),
          },
          panic_message(payload.as_ref()),
          Some(format!("configuration '{}'", self.configuration.name())),
        ));
        FilterResult::Deny
      });
      match result {
        FilterResult::Accept => return true,
        FilterResult::Deny => return false,
        FilterResult::Neutral => {}
      }
    }
    level.ordinal() <= self.level_ordinal
  }

  /// Builds the immutable event for an accepted call. Location is only kept
  /// when the logger config asks for it.
  pub fn create_event(&self, request: &DeliveryRequest<'_>) -> LogEvent {
    let context_data = match self
      .configuration
      .injector()
      .inject_context_data(&self.properties, StringMap::with_capacity(self.properties.len()))
    {
      Ok(data) => data,
      Err(e) => {
        StatusLogger::global().report(InternalErrorReport::new(
          InternalErrorSource::ContextInjection,
          &e,
          Some(format!("logger '{}'", request.logger_name)),
        ));
        context::empty_snapshot()
      }
    };

    let current_thread = std::thread::current();
    LogEvent {
      timestamp: Utc::now(),
      level: request.level,
      logger_name: request.logger_name.to_string(),
      fqcn: request.fqcn,
      marker: request.marker.cloned(),
      message: request.message.formatted(),
      error: request.error.map(render_error),
      context_data,
      context_stack: ThreadContext::stack_snapshot(),
      thread_id: Some(thread_id_string(current_thread.id())),
      thread_name: current_thread.name().map(str::to_string),
      location: if self.requires_location {
        request.location
      } else {
        None
      },
    }
  }

  /// Hands an accepted call to the logger config's delivery strategy.
  pub fn deliver(&self, request: &DeliveryRequest<'_>) {
    self.logger_config.delivery().deliver(self, request);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::appender::MemoryAppender;
  use crate::config::LoggerSpec;
  use crate::filter::ThresholdFilter;
  use crate::message::Message;
  use crate::model::Location;
  use pretty_assertions::assert_eq;

  fn request<'a>(logger_name: &'a str, level: Level, message: &'a Message) -> DeliveryRequest<'a> {
    DeliveryRequest {
      logger_name,
      fqcn: crate::logger::FQCN,
      marker: None,
      level,
      message,
      error: None,
      location: Some(Location {
        file: "src/lib.rs",
        line: 7,
        column: 1,
      }),
    }
  }

  #[test]
  fn level_stage_compares_ordinals() {
    let config = Arc::new(
      Configuration::builder("t")
        .root(LoggerSpec::root().level(Level::Warn))
        .build()
        .unwrap(),
    );
    let binding = ConfigBinding::new(config, "app", None);
    assert_eq!(binding.level(), Level::Warn);
    assert!(binding.filter(Level::Error, None, None));
    assert!(binding.filter(Level::Warn, None, None));
    assert!(!binding.filter(Level::Info, None, None));
    assert!(!binding.filter(Level::Off, None, None));

    let debug = binding.with_level(Level::Debug);
    assert!(debug.filter(Level::Debug, None, None));
    assert_eq!(binding.level(), Level::Warn);
  }

  #[test]
  fn global_filter_short_circuits_level_stage() {
    let accept = Arc::new(
      Configuration::builder("t")
        .root(LoggerSpec::root().level(Level::Error))
        .filter(Arc::new(ThresholdFilter::with_results(
          Level::Trace,
          FilterResult::Accept,
          FilterResult::Neutral,
        )))
        .build()
        .unwrap(),
    );
    assert!(ConfigBinding::new(accept, "a", None).filter(Level::Debug, None, None));

    let deny = Arc::new(
      Configuration::builder("t")
        .root(LoggerSpec::root().level(Level::Trace))
        .filter(Arc::new(ThresholdFilter::with_results(
          Level::Trace,
          FilterResult::Deny,
          FilterResult::Neutral,
        )))
        .build()
        .unwrap(),
    );
    assert!(!ConfigBinding::new(deny, "a", None).filter(Level::Error, None, None));
  }

  #[derive(Debug)]
  struct BrokenFilter;

  impl crate::filter::Filter for BrokenFilter {
    fn filter(&self, input: &FilterInput<'_>) -> FilterResult {
      if input.level == Level::Error {
        panic!("broken filter");
      }
      FilterResult::Neutral
    }
  }

  #[test]
  fn panicking_global_filter_denies_and_reports() {
    let reported = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    {
      let reported = reported.clone();
      StatusLogger::global().add_listener(Arc::new(move |report: &InternalErrorReport| {
        if report.source
          == (InternalErrorSource::Filter {
            logger_name: "broken::filter".to_string(),
          })
        {
          reported.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
      }));
    }
    let config = Arc::new(
      Configuration::builder("t")
        .root(LoggerSpec::root().level(Level::Info))
        .filter(Arc::new(BrokenFilter))
        .build()
        .unwrap(),
    );
    let binding = ConfigBinding::new(config, "broken::filter", None);

    let outcome = catch_unwind(AssertUnwindSafe(|| binding.filter(Level::Error, None, Some("boom"))));
    assert_eq!(outcome.ok(), Some(false));
    assert!(binding.filter(Level::Warn, None, None));
    assert_eq!(reported.load(std::sync::atomic::Ordering::SeqCst), 1);
  }

  #[test]
  fn events_carry_properties_and_optional_location() {
    let mem = Arc::new(MemoryAppender::new("mem"));
    let config = Arc::new(
      Configuration::builder("t")
        .property("region", "eu-1")
        .appender(mem.clone())
        .root(LoggerSpec::root().appender("mem"))
        .logger(
          LoggerSpec::new("located")
            .include_location(true)
            .property("region", "${region}"),
        )
        .build()
        .unwrap(),
    );
    config.start();

    let message = Message::parameterized("user {} in", &[&42]);
    let plain = ConfigBinding::new(config.clone(), "plain", None);
    let event = plain.create_event(&request("plain", Level::Info, &message));
    assert_eq!(event.message, "user 42 in");
    assert_eq!(event.location, None);
    assert!(event.context_data.is_frozen());

    let located = ConfigBinding::new(config.clone(), "located", None);
    assert!(located.requires_location());
    assert_eq!(located.properties(), &[Property::new("region", "eu-1")]);
    let event = located.create_event(&request("located", Level::Info, &message));
    assert_eq!(event.location.map(|l| l.line), Some(7));
    assert_eq!(
      event.context_data.get("region").map(ToString::to_string),
      Some("eu-1".to_string())
    );

    located.deliver(&request("located", Level::Info, &message));
    assert_eq!(mem.messages(), vec!["user 42 in"]);
    config.stop(std::time::Duration::from_secs(1));
  }
}
