mod common;
use common::*;

use fibre_context::subscriber::{ContextLayer, LogBridge, LOG_FQCN, TRACING_FQCN};
use fibre_context::Level;

use log::Log;
use pretty_assertions::assert_eq;
use tracing_subscriber::prelude::*;

#[test]
fn tracing_follows_runtime_level_changes() {
  let (config, mem) = memory_config("tracing", "app", Level::Warn);
  let context = registry_with("tracing-bridge", config);
  let subscriber = tracing_subscriber::registry().with(ContextLayer::new(context.clone()));

  tracing::subscriber::with_default(subscriber, || {
    for round in 0..2 {
      if round == 1 {
        context.get_logger("app").set_level(Some(Level::Debug));
      }
      tracing::debug!(target: "app", round, "debug from tracing");
    }
  });

  let events = mem.take();
  assert_eq!(events.len(), 1);
  assert_eq!(events[0].message, "debug from tracing");
  assert_eq!(events[0].fqcn, TRACING_FQCN);
  assert_eq!(events[0].context_data.get("round").map(|v| v.to_string()), Some("1".to_string()));
}

#[test]
fn log_records_reach_named_loggers() {
  let (config, mem) = memory_config("log", "legacy", Level::Info);
  let context = registry_with("log-bridge", config);
  let bridge = LogBridge::new(context.clone());

  let enabled = log::MetadataBuilder::new()
    .level(log::Level::Info)
    .target("legacy::io")
    .build();
  assert!(bridge.enabled(&enabled));

  let disabled = log::MetadataBuilder::new()
    .level(log::Level::Debug)
    .target("legacy::io")
    .build();
  assert!(!bridge.enabled(&disabled));

  bridge.log(
    &log::Record::builder()
      .level(log::Level::Info)
      .target("legacy::io")
      .args(format_args!("opened {}", "file.txt"))
      .build(),
  );
  bridge.log(
    &log::Record::builder()
      .level(log::Level::Trace)
      .target("legacy::io")
      .args(format_args!("dropped"))
      .build(),
  );

  let events = mem.take();
  assert_eq!(events.len(), 1);
  assert_eq!(events[0].logger_name, "legacy::io");
  assert_eq!(events[0].message, "opened file.txt");
  assert_eq!(events[0].fqcn, LOG_FQCN);
}
