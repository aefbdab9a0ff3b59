// Shared helpers for integration tests.
#![allow(dead_code)]

use fibre_context::appender::MemoryAppender;
use fibre_context::{Configuration, ContextRegistry, Level, LoggerSpec};

use std::sync::Arc;

pub const SWAP_LOGGERS: usize = 100;
pub const SWAP_READERS: usize = 16;
pub const SWAP_COUNT: usize = 1000;

/// A configuration whose root writes to a memory appender named `mem`, with
/// one logger `name` at `level`.
pub fn memory_config(config_name: &str, name: &str, level: Level) -> (Arc<Configuration>, Arc<MemoryAppender>) {
  let mem = Arc::new(MemoryAppender::new("mem"));
  let config = Configuration::builder(config_name)
    .appender(mem.clone())
    .root(LoggerSpec::root().level(Level::Error).appender("mem"))
    .logger(LoggerSpec::new(name).level(level))
    .build()
    .expect("test configuration must build");
  (Arc::new(config), mem)
}

pub fn registry_with(name: &str, config: Arc<Configuration>) -> Arc<ContextRegistry> {
  let context = ContextRegistry::new(name);
  context.start_with(config);
  context
}
