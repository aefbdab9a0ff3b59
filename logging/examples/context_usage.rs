// examples/context_usage.rs

use fibre_context::appender::MemoryAppender;
use fibre_context::{init_from_file, Configuration, Level, LoggerSpec, ScopedContext};
use std::fs;
use std::sync::Arc;

const CONFIG: &str = r#"
name: demo
properties:
  service: checkout
appenders:
  console:
    kind: console
    target: stdout
    encoder:
      pattern: "%d{%H:%M:%S} %-5p %c [%X] - %m%n"
loggers:
  root: { level: info, appenders: [console] }
  demo::db: { level: debug, properties: { component: "${service}-db" } }
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let dir = std::env::temp_dir().join("fibre_context_demo");
  fs::create_dir_all(&dir)?;
  let path = dir.join("fibre_context.yaml");
  fs::write(&path, CONFIG)?;

  let init = init_from_file(&path)?;
  let context = init.context().clone();

  let db = context.get_logger("demo::db");
  {
    let _request = ScopedContext::with("request_id", "r-1001");
    db.debug("query planned");
    tracing::info!(target: "demo::http", user = "alice", "request served");
    log::warn!(target: "demo::legacy", "legacy path used");
  }

  // Swap in a configuration that only keeps warnings, captured in memory.
  let mem = Arc::new(MemoryAppender::new("mem"));
  let quiet = Configuration::builder("quiet")
    .appender(mem.clone())
    .root(LoggerSpec::root().level(Level::Warn).appender("mem"))
    .build()?;
  context.set_configuration(Some(Arc::new(quiet)));

  db.debug("dropped after the swap");
  db.warn("kept after the swap");
  println!("captured after swap: {:?}", mem.messages());

  Ok(())
}
