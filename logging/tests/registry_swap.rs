mod common;
use common::*;

use fibre_context::appender::{Appender, MemoryAppender};
use fibre_context::filter::{FilterInput, MarkerFilter};
use fibre_context::{
  Configuration, ContextDataInjector, ContextRegistry, Filter, FilterResult, InternalErrorReport,
  Level, LoggerSpec, Marker, Property, StatusLogger, StringMap,
};

use crossbeam_channel::{bounded, Receiver, Sender};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn swap_config(round: usize) -> Arc<Configuration> {
  let level = if round % 2 == 0 { Level::Warn } else { Level::Debug };
  let mut builder = Configuration::builder(format!("round-{}", round))
    .root(LoggerSpec::root().level(Level::Info));
  for i in 0..SWAP_LOGGERS {
    builder = builder.logger(LoggerSpec::new(format!("svc::{}", i)).level(level));
  }
  Arc::new(builder.build().unwrap())
}

#[test]
fn readers_never_see_a_partial_binding() {
  let context = registry_with("stress", swap_config(0));
  let loggers: Vec<_> = (0..SWAP_LOGGERS)
    .map(|i| context.get_logger(&format!("svc::{}", i)))
    .collect();
  let loggers = Arc::new(loggers);
  let done = Arc::new(AtomicBool::new(false));
  let reads = Arc::new(AtomicUsize::new(0));

  let readers: Vec<_> = (0..SWAP_READERS)
    .map(|r| {
      let loggers = loggers.clone();
      let done = done.clone();
      let reads = reads.clone();
      thread::spawn(move || {
        let mut i = r;
        while !done.load(Ordering::Acquire) {
          let logger = &loggers[i % loggers.len()];
          let binding = logger.binding();
          // Name, config and level always come from the same configuration.
          assert_eq!(binding.logger_name(), logger.name());
          assert_eq!(binding.logger_config().name(), logger.name());
          assert_eq!(binding.level(), binding.logger_config().level());
          let expected = match binding.configuration().name().trim_start_matches("round-").parse::<usize>() {
            Ok(round) if round % 2 == 0 => Level::Warn,
            Ok(_) => Level::Debug,
            Err(_) => panic!("unexpected configuration {}", binding.configuration().name()),
          };
          assert_eq!(binding.level(), expected);
          logger.debug("may or may not be delivered");
          reads.fetch_add(1, Ordering::Relaxed);
          i += 1;
        }
      })
    })
    .collect();

  for round in 1..=SWAP_COUNT {
    context.set_configuration(Some(swap_config(round)));
  }
  done.store(true, Ordering::Release);
  for reader in readers {
    reader.join().expect("reader thread panicked");
  }

  assert!(reads.load(Ordering::Relaxed) > 0);
  let final_name = format!("round-{}", SWAP_COUNT);
  for logger in loggers.iter() {
    assert_eq!(logger.binding().configuration().name(), final_name);
  }
}

#[test]
fn swap_from_warn_to_debug_delivers_debug() {
  let (warn_config, warn_mem) = memory_config("warn", "X", Level::Warn);
  let context = registry_with("warn-to-debug", warn_config);
  let logger = context.get_logger("X");

  logger.debug("dropped under WARN");
  assert!(warn_mem.is_empty());

  let (debug_config, debug_mem) = memory_config("debug", "X", Level::Debug);
  let concurrent = {
    let logger = logger.clone();
    thread::spawn(move || {
      for _ in 0..1000 {
        logger.debug("racing the swap");
      }
    })
  };
  context.set_configuration(Some(debug_config));
  concurrent.join().expect("concurrent logger panicked");

  logger.debug("delivered under DEBUG");
  let messages = debug_mem.messages();
  assert_eq!(messages.last().map(String::as_str), Some("delivered under DEBUG"));
  assert!(messages[..messages.len() - 1].iter().all(|m| m == "racing the swap"));
  assert!(warn_mem.is_empty());
}

/// Holds the first call inside event creation until released.
#[derive(Debug)]
struct GateInjector {
  used: AtomicBool,
  entered: Sender<()>,
  release: Receiver<()>,
}

impl ContextDataInjector for GateInjector {
  fn inject_context_data(
    &self,
    _properties: &[Property],
    mut reusable: StringMap,
  ) -> fibre_context::Result<Arc<StringMap>> {
    if !self.used.swap(true, Ordering::SeqCst) {
      let _ = self.entered.send(());
      let _ = self.release.recv();
    }
    reusable.freeze();
    Ok(Arc::new(reusable))
  }

  fn with_raw_context_data(&self, visitor: &mut dyn FnMut(&StringMap)) {
    visitor(&StringMap::new());
  }
}

#[test]
fn call_in_flight_during_swap_is_delivered_without_error() {
  let write_errors = Arc::new(AtomicUsize::new(0));
  {
    let write_errors = write_errors.clone();
    StatusLogger::global().add_listener(Arc::new(move |report: &InternalErrorReport| {
      if report.to_string().contains("gated-mem") {
        write_errors.fetch_add(1, Ordering::SeqCst);
      }
    }));
  }

  let (entered_tx, entered_rx) = bounded(1);
  let (release_tx, release_rx) = bounded(1);
  let mem = Arc::new(MemoryAppender::new("gated-mem"));
  let gated = Arc::new(
    Configuration::builder("gated")
      .injector(Arc::new(GateInjector {
        used: AtomicBool::new(false),
        entered: entered_tx,
        release: release_rx,
      }))
      .appender(mem.clone())
      .root(LoggerSpec::root().level(Level::Debug).appender("gated-mem"))
      .build()
      .unwrap(),
  );
  let context = registry_with("in-flight", gated);
  let logger = context.get_logger("X");

  let caller = thread::spawn(move || logger.info("held across the swap"));
  entered_rx
    .recv_timeout(Duration::from_secs(5))
    .expect("call never reached event creation");

  let swapper = {
    let context = context.clone();
    let (next, _) = memory_config("next", "X", Level::Debug);
    thread::spawn(move || context.set_configuration(Some(next)))
  };
  // The swap waits on the held call before stopping the old appenders.
  thread::sleep(Duration::from_millis(50));
  assert!(mem.is_started());

  release_tx.send(()).unwrap();
  caller.join().expect("caller panicked");
  let previous = swapper.join().expect("swap panicked");

  assert_eq!(previous.name(), "gated");
  assert_eq!(mem.messages(), vec!["held across the swap"]);
  assert!(!mem.is_started());
  assert_eq!(write_errors.load(Ordering::SeqCst), 0);
  assert_eq!(context.configuration().name(), "next");
}

#[derive(Debug)]
struct Fixed(FilterResult);

impl Filter for Fixed {
  fn filter(&self, _input: &FilterInput<'_>) -> FilterResult {
    self.0
  }
}

fn filtered(result: FilterResult, root: Level) -> (Arc<Configuration>, Arc<MemoryAppender>) {
  let mem = Arc::new(MemoryAppender::new("mem"));
  let config = Configuration::builder("filtered")
    .appender(mem.clone())
    .filter(Arc::new(Fixed(result)))
    .root(LoggerSpec::root().level(root).appender("mem"))
    .build()
    .unwrap();
  (Arc::new(config), mem)
}

#[test]
fn global_deny_drops_everything() {
  let (config, mem) = filtered(FilterResult::Deny, Level::All);
  let context = registry_with("deny", config);
  let logger = context.get_logger("any");
  logger.fatal("denied");
  logger.error("denied");
  assert!(mem.is_empty());
}

#[test]
fn global_accept_bypasses_level() {
  let (config, mem) = filtered(FilterResult::Accept, Level::Error);
  let context = registry_with("accept", config);
  let logger = context.get_logger("any");
  logger.trace("accepted");
  assert_eq!(mem.messages(), vec!["accepted"]);
}

#[test]
fn marker_filter_neutral_falls_through_to_level() {
  let mem = Arc::new(MemoryAppender::new("mem"));
  let config = Configuration::builder("marker")
    .appender(mem.clone())
    .filter(Arc::new(MarkerFilter {
      marker: "SECURITY".to_string(),
      on_match: FilterResult::Accept,
      on_mismatch: FilterResult::Neutral,
    }))
    .root(LoggerSpec::root().level(Level::Warn).appender("mem"))
    .build()
    .unwrap();
  let context = registry_with("marker", Arc::new(config));
  let logger = context.get_logger("auth");
  let security = Marker::with_parents("LOGIN", vec![Marker::new("SECURITY")]);

  logger.at(Level::Debug).marker(&security).log("child marker accepted");
  logger.debug("neutral then below level");
  logger.warn("neutral then at level");
  assert_eq!(mem.messages(), vec!["child marker accepted", "neutral then at level"]);
}

#[test]
fn stop_leaves_loggers_on_null_configuration() {
  let (config, mem) = memory_config("real", "X", Level::Trace);
  let context = registry_with("stopping", config.clone());
  let loggers: Vec<_> = ["X", "X::y", "other"].iter().map(|n| context.get_logger(n)).collect();

  assert!(context.stop_timeout(Duration::from_secs(2)));
  assert!(!config.is_started());
  assert!(!mem.is_started());
  for logger in &loggers {
    logger.fatal("after stop");
    assert!(!logger.is_enabled(Level::Fatal));
  }
  assert!(mem.is_empty());

  // Restart brings back a usable configuration.
  context.start();
  assert!(context.is_started());
  assert!(loggers[0].is_enabled(Level::Error));
}

#[test]
fn registries_are_independent() {
  let (a_config, a_mem) = memory_config("a", "X", Level::Info);
  let (b_config, b_mem) = memory_config("b", "X", Level::Info);
  let a = registry_with("a", a_config);
  let b = ContextRegistry::new("b");
  b.start_with(b_config);

  a.get_logger("X").info("to a");
  b.get_logger("X").info("to b");
  assert_eq!(a_mem.messages(), vec!["to a"]);
  assert_eq!(b_mem.messages(), vec!["to b"]);
}
