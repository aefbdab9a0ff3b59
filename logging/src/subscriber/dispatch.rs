// src/subscriber/dispatch.rs
//! Defines the Layer that forwards `tracing` events to a registry's loggers.

use crate::level::Level;
use crate::model::Location;
use crate::registry::ContextRegistry;
use crate::subscriber::visitor::ContextFieldVisitor;

use std::sync::Arc;
use tracing::{Event, Metadata, Subscriber};
use tracing_core::subscriber::Interest;
use tracing_subscriber::layer::{Context, Layer};

/// Facade name recorded on events that arrive through [`ContextLayer`].
pub const TRACING_FQCN: &str = "fibre_context::subscriber::ContextLayer";

/// A `tracing_subscriber` layer that logs each event on the registry's
/// logger named after the event's target.
///
/// Event fields other than `message` are put into the thread context for
/// the duration of the call, so they override logger properties and show up
/// in `%X`.
#[derive(Debug, Clone)]
pub struct ContextLayer {
  context: Arc<ContextRegistry>,
}

impl ContextLayer {
  pub fn new(context: Arc<ContextRegistry>) -> Self {
    Self { context }
  }

  pub fn context(&self) -> &Arc<ContextRegistry> {
    &self.context
  }
}

impl<S> Layer<S> for ContextLayer
where
  S: Subscriber,
{
  // Levels change with the configuration, so no callsite may be cached as
  // always or never enabled.
  fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
    Interest::sometimes()
  }

  fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
    if !metadata.is_event() {
      return true;
    }
    self
      .context
      .get_logger(metadata.target())
      .is_enabled(Level::from(*metadata.level()))
  }

  fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
    let metadata = event.metadata();
    let logger = self.context.get_logger(metadata.target());

    let mut visitor = ContextFieldVisitor::default();
    event.record(&mut visitor);
    let _scope = visitor.scope_fields();

    let location = match (metadata.file(), metadata.line()) {
      (Some(file), Some(line)) => Some(Location {
        file,
        line,
        column: 0,
      }),
      _ => None,
    };

    logger
      .at(Level::from(*metadata.level()))
      .fqcn(TRACING_FQCN)
      .location(location)
      .log(visitor.message.take().unwrap_or_default());
  }
}
