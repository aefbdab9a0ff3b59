// src/subscriber/mod.rs
//! Bridges from the `tracing` and `log` ecosystems into a registry.

mod dispatch;
mod log_handler;
mod visitor;

pub use dispatch::{ContextLayer, TRACING_FQCN};
pub use log_handler::{LogBridge, LOG_FQCN};

use crate::error::{Error, Result};
use crate::registry::ContextRegistry;

use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Optional `EnvFilter` directives applied in front of [`ContextLayer`].
pub const TRACING_FILTER_ENV: &str = "FIBRE_CONTEXT_TRACING";

/// Sets a registry-backed subscriber as the global `tracing` default.
///
/// When `FIBRE_CONTEXT_TRACING` holds valid directives they filter events
/// before they reach the registry.
pub fn install_tracing(context: Arc<ContextRegistry>) -> Result<()> {
  let env_filter = EnvFilter::try_from_env(TRACING_FILTER_ENV).ok();
  let subscriber = tracing_subscriber::registry()
    .with(env_filter)
    .with(ContextLayer::new(context));
  tracing::subscriber::set_global_default(subscriber)
    .map_err(|e| Error::GlobalSubscriberSet(e.to_string()))
}
