// src/error.rs

use thiserror::Error;

/// Errors surfaced by map mutation, configuration loading and context setup.
#[derive(Debug, Error)]
pub enum Error {
  #[error("Frozen collection cannot be modified")]
  ImmutableState,

  #[error("Context map modified while it is being iterated")]
  ConcurrentModification,

  #[error("No configuration found for context '{context}': {reason}")]
  ConfigurationResolution { context: String, reason: String },

  #[error("Configuration file not found: {0}")]
  ConfigNotFound(String),

  #[error("Failed to read configuration file: {0}")]
  ConfigRead(#[from] std::io::Error),

  #[error("Failed to parse configuration: {0}")]
  ConfigParse(String),

  #[error("Invalid configuration value for '{field}': {message}")]
  InvalidConfigValue { field: String, message: String },

  #[error("Appender setup failed for '{appender_name}': {reason}")]
  AppenderSetup {
    appender_name: String,
    reason: String,
  },

  #[error("Appender '{appender_name}' failed to write: {reason}")]
  AppenderWrite {
    appender_name: String,
    reason: String,
  },

  #[error("Failed to rebind logger '{logger}': {reason}")]
  RebindFailed { logger: String, reason: String },

  #[error("Failed to install log bridge: {0}")]
  LogBridgeInit(String),

  #[error("Failed to set global tracing subscriber: {0}")]
  GlobalSubscriberSet(String),

  #[error("Internal library error: {0}")]
  Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
