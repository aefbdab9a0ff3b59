// src/config/mod.rs

pub mod processed;
pub mod raw;

pub use processed::{
  parent_logger_name, process_raw_config, AppenderRef, Configuration, ConfigurationBuilder,
  ConfigurationListener, EncoderConfig, LoggerConfig, LoggerSpec, Property,
  DEFAULT_CONFIGURATION_NAME, DEFAULT_SHUTDOWN_TIMEOUT, NULL_CONFIGURATION_NAME, ROOT_LOGGER_NAME,
};
pub use raw::ConfigRaw;
