// src/init.rs
//! Contains the primary public initialization functions for fibre_context.

use crate::{
  config::{process_raw_config, raw::ConfigRaw, Configuration},
  error::{Error, Result},
  registry::ContextRegistry,
  status::StatusLogger,
  subscriber::{self, LogBridge},
  system::LoggingSystem,
};

use std::{
  env,
  path::{Path, PathBuf},
  sync::Arc,
};

const DEFAULT_CONFIG_BASE_NAME: &str = "fibre_context";
const CONFIG_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Finds the configuration file in the working directory, trying the
/// environment-specific name first. The environment comes from
/// `environment_suffix`, then `FIBRE_ENV`, then `APP_ENV`.
pub fn find_config_file(environment_suffix: Option<&str>) -> Result<PathBuf> {
  find_config_file_in(Path::new("."), environment_suffix)
}

/// Like [`find_config_file`], searching `dir` instead of the working
/// directory.
pub fn find_config_file_in(dir: &Path, environment_suffix: Option<&str>) -> Result<PathBuf> {
  let base_name = DEFAULT_CONFIG_BASE_NAME;

  let env_from_var = environment_suffix
    .map(|s| s.to_string())
    .or_else(|| env::var("FIBRE_ENV").ok())
    .or_else(|| env::var("APP_ENV").ok());

  let mut files_to_check: Vec<String> = Vec::new();
  if let Some(env_str) = &env_from_var {
    if !env_str.is_empty() {
      for extension in CONFIG_EXTENSIONS {
        files_to_check.push(format!("{}.{}.{}", base_name, env_str, extension));
      }
    }
  }
  for extension in CONFIG_EXTENSIONS {
    files_to_check.push(format!("{}.{}", base_name, extension));
  }

  for file_name in &files_to_check {
    let path = dir.join(file_name);
    if path.is_file() {
      return Ok(path);
    }
  }

  Err(Error::ConfigNotFound(format!(
    "Searched for: {:?} in {:?}. Provide a config file or check FIBRE_ENV/APP_ENV.",
    files_to_check, dir
  )))
}

/// Reads and validates a configuration file. `.json` files are parsed as
/// JSON, anything else as YAML. The path is remembered as the
/// configuration's source for reloads.
pub fn load_configuration(config_path: &Path) -> Result<Arc<Configuration>> {
  let contents = std::fs::read_to_string(config_path)?;
  let is_json = config_path
    .extension()
    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

  let raw_config: ConfigRaw = if is_json {
    serde_json::from_str(&contents).map_err(|e| Error::ConfigParse(e.to_string()))?
  } else {
    serde_yaml::from_str(&contents).map_err(|e| Error::ConfigParse(e.to_string()))?
  };

  let configuration = process_raw_config(raw_config)?
    .source(config_path)
    .build()?;
  StatusLogger::global().debug(format!(
    "Loaded configuration '{}' from {:?}",
    configuration.name(),
    config_path
  ));
  Ok(Arc::new(configuration))
}

/// Loads `config_path` into the default context of `system`, which then
/// reloads from that path on `reconfigure`.
pub fn configure_from_file(system: &LoggingSystem, config_path: &Path) -> Result<Arc<ContextRegistry>> {
  let configuration = load_configuration(config_path)?;
  let context = system.default_context();
  context.set_config_location(config_path);
  context.set_configuration(Some(configuration));
  Ok(context)
}

/// Initializes `fibre_context` from a configuration file path: configures the
/// global default context and routes the `tracing` and `log` facades into it.
pub fn init_from_file(config_path: &Path) -> Result<InitResult> {
  let context = configure_from_file(LoggingSystem::global(), config_path)?;
  subscriber::install_tracing(context.clone())?;
  LogBridge::install(context.clone())?;
  StatusLogger::global().debug("Initialization complete.");
  Ok(InitResult { context })
}

/// Keeps the initialized context running. Dropping it stops the context,
/// which flushes its appenders.
#[must_use = "The InitResult must be kept alive for logging to work correctly and flush on exit"]
#[derive(Debug)]
pub struct InitResult {
  context: Arc<ContextRegistry>,
}

impl InitResult {
  pub fn context(&self) -> &Arc<ContextRegistry> {
    &self.context
  }
}

impl Drop for InitResult {
  fn drop(&mut self) {
    if !self.context.stop() {
      StatusLogger::global().error(format!(
        "Context '{}' did not shut down cleanly",
        self.context.name()
      ));
    }
  }
}
