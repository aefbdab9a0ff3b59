// src/error_handling.rs

use std::fmt;

/// Where an internal failure originated. Reports never reach application
/// code as errors; they go to the status channel instead.
#[derive(Debug, Clone, PartialEq)]
pub enum InternalErrorSource {
  Rebind { logger_name: String },
  AppenderWrite { appender_name: String },
  AppenderLifecycle { appender_name: String },
  ConfigProcessing,
  Lifecycle { context_name: String },
  ContextInjection,
  Delivery { logger_name: String },
  DeliveryQueue,
  Filter { logger_name: String },
}

impl fmt::Display for InternalErrorSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      InternalErrorSource::Rebind { logger_name } => {
        write!(f, "Rebind {{ logger_name: \"{}\" }}", logger_name)
      }
      InternalErrorSource::AppenderWrite { appender_name } => {
        write!(
          f,
          "AppenderWrite {{ appender_name: \"{}\" }}",
          appender_name
        )
      }
      InternalErrorSource::AppenderLifecycle { appender_name } => {
        write!(
          f,
          "AppenderLifecycle {{ appender_name: \"{}\" }}",
          appender_name
        )
      }
      InternalErrorSource::ConfigProcessing => write!(f, "ConfigProcessing"),
      InternalErrorSource::Lifecycle { context_name } => {
        write!(f, "Lifecycle {{ context_name: \"{}\" }}", context_name)
      }
      InternalErrorSource::ContextInjection => write!(f, "ContextInjection"),
      InternalErrorSource::Delivery { logger_name } => {
        write!(f, "Delivery {{ logger_name: \"{}\" }}", logger_name)
      }
      InternalErrorSource::DeliveryQueue => write!(f, "DeliveryQueue"),
      InternalErrorSource::Filter { logger_name } => {
        write!(f, "Filter {{ logger_name: \"{}\" }}", logger_name)
      }
    }
  }
}

#[derive(Debug, Clone)]
pub struct InternalErrorReport {
  pub source: InternalErrorSource,
  pub error_message: String,
  pub context: Option<String>,
  pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl InternalErrorReport {
  pub(crate) fn new<E: std::error::Error + ?Sized>(
    source: InternalErrorSource,
    error: &E,
    context: Option<String>,
  ) -> Self {
    Self::from_message(source, error.to_string(), context)
  }

  pub(crate) fn from_message(
    source: InternalErrorSource,
    error_message: impl Into<String>,
    context: Option<String>,
  ) -> Self {
    Self {
      source,
      error_message: error_message.into(),
      context,
      timestamp: chrono::Utc::now(),
    }
  }
}

impl fmt::Display for InternalErrorReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.source, self.error_message)?;
    if let Some(context) = &self.context {
      write!(f, " ({})", context)?;
    }
    Ok(())
  }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
