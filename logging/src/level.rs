// src/level.rs

use crate::error::Error;

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Severity of a log call or threshold of a logger.
///
/// Lower ordinals are more severe. A call at level `L` passes a threshold `T`
/// when `L.ordinal() <= T.ordinal()`, so `Off` admits nothing and `All`
/// admits everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
  Off,
  Fatal,
  Error,
  Warn,
  Info,
  Debug,
  Trace,
  All,
}

impl Level {
  pub const fn ordinal(self) -> u32 {
    match self {
      Level::Off => 0,
      Level::Fatal => 100,
      Level::Error => 200,
      Level::Warn => 300,
      Level::Info => 400,
      Level::Debug => 500,
      Level::Trace => 600,
      Level::All => u32::MAX,
    }
  }

  pub const fn as_str(self) -> &'static str {
    match self {
      Level::Off => "OFF",
      Level::Fatal => "FATAL",
      Level::Error => "ERROR",
      Level::Warn => "WARN",
      Level::Info => "INFO",
      Level::Debug => "DEBUG",
      Level::Trace => "TRACE",
      Level::All => "ALL",
    }
  }

  /// True when a call at `self` is admitted by the `threshold`.
  #[inline]
  pub fn is_less_specific_than(self, threshold: Level) -> bool {
    self.ordinal() <= threshold.ordinal()
  }
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Level {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "off" => Ok(Level::Off),
      "fatal" => Ok(Level::Fatal),
      "error" => Ok(Level::Error),
      "warn" | "warning" => Ok(Level::Warn),
      "info" => Ok(Level::Info),
      "debug" => Ok(Level::Debug),
      "trace" => Ok(Level::Trace),
      "all" => Ok(Level::All),
      other => Err(Error::InvalidConfigValue {
        field: "level".to_string(),
        message: format!("unknown level '{}'", other),
      }),
    }
  }
}

impl<'de> Deserialize<'de> for Level {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

impl From<tracing::Level> for Level {
  fn from(level: tracing::Level) -> Self {
    match level {
      tracing::Level::ERROR => Level::Error,
      tracing::Level::WARN => Level::Warn,
      tracing::Level::INFO => Level::Info,
      tracing::Level::DEBUG => Level::Debug,
      tracing::Level::TRACE => Level::Trace,
    }
  }
}

impl From<log::Level> for Level {
  fn from(level: log::Level) -> Self {
    match level {
      log::Level::Error => Level::Error,
      log::Level::Warn => Level::Warn,
      log::Level::Info => Level::Info,
      log::Level::Debug => Level::Debug,
      log::Level::Trace => Level::Trace,
    }
  }
}

impl From<Level> for log::LevelFilter {
  fn from(level: Level) -> Self {
    match level {
      Level::Off => log::LevelFilter::Off,
      Level::Fatal | Level::Error => log::LevelFilter::Error,
      Level::Warn => log::LevelFilter::Warn,
      Level::Info => log::LevelFilter::Info,
      Level::Debug => log::LevelFilter::Debug,
      Level::Trace | Level::All => log::LevelFilter::Trace,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ordinals_follow_severity() {
    assert!(Level::Fatal.ordinal() < Level::Error.ordinal());
    assert!(Level::Debug.is_less_specific_than(Level::Trace));
    assert!(!Level::Debug.is_less_specific_than(Level::Warn));
    assert!(Level::Fatal.is_less_specific_than(Level::All));
    assert!(!Level::Fatal.is_less_specific_than(Level::Off));
  }

  #[test]
  fn parse_is_case_insensitive() {
    assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warn);
    assert_eq!(" debug ".parse::<Level>().unwrap(), Level::Debug);
    assert_eq!("Warning".parse::<Level>().unwrap(), Level::Warn);
    assert!(matches!(
      "loud".parse::<Level>(),
      Err(Error::InvalidConfigValue { .. })
    ));
  }

  #[test]
  fn converts_from_ecosystem_levels() {
    assert_eq!(Level::from(tracing::Level::TRACE), Level::Trace);
    assert_eq!(Level::from(log::Level::Warn), Level::Warn);
    assert_eq!(log::LevelFilter::from(Level::Fatal), log::LevelFilter::Error);
  }
}
