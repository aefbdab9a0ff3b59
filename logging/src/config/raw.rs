// src/config/raw.rs

use crate::appender::ConsoleTarget;
use crate::delivery::DeliveryKind;
use crate::filter::FilterResult;
use crate::level::Level;

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigRaw {
  #[serde(default = "default_version")]
  pub version: u32,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default, with = "humantime_serde_opt")]
  pub shutdown_timeout: Option<Duration>,
  /// Variables available to `${name}` substitution.
  #[serde(default)]
  pub properties: BTreeMap<String, String>,
  /// Global filter, consulted before any logger level.
  #[serde(default)]
  pub filter: Option<FilterConfigRaw>,
  #[serde(default)]
  pub queue_capacity: Option<usize>,
  #[serde(default)]
  pub appenders: HashMap<String, AppenderConfigRaw>,
  /// Without a `root` entry the root logger defaults to `info`.
  #[serde(default)]
  pub loggers: HashMap<String, LoggerConfigRaw>,
}

fn default_version() -> u32 {
  1
}

// humantime strings such as "5s" or "1m 30s".
mod humantime_serde_opt {
  use serde::{Deserialize, Deserializer};
  use std::time::Duration;

  pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
  where
    D: Deserializer<'de>,
  {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw
      .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
      .transpose()
  }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum AppenderConfigRaw {
  Console(ConsoleAppenderConfigRaw),
  File(FileAppenderConfigRaw),
  Memory(MemoryAppenderConfigRaw),
}

impl AppenderConfigRaw {
  pub fn encoder_config_raw(&self) -> Option<&EncoderConfigRaw> {
    match self {
      AppenderConfigRaw::Console(c) => c.encoder.as_ref(),
      AppenderConfigRaw::File(f) => f.encoder.as_ref(),
      AppenderConfigRaw::Memory(_) => None,
    }
  }
}

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ConsoleAppenderConfigRaw {
  #[serde(default)]
  pub target: ConsoleTarget,
  #[serde(default)]
  pub encoder: Option<EncoderConfigRaw>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileAppenderConfigRaw {
  pub path: String,
  #[serde(default)]
  pub encoder: Option<EncoderConfigRaw>,
}

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct MemoryAppenderConfigRaw {}

#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct EncoderConfigRaw {
  pub pattern: String,
}

fn default_on_match() -> FilterResult {
  FilterResult::Neutral
}

fn default_on_mismatch() -> FilterResult {
  FilterResult::Deny
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum FilterConfigRaw {
  Threshold {
    level: Level,
    #[serde(default = "default_on_match")]
    on_match: FilterResult,
    #[serde(default = "default_on_mismatch")]
    on_mismatch: FilterResult,
  },
  Marker {
    marker: String,
    #[serde(default = "default_on_match")]
    on_match: FilterResult,
    #[serde(default = "default_on_mismatch")]
    on_mismatch: FilterResult,
  },
  ContextMap {
    key: String,
    value: String,
    #[serde(default = "default_on_match")]
    on_match: FilterResult,
    #[serde(default = "default_on_mismatch")]
    on_mismatch: FilterResult,
  },
  Composite {
    filters: Vec<FilterConfigRaw>,
  },
}

fn default_additive() -> bool {
  true
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfigRaw {
  /// Inherited from the nearest configured ancestor when absent.
  #[serde(default)]
  pub level: Option<Level>,
  #[serde(default)]
  pub appenders: Vec<AppenderRefRaw>,
  #[serde(default = "default_additive")]
  pub additive: bool,
  #[serde(default)]
  pub include_location: bool,
  #[serde(default)]
  pub delivery: Option<DeliveryKind>,
  #[serde(default)]
  pub filter: Option<FilterConfigRaw>,
  /// Added to the context data of every event routed through this logger.
  #[serde(default)]
  pub properties: BTreeMap<String, String>,
}

/// Either `console` or `{ ref: console, level: warn }`.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AppenderRefRaw {
  Name(String),
  Detailed {
    #[serde(rename = "ref")]
    name: String,
    #[serde(default)]
    level: Option<Level>,
  },
}

impl AppenderRefRaw {
  pub fn name(&self) -> &str {
    match self {
      AppenderRefRaw::Name(name) => name,
      AppenderRefRaw::Detailed { name, .. } => name,
    }
  }

  pub fn level(&self) -> Option<Level> {
    match self {
      AppenderRefRaw::Name(_) => None,
      AppenderRefRaw::Detailed { level, .. } => *level,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_full_yaml_document() {
    let yaml = r#"
version: 1
name: test-config
shutdown_timeout: 2s
properties:
  env: prod
filter:
  kind: threshold
  level: warn
  on_match: neutral
  on_mismatch: deny
appenders:
  console:
    kind: console
    target: stderr
    encoder:
      pattern: "%p %m%n"
  mem:
    kind: memory
loggers:
  root:
    level: info
    appenders: [console]
  my_app::db:
    level: debug
    appenders:
      - mem
      - ref: console
        level: error
    additive: false
    include_location: true
    delivery: await_completion
    properties:
      component: db
"#;
    let raw: ConfigRaw = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(raw.name.as_deref(), Some("test-config"));
    assert_eq!(raw.shutdown_timeout, Some(Duration::from_secs(2)));
    assert_eq!(raw.properties.get("env").map(String::as_str), Some("prod"));
    assert!(matches!(
      raw.filter,
      Some(FilterConfigRaw::Threshold { level: Level::Warn, .. })
    ));
    assert!(matches!(
      raw.appenders.get("console"),
      Some(AppenderConfigRaw::Console(ConsoleAppenderConfigRaw {
        target: ConsoleTarget::Stderr,
        ..
      }))
    ));

    let db = raw.loggers.get("my_app::db").unwrap();
    assert_eq!(db.level, Some(Level::Debug));
    assert!(!db.additive);
    assert!(db.include_location);
    assert_eq!(db.delivery, Some(DeliveryKind::AwaitCompletion));
    assert_eq!(db.appenders[0], AppenderRefRaw::Name("mem".to_string()));
    assert_eq!(db.appenders[1].name(), "console");
    assert_eq!(db.appenders[1].level(), Some(Level::Error));
  }

  #[test]
  fn rejects_unknown_fields() {
    let yaml = "version: 1\nloggers:\n  root:\n    levle: info\n";
    assert!(serde_yaml::from_str::<ConfigRaw>(yaml).is_err());
  }

  #[test]
  fn parses_json() {
    let json = r#"{"loggers": {"root": {"level": "TRACE"}}, "queue_capacity": 16}"#;
    let raw: ConfigRaw = serde_json::from_str(json).unwrap();
    assert_eq!(raw.version, 1);
    assert_eq!(raw.queue_capacity, Some(16));
    assert_eq!(raw.loggers["root"].level, Some(Level::Trace));
    assert!(raw.loggers["root"].additive);
  }
}
