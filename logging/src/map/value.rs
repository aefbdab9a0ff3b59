// src/map/value.rs

use std::fmt;

/// A value carried in context data. Mirrors the scalar kinds a `tracing`
/// visitor can record, with `Debug` holding pre-rendered debug output.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
  String(String),
  Int(i64),
  Float(f64),
  Bool(bool),
  Debug(String),
}

impl ContextValue {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      ContextValue::String(s) | ContextValue::Debug(s) => Some(s),
      _ => None,
    }
  }
}

impl fmt::Display for ContextValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ContextValue::String(s) => f.write_str(s),
      ContextValue::Int(i) => write!(f, "{}", i),
      ContextValue::Float(fl) => write!(f, "{}", fl),
      ContextValue::Bool(b) => write!(f, "{}", b),
      ContextValue::Debug(s) => f.write_str(s),
    }
  }
}

impl From<&str> for ContextValue {
  fn from(s: &str) -> Self {
    ContextValue::String(s.to_string())
  }
}

impl From<String> for ContextValue {
  fn from(s: String) -> Self {
    ContextValue::String(s)
  }
}

impl From<i64> for ContextValue {
  fn from(i: i64) -> Self {
    ContextValue::Int(i)
  }
}

impl From<i32> for ContextValue {
  fn from(i: i32) -> Self {
    ContextValue::Int(i as i64)
  }
}

impl From<u64> for ContextValue {
  fn from(i: u64) -> Self {
    // Values above i64::MAX are kept as text rather than wrapped.
    match i64::try_from(i) {
      Ok(v) => ContextValue::Int(v),
      Err(_) => ContextValue::String(i.to_string()),
    }
  }
}

impl From<f64> for ContextValue {
  fn from(f: f64) -> Self {
    ContextValue::Float(f)
  }
}

impl From<bool> for ContextValue {
  fn from(b: bool) -> Self {
    ContextValue::Bool(b)
  }
}
