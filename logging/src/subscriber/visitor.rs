// src/subscriber/visitor.rs

use crate::context::ScopedContext;
use crate::map::ContextValue;

use tracing::field::{Field, Visit};

/// Collects the fields of a `tracing` event: `message` becomes the log
/// message and every other field becomes a context entry.
#[derive(Debug, Default)]
pub(crate) struct ContextFieldVisitor {
  pub(crate) message: Option<String>,
  pub(crate) fields: Vec<(String, ContextValue)>,
}

impl ContextFieldVisitor {
  fn record(&mut self, field: &Field, value: ContextValue) {
    if field.name() == "message" && self.message.is_none() {
      self.message = Some(value.to_string());
    } else {
      self.fields.push((field.name().to_string(), value));
    }
  }

  /// Puts the collected fields into the thread context until the returned
  /// guard is dropped.
  pub(crate) fn scope_fields(&mut self) -> ScopedContext {
    self
      .fields
      .drain(..)
      .fold(ScopedContext::new(), |scope, (key, value)| scope.put(&key, value))
  }
}

impl Visit for ContextFieldVisitor {
  fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
    let rendered = format!("{:?}", value);
    if field.name() == "message" {
      self.record(field, ContextValue::String(rendered));
    } else {
      self.record(field, ContextValue::Debug(rendered));
    }
  }

  fn record_str(&mut self, field: &Field, value: &str) {
    self.record(field, ContextValue::from(value));
  }

  fn record_i64(&mut self, field: &Field, value: i64) {
    self.record(field, ContextValue::Int(value));
  }

  fn record_u64(&mut self, field: &Field, value: u64) {
    self.record(field, ContextValue::from(value));
  }

  fn record_f64(&mut self, field: &Field, value: f64) {
    self.record(field, ContextValue::Float(value));
  }

  fn record_bool(&mut self, field: &Field, value: bool) {
    self.record(field, ContextValue::Bool(value));
  }
}
