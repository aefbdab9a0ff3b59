// src/context/scoped.rs

use super::ThreadContext;
use crate::error_handling::{InternalErrorReport, InternalErrorSource};
use crate::map::ContextValue;
use crate::status::StatusLogger;

use std::marker::PhantomData;

/// Adds entries to the thread context for as long as the guard lives.
///
/// Keys put through the guard get their previous values back on drop (or are
/// removed if they were absent) and pushed stack entries are popped. The
/// guard is tied to the thread that created it.
#[must_use = "context entries are removed as soon as the guard is dropped"]
pub struct ScopedContext {
  saved: Vec<(String, Option<ContextValue>)>,
  pushed: usize,
  _not_send: PhantomData<*const ()>,
}

impl ScopedContext {
  pub fn new() -> Self {
    Self {
      saved: Vec::new(),
      pushed: 0,
      _not_send: PhantomData,
    }
  }

  pub fn with(key: &str, value: impl Into<ContextValue>) -> Self {
    Self::new().put(key, value)
  }

  pub fn put(mut self, key: &str, value: impl Into<ContextValue>) -> Self {
    if !self.saved.iter().any(|(k, _)| k == key) {
      self.saved.push((key.to_string(), ThreadContext::get(key)));
    }
    if let Err(e) = ThreadContext::put(key, value) {
      report(&e, key);
    }
    self
  }

  pub fn push(mut self, message: impl Into<String>) -> Self {
    ThreadContext::push(message);
    self.pushed += 1;
    self
  }
}

impl Default for ScopedContext {
  fn default() -> Self {
    Self::new()
  }
}

impl Drop for ScopedContext {
  fn drop(&mut self) {
    for _ in 0..self.pushed {
      ThreadContext::pop();
    }
    for (key, previous) in self.saved.drain(..).rev() {
      let restored = match previous {
        Some(value) => ThreadContext::put(&key, value),
        None => ThreadContext::remove(&key),
      };
      if let Err(e) = restored {
        report(&e, &key);
      }
    }
  }
}

fn report(error: &crate::error::Error, key: &str) {
  StatusLogger::global().report(InternalErrorReport::new(
    InternalErrorSource::ContextInjection,
    error,
    Some(format!("scoped context key '{}'", key)),
  ));
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;

  #[test]
  fn restores_previous_values_on_drop() {
    thread::spawn(|| {
      ThreadContext::put("user", "outer").unwrap();
      {
        let _scope = ScopedContext::with("user", "inner")
          .put("request", 42i64)
          .push("handling");
        assert_eq!(ThreadContext::get("user"), Some(ContextValue::from("inner")));
        assert_eq!(ThreadContext::get("request"), Some(ContextValue::Int(42)));
        assert_eq!(ThreadContext::peek().as_deref(), Some("handling"));
      }
      assert_eq!(ThreadContext::get("user"), Some(ContextValue::from("outer")));
      assert!(!ThreadContext::contains_key("request"));
      assert_eq!(ThreadContext::depth(), 0);
      ThreadContext::clear_all().unwrap();
    })
    .join()
    .unwrap();
  }

  #[test]
  fn nested_scopes_unwind_in_order() {
    thread::spawn(|| {
      let outer = ScopedContext::with("k", "1");
      {
        let _inner = ScopedContext::with("k", "2");
        assert_eq!(ThreadContext::get("k"), Some(ContextValue::from("2")));
      }
      assert_eq!(ThreadContext::get("k"), Some(ContextValue::from("1")));
      drop(outer);
      assert_eq!(ThreadContext::get("k"), None);
    })
    .join()
    .unwrap();
  }
}
