// src/context/injector.rs

use super::{ThreadContext, ThreadContextMap};
use crate::config::Property;
use crate::error::Result;
use crate::map::{ContextValue, StringMap};

use std::fmt;
use std::sync::Arc;

/// Supplies the context data attached to each log event.
///
/// The two methods have different thread-safety contracts and are
/// deliberately named apart:
///
/// * [`inject_context_data`](Self::inject_context_data) returns a frozen map
///   that may travel with the event to any thread.
/// * [`with_raw_context_data`](Self::with_raw_context_data) lends the live,
///   thread-local data to a closure and must not be retained.
pub trait ContextDataInjector: Send + Sync + fmt::Debug {
  /// Builds the event's context data.
  ///
  /// Declared `properties` go in first and the live context is merged over
  /// them, so ambient values win on a shared key. `reusable` is an unfrozen
  /// map whose allocation may be reused for the result.
  fn inject_context_data(
    &self,
    properties: &[Property],
    reusable: StringMap,
  ) -> Result<Arc<StringMap>>;

  fn with_raw_context_data(&self, visitor: &mut dyn FnMut(&StringMap));
}

/// Injects data from the thread context map.
#[derive(Debug, Clone, Copy)]
pub struct ThreadContextDataInjector {
  map: &'static dyn ThreadContextMap,
}

impl ThreadContextDataInjector {
  pub fn new() -> Self {
    Self {
      map: ThreadContext::context_map(),
    }
  }

  pub fn with_map(map: &'static dyn ThreadContextMap) -> Self {
    Self { map }
  }
}

impl Default for ThreadContextDataInjector {
  fn default() -> Self {
    Self::new()
  }
}

impl ContextDataInjector for ThreadContextDataInjector {
  fn inject_context_data(
    &self,
    properties: &[Property],
    mut reusable: StringMap,
  ) -> Result<Arc<StringMap>> {
    if properties.is_empty() {
      return Ok(self.map.current_snapshot());
    }

    reusable.clear()?;
    for property in properties {
      reusable.put(property.name(), ContextValue::from(property.value()))?;
    }

    let mut merged = Ok(());
    self.map.with_live_view(&mut |live| {
      merged = reusable.put_all(live);
    });
    merged?;

    reusable.freeze();
    Ok(Arc::new(reusable))
  }

  fn with_raw_context_data(&self, visitor: &mut dyn FnMut(&StringMap)) {
    self.map.with_live_view(visitor)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::{CopyOnWriteContextMap, GarbageFreeContextMap};
  use pretty_assertions::assert_eq;

  static COW: CopyOnWriteContextMap = CopyOnWriteContextMap;
  static GF: GarbageFreeContextMap = GarbageFreeContextMap;

  fn check_ambient_wins(map: &'static dyn ThreadContextMap) {
    map.put("env", "request".into()).unwrap();
    map.put("user", "alice".into()).unwrap();

    let injector = ThreadContextDataInjector::with_map(map);
    let properties = vec![
      Property::new("env", "declared"),
      Property::new("region", "eu"),
    ];
    let data = injector
      .inject_context_data(&properties, StringMap::new())
      .unwrap();

    assert!(data.is_frozen());
    assert_eq!(data.get("env"), Some(&ContextValue::from("request")));
    assert_eq!(data.get("region"), Some(&ContextValue::from("eu")));
    assert_eq!(data.get("user"), Some(&ContextValue::from("alice")));

    // The returned map is detached from later thread context changes.
    map.put("user", "bob".into()).unwrap();
    assert_eq!(data.get("user"), Some(&ContextValue::from("alice")));
    map.clear().unwrap();
  }

  #[test]
  fn ambient_overrides_declared_properties_copy_on_write() {
    check_ambient_wins(&COW);
  }

  #[test]
  fn ambient_overrides_declared_properties_garbage_free() {
    check_ambient_wins(&GF);
  }

  #[test]
  fn without_properties_returns_the_snapshot() {
    COW.put("k", "v".into()).unwrap();
    let injector = ThreadContextDataInjector::with_map(&COW);
    let data = injector.inject_context_data(&[], StringMap::new()).unwrap();
    assert!(Arc::ptr_eq(&data, &COW.current_snapshot()));
    COW.clear().unwrap();
  }

  #[test]
  fn raw_view_sees_live_data() {
    GF.put("k", "v".into()).unwrap();
    let injector = ThreadContextDataInjector::with_map(&GF);
    let mut seen = 0;
    injector.with_raw_context_data(&mut |live| seen = live.len());
    assert_eq!(seen, 1);
    GF.clear().unwrap();
  }
}
