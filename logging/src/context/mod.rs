// src/context/mod.rs
//! Thread-scoped ambient context: a key/value map and a message stack that
//! every log event on the thread picks up.
//!
//! Two storage strategies are available for the map. `CopyOnWrite` replaces
//! a frozen map on every mutation, so snapshots are pointer copies.
//! `GarbageFree` mutates a single map in place and copies it when a snapshot
//! is requested. The active strategy is read once from `FIBRE_CONTEXT_MAP`.

mod injector;
mod scoped;

pub use injector::{ContextDataInjector, ThreadContextDataInjector};
pub use scoped::ScopedContext;

use crate::error::{Error, Result};
use crate::map::{ContextValue, StringMap};

use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Environment variable selecting the context map storage strategy.
pub const CONTEXT_MAP_ENV: &str = "FIBRE_CONTEXT_MAP";

static EMPTY_SNAPSHOT: Lazy<Arc<StringMap>> = Lazy::new(|| {
  let mut map = StringMap::new();
  map.freeze();
  Arc::new(map)
});

static MODE: Lazy<ContextMapMode> = Lazy::new(|| {
  std::env::var(CONTEXT_MAP_ENV)
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or_default()
});

static COPY_ON_WRITE: CopyOnWriteContextMap = CopyOnWriteContextMap;
static GARBAGE_FREE: GarbageFreeContextMap = GarbageFreeContextMap;

thread_local! {
  static COW_MAP: RefCell<Option<Arc<StringMap>>> = const { RefCell::new(None) };
  static GF_MAP: RefCell<StringMap> = RefCell::new(StringMap::new());
  static STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// A frozen, empty map shared by every empty snapshot.
pub fn empty_snapshot() -> Arc<StringMap> {
  EMPTY_SNAPSHOT.clone()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextMapMode {
  #[default]
  CopyOnWrite,
  GarbageFree,
}

impl FromStr for ContextMapMode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
      "copy_on_write" | "copyonwrite" => Ok(ContextMapMode::CopyOnWrite),
      "garbage_free" | "garbagefree" => Ok(ContextMapMode::GarbageFree),
      other => Err(Error::InvalidConfigValue {
        field: CONTEXT_MAP_ENV.to_string(),
        message: format!("unknown context map mode '{}'", other),
      }),
    }
  }
}

/// Storage for the current thread's context map.
///
/// `current_snapshot` returns a frozen map that may be sent to other threads.
/// `with_live_view` exposes the live storage to a closure on the calling
/// thread only; the reference cannot escape the closure.
pub trait ThreadContextMap: Send + Sync + fmt::Debug {
  fn put(&self, key: &str, value: ContextValue) -> Result<()>;

  fn put_all(&self, entries: &StringMap) -> Result<()>;

  fn get(&self, key: &str) -> Option<ContextValue>;

  fn remove(&self, key: &str) -> Result<()>;

  fn remove_all(&self, keys: &[&str]) -> Result<()>;

  fn clear(&self) -> Result<()>;

  fn contains_key(&self, key: &str) -> bool;

  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn current_snapshot(&self) -> Arc<StringMap>;

  fn with_live_view(&self, visitor: &mut dyn FnMut(&StringMap));
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CopyOnWriteContextMap;

impl CopyOnWriteContextMap {
  fn update<F>(&self, mutate: F) -> Result<()>
  where
    F: FnOnce(&mut StringMap) -> Result<()>,
  {
    COW_MAP.with(|cell| {
      let mut slot = cell
        .try_borrow_mut()
        .map_err(|_| Error::ConcurrentModification)?;
      let mut next = match slot.as_deref() {
        Some(current) => StringMap::copy_of(current),
        None => StringMap::new(),
      };
      mutate(&mut next)?;
      next.freeze();
      *slot = Some(Arc::new(next));
      Ok(())
    })
  }

  fn current(&self) -> Option<Arc<StringMap>> {
    COW_MAP
      .try_with(|cell| cell.try_borrow().ok().and_then(|slot| slot.clone()))
      .ok()
      .flatten()
  }
}

impl ThreadContextMap for CopyOnWriteContextMap {
  fn put(&self, key: &str, value: ContextValue) -> Result<()> {
    self.update(|map| map.put(key, value))
  }

  fn put_all(&self, entries: &StringMap) -> Result<()> {
    if entries.is_empty() {
      return Ok(());
    }
    self.update(|map| map.put_all(entries))
  }

  fn get(&self, key: &str) -> Option<ContextValue> {
    self.current().and_then(|map| map.get(key).cloned())
  }

  fn remove(&self, key: &str) -> Result<()> {
    if !self.contains_key(key) {
      return Ok(());
    }
    self.update(|map| map.remove(key).map(|_| ()))
  }

  fn remove_all(&self, keys: &[&str]) -> Result<()> {
    self.update(|map| {
      for key in keys {
        map.remove(*key)?;
      }
      Ok(())
    })
  }

  fn clear(&self) -> Result<()> {
    COW_MAP.with(|cell| {
      let mut slot = cell
        .try_borrow_mut()
        .map_err(|_| Error::ConcurrentModification)?;
      *slot = None;
      Ok(())
    })
  }

  fn contains_key(&self, key: &str) -> bool {
    self.current().is_some_and(|map| map.contains_key(key))
  }

  fn len(&self) -> usize {
    self.current().map_or(0, |map| map.len())
  }

  fn current_snapshot(&self) -> Arc<StringMap> {
    self.current().unwrap_or_else(empty_snapshot)
  }

  fn with_live_view(&self, visitor: &mut dyn FnMut(&StringMap)) {
    // The published map is already immutable; mutations from inside the
    // visitor replace it rather than touch what is being visited.
    let current = self.current_snapshot();
    visitor(current.as_ref());
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GarbageFreeContextMap;

impl GarbageFreeContextMap {
  fn update<F, R>(&self, mutate: F) -> Result<R>
  where
    F: FnOnce(&mut StringMap) -> Result<R>,
  {
    GF_MAP.with(|cell| {
      let mut map = cell
        .try_borrow_mut()
        .map_err(|_| Error::ConcurrentModification)?;
      mutate(&mut *map)
    })
  }

  fn read<R>(&self, default: R, f: impl FnOnce(&StringMap) -> R) -> R {
    GF_MAP
      .try_with(|cell| match cell.try_borrow() {
        Ok(map) => Some(f(&*map)),
        Err(_) => None,
      })
      .ok()
      .flatten()
      .unwrap_or(default)
  }
}

impl ThreadContextMap for GarbageFreeContextMap {
  fn put(&self, key: &str, value: ContextValue) -> Result<()> {
    self.update(|map| map.put(key, value))
  }

  fn put_all(&self, entries: &StringMap) -> Result<()> {
    self.update(|map| map.put_all(entries))
  }

  fn get(&self, key: &str) -> Option<ContextValue> {
    self.read(None, |map| map.get(key).cloned())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.update(|map| map.remove(key).map(|_| ()))
  }

  fn remove_all(&self, keys: &[&str]) -> Result<()> {
    self.update(|map| {
      for key in keys {
        map.remove(*key)?;
      }
      Ok(())
    })
  }

  fn clear(&self) -> Result<()> {
    self.update(|map| map.clear())
  }

  fn contains_key(&self, key: &str) -> bool {
    self.read(false, |map| map.contains_key(key))
  }

  fn len(&self) -> usize {
    self.read(0, |map| map.len())
  }

  fn current_snapshot(&self) -> Arc<StringMap> {
    self.read(None, |map| {
      if map.is_empty() {
        None
      } else {
        let mut copy = StringMap::copy_of(map);
        copy.freeze();
        Some(Arc::new(copy))
      }
    })
    .unwrap_or_else(empty_snapshot)
  }

  fn with_live_view(&self, visitor: &mut dyn FnMut(&StringMap)) {
    let visited = GF_MAP
      .try_with(|cell| match cell.try_borrow() {
        Ok(map) => {
          visitor(&*map);
          true
        }
        Err(_) => false,
      })
      .unwrap_or(false);
    if !visited {
      let empty = empty_snapshot();
      visitor(empty.as_ref());
    }
  }
}

/// Facade over the current thread's context map and stack.
pub struct ThreadContext;

impl ThreadContext {
  pub fn mode() -> ContextMapMode {
    *MODE
  }

  /// The map implementation selected for this process.
  pub fn context_map() -> &'static dyn ThreadContextMap {
    Self::context_map_for(Self::mode())
  }

  pub fn context_map_for(mode: ContextMapMode) -> &'static dyn ThreadContextMap {
    match mode {
      ContextMapMode::CopyOnWrite => &COPY_ON_WRITE,
      ContextMapMode::GarbageFree => &GARBAGE_FREE,
    }
  }

  pub fn put(key: &str, value: impl Into<ContextValue>) -> Result<()> {
    Self::context_map().put(key, value.into())
  }

  pub fn put_all(entries: &StringMap) -> Result<()> {
    Self::context_map().put_all(entries)
  }

  pub fn get(key: &str) -> Option<ContextValue> {
    Self::context_map().get(key)
  }

  pub fn remove(key: &str) -> Result<()> {
    Self::context_map().remove(key)
  }

  pub fn remove_all(keys: &[&str]) -> Result<()> {
    Self::context_map().remove_all(keys)
  }

  pub fn clear_map() -> Result<()> {
    Self::context_map().clear()
  }

  pub fn contains_key(key: &str) -> bool {
    Self::context_map().contains_key(key)
  }

  pub fn len() -> usize {
    Self::context_map().len()
  }

  pub fn is_empty() -> bool {
    Self::context_map().is_empty()
  }

  pub fn current_snapshot() -> Arc<StringMap> {
    Self::context_map().current_snapshot()
  }

  pub fn with_live_view<F: FnMut(&StringMap)>(mut visitor: F) {
    Self::context_map().with_live_view(&mut visitor)
  }

  pub fn push(message: impl Into<String>) {
    let message = message.into();
    STACK.with(|stack| stack.borrow_mut().push(message));
  }

  pub fn pop() -> Option<String> {
    STACK.with(|stack| stack.borrow_mut().pop())
  }

  pub fn peek() -> Option<String> {
    STACK.with(|stack| stack.borrow().last().cloned())
  }

  pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
  }

  pub fn clear_stack() {
    STACK.with(|stack| stack.borrow_mut().clear());
  }

  /// Copy of the stack, bottom first.
  pub fn stack_snapshot() -> Vec<String> {
    STACK
      .try_with(|stack| stack.borrow().clone())
      .unwrap_or_default()
  }

  /// Clears both the map and the stack of the current thread.
  pub fn clear_all() -> Result<()> {
    Self::clear_stack();
    Self::clear_map()
  }
}
