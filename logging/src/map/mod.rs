// src/map/mod.rs
//! Sorted array-backed string map used to carry context data on log events.
//!
//! Keys live in one array kept in ascending order and values in a parallel
//! array, so lookups are a binary search and iteration allocates nothing.
//! Contexts are small, which makes shifting on insert cheaper in practice
//! than hashing. A `None` key is permitted and always sorts first.

mod value;

pub use value::ContextValue;

use crate::error::{Error, Result};

use std::collections::HashMap;
use std::fmt;

/// The map type attached to log events.
pub type StringMap = SortedArrayStringMap<ContextValue>;

pub const DEFAULT_INITIAL_CAPACITY: usize = 4;

/// Rounds `x` up to the next power of two (`1` for `0` and `1`).
pub fn ceiling_next_power_of_two(x: usize) -> usize {
  if x <= 1 {
    return 1;
  }
  1 << (usize::BITS - (x - 1).leading_zeros())
}

/// Borrowed form of a map key. `None` is the null key.
pub trait AsMapKey {
  fn as_key(&self) -> Option<&str>;
}

impl AsMapKey for str {
  fn as_key(&self) -> Option<&str> {
    Some(self)
  }
}

impl AsMapKey for String {
  fn as_key(&self) -> Option<&str> {
    Some(self.as_str())
  }
}

impl AsMapKey for Option<&str> {
  fn as_key(&self) -> Option<&str> {
    *self
  }
}

impl AsMapKey for Option<String> {
  fn as_key(&self) -> Option<&str> {
    self.as_deref()
  }
}

/// Owned form of a map key, consumed on insert.
pub trait IntoMapKey {
  fn into_key(self) -> Option<String>;
}

impl IntoMapKey for &str {
  fn into_key(self) -> Option<String> {
    Some(self.to_string())
  }
}

impl IntoMapKey for String {
  fn into_key(self) -> Option<String> {
    Some(self)
  }
}

impl IntoMapKey for &String {
  fn into_key(self) -> Option<String> {
    Some(self.clone())
  }
}

impl IntoMapKey for Option<&str> {
  fn into_key(self) -> Option<String> {
    self.map(str::to_string)
  }
}

impl IntoMapKey for Option<String> {
  fn into_key(self) -> Option<String> {
    self
  }
}

/// An ordered map from (nullable) string keys to values.
///
/// Both backing arrays are allocated lazily on the first insert, sized to
/// `threshold`, and doubled whenever `size` reaches it. Slots at and beyond
/// `size` are always empty.
///
/// Once [`freeze`](Self::freeze) has been called every mutating method fails
/// with [`Error::ImmutableState`] and leaves the contents untouched. Mutation
/// during [`for_each`](Self::for_each) is ruled out by the borrow checker;
/// shared thread-local maps report it as [`Error::ConcurrentModification`].
#[derive(Clone)]
pub struct SortedArrayStringMap<V> {
  keys: Vec<Option<String>>,
  values: Vec<Option<V>>,
  size: usize,
  threshold: usize,
  frozen: bool,
}

impl<V> SortedArrayStringMap<V> {
  pub fn new() -> Self {
    Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
  }

  pub fn with_capacity(initial_capacity: usize) -> Self {
    Self {
      keys: Vec::new(),
      values: Vec::new(),
      size: 0,
      threshold: ceiling_next_power_of_two(initial_capacity.max(1)),
      frozen: false,
    }
  }

  /// An unfrozen copy of `other`.
  pub fn copy_of(other: &Self) -> Self
  where
    V: Clone,
  {
    let mut map = Self::with_capacity(other.threshold);
    if other.size > 0 {
      map.init_from(other);
    }
    map
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.size
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.size == 0
  }

  /// Length of the backing arrays (`0` until the first insert).
  pub fn capacity(&self) -> usize {
    self.keys.len()
  }

  pub fn is_frozen(&self) -> bool {
    self.frozen
  }

  /// Makes the map permanently read-only. Idempotent.
  pub fn freeze(&mut self) {
    self.frozen = true;
  }

  /// Position of `key`, or `-(insertion_point) - 1` when absent.
  pub fn index_of_key<K: AsMapKey + ?Sized>(&self, key: &K) -> isize {
    if self.keys.is_empty() {
      return -1;
    }
    let key = key.as_key();
    match self.keys[..self.size].binary_search_by(|probe| probe.as_deref().cmp(&key)) {
      Ok(index) => index as isize,
      Err(insertion_point) => -(insertion_point as isize) - 1,
    }
  }

  pub fn contains_key<K: AsMapKey + ?Sized>(&self, key: &K) -> bool {
    self.index_of_key(key) >= 0
  }

  pub fn get<K: AsMapKey + ?Sized>(&self, key: &K) -> Option<&V> {
    let index = self.index_of_key(key);
    if index < 0 {
      return None;
    }
    self.values[index as usize].as_ref()
  }

  pub fn key_at(&self, index: usize) -> Option<&str> {
    if index >= self.size {
      return None;
    }
    self.keys[index].as_deref()
  }

  pub fn value_at(&self, index: usize) -> Option<&V> {
    if index >= self.size {
      return None;
    }
    self.values[index].as_ref()
  }

  /// Inserts or overwrites `key`.
  pub fn put(&mut self, key: impl IntoMapKey, value: V) -> Result<()> {
    self.assert_not_frozen()?;
    self.put_entry(key.into_key(), value, true);
    Ok(())
  }

  /// Removes `key`, returning its value. Absent keys are a no-op.
  pub fn remove<K: AsMapKey + ?Sized>(&mut self, key: &K) -> Result<Option<V>> {
    self.assert_not_frozen()?;
    let index = self.index_of_key(key);
    if index < 0 {
      return Ok(None);
    }
    let index = index as usize;
    let removed = self.values[index].take();
    self.keys[index] = None;
    self.keys[index..self.size].rotate_left(1);
    self.values[index..self.size].rotate_left(1);
    self.size -= 1;
    Ok(removed)
  }

  pub fn clear(&mut self) -> Result<()> {
    self.assert_not_frozen()?;
    for slot in &mut self.keys[..self.size] {
      *slot = None;
    }
    for slot in &mut self.values[..self.size] {
      *slot = None;
    }
    self.size = 0;
    Ok(())
  }

  /// Copies every entry of `source` into this map.
  ///
  /// On a key present in both maps the value from `source` wins.
  pub fn put_all(&mut self, source: &Self) -> Result<()>
  where
    V: Clone,
  {
    self.assert_not_frozen()?;
    if source.is_empty() {
      return Ok(());
    }
    if self.size == 0 {
      self.init_from(source);
    } else {
      self.merge(source);
    }
    Ok(())
  }

  /// Visits every entry in key order.
  pub fn for_each<F>(&self, mut action: F)
  where
    F: FnMut(Option<&str>, &V),
  {
    for i in 0..self.size {
      if let Some(value) = &self.values[i] {
        action(self.keys[i].as_deref(), value);
      }
    }
  }

  /// Like [`for_each`](Self::for_each) with a caller-supplied accumulator.
  pub fn for_each_with_state<S, F>(&self, mut action: F, state: &mut S)
  where
    F: FnMut(Option<&str>, &V, &mut S),
  {
    for i in 0..self.size {
      if let Some(value) = &self.values[i] {
        action(self.keys[i].as_deref(), value, state);
      }
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &V)> + '_ {
    self.keys[..self.size]
      .iter()
      .zip(self.values[..self.size].iter())
      .filter_map(|(k, v)| v.as_ref().map(|v| (k.as_deref(), v)))
  }

  /// Unordered copy with values rendered as strings. The null key maps to `""`.
  pub fn to_plain_map(&self) -> HashMap<String, String>
  where
    V: fmt::Display,
  {
    let mut result = HashMap::with_capacity(self.size);
    self.for_each(|k, v| {
      result.insert(k.unwrap_or_default().to_string(), v.to_string());
    });
    result
  }

  fn assert_not_frozen(&self) -> Result<()> {
    if self.frozen {
      return Err(Error::ImmutableState);
    }
    Ok(())
  }

  fn put_entry(&mut self, key: Option<String>, value: V, overwrite: bool) {
    if self.keys.is_empty() {
      self.inflate(self.threshold);
    }
    let index = self.index_of_key(&key);
    if index >= 0 {
      if overwrite {
        self.values[index as usize] = Some(value);
      }
    } else {
      self.insert_at((-(index + 1)) as usize, key, value);
    }
  }

  fn insert_at(&mut self, index: usize, key: Option<String>, value: V) {
    self.ensure_capacity();
    // The slot at `size` is empty, rotating it down opens a hole at `index`.
    self.keys[index..=self.size].rotate_right(1);
    self.values[index..=self.size].rotate_right(1);
    self.keys[index] = key;
    self.values[index] = Some(value);
    self.size += 1;
  }

  fn ensure_capacity(&mut self) {
    if self.size >= self.threshold {
      self.resize(self.threshold * 2);
    }
  }

  fn resize(&mut self, new_capacity: usize) {
    self.keys.resize_with(new_capacity, || None);
    self.values.resize_with(new_capacity, || None);
    self.threshold = new_capacity;
  }

  fn inflate(&mut self, to_size: usize) {
    self.threshold = to_size;
    self.keys = Vec::with_capacity(to_size);
    self.values = Vec::with_capacity(to_size);
    self.keys.resize_with(to_size, || None);
    self.values.resize_with(to_size, || None);
  }

  fn init_from(&mut self, other: &Self)
  where
    V: Clone,
  {
    if self.keys.len() < other.threshold {
      self.keys.resize_with(other.threshold, || None);
      self.values.resize_with(other.threshold, || None);
    }
    self.keys[..other.size].clone_from_slice(&other.keys[..other.size]);
    self.values[..other.size].clone_from_slice(&other.values[..other.size]);
    self.size = other.size;
    self.threshold = other.threshold;
  }

  fn merge(&mut self, other: &Self)
  where
    V: Clone,
  {
    let new_size = self.size + other.size;
    self.threshold = ceiling_next_power_of_two(new_size);
    if self.keys.len() < self.threshold {
      self.keys.resize_with(self.threshold, || None);
      self.values.resize_with(self.threshold, || None);
    }

    if other.size > self.size {
      // Lay the larger map down first, then fold our own entries in without
      // overwriting so the incoming values survive collisions.
      let my_size = self.size;
      let mine: Vec<(Option<String>, V)> = self.keys[..my_size]
        .iter_mut()
        .zip(self.values[..my_size].iter_mut())
        .filter_map(|(k, v)| v.take().map(|v| (k.take(), v)))
        .collect();

      self.keys[..other.size].clone_from_slice(&other.keys[..other.size]);
      self.values[..other.size].clone_from_slice(&other.values[..other.size]);
      self.size = other.size;

      for (key, value) in mine {
        self.put_entry(key, value, false);
      }
    } else {
      for i in 0..other.size {
        if let Some(value) = &other.values[i] {
          self.put_entry(other.keys[i].clone(), value.clone(), true);
        }
      }
    }
  }
}

impl<V> Default for SortedArrayStringMap<V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<V: PartialEq> PartialEq for SortedArrayStringMap<V> {
  fn eq(&self, other: &Self) -> bool {
    self.size == other.size && self.iter().eq(other.iter())
  }
}

impl<V: fmt::Debug> fmt::Debug for SortedArrayStringMap<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_map().entries(self.iter()).finish()
  }
}

impl<K: IntoMapKey, V> FromIterator<(K, V)> for SortedArrayStringMap<V> {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let iter = iter.into_iter();
    let mut map = Self::with_capacity(iter.size_hint().0);
    for (key, value) in iter {
      map.put_entry(key.into_key(), value, true);
    }
    map
  }
}

impl<V> From<HashMap<String, V>> for SortedArrayStringMap<V> {
  fn from(source: HashMap<String, V>) -> Self {
    source.into_iter().collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn keys_of<V>(map: &SortedArrayStringMap<V>) -> Vec<Option<String>> {
    map.iter().map(|(k, _)| k.map(str::to_string)).collect()
  }

  #[test]
  fn next_power_of_two() {
    assert_eq!(ceiling_next_power_of_two(0), 1);
    assert_eq!(ceiling_next_power_of_two(1), 1);
    assert_eq!(ceiling_next_power_of_two(3), 4);
    assert_eq!(ceiling_next_power_of_two(4), 4);
    assert_eq!(ceiling_next_power_of_two(5), 8);
    assert_eq!(ceiling_next_power_of_two(1000), 1024);
  }

  #[test]
  fn insertion_keeps_keys_sorted() {
    let mut map = SortedArrayStringMap::new();
    map.put("b", 1).unwrap();
    map.put("a", 2).unwrap();
    map.put("c", 3).unwrap();

    assert_eq!(
      keys_of(&map),
      vec![Some("a".into()), Some("b".into()), Some("c".into())]
    );
    let values: Vec<i32> = map.iter().map(|(_, v)| *v).collect();
    assert_eq!(values, vec![2, 1, 3]);
    assert_eq!(map.get("a"), Some(&2));
    assert_eq!(map.index_of_key("z"), -4);
    assert_eq!(map.index_of_key("0"), -1);
  }

  #[test]
  fn null_key_sorts_first() {
    let mut map = SortedArrayStringMap::new();
    map.put("a", 1).unwrap();
    map.put(None::<String>, 0).unwrap();
    assert_eq!(map.index_of_key(&None::<&str>), 0);
    assert_eq!(map.key_at(0), None);
    assert_eq!(map.key_at(1), Some("a"));
    assert_eq!(map.get(&None::<&str>), Some(&0));
    assert_eq!(map.to_plain_map().get(""), Some(&"0".to_string()));
  }

  #[test]
  fn grows_by_doubling() {
    let mut map = SortedArrayStringMap::new();
    assert_eq!(map.capacity(), 0);
    map.put("k0", 0).unwrap();
    assert_eq!(map.capacity(), DEFAULT_INITIAL_CAPACITY);
    for i in 1..5 {
      map.put(format!("k{}", i), i).unwrap();
    }
    assert_eq!(map.capacity(), 8);
    assert_eq!(map.len(), 5);
  }

  #[test]
  fn remove_shifts_tail() {
    let mut map: SortedArrayStringMap<i32> = ["a", "b", "c", "d"].iter().map(|k| (*k, 1)).collect();
    assert_eq!(map.remove("b").unwrap(), Some(1));
    assert_eq!(map.remove("zz").unwrap(), None);
    assert_eq!(
      keys_of(&map),
      vec![Some("a".into()), Some("c".into()), Some("d".into())]
    );
    assert_eq!(map.value_at(3), None);
  }

  #[test]
  fn frozen_map_rejects_every_mutation() {
    let mut map = SortedArrayStringMap::new();
    map.put("a", 1).unwrap();
    map.freeze();
    map.freeze();

    assert!(matches!(map.put("b", 2), Err(Error::ImmutableState)));
    assert!(matches!(map.remove("a"), Err(Error::ImmutableState)));
    assert!(matches!(map.remove("absent"), Err(Error::ImmutableState)));
    assert!(matches!(map.clear(), Err(Error::ImmutableState)));
    let other: SortedArrayStringMap<i32> = vec![("x", 9)].into_iter().collect();
    assert!(matches!(map.put_all(&other), Err(Error::ImmutableState)));
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("a"), Some(&1));
  }

  #[test]
  fn merge_incoming_wins_when_incoming_is_smaller() {
    let mut base: SortedArrayStringMap<&str> =
      vec![("a", "base"), ("b", "base"), ("c", "base")].into_iter().collect();
    let incoming: SortedArrayStringMap<&str> = vec![("b", "new")].into_iter().collect();
    base.put_all(&incoming).unwrap();
    assert_eq!(base.get("b"), Some(&"new"));
    assert_eq!(base.len(), 3);
  }

  #[test]
  fn merge_incoming_wins_when_incoming_is_larger() {
    let mut base: SortedArrayStringMap<&str> = vec![("b", "base"), ("z", "base")].into_iter().collect();
    let incoming: SortedArrayStringMap<&str> =
      vec![("a", "new"), ("b", "new"), ("c", "new")].into_iter().collect();
    base.put_all(&incoming).unwrap();
    assert_eq!(base.get("b"), Some(&"new"));
    assert_eq!(base.get("z"), Some(&"base"));
    assert_eq!(
      keys_of(&base),
      vec![
        Some("a".into()),
        Some("b".into()),
        Some("c".into()),
        Some("z".into())
      ]
    );
    assert_eq!(base.capacity(), 8);
  }

  #[test]
  fn put_all_into_empty_copies() {
    let mut target = SortedArrayStringMap::new();
    let source: SortedArrayStringMap<i32> = (0..10).map(|i| (format!("k{:02}", i), i)).collect();
    target.put_all(&source).unwrap();
    assert_eq!(target, source);
    target.put("k99", 99).unwrap();
    assert_eq!(target.len(), 11);
  }

  #[test]
  fn copy_of_is_unfrozen() {
    let mut map: SortedArrayStringMap<i32> = vec![("a", 1)].into_iter().collect();
    map.freeze();
    let mut copy = SortedArrayStringMap::copy_of(&map);
    assert!(!copy.is_frozen());
    copy.put("b", 2).unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(copy.len(), 2);
  }

  #[test]
  fn for_each_with_state_accumulates_in_order() {
    let map: SortedArrayStringMap<i32> = vec![("b", 2), ("a", 1)].into_iter().collect();
    let mut seen = String::new();
    map.for_each_with_state(
      |k, v, acc: &mut String| {
        acc.push_str(&format!("{}={};", k.unwrap_or("-"), v));
      },
      &mut seen,
    );
    assert_eq!(seen, "a=1;b=2;");
  }

  #[test]
  fn builds_from_hash_map() {
    let mut source = HashMap::new();
    source.insert("y".to_string(), ContextValue::from(1i64));
    source.insert("x".to_string(), ContextValue::from("v"));
    let map = StringMap::from(source);
    assert_eq!(map.key_at(0), Some("x"));
    assert_eq!(map.to_plain_map().get("y"), Some(&"1".to_string()));
  }
}
