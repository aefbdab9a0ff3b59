// src/marker.rs

use std::fmt;
use std::sync::Arc;

/// A named tag attached to a log call, optionally refining parent markers.
///
/// Markers are cheap to clone and compare by name.
#[derive(Clone)]
pub struct Marker {
  inner: Arc<MarkerInner>,
}

struct MarkerInner {
  name: String,
  parents: Vec<Marker>,
}

impl Marker {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      inner: Arc::new(MarkerInner {
        name: name.into(),
        parents: Vec::new(),
      }),
    }
  }

  pub fn with_parents(name: impl Into<String>, parents: Vec<Marker>) -> Self {
    Self {
      inner: Arc::new(MarkerInner {
        name: name.into(),
        parents,
      }),
    }
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  pub fn parents(&self) -> &[Marker] {
    &self.inner.parents
  }

  /// True if this marker is `name` or descends from a marker called `name`.
  pub fn is_instance_of(&self, name: &str) -> bool {
    if self.inner.name == name {
      return true;
    }
    self.inner.parents.iter().any(|p| p.is_instance_of(name))
  }
}

impl PartialEq for Marker {
  fn eq(&self, other: &Self) -> bool {
    self.inner.name == other.inner.name
  }
}

impl Eq for Marker {}

impl fmt::Debug for Marker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parents: Vec<&str> = self.inner.parents.iter().map(|p| p.name()).collect();
    f.debug_struct("Marker")
      .field("name", &self.inner.name)
      .field("parents", &parents)
      .finish()
  }
}

impl fmt::Display for Marker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.inner.name)?;
    if !self.inner.parents.is_empty() {
      f.write_str("[ ")?;
      for (i, parent) in self.inner.parents.iter().enumerate() {
        if i > 0 {
          f.write_str(", ")?;
        }
        write!(f, "{}", parent)?;
      }
      f.write_str(" ]")?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn instance_of_walks_parents() {
    let sql = Marker::new("SQL");
    let update = Marker::with_parents("SQL_UPDATE", vec![sql.clone()]);
    assert!(update.is_instance_of("SQL"));
    assert!(update.is_instance_of("SQL_UPDATE"));
    assert!(!sql.is_instance_of("SQL_UPDATE"));
    assert_eq!(update.to_string(), "SQL_UPDATE[ SQL ]");
  }
}
