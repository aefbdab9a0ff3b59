// src/lifecycle.rs

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifeCycleState {
  Initialized = 0,
  Starting = 1,
  Started = 2,
  Stopping = 3,
  Stopped = 4,
}

impl LifeCycleState {
  fn from_u8(value: u8) -> Self {
    match value {
      0 => LifeCycleState::Initialized,
      1 => LifeCycleState::Starting,
      2 => LifeCycleState::Started,
      3 => LifeCycleState::Stopping,
      _ => LifeCycleState::Stopped,
    }
  }
}

/// Atomic lifecycle state shared by registries and configurations.
#[derive(Debug)]
pub struct LifeCycle {
  state: AtomicU8,
}

impl LifeCycle {
  pub fn new() -> Self {
    Self {
      state: AtomicU8::new(LifeCycleState::Initialized as u8),
    }
  }

  pub fn state(&self) -> LifeCycleState {
    LifeCycleState::from_u8(self.state.load(Ordering::Acquire))
  }

  pub fn set(&self, state: LifeCycleState) {
    self.state.store(state as u8, Ordering::Release);
  }

  /// Moves from `from` to `to` if currently in `from`.
  pub fn transition(&self, from: LifeCycleState, to: LifeCycleState) -> bool {
    self
      .state
      .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  /// Moves to `Starting` from `Initialized` or `Stopped`.
  pub fn begin_start(&self) -> bool {
    self.transition(LifeCycleState::Initialized, LifeCycleState::Starting)
      || self.transition(LifeCycleState::Stopped, LifeCycleState::Starting)
  }

  /// Moves to `Stopping` from `Started` or `Initialized`.
  pub fn begin_stop(&self) -> bool {
    self.transition(LifeCycleState::Started, LifeCycleState::Stopping)
      || self.transition(LifeCycleState::Initialized, LifeCycleState::Stopping)
  }

  pub fn is_started(&self) -> bool {
    self.state() == LifeCycleState::Started
  }

  pub fn is_stopped(&self) -> bool {
    self.state() == LifeCycleState::Stopped
  }
}

impl Default for LifeCycle {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn start_stop_cycle() {
    let lifecycle = LifeCycle::new();
    assert!(lifecycle.begin_start());
    assert!(!lifecycle.begin_start());
    lifecycle.set(LifeCycleState::Started);
    assert!(lifecycle.is_started());
    assert!(lifecycle.begin_stop());
    lifecycle.set(LifeCycleState::Stopped);
    assert!(lifecycle.is_stopped());
    assert!(lifecycle.begin_start());
  }
}
