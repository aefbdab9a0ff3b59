// src/scratch.rs
//! Per-thread ring of reusable string buffers.
//!
//! A buffer handed out by [`with_buffer`] is reused by the 32nd following
//! acquisition on the same thread. The closure form keeps callers from
//! holding on to it longer than that.

use std::cell::RefCell;

pub const RING_SIZE: usize = 32;

const MAX_RETAINED_CAPACITY: usize = 4096;

struct Ring {
  buffers: Vec<String>,
  cursor: usize,
}

thread_local! {
  static RING: RefCell<Ring> = RefCell::new(Ring {
    buffers: (0..RING_SIZE).map(|_| String::new()).collect(),
    cursor: 0,
  });
}

/// Runs `f` with an empty scratch buffer from the current thread's ring.
///
/// Re-entrant calls receive distinct buffers. If thread-local storage is
/// already torn down a fresh buffer is used.
pub fn with_buffer<R>(f: impl FnOnce(&mut String) -> R) -> R {
  let taken = RING
    .try_with(|ring| {
      let mut ring = ring.borrow_mut();
      let slot = ring.cursor;
      ring.cursor = (ring.cursor + 1) & (RING_SIZE - 1);
      (slot, std::mem::take(&mut ring.buffers[slot]))
    })
    .ok();

  let Some((slot, mut buffer)) = taken else {
    return f(&mut String::new());
  };

  buffer.clear();
  let result = f(&mut buffer);

  if buffer.capacity() <= MAX_RETAINED_CAPACITY {
    let _ = RING.try_with(|ring| {
      let mut ring = ring.borrow_mut();
      ring.buffers[slot] = buffer;
    });
  }
  result
}
