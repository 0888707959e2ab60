use super::EndpointHooks;

use std::collections::VecDeque;
use std::fmt;

/// Unbounded FIFO hooks: every value is delivered, in write order.
pub struct Fifo<T> {
  queue: VecDeque<T>,
}

impl<T> Default for Fifo<T> {
  fn default() -> Self {
    Self {
      queue: VecDeque::new(),
    }
  }
}

impl<T> fmt::Debug for Fifo<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Fifo").field("len", &self.queue.len()).finish()
  }
}

impl<T: Send> EndpointHooks<T> for Fifo<T> {
  fn read_do(&mut self) -> Option<T> {
    self.queue.pop_front()
  }

  fn write_do(&mut self, value: T) {
    self.queue.push_back(value);
  }

  fn is_drained(&self) -> bool {
    self.queue.is_empty()
  }
}

/// Single-cell hooks: a write replaces any value not yet read.
pub struct LatestValue<T> {
  cell: Option<T>,
  replaced: u64,
}

impl<T> LatestValue<T> {
  /// How many unread values were replaced by newer ones.
  pub fn replaced(&self) -> u64 {
    self.replaced
  }
}

impl<T> Default for LatestValue<T> {
  fn default() -> Self {
    Self {
      cell: None,
      replaced: 0,
    }
  }
}

impl<T> fmt::Debug for LatestValue<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LatestValue")
      .field("occupied", &self.cell.is_some())
      .field("replaced", &self.replaced)
      .finish()
  }
}

impl<T: Send> EndpointHooks<T> for LatestValue<T> {
  fn read_do(&mut self) -> Option<T> {
    self.cell.take()
  }

  fn write_do(&mut self, value: T) {
    if self.cell.replace(value).is_some() {
      self.replaced += 1;
    }
  }

  fn is_drained(&self) -> bool {
    self.cell.is_none()
  }
}
