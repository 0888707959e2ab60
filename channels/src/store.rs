//! Pluggable storage strategies for a channel's in-flight values.
//!
//! A [`ValueStore`] only decides *where* values wait and *when* the slot counts
//! as full. All locking and blocking is done by the owning
//! [`Channel`](crate::channel::Channel), which calls into the store while
//! holding its state mutex.
//!
//! | Store | Capacity | Reports `Full` |
//! |---|---|---|
//! | [`ZeroBuffer`] | 1 | after every `put` (true rendezvous) |
//! | [`Buffer`] | `n >= 1` | when `n` values are pending |
//! | [`InfiniteBuffer`] | unbounded | never |
//! | [`OverwriteOldest`] | `n >= 1` | never; the oldest value is dropped instead |
//! | [`IterStore`] | read-only | never; `put` is refused |

use std::collections::VecDeque;
use std::fmt;

/// How much a store currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreState {
  /// Nothing to read.
  Empty,
  /// At least one value to read, and room for another `put`.
  Partial,
  /// No room for another `put` until a value is taken.
  Full,
}

impl StoreState {
  /// Returns `true` if a `get` would yield a value.
  #[inline]
  pub fn has_value(self) -> bool {
    self != StoreState::Empty
  }
}

/// Storage strategy for a channel.
///
/// Contract: `put` is only called while the state is not [`StoreState::Full`],
/// and `get` only while it is not [`StoreState::Empty`]. A store that cannot
/// accept a value hands it back as `Err(value)`.
pub trait ValueStore<T>: Send {
  /// Current fill level.
  fn state(&self) -> StoreState;

  /// Stores `value`, or returns it if the store refuses it.
  fn put(&mut self, value: T) -> Result<(), T>;

  /// Removes and returns the next value, if any.
  fn get(&mut self) -> Option<T>;

  /// Number of values currently pending.
  fn len(&self) -> usize;

  /// Returns `true` if nothing is pending.
  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

// --- ZeroBuffer ---

/// A single slot with no queuing. Every `put` makes it `Full`, so a writer
/// blocks until a reader has taken the value.
pub struct ZeroBuffer<T> {
  slot: Option<T>,
}

impl<T> ZeroBuffer<T> {
  pub fn new() -> Self {
    Self { slot: None }
  }
}

impl<T> Default for ZeroBuffer<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> fmt::Debug for ZeroBuffer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ZeroBuffer")
      .field("occupied", &self.slot.is_some())
      .finish()
  }
}

impl<T: Send> ValueStore<T> for ZeroBuffer<T> {
  fn state(&self) -> StoreState {
    if self.slot.is_some() {
      StoreState::Full
    } else {
      StoreState::Empty
    }
  }

  fn put(&mut self, value: T) -> Result<(), T> {
    if self.slot.is_some() {
      return Err(value);
    }
    self.slot = Some(value);
    Ok(())
  }

  fn get(&mut self) -> Option<T> {
    self.slot.take()
  }

  fn len(&self) -> usize {
    usize::from(self.slot.is_some())
  }
}

// --- Buffer ---

/// A bounded FIFO holding up to `capacity` values.
pub struct Buffer<T> {
  queue: VecDeque<T>,
  capacity: usize,
}

impl<T> Buffer<T> {
  /// Creates a buffer. Returns `None` for a zero capacity; use [`ZeroBuffer`]
  /// for rendezvous behaviour.
  pub fn new(capacity: usize) -> Option<Self> {
    if capacity == 0 {
      return None;
    }
    Some(Self {
      queue: VecDeque::with_capacity(capacity.min(1024)),
      capacity,
    })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }
}

impl<T> fmt::Debug for Buffer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Buffer")
      .field("len", &self.queue.len())
      .field("capacity", &self.capacity)
      .finish()
  }
}

impl<T: Send> ValueStore<T> for Buffer<T> {
  fn state(&self) -> StoreState {
    match self.queue.len() {
      0 => StoreState::Empty,
      n if n >= self.capacity => StoreState::Full,
      _ => StoreState::Partial,
    }
  }

  fn put(&mut self, value: T) -> Result<(), T> {
    if self.queue.len() >= self.capacity {
      return Err(value);
    }
    self.queue.push_back(value);
    Ok(())
  }

  fn get(&mut self) -> Option<T> {
    self.queue.pop_front()
  }

  fn len(&self) -> usize {
    self.queue.len()
  }
}

// --- InfiniteBuffer ---

/// An unbounded FIFO. Writers never wait.
pub struct InfiniteBuffer<T> {
  queue: VecDeque<T>,
}

impl<T> InfiniteBuffer<T> {
  pub fn new() -> Self {
    Self {
      queue: VecDeque::new(),
    }
  }
}

impl<T> Default for InfiniteBuffer<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> fmt::Debug for InfiniteBuffer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InfiniteBuffer")
      .field("len", &self.queue.len())
      .finish()
  }
}

impl<T: Send> ValueStore<T> for InfiniteBuffer<T> {
  fn state(&self) -> StoreState {
    if self.queue.is_empty() {
      StoreState::Empty
    } else {
      StoreState::Partial
    }
  }

  fn put(&mut self, value: T) -> Result<(), T> {
    self.queue.push_back(value);
    Ok(())
  }

  fn get(&mut self) -> Option<T> {
    self.queue.pop_front()
  }

  fn len(&self) -> usize {
    self.queue.len()
  }
}

// --- OverwriteOldest ---

/// A bounded FIFO that never blocks writers: once `capacity` values are
/// pending, each further `put` evicts the oldest one.
pub struct OverwriteOldest<T> {
  queue: VecDeque<T>,
  capacity: usize,
  overwritten: u64,
}

impl<T> OverwriteOldest<T> {
  /// Returns `None` for a zero capacity.
  pub fn new(capacity: usize) -> Option<Self> {
    if capacity == 0 {
      return None;
    }
    Some(Self {
      queue: VecDeque::with_capacity(capacity.min(1024)),
      capacity,
      overwritten: 0,
    })
  }

  /// How many values have been evicted so far.
  pub fn overwritten(&self) -> u64 {
    self.overwritten
  }
}

impl<T> fmt::Debug for OverwriteOldest<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("OverwriteOldest")
      .field("len", &self.queue.len())
      .field("capacity", &self.capacity)
      .field("overwritten", &self.overwritten)
      .finish()
  }
}

impl<T: Send> ValueStore<T> for OverwriteOldest<T> {
  fn state(&self) -> StoreState {
    if self.queue.is_empty() {
      StoreState::Empty
    } else {
      StoreState::Partial
    }
  }

  fn put(&mut self, value: T) -> Result<(), T> {
    if self.queue.len() >= self.capacity {
      self.queue.pop_front();
      self.overwritten += 1;
    }
    self.queue.push_back(value);
    Ok(())
  }

  fn get(&mut self) -> Option<T> {
    self.queue.pop_front()
  }

  fn len(&self) -> usize {
    self.queue.len()
  }
}

// --- IterStore ---

/// A read-only store over an already-materialized sequence.
///
/// It reports `Partial` while items remain and `Empty` once the iterator is
/// exhausted; `put` is always refused. One item is fetched ahead so that
/// `state` does not need to touch the iterator.
pub struct IterStore<I: Iterator> {
  next: Option<I::Item>,
  rest: I,
}

impl<I: Iterator> IterStore<I> {
  pub fn new<U>(items: U) -> Self
  where
    U: IntoIterator<IntoIter = I>,
  {
    let mut rest = items.into_iter();
    let next = rest.next();
    Self { next, rest }
  }
}

impl<I: Iterator> fmt::Debug for IterStore<I> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IterStore")
      .field("exhausted", &self.next.is_none())
      .finish_non_exhaustive()
  }
}

impl<I> ValueStore<I::Item> for IterStore<I>
where
  I: Iterator + Send,
  I::Item: Send,
{
  fn state(&self) -> StoreState {
    if self.next.is_some() {
      StoreState::Partial
    } else {
      StoreState::Empty
    }
  }

  fn put(&mut self, value: I::Item) -> Result<(), I::Item> {
    Err(value)
  }

  fn get(&mut self) -> Option<I::Item> {
    let value = self.next.take()?;
    self.next = self.rest.next();
    Some(value)
  }

  fn len(&self) -> usize {
    // Only the prefetched item is known without draining the iterator.
    usize::from(self.next.is_some())
  }
}
