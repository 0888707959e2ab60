// src/channel/mod.rs

//! Rendezvous channels with a pluggable [`ValueStore`].
//!
//! A [`Channel`] combines a store with reader/writer reference counting and a
//! single slot in which a [`Selector`](crate::select::Selector) can park.
//! Three mutexes guard it:
//!
//! - a **reader-role** mutex, held for the whole of a `read`, so concurrent
//!   readers never interleave;
//! - a **writer-role** mutex, held for the whole of a `write` (including the
//!   wait for a reader to drain a full slot);
//! - a **state** mutex over the store, flags and selector slot, released
//!   while parked on the state condition.
//!
//! With the default [`ZeroBuffer`] store a `write` only returns once a reader
//! has taken the value.
//!
//! ### Closing
//!
//! - The last reader disconnecting (or an explicit [`Channel::close`]) closes
//!   the channel at once and wakes everyone.
//! - The last writer disconnecting marks it *write-closed*; it becomes closed
//!   as soon as the store drains ("close-on-drain").
//!
//! ```
//! use std::thread;
//! use switchyard::channel;
//!
//! let (tx, rx) = channel::rendezvous();
//! let producer = thread::spawn(move || tx.write(42));
//! assert_eq!(rx.read().unwrap(), 42);
//! producer.join().unwrap().unwrap();
//! ```

mod handles;

pub use handles::{Reader, Writer};

use crate::config::ChannelConfig;
use crate::endpoint::roles::{Roles, Transition};
use crate::error::ChannelError;
use crate::select::{SelectableInput, SelectorHandle};
use crate::store::{Buffer, InfiniteBuffer, IterStore, StoreState, ValueStore, ZeroBuffer};
use crate::sync_util;
use crate::telemetry;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

// --- Shared State ---

struct ChannelState<T> {
  store: Box<dyn ValueStore<T>>,
  roles: Roles,
  /// At most one parked selector, never owned.
  selector: Option<SelectorHandle>,
  interrupt_pending: bool,
}

impl<T> ChannelState<T> {
  /// The closed flag, with close-on-drain applied.
  fn check_closed(&mut self) -> bool {
    let drained = self.store.state() == StoreState::Empty;
    self.roles.settle(drained)
  }

  fn take_interrupt(&mut self) -> bool {
    std::mem::replace(&mut self.interrupt_pending, false)
  }

  /// Tells a parked selector this channel has closed, then forgets it.
  fn release_selector(&mut self) {
    if let Some(selector) = self.selector.take() {
      selector.close_channel();
    }
  }
}

struct ChannelShared<T> {
  name: Option<Arc<str>>,
  read_role: Mutex<()>,
  write_role: Mutex<()>,
  state: Mutex<ChannelState<T>>,
  cond: Condvar,
}

impl<T> ChannelShared<T> {
  fn name(&self) -> &str {
    self.name.as_deref().unwrap_or("-")
  }

  /// Force-closes after an interrupted wait so nobody is left parked.
  fn abort_wait(&self, state: &mut ChannelState<T>) -> ChannelError {
    state.roles.close();
    state.release_selector();
    self.cond.notify_all();
    warn!(channel = self.name(), "wait interrupted, channel force-closed");
    ChannelError::WaitInterrupted
  }
}

// --- Public Channel Handle ---

/// A channel shared between any number of readers and writers.
///
/// Cloning the handle does not connect anything; it is another reference to
/// the same channel. Use [`reader`](Self::reader)/[`writer`](Self::writer) for
/// connected RAII handles, or call the `connect_*`/`disconnect_*` methods
/// directly.
pub struct Channel<T> {
  shared: Arc<ChannelShared<T>>,
}

impl<T> Clone for Channel<T> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T> fmt::Debug for Channel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.shared.state.lock();
    f.debug_struct("Channel")
      .field("name", &self.shared.name)
      .field("store", &state.store.state())
      .field("roles", &state.roles)
      .field("selector", &state.selector.is_some())
      .finish()
  }
}

impl<T: Send + 'static> Channel<T> {
  /// A channel over the given store.
  pub fn new(store: Box<dyn ValueStore<T>>) -> Self {
    Self::build(store, Roles::default(), None)
  }

  /// A zero-buffer (synchronous hand-off) channel.
  pub fn zero() -> Self {
    Self::new(Box::new(ZeroBuffer::new()))
  }

  /// A channel built from a configuration.
  pub fn with_config(config: &ChannelConfig) -> Result<Self, ChannelError> {
    let store = config.store.build()?;
    Ok(Self::build(store, Roles::default(), config.name.as_deref()))
  }

  /// A read-only channel over an already-computed sequence. It has no writers
  /// and closes once the sequence is drained.
  pub fn from_iter<I>(items: I) -> Self
  where
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
  {
    Self::build(
      Box::new(IterStore::new(items)),
      Roles::write_closed_from_start(),
      None,
    )
  }

  fn build(store: Box<dyn ValueStore<T>>, roles: Roles, name: Option<&str>) -> Self {
    Self {
      shared: Arc::new(ChannelShared {
        name: name.map(Arc::from),
        read_role: Mutex::new(()),
        write_role: Mutex::new(()),
        state: Mutex::new(ChannelState {
          store,
          roles,
          selector: None,
          interrupt_pending: false,
        }),
        cond: Condvar::new(),
      }),
    }
  }
}

impl<T> Channel<T> {
  /// The configured name, if any.
  pub fn name(&self) -> Option<&str> {
    self.shared.name.as_deref()
  }

  /// Reads a value, blocking until one is available.
  ///
  /// # Errors
  ///
  /// - `Closed` if the channel is closed, or closes while waiting.
  /// - `WaitInterrupted` if [`interrupt`](Self::interrupt) broke the wait.
  pub fn read(&self) -> Result<T, ChannelError> {
    loop {
      if let Some(value) = self.read_until(None)? {
        return Ok(value);
      }
    }
  }

  /// Reads a value, waiting at most `timeout`. Returns `Ok(None)` if the
  /// channel is still empty when the timeout expires. A zero timeout polls.
  pub fn read_timeout(&self, timeout: Duration) -> Result<Option<T>, ChannelError> {
    self.read_until(sync_util::deadline_after(Some(timeout)))
  }

  fn read_until(&self, deadline: Option<Instant>) -> Result<Option<T>, ChannelError> {
    let shared = &*self.shared;
    let _role = shared.read_role.lock();
    let mut state = shared.state.lock();
    let mut parked = false;
    loop {
      if state.check_closed() {
        return Err(ChannelError::Closed);
      }
      if let Some(value) = state.store.get() {
        // Releases a writer waiting for the slot to drain.
        shared.cond.notify_all();
        return Ok(Some(value));
      }
      if state.take_interrupt() {
        return Err(shared.abort_wait(&mut state));
      }
      if sync_util::expired(deadline) {
        return Ok(None);
      }
      if !parked {
        parked = true;
        telemetry::increment_counter("channel::read", "Parked");
      }
      sync_util::wait_until_deadline(&shared.cond, &mut state, deadline);
    }
  }

  /// Writes a value.
  ///
  /// Returns once the value has been stored and, if that filled the store,
  /// once a reader has drained it again. On a zero-buffer channel that means
  /// a reader has taken this very value.
  ///
  /// # Errors
  ///
  /// - `Closed` if the channel is closed or write-closed, or closes before a
  ///   reader drains the full slot.
  /// - `WaitInterrupted` if [`interrupt`](Self::interrupt) broke the wait.
  ///   An interrupted write is reported this way rather than as `Closed`.
  pub fn write(&self, value: T) -> Result<(), ChannelError> {
    let shared = &*self.shared;
    let _role = shared.write_role.lock();
    let mut state = shared.state.lock();
    if state.check_closed() || state.roles.is_write_closed() {
      return Err(ChannelError::Closed);
    }

    let selector = state.selector.clone();
    if state.store.put(value).is_err() {
      return Err(ChannelError::ProtocolViolation("value store refused a put"));
    }
    shared.cond.notify_all();
    if let Some(selector) = selector {
      selector.schedule();
    }

    let mut parked = false;
    while state.store.state() == StoreState::Full {
      if state.roles.is_closed_flag() {
        return Err(ChannelError::Closed);
      }
      if state.take_interrupt() {
        return Err(shared.abort_wait(&mut state));
      }
      if !parked {
        parked = true;
        telemetry::increment_counter("channel::write", "Parked");
      }
      shared.cond.wait(&mut state);
    }
    Ok(())
  }

  pub fn connect_read(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    state.roles.connect_read()?;
    trace!(channel = self.shared.name(), readers = state.roles.readers(), "reader connected");
    Ok(())
  }

  /// Disconnects a reader. The last reader closes the channel.
  pub fn disconnect_read(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    if state.roles.disconnect_read()? == Transition::Closed {
      debug!(channel = self.shared.name(), "last reader disconnected, channel closed");
      state.release_selector();
      self.shared.cond.notify_all();
    }
    Ok(())
  }

  pub fn connect_write(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    state.roles.connect_write()?;
    trace!(channel = self.shared.name(), writers = state.roles.writers(), "writer connected");
    Ok(())
  }

  /// Disconnects a writer. The last writer makes the channel write-closed; it
  /// closes once drained.
  pub fn disconnect_write(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    if state.roles.disconnect_write()? == Transition::WriteClosed {
      debug!(channel = self.shared.name(), "last writer disconnected, channel write-closed");
      state.release_selector();
      self.shared.cond.notify_all();
    }
    Ok(())
  }

  /// Closes the channel permanently, waking every waiter.
  pub fn close(&self) {
    let mut state = self.shared.state.lock();
    if state.roles.close() {
      debug!(channel = self.shared.name(), "channel closed explicitly");
      state.release_selector();
      self.shared.cond.notify_all();
    }
  }

  /// Returns `true` once the channel is closed, including the close-on-drain
  /// case: write-closed with an empty store.
  pub fn is_closed(&self) -> bool {
    self.shared.state.lock().check_closed()
  }

  /// Returns `true` once the last writer has disconnected.
  pub fn is_write_closed(&self) -> bool {
    self.shared.state.lock().roles.is_write_closed()
  }

  /// Breaks a blocked `read` or `write` with `WaitInterrupted`.
  ///
  /// The interrupted thread force-closes the channel. If nobody is blocked,
  /// the next wait is the one interrupted.
  pub fn interrupt(&self) {
    let mut state = self.shared.state.lock();
    state.interrupt_pending = true;
    self.shared.cond.notify_all();
  }

  /// Current fill level of the store.
  pub fn store_state(&self) -> StoreState {
    self.shared.state.lock().store.state()
  }

  /// Number of values pending in the store.
  pub fn len(&self) -> usize {
    self.shared.state.lock().store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn reader_count(&self) -> usize {
    self.shared.state.lock().roles.readers()
  }

  pub fn writer_count(&self) -> usize {
    self.shared.state.lock().roles.writers()
  }

  /// Identity of the underlying channel, stable while any handle is alive.
  pub(crate) fn key(&self) -> usize {
    Arc::as_ptr(&self.shared) as *const () as usize
  }
}

impl<T: Send> Channel<T> {
  /// Connects a reader and returns a handle that disconnects on drop.
  pub fn reader(&self) -> Result<Reader<T>, ChannelError> {
    Reader::connect(self.clone())
  }

  /// Connects a writer and returns a handle that disconnects on drop.
  pub fn writer(&self) -> Result<Writer<T>, ChannelError> {
    Writer::connect(self.clone())
  }
}

// --- Selector integration ---

impl<T: Send> SelectableInput for Channel<T> {
  /// Parks `selector` on this channel if it is empty. A non-empty or closed
  /// channel answers `true` without parking, so the selector goes straight to
  /// its disable scan.
  fn enable(&self, selector: &SelectorHandle) -> bool {
    let mut state = self.shared.state.lock();
    if state.check_closed() || state.store.state().has_value() {
      return true;
    }
    let already_parked = state
      .selector
      .as_ref()
      .is_some_and(|parked| parked.same_selector(selector));
    if already_parked {
      // Listed twice in one selector: one registration serves both inputs.
      selector.enroll();
    } else {
      selector.register();
      state.selector = Some(selector.clone());
    }
    false
  }

  fn disable(&self) -> bool {
    let mut state = self.shared.state.lock();
    state.selector = None;
    state.store.state().has_value()
  }

  fn is_closed(&self) -> bool {
    Channel::is_closed(self)
  }
}

// --- Constructors ---

/// A connected writer/reader pair over a zero-buffer channel.
pub fn rendezvous<T: Send + 'static>() -> (Writer<T>, Reader<T>) {
  pair(Channel::zero())
}

/// A connected pair over a bounded FIFO of `capacity` values. A capacity of
/// `0` gives a rendezvous channel.
pub fn buffered<T: Send + 'static>(capacity: usize) -> (Writer<T>, Reader<T>) {
  match Buffer::new(capacity) {
    Some(buffer) => pair(Channel::new(Box::new(buffer))),
    None => rendezvous(),
  }
}

/// A connected pair over an unbounded FIFO; writes never wait.
pub fn unbounded<T: Send + 'static>() -> (Writer<T>, Reader<T>) {
  pair(Channel::new(Box::new(InfiniteBuffer::new())))
}

/// A connected reader over an already-computed sequence.
pub fn from_iter<I>(items: I) -> Reader<I::Item>
where
  I: IntoIterator,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
{
  Reader::new_connected(Channel::from_iter(items))
}

fn pair<T: Send>(channel: Channel<T>) -> (Writer<T>, Reader<T>) {
  (
    Writer::new_connected(channel.clone()),
    Reader::new_connected(channel),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;

  #[test]
  fn zero_buffer_never_holds_two_values() {
    let channel = Channel::<u32>::zero();
    let reader = {
      let channel = channel.clone();
      thread::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..50 {
          assert!(channel.len() <= 1);
          seen.push(channel.read().unwrap());
        }
        seen
      })
    };
    for i in 0..50 {
      channel.write(i).unwrap();
      assert!(channel.len() <= 1);
    }
    assert_eq!(reader.join().unwrap(), (0..50).collect::<Vec<_>>());
    assert_eq!(channel.store_state(), StoreState::Empty);
  }

  #[test]
  fn read_timeout_on_empty_returns_none() {
    let channel = Channel::<u8>::zero();
    assert_eq!(channel.read_timeout(Duration::ZERO), Ok(None));
    assert_eq!(channel.read_timeout(Duration::from_millis(20)), Ok(None));
    assert!(!channel.is_closed());
  }

  #[test]
  fn write_after_write_close_fails() {
    let channel: Channel<i32> = Channel::new(Box::new(InfiniteBuffer::new()));
    channel.connect_write().unwrap();
    channel.write(1).unwrap();
    channel.disconnect_write().unwrap();
    assert_eq!(channel.write(2), Err(ChannelError::Closed));
    // Backlog still readable, then closed on drain.
    assert_eq!(channel.read(), Ok(1));
    assert!(channel.is_closed());
    assert_eq!(channel.read(), Err(ChannelError::Closed));
  }

  #[test]
  fn enable_registers_only_when_empty() {
    let channel: Channel<i32> = Channel::new(Box::new(InfiniteBuffer::new()));
    let core = Arc::new(crate::select::core::SelectorCore::default());
    let handle = SelectorHandle::new(&core);
    assert!(!channel.enable(&handle));
    assert!(!channel.disable());
    channel.write(5).unwrap();
    assert!(channel.enable(&handle));
    assert!(channel.disable());
  }

  #[test]
  fn duplicate_enable_registers_once() {
    let channel = Channel::<u8>::zero();
    let core = Arc::new(crate::select::core::SelectorCore::default());
    let handle = SelectorHandle::new(&core);
    assert!(!channel.enable(&handle));
    assert!(!channel.enable(&handle));
    assert_eq!(core.enrolled(), 2);

    channel.connect_write().unwrap();
    channel.disconnect_write().unwrap();
    // The single close notification drops the registration count to zero.
    let start = Instant::now();
    core.block(Some(start + Duration::from_secs(2)), false);
    assert!(start.elapsed() < Duration::from_secs(1));
  }

  #[test]
  fn with_config_names_the_channel() {
    let config = ChannelConfig::named("edge-1");
    let channel = Channel::<i32>::with_config(&config).unwrap();
    assert_eq!(channel.name(), Some("edge-1"));
    assert_eq!(channel.store_state(), StoreState::Empty);
  }
}
