//! Per-thread write connections.
//!
//! A thread that writes to a shared channel from many call sites can ask
//! [`ThreadConnectionCache`] to hold its write connection instead of threading
//! a [`Writer`](crate::channel::Writer) through every call. The first
//! `ensure_connected` on a thread connects a writer; later calls are no-ops.
//! When the thread exits, its cache is dropped and every cached connection is
//! disconnected, so a channel written only through the cache write-closes once
//! all its writer threads have finished.

use crate::channel::Channel;
use crate::endpoint::{Endpoint, EndpointHooks};
use crate::error::ChannelError;
use crate::mailbox::NamedMailbox;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use tracing::{trace, warn};

/// Anything a thread can hold a write connection to.
pub trait WriteConnect: Send + Sync + 'static {
  /// Identifies the underlying shared object; clones share a key.
  fn connection_key(&self) -> usize;

  fn connect_write(&self) -> Result<(), ChannelError>;

  fn disconnect_write(&self) -> Result<(), ChannelError>;
}

impl<T: Send + 'static> WriteConnect for Channel<T> {
  fn connection_key(&self) -> usize {
    self.key()
  }

  fn connect_write(&self) -> Result<(), ChannelError> {
    Channel::connect_write(self)
  }

  fn disconnect_write(&self) -> Result<(), ChannelError> {
    Channel::disconnect_write(self)
  }
}

impl<T: Send + 'static> WriteConnect for NamedMailbox<T> {
  fn connection_key(&self) -> usize {
    self.key()
  }

  fn connect_write(&self) -> Result<(), ChannelError> {
    NamedMailbox::connect_write(self)
  }

  fn disconnect_write(&self) -> Result<(), ChannelError> {
    NamedMailbox::disconnect_write(self)
  }
}

impl<T, H> WriteConnect for Endpoint<T, H>
where
  T: Send + 'static,
  H: EndpointHooks<T> + 'static,
{
  fn connection_key(&self) -> usize {
    self.key()
  }

  fn connect_write(&self) -> Result<(), ChannelError> {
    Endpoint::connect_write(self)
  }

  fn disconnect_write(&self) -> Result<(), ChannelError> {
    Endpoint::disconnect_write(self)
  }
}

#[derive(Default)]
struct ConnectionSet {
  connections: HashMap<usize, Box<dyn WriteConnect>>,
}

impl Drop for ConnectionSet {
  fn drop(&mut self) {
    for (_, connection) in self.connections.drain() {
      if let Err(err) = connection.disconnect_write() {
        warn!(error = %err, "cached write connection failed to disconnect at thread exit");
      }
    }
  }
}

thread_local! {
  static CONNECTIONS: RefCell<ConnectionSet> = RefCell::new(ConnectionSet::default());
}

fn with_connections<R>(
  f: impl FnOnce(&mut ConnectionSet) -> Result<R, ChannelError>,
) -> Result<R, ChannelError> {
  CONNECTIONS
    .try_with(|set| f(&mut set.borrow_mut()))
    .unwrap_or(Err(ChannelError::ProtocolViolation(
      "connection cache used during thread teardown",
    )))
}

/// The calling thread's cache of write connections.
#[derive(Clone, Copy, Default)]
pub struct ThreadConnectionCache;

impl fmt::Debug for ThreadConnectionCache {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let held = CONNECTIONS
      .try_with(|set| set.borrow().connections.len())
      .unwrap_or(0);
    f.debug_struct("ThreadConnectionCache")
      .field("held", &held)
      .finish()
  }
}

impl ThreadConnectionCache {
  /// Connects the calling thread as a writer of `target` unless it already is.
  /// Returns `true` if a new connection was made.
  ///
  /// # Errors
  ///
  /// `Closed` if `target` refuses the connection.
  pub fn ensure_connected<C: WriteConnect + Clone>(target: &C) -> Result<bool, ChannelError> {
    with_connections(|set| {
      let key = target.connection_key();
      if set.connections.contains_key(&key) {
        return Ok(false);
      }
      target.connect_write()?;
      set.connections.insert(key, Box::new(target.clone()));
      trace!(key, "thread write connection cached");
      Ok(true)
    })
  }

  /// Whether the calling thread holds a cached connection to `target`.
  pub fn is_connected<C: WriteConnect>(target: &C) -> bool {
    CONNECTIONS
      .try_with(|set| set.borrow().connections.contains_key(&target.connection_key()))
      .unwrap_or(false)
  }

  /// Disconnects the calling thread's cached connection to `target`, if any.
  /// Returns `true` if one was released.
  pub fn release<C: WriteConnect>(target: &C) -> Result<bool, ChannelError> {
    let removed = with_connections(|set| Ok(set.connections.remove(&target.connection_key())))?;
    match removed {
      // Disconnect outside the borrow.
      Some(connection) => connection.disconnect_write().map(|()| true),
      None => Ok(false),
    }
  }

  /// Disconnects every connection the calling thread holds and returns how
  /// many there were. All are attempted; the first error is returned.
  pub fn release_all() -> Result<usize, ChannelError> {
    let drained: Vec<_> =
      with_connections(|set| Ok(set.connections.drain().map(|(_, c)| c).collect()))?;
    let count = drained.len();
    let mut first_err = None;
    for connection in drained {
      if let Err(err) = connection.disconnect_write() {
        first_err.get_or_insert(err);
      }
    }
    match first_err {
      Some(err) => Err(err),
      None => Ok(count),
    }
  }
}
