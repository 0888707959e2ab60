//! Point-to-point endpoints that do not need a pluggable store.
//!
//! [`Endpoint`] supplies the locking, waiting and connect/disconnect/close
//! bookkeeping; an [`EndpointHooks`] implementation supplies the actual
//! `read_do`/`write_do` behaviour. Writes never wait: hooks accept every value.
//!
//! The same [`Roles`](roles::Roles) bookkeeping backs
//! [`Channel`](crate::channel::Channel) and
//! [`NamedMailbox`](crate::mailbox::NamedMailbox).

mod hooks;
pub(crate) mod roles;

pub use hooks::{Fifo, LatestValue};

use self::roles::{Roles, Transition};
use crate::error::ChannelError;
use crate::sync_util;
use crate::telemetry;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

/// The storage behaviour behind an [`Endpoint`]. Called with the endpoint's
/// state mutex held.
pub trait EndpointHooks<T>: Send {
  /// Takes the next value, if one is available.
  fn read_do(&mut self) -> Option<T>;

  /// Accepts a value.
  fn write_do(&mut self, value: T);

  /// Returns `true` if a `read_do` would yield nothing.
  fn is_drained(&self) -> bool;
}

struct EndpointState<H> {
  hooks: H,
  roles: Roles,
  interrupt_pending: bool,
}

struct EndpointShared<T, H> {
  read_role: Mutex<()>,
  write_role: Mutex<()>,
  state: Mutex<EndpointState<H>>,
  cond: Condvar,
  _marker: PhantomData<fn(T) -> T>,
}

/// A shared handle to an endpoint. Clones refer to the same endpoint.
pub struct Endpoint<T, H> {
  shared: Arc<EndpointShared<T, H>>,
}

impl<T, H> Clone for Endpoint<T, H> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T, H> fmt::Debug for Endpoint<T, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.shared.state.lock();
    f.debug_struct("Endpoint")
      .field("roles", &state.roles)
      .finish_non_exhaustive()
  }
}

impl<T: Send> Endpoint<T, Fifo<T>> {
  /// An endpoint delivering every value in write order.
  pub fn fifo() -> Self {
    Self::new(Fifo::default())
  }
}

impl<T: Send> Endpoint<T, LatestValue<T>> {
  /// An endpoint holding only the most recent unread value.
  pub fn latest() -> Self {
    Self::new(LatestValue::default())
  }
}

impl<T, H: EndpointHooks<T>> Endpoint<T, H> {
  pub fn new(hooks: H) -> Self {
    Self {
      shared: Arc::new(EndpointShared {
        read_role: Mutex::new(()),
        write_role: Mutex::new(()),
        state: Mutex::new(EndpointState {
          hooks,
          roles: Roles::default(),
          interrupt_pending: false,
        }),
        cond: Condvar::new(),
        _marker: PhantomData,
      }),
    }
  }

  /// The closed flag, with close-on-drain applied.
  fn settle(state: &mut EndpointState<H>) -> bool {
    let drained = state.hooks.is_drained();
    state.roles.settle(drained)
  }

  /// Reads a value, blocking until one is available.
  pub fn read(&self) -> Result<T, ChannelError> {
    loop {
      if let Some(value) = self.read_until(None)? {
        return Ok(value);
      }
    }
  }

  /// Reads a value, waiting at most `timeout`; `Ok(None)` on expiry.
  pub fn read_timeout(&self, timeout: Duration) -> Result<Option<T>, ChannelError> {
    self.read_until(sync_util::deadline_after(Some(timeout)))
  }

  fn read_until(&self, deadline: Option<Instant>) -> Result<Option<T>, ChannelError> {
    let shared = &*self.shared;
    let _role = shared.read_role.lock();
    let mut state = shared.state.lock();
    let mut parked = false;
    loop {
      if Self::settle(&mut state) {
        return Err(ChannelError::Closed);
      }
      if let Some(value) = state.hooks.read_do() {
        return Ok(Some(value));
      }
      if std::mem::take(&mut state.interrupt_pending) {
        state.roles.close();
        shared.cond.notify_all();
        warn!("endpoint wait interrupted, endpoint force-closed");
        return Err(ChannelError::WaitInterrupted);
      }
      if sync_util::expired(deadline) {
        return Ok(None);
      }
      if !parked {
        parked = true;
        telemetry::increment_counter("endpoint::read", "Parked");
      }
      sync_util::wait_until_deadline(&shared.cond, &mut state, deadline);
    }
  }

  /// Hands a value to the hooks and wakes a blocked reader.
  pub fn write(&self, value: T) -> Result<(), ChannelError> {
    let shared = &*self.shared;
    let _role = shared.write_role.lock();
    let mut state = shared.state.lock();
    if Self::settle(&mut state) || state.roles.is_write_closed() {
      return Err(ChannelError::Closed);
    }
    state.hooks.write_do(value);
    shared.cond.notify_all();
    Ok(())
  }

  pub fn connect_read(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    state.roles.connect_read()?;
    trace!(readers = state.roles.readers(), "endpoint reader connected");
    Ok(())
  }

  pub fn disconnect_read(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    if state.roles.disconnect_read()? == Transition::Closed {
      debug!("last endpoint reader disconnected, endpoint closed");
      self.shared.cond.notify_all();
    }
    Ok(())
  }

  pub fn connect_write(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    state.roles.connect_write()?;
    trace!(writers = state.roles.writers(), "endpoint writer connected");
    Ok(())
  }

  pub fn disconnect_write(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    if state.roles.disconnect_write()? == Transition::WriteClosed {
      debug!("last endpoint writer disconnected, endpoint write-closed");
      self.shared.cond.notify_all();
    }
    Ok(())
  }

  pub fn close(&self) {
    let mut state = self.shared.state.lock();
    if state.roles.close() {
      debug!("endpoint closed explicitly");
      self.shared.cond.notify_all();
    }
  }

  /// Closed, or write-closed with nothing left to read.
  pub fn is_closed(&self) -> bool {
    Self::settle(&mut self.shared.state.lock())
  }

  /// Breaks a blocked `read` with `WaitInterrupted` and force-closes.
  pub fn interrupt(&self) {
    let mut state = self.shared.state.lock();
    state.interrupt_pending = true;
    self.shared.cond.notify_all();
  }

  pub(crate) fn key(&self) -> usize {
    Arc::as_ptr(&self.shared) as *const () as usize
  }
}
