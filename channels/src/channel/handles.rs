//! Connected reader/writer handles. Each handle holds one connection of its
//! role and gives it back on drop or explicit `close`.

use super::Channel;
use crate::error::ChannelError;
use crate::select::{SelectableInput, SelectorHandle};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::warn;

// --- Reader ---

/// The reading end of a [`Channel`].
///
/// Cloning connects another reader. The channel closes once every reader has
/// been dropped or closed.
#[derive(Debug)]
pub struct Reader<T: Send> {
  channel: Channel<T>,
  closed: AtomicBool,
}

impl<T: Send> Reader<T> {
  pub(crate) fn connect(channel: Channel<T>) -> Result<Self, ChannelError> {
    channel.connect_read()?;
    Ok(Self::attach(channel))
  }

  /// For channels created by this crate's constructors, which cannot be closed yet.
  pub(crate) fn new_connected(channel: Channel<T>) -> Self {
    if let Err(err) = channel.connect_read() {
      warn!(error = %err, "reader created on a closed channel");
      return Self {
        channel,
        closed: AtomicBool::new(true),
      };
    }
    Self::attach(channel)
  }

  fn attach(channel: Channel<T>) -> Self {
    Self {
      channel,
      closed: AtomicBool::new(false),
    }
  }

  /// See [`Channel::read`].
  pub fn read(&self) -> Result<T, ChannelError> {
    if self.closed.load(Ordering::Relaxed) {
      return Err(ChannelError::Closed);
    }
    self.channel.read()
  }

  /// See [`Channel::read_timeout`].
  pub fn read_timeout(&self, timeout: Duration) -> Result<Option<T>, ChannelError> {
    if self.closed.load(Ordering::Relaxed) {
      return Err(ChannelError::Closed);
    }
    self.channel.read_timeout(timeout)
  }

  /// Reads without waiting.
  pub fn try_read(&self) -> Result<Option<T>, ChannelError> {
    self.read_timeout(Duration::ZERO)
  }

  /// Disconnects this reader. A second call is a protocol violation.
  pub fn close(&self) -> Result<(), ChannelError> {
    if self
      .closed
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
      .is_ok()
    {
      self.channel.disconnect_read()
    } else {
      Err(ChannelError::ProtocolViolation("reader already closed"))
    }
  }

  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Relaxed) || self.channel.is_closed()
  }

  /// The underlying channel.
  pub fn channel(&self) -> &Channel<T> {
    &self.channel
  }
}

impl<T: Send> Clone for Reader<T> {
  fn clone(&self) -> Self {
    Self::new_connected(self.channel.clone())
  }
}

impl<T: Send> Drop for Reader<T> {
  fn drop(&mut self) {
    if !self.closed.swap(true, Ordering::AcqRel) {
      if let Err(err) = self.channel.disconnect_read() {
        warn!(error = %err, "reader disconnect failed on drop");
      }
    }
  }
}

impl<T: Send> SelectableInput for Reader<T> {
  fn enable(&self, selector: &SelectorHandle) -> bool {
    self.channel.enable(selector)
  }

  fn disable(&self) -> bool {
    // Always clear any registration, but a locally closed reader is never ready.
    let ready = self.channel.disable();
    ready && !self.closed.load(Ordering::Relaxed)
  }

  fn is_closed(&self) -> bool {
    Reader::is_closed(self)
  }
}

// --- Writer ---

/// The writing end of a [`Channel`].
///
/// Cloning connects another writer. Once every writer is gone the channel is
/// write-closed and closes when drained.
#[derive(Debug)]
pub struct Writer<T: Send> {
  channel: Channel<T>,
  closed: AtomicBool,
}

impl<T: Send> Writer<T> {
  pub(crate) fn connect(channel: Channel<T>) -> Result<Self, ChannelError> {
    channel.connect_write()?;
    Ok(Self {
      channel,
      closed: AtomicBool::new(false),
    })
  }

  pub(crate) fn new_connected(channel: Channel<T>) -> Self {
    let closed = match channel.connect_write() {
      Ok(()) => false,
      Err(err) => {
        warn!(error = %err, "writer created on a closed channel");
        true
      }
    };
    Self {
      channel,
      closed: AtomicBool::new(closed),
    }
  }

  /// See [`Channel::write`].
  pub fn write(&self, value: T) -> Result<(), ChannelError> {
    if self.closed.load(Ordering::Relaxed) {
      return Err(ChannelError::Closed);
    }
    self.channel.write(value)
  }

  /// Disconnects this writer. A second call is a protocol violation.
  pub fn close(&self) -> Result<(), ChannelError> {
    if self
      .closed
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
      .is_ok()
    {
      self.channel.disconnect_write()
    } else {
      Err(ChannelError::ProtocolViolation("writer already closed"))
    }
  }

  /// Returns `true` if this writer was closed or the channel is closed.
  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Relaxed) || self.channel.is_closed()
  }

  pub fn channel(&self) -> &Channel<T> {
    &self.channel
  }
}

impl<T: Send> Clone for Writer<T> {
  fn clone(&self) -> Self {
    Self::new_connected(self.channel.clone())
  }
}

impl<T: Send> Drop for Writer<T> {
  fn drop(&mut self) {
    if !self.closed.swap(true, Ordering::AcqRel) {
      if let Err(err) = self.channel.disconnect_write() {
        warn!(error = %err, "writer disconnect failed on drop");
      }
    }
  }
}
