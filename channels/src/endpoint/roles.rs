//! Reader/writer reference counting and the close state machine shared by
//! channels, endpoints and mailboxes. Always used under the owner's state mutex.

use crate::error::ChannelError;

/// What a disconnect did to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
  /// Other connections of the same role remain.
  Unchanged,
  /// The last reader left; the owner is now closed.
  Closed,
  /// The last writer left; the owner closes once drained.
  WriteClosed,
}

#[derive(Debug, Default)]
pub(crate) struct Roles {
  /// Only ever goes from false to true.
  closed: bool,
  /// Only ever goes from false to true.
  write_closed: bool,
  readers: usize,
  writers: usize,
}

impl Roles {
  /// Roles for an owner with no writers ever expected (e.g. an iterable-backed channel).
  pub(crate) fn write_closed_from_start() -> Self {
    Self {
      write_closed: true,
      ..Self::default()
    }
  }

  pub(crate) fn readers(&self) -> usize {
    self.readers
  }

  pub(crate) fn writers(&self) -> usize {
    self.writers
  }

  pub(crate) fn is_write_closed(&self) -> bool {
    self.write_closed
  }

  /// The stored flag, without the close-on-drain transition.
  pub(crate) fn is_closed_flag(&self) -> bool {
    self.closed
  }

  /// Close-on-drain: once write-closed with nothing pending, the owner is
  /// closed for good. Returns the (possibly updated) closed flag.
  pub(crate) fn settle(&mut self, drained: bool) -> bool {
    if !self.closed && self.write_closed && drained {
      self.closed = true;
    }
    self.closed
  }

  /// Forces the closed state. Returns `true` if this call closed it.
  pub(crate) fn close(&mut self) -> bool {
    !std::mem::replace(&mut self.closed, true)
  }

  pub(crate) fn connect_read(&mut self) -> Result<(), ChannelError> {
    if self.closed {
      return Err(ChannelError::Closed);
    }
    self.readers += 1;
    Ok(())
  }

  pub(crate) fn connect_write(&mut self) -> Result<(), ChannelError> {
    if self.closed {
      return Err(ChannelError::Closed);
    }
    self.writers += 1;
    Ok(())
  }

  pub(crate) fn disconnect_read(&mut self) -> Result<Transition, ChannelError> {
    if self.readers == 0 {
      return Err(ChannelError::ProtocolViolation(
        "disconnect_read without a connected reader",
      ));
    }
    self.readers -= 1;
    if self.readers == 0 && self.close() {
      return Ok(Transition::Closed);
    }
    Ok(Transition::Unchanged)
  }

  pub(crate) fn disconnect_write(&mut self) -> Result<Transition, ChannelError> {
    if self.writers == 0 {
      return Err(ChannelError::ProtocolViolation(
        "disconnect_write without a connected writer",
      ));
    }
    self.writers -= 1;
    if self.writers == 0 && !self.write_closed {
      self.write_closed = true;
      return Ok(Transition::WriteClosed);
    }
    Ok(Transition::Unchanged)
  }
}
