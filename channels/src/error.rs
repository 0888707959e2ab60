// src/error.rs

use thiserror::Error;

/// Errors raised by channels, endpoints, mailboxes and selectors.
///
/// Timeouts are not errors: a bounded read or select that runs out of time
/// returns `Ok(None)`.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ChannelError {
  /// The channel (or mailbox, or endpoint) is closed, or every active input of
  /// a select is closed.
  #[error("channel closed")]
  Closed,
  /// A connect/disconnect call broke the reference-counting contract, or an
  /// operation was handed arguments that do not match the object it targets.
  #[error("protocol violation: {0}")]
  ProtocolViolation(&'static str),
  /// A blocking wait was interrupted. The owning object has been force-closed
  /// and every other waiter woken before this was returned.
  #[error("wait interrupted")]
  WaitInterrupted,
  /// A configuration could not be turned into a store.
  #[error("invalid channel configuration: {0}")]
  InvalidConfig(String),
}

impl ChannelError {
  /// Returns `true` for [`ChannelError::Closed`].
  #[inline]
  pub fn is_closed(&self) -> bool {
    matches!(self, ChannelError::Closed)
  }
}
