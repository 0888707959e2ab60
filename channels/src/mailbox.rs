//! A many-producer mailbox multiplexed by name.
//!
//! Every write is stamped with the next value of one mailbox-wide sequence
//! counter. A read restricted to a set of names takes the value whose stamp is
//! smallest among the heads of those names' queues, i.e. the oldest pending
//! write among them. Reads over a fixed name set therefore see values in
//! nondecreasing sequence order, however other names are interleaved.
//!
//! ```
//! use switchyard::mailbox::NamedMailbox;
//!
//! let mailbox = NamedMailbox::new();
//! mailbox.write("a", 1).unwrap();
//! mailbox.write("b", 2).unwrap();
//! mailbox.write("a", 3).unwrap();
//!
//! let names = ["a", "b"];
//! assert_eq!(mailbox.read(&names).unwrap(), ("a".to_string(), 1));
//! assert_eq!(mailbox.read(&names).unwrap(), ("b".to_string(), 2));
//! assert_eq!(mailbox.read(&names).unwrap(), ("a".to_string(), 3));
//! ```

use crate::endpoint::roles::{Roles, Transition};
use crate::error::ChannelError;
use crate::sync_util;
use crate::telemetry;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

/// A value together with the sequence number assigned when it was written.
struct Stamped<T> {
  seq: u64,
  value: T,
}

struct MailboxState<T> {
  /// Only names with pending values have an entry.
  queues: HashMap<String, VecDeque<Stamped<T>>>,
  next_seq: u64,
  roles: Roles,
  /// Bumped by `notify_readers` so parked readers re-run their scan.
  reader_notify_count: u64,
  interrupt_pending: bool,
}

impl<T> MailboxState<T> {
  fn check_closed(&mut self) -> bool {
    let drained = self.queues.is_empty();
    self.roles.settle(drained)
  }

  /// The name whose head carries the smallest sequence number among those
  /// accepted by `filter`.
  fn oldest_match<F>(&self, filter: &F) -> Option<String>
  where
    F: Fn(&str) -> bool + ?Sized,
  {
    self
      .queues
      .iter()
      .filter(|(name, _)| filter(name.as_str()))
      .filter_map(|(name, queue)| queue.front().map(|head| (head.seq, name)))
      .min_by_key(|(seq, _)| *seq)
      .map(|(_, name)| name.clone())
  }

  fn pop(&mut self, name: &str) -> Option<T> {
    let queue = self.queues.get_mut(name)?;
    let stamped = queue.pop_front()?;
    if queue.is_empty() {
      self.queues.remove(name);
    }
    Some(stamped.value)
  }
}

struct MailboxShared<T> {
  state: Mutex<MailboxState<T>>,
  cond: Condvar,
}

/// A shared handle to a named mailbox. Clones refer to the same mailbox.
pub struct NamedMailbox<T> {
  shared: Arc<MailboxShared<T>>,
}

impl<T> Clone for NamedMailbox<T> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T> fmt::Debug for NamedMailbox<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.shared.state.lock();
    f.debug_struct("NamedMailbox")
      .field("names", &state.queues.len())
      .field("next_seq", &state.next_seq)
      .field("roles", &state.roles)
      .finish()
  }
}

impl<T> Default for NamedMailbox<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> NamedMailbox<T> {
  pub fn new() -> Self {
    Self {
      shared: Arc::new(MailboxShared {
        state: Mutex::new(MailboxState {
          queues: HashMap::new(),
          next_seq: 0,
          roles: Roles::default(),
          reader_notify_count: 0,
          interrupt_pending: false,
        }),
        cond: Condvar::new(),
      }),
    }
  }

  /// Appends `value` to `name`'s queue and wakes every blocked reader.
  /// Returns the sequence number the write was stamped with.
  ///
  /// # Errors
  ///
  /// `Closed` if the mailbox is closed or write-closed.
  pub fn write(&self, name: &str, value: T) -> Result<u64, ChannelError> {
    let mut state = self.shared.state.lock();
    if state.check_closed() || state.roles.is_write_closed() {
      return Err(ChannelError::Closed);
    }
    let seq = state.next_seq;
    state.next_seq += 1;
    match state.queues.get_mut(name) {
      Some(queue) => queue.push_back(Stamped { seq, value }),
      None => {
        state
          .queues
          .insert(name.to_owned(), VecDeque::from([Stamped { seq, value }]));
      }
    }
    // Any reader might match this name.
    self.shared.cond.notify_all();
    Ok(seq)
  }

  /// Takes the oldest pending value among `names` (all names if empty),
  /// blocking until one exists.
  ///
  /// # Errors
  ///
  /// - `Closed` if the mailbox is closed, or is write-closed with nothing
  ///   pending under `names`.
  /// - `WaitInterrupted` if [`interrupt`](Self::interrupt) broke the wait.
  pub fn read(&self, names: &[&str]) -> Result<(String, T), ChannelError> {
    let filter = name_filter(names);
    loop {
      if let Some(item) = self.read_until(None, &filter)? {
        return Ok(item);
      }
    }
  }

  /// Like [`read`](Self::read), waiting at most `timeout`; `Ok(None)` on expiry.
  pub fn read_timeout(
    &self,
    timeout: Duration,
    names: &[&str],
  ) -> Result<Option<(String, T)>, ChannelError> {
    self.read_until(sync_util::deadline_after(Some(timeout)), &name_filter(names))
  }

  /// Takes the oldest pending value whose name passes `filter`.
  ///
  /// `filter` is re-evaluated on every wake-up, so a caller whose set of
  /// interesting names changes can make parked readers pick the change up with
  /// [`notify_readers`](Self::notify_readers).
  pub fn read_where<F>(
    &self,
    timeout: Option<Duration>,
    filter: F,
  ) -> Result<Option<(String, T)>, ChannelError>
  where
    F: Fn(&str) -> bool,
  {
    let deadline = sync_util::deadline_after(timeout);
    loop {
      let item = self.read_until(deadline, &filter)?;
      if item.is_some() || timeout.is_some() {
        return Ok(item);
      }
    }
  }

  fn read_until<F>(
    &self,
    deadline: Option<Instant>,
    filter: &F,
  ) -> Result<Option<(String, T)>, ChannelError>
  where
    F: Fn(&str) -> bool + ?Sized,
  {
    let shared = &*self.shared;
    let mut state = shared.state.lock();
    let mut parked = false;
    loop {
      if state.check_closed() {
        return Err(ChannelError::Closed);
      }
      if let Some(name) = state.oldest_match(filter) {
        if let Some(value) = state.pop(&name) {
          if state.check_closed() {
            debug!("mailbox drained after write-close, closed");
          }
          shared.cond.notify_all();
          return Ok(Some((name, value)));
        }
      }
      if state.roles.is_write_closed() {
        // Nothing can arrive for these names any more.
        return Err(ChannelError::Closed);
      }
      if std::mem::take(&mut state.interrupt_pending) {
        state.roles.close();
        shared.cond.notify_all();
        warn!("mailbox wait interrupted, mailbox force-closed");
        return Err(ChannelError::WaitInterrupted);
      }
      if sync_util::expired(deadline) {
        return Ok(None);
      }
      if !parked {
        parked = true;
        telemetry::increment_counter("mailbox::read", "Parked");
      }
      sync_util::wait_until_deadline(&shared.cond, &mut state, deadline);
    }
  }

  /// Forces every blocked reader to re-run its scan even though nothing new
  /// was written. Returns the new notification count.
  pub fn notify_readers(&self) -> u64 {
    let mut state = self.shared.state.lock();
    state.reader_notify_count += 1;
    self.shared.cond.notify_all();
    state.reader_notify_count
  }

  /// Discards everything pending under `name` and returns how many values
  /// were dropped.
  pub fn remove(&self, name: &str) -> usize {
    let mut state = self.shared.state.lock();
    let dropped = state.queues.remove(name).map_or(0, |queue| queue.len());
    if dropped > 0 {
      debug!(name, dropped, "mailbox queue removed");
      // May have completed a close-on-drain.
      state.check_closed();
      self.shared.cond.notify_all();
    }
    dropped
  }

  pub fn connect_read(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    state.roles.connect_read()?;
    trace!(readers = state.roles.readers(), "mailbox reader connected");
    Ok(())
  }

  pub fn disconnect_read(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    if state.roles.disconnect_read()? == Transition::Closed {
      debug!("last mailbox reader disconnected, mailbox closed");
      self.shared.cond.notify_all();
    }
    Ok(())
  }

  pub fn connect_write(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    state.roles.connect_write()?;
    trace!(writers = state.roles.writers(), "mailbox writer connected");
    Ok(())
  }

  pub fn disconnect_write(&self) -> Result<(), ChannelError> {
    let mut state = self.shared.state.lock();
    if state.roles.disconnect_write()? == Transition::WriteClosed {
      debug!("last mailbox writer disconnected, mailbox write-closed");
      self.shared.cond.notify_all();
    }
    Ok(())
  }

  pub fn close(&self) {
    let mut state = self.shared.state.lock();
    if state.roles.close() {
      debug!("mailbox closed explicitly");
      self.shared.cond.notify_all();
    }
  }

  /// Closed, or write-closed with every queue drained.
  pub fn is_closed(&self) -> bool {
    self.shared.state.lock().check_closed()
  }

  /// Breaks a blocked read with `WaitInterrupted` and force-closes.
  pub fn interrupt(&self) {
    let mut state = self.shared.state.lock();
    state.interrupt_pending = true;
    self.shared.cond.notify_all();
  }

  /// Total number of pending values across all names.
  pub fn len(&self) -> usize {
    let state = self.shared.state.lock();
    state.queues.values().map(VecDeque::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.shared.state.lock().queues.is_empty()
  }

  /// Names that currently have pending values, in no particular order.
  pub fn names(&self) -> Vec<String> {
    self.shared.state.lock().queues.keys().cloned().collect()
  }

  /// Number of values pending under `name`.
  pub fn pending(&self, name: &str) -> usize {
    self
      .shared
      .state
      .lock()
      .queues
      .get(name)
      .map_or(0, VecDeque::len)
  }

  pub(crate) fn key(&self) -> usize {
    Arc::as_ptr(&self.shared) as *const () as usize
  }
}

/// Accepts everything for an empty list, otherwise exactly the listed names.
fn name_filter<'a>(names: &'a [&'a str]) -> impl Fn(&str) -> bool + 'a {
  move |name| names.is_empty() || names.iter().any(|n| *n == name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sequence_numbers_increase_across_names() {
    let mailbox = NamedMailbox::new();
    assert_eq!(mailbox.write("x", 'a').unwrap(), 0);
    assert_eq!(mailbox.write("y", 'b').unwrap(), 1);
    assert_eq!(mailbox.write("x", 'c').unwrap(), 2);
    assert_eq!(mailbox.pending("x"), 2);
    assert_eq!(mailbox.len(), 3);
  }

  #[test]
  fn empty_name_list_reads_everything_in_order() {
    let mailbox = NamedMailbox::new();
    mailbox.write("b", 1).unwrap();
    mailbox.write("a", 2).unwrap();
    assert_eq!(mailbox.read(&[]).unwrap(), ("b".to_string(), 1));
    assert_eq!(mailbox.read(&[]).unwrap(), ("a".to_string(), 2));
    assert!(mailbox.is_empty());
  }

  #[test]
  fn remove_discards_one_name() {
    let mailbox = NamedMailbox::new();
    mailbox.write("keep", 1).unwrap();
    mailbox.write("drop", 2).unwrap();
    mailbox.write("drop", 3).unwrap();
    assert_eq!(mailbox.remove("drop"), 2);
    assert_eq!(mailbox.remove("missing"), 0);
    assert_eq!(mailbox.names(), vec!["keep".to_string()]);
  }

  #[test]
  fn timeout_without_match_returns_none() {
    let mailbox = NamedMailbox::new();
    mailbox.write("other", 1).unwrap();
    assert_eq!(
      mailbox.read_timeout(Duration::from_millis(10), &["wanted"]),
      Ok(None)
    );
    assert_eq!(mailbox.pending("other"), 1);
  }
}
