//! Wake-up state shared between a [`Selector`](super::Selector) and the inputs
//! it is parked on.

use crate::sync_util;
use crate::telemetry;

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

#[derive(Debug, Default)]
struct SelectState {
  /// Set by a writer once a registered input has become ready.
  scheduled: bool,
  /// Inputs that registered during the current enable pass and have not
  /// reported a close since.
  registered: usize,
  /// Registrations made during the current enable pass, closes not subtracted.
  enrolled: usize,
}

/// Owned by exactly one `Selector`. Inputs only ever see it through a
/// [`SelectorHandle`].
#[derive(Debug, Default)]
pub(crate) struct SelectorCore {
  state: Mutex<SelectState>,
  cond: Condvar,
}

impl SelectorCore {
  /// Clears per-select state before an enable pass.
  pub(crate) fn reset(&self) {
    let mut state = self.state.lock();
    state.scheduled = false;
    state.registered = 0;
    state.enrolled = 0;
  }

  /// How many inputs registered since the last [`reset`](Self::reset).
  pub(crate) fn enrolled(&self) -> usize {
    self.state.lock().enrolled
  }

  /// Blocks until an input schedules us, every registered input has closed,
  /// or `deadline` passes.
  ///
  /// `passive` says some open input did not register (a timer). Without one,
  /// once no registered input is left nothing could wake the selector, so this
  /// returns at once.
  pub(crate) fn block(&self, deadline: Option<Instant>, passive: bool) {
    let mut state = self.state.lock();
    let mut parked = false;
    loop {
      if state.scheduled {
        return;
      }
      if state.registered == 0 && !passive {
        return;
      }
      if !parked {
        parked = true;
        telemetry::increment_counter("select::block", "Parked");
        trace!(registered = state.registered, "selector blocking");
      }
      if sync_util::wait_until_deadline(&self.cond, &mut state, deadline) {
        return;
      }
    }
  }

  fn register(&self) {
    let mut state = self.state.lock();
    state.registered += 1;
    state.enrolled += 1;
  }

  fn enroll(&self) {
    self.state.lock().enrolled += 1;
  }

  fn schedule(&self) {
    let mut state = self.state.lock();
    state.scheduled = true;
    self.cond.notify_one();
  }

  fn close_channel(&self) {
    let mut state = self.state.lock();
    state.registered = state.registered.saturating_sub(1);
    if state.registered == 0 {
      self.cond.notify_one();
    }
  }
}

/// A non-owning reference to a selector, handed to
/// [`SelectableInput::enable`](super::SelectableInput::enable).
///
/// Inputs keep at most one of these. Once the selector is dropped every method
/// is a no-op.
#[derive(Clone)]
pub struct SelectorHandle {
  core: Weak<SelectorCore>,
}

impl SelectorHandle {
  pub(crate) fn new(core: &Arc<SelectorCore>) -> Self {
    Self {
      core: Arc::downgrade(core),
    }
  }

  /// Records that the calling input is now parked on this selector and will
  /// later call either [`schedule`](Self::schedule) or
  /// [`close_channel`](Self::close_channel).
  pub fn register(&self) {
    if let Some(core) = self.core.upgrade() {
      core.register();
    }
  }

  /// Records an input that shares a registration already made through
  /// [`register`](Self::register), e.g. the same channel listed twice. It
  /// counts as enrolled but expects no close notification of its own.
  pub fn enroll(&self) {
    if let Some(core) = self.core.upgrade() {
      core.enroll();
    }
  }

  /// Wakes the selector because an input has become ready.
  pub fn schedule(&self) {
    if let Some(core) = self.core.upgrade() {
      core.schedule();
    }
  }

  /// Tells the selector a registered input has closed. The selector wakes once
  /// all registered inputs have done so.
  pub fn close_channel(&self) {
    if let Some(core) = self.core.upgrade() {
      core.close_channel();
    }
  }

  /// Returns `true` if both handles refer to the same selector.
  pub fn same_selector(&self, other: &SelectorHandle) -> bool {
    Weak::ptr_eq(&self.core, &other.core)
  }
}

impl fmt::Debug for SelectorHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SelectorHandle")
      .field("alive", &(self.core.strong_count() > 0))
      .finish()
  }
}
