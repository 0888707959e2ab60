//! The capability a [`Selector`](super::Selector) waits on, plus the two
//! non-channel inputs: [`Timer`] and [`AlwaysReady`].

use super::core::SelectorHandle;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Anything a selector can wait on.
///
/// An input that answers `false` from [`enable`](Self::enable) must either
/// [`register`](SelectorHandle::register) with the selector (and later call
/// `schedule` or `close_channel` on it) or report a
/// [`remaining_wait`](Self::remaining_wait), otherwise the selector has no way
/// to learn that it became ready.
pub trait SelectableInput: Send + Sync {
  /// Registers interest. Returns `true` if the input is already ready, in
  /// which case it must not register.
  fn enable(&self, selector: &SelectorHandle) -> bool;

  /// Drops any registration and reports whether the input is ready.
  fn disable(&self) -> bool;

  /// Returns `true` once the input can never become ready again.
  fn is_closed(&self) -> bool;

  /// For timer-like inputs, how long until they become ready. Bounds how long
  /// a selector may block.
  fn remaining_wait(&self) -> Option<Duration> {
    None
  }
}

impl<I: SelectableInput + ?Sized> SelectableInput for Arc<I> {
  fn enable(&self, selector: &SelectorHandle) -> bool {
    (**self).enable(selector)
  }

  fn disable(&self) -> bool {
    (**self).disable()
  }

  fn is_closed(&self) -> bool {
    (**self).is_closed()
  }

  fn remaining_wait(&self) -> Option<Duration> {
    (**self).remaining_wait()
  }
}

/// An alarm input. Ready once its deadline has passed; never closes.
///
/// Clones share the alarm, so a consumer can keep one clone and re-arm it
/// between selects while the selector holds the other.
#[derive(Debug, Clone, Default)]
pub struct Timer {
  alarm: Arc<Mutex<Option<Instant>>>,
}

impl Timer {
  /// A timer with no alarm set. It is never ready and never bounds a select.
  pub fn new() -> Self {
    Self::default()
  }

  /// A timer that fires `delay` from now.
  pub fn after(delay: Duration) -> Self {
    let timer = Self::new();
    timer.set_alarm(delay);
    timer
  }

  /// Arms the timer to fire `delay` from now.
  pub fn set_alarm(&self, delay: Duration) {
    *self.alarm.lock() = Instant::now().checked_add(delay);
  }

  /// Arms the timer to fire at `deadline`.
  pub fn set_deadline(&self, deadline: Instant) {
    *self.alarm.lock() = Some(deadline);
  }

  /// Disarms the timer.
  pub fn clear(&self) {
    *self.alarm.lock() = None;
  }

  pub fn deadline(&self) -> Option<Instant> {
    *self.alarm.lock()
  }

  /// Returns `true` if an alarm is set and has passed.
  pub fn fired(&self) -> bool {
    self.deadline().is_some_and(|d| Instant::now() >= d)
  }
}

impl SelectableInput for Timer {
  fn enable(&self, _selector: &SelectorHandle) -> bool {
    self.fired()
  }

  fn disable(&self) -> bool {
    self.fired()
  }

  fn is_closed(&self) -> bool {
    false
  }

  fn remaining_wait(&self) -> Option<Duration> {
    self
      .deadline()
      .map(|d| d.saturating_duration_since(Instant::now()))
  }
}

/// An input that is always ready and never closes. Placed last in a guarded
/// select it acts as a default branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl SelectableInput for AlwaysReady {
  fn enable(&self, _selector: &SelectorHandle) -> bool {
    true
  }

  fn disable(&self) -> bool {
    true
  }

  fn is_closed(&self) -> bool {
    false
  }
}
