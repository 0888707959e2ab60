//! Utilities for synchronous blocking on a `parking_lot::Condvar`.
//! Every suspension point in the crate goes through `wait_until_deadline`, so
//! all of them release the owner's state mutex while parked.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, MutexGuard};

/// Converts an optional timeout into an optional absolute deadline.
///
/// A timeout too large to represent is treated as "wait forever".
#[inline]
pub(crate) fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
  timeout.and_then(|t| Instant::now().checked_add(t))
}

/// Returns `true` once `deadline` has passed. `None` never expires.
#[inline]
pub(crate) fn expired(deadline: Option<Instant>) -> bool {
  deadline.is_some_and(|d| Instant::now() >= d)
}

/// Earlier of two optional deadlines, where `None` means unbounded.
#[inline]
pub(crate) fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
  match (a, b) {
    (Some(x), Some(y)) => Some(x.min(y)),
    (x, None) => x,
    (None, y) => y,
  }
}

/// Waits on `cond`, releasing the guarded mutex, until notified or `deadline`
/// passes. Returns `true` if the wait timed out.
#[inline]
pub(crate) fn wait_until_deadline<T: ?Sized>(
  cond: &Condvar,
  guard: &mut MutexGuard<'_, T>,
  deadline: Option<Instant>,
) -> bool {
  match deadline {
    Some(d) => cond.wait_until(guard, d).timed_out(),
    None => {
      cond.wait(guard);
      false
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn earliest_prefers_bounded() {
    let now = Instant::now();
    let later = now + Duration::from_secs(1);
    assert_eq!(earliest(None, None), None);
    assert_eq!(earliest(Some(now), None), Some(now));
    assert_eq!(earliest(None, Some(later)), Some(later));
    assert_eq!(earliest(Some(later), Some(now)), Some(now));
  }

  #[test]
  fn zero_timeout_is_already_expired() {
    let deadline = deadline_after(Some(Duration::ZERO));
    assert!(expired(deadline));
    assert!(!expired(None));
    assert_eq!(deadline_after(Some(Duration::MAX)), None);
  }
}
