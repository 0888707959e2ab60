//! Guarded alternation over several inputs.
//!
//! A [`Selector`] owns an ordered list of [`SelectableInput`]s and, on each
//! `select`, returns the index of one that is ready to read. Every variant runs
//! the same three steps:
//!
//! 1. **Enable**: each guard-true, still-open input is asked to `enable`. If
//!    one is already ready the pass stops early. Timer inputs fold their
//!    remaining wait into a bound on how long the selector may block.
//! 2. **Block**: only if nothing was ready. Waits until an input calls
//!    `schedule`, every registered input closes, or the bound elapses.
//! 3. **Disable**: every guard-true input is disabled from the **highest index
//!    down to the lowest**, keeping the last ready index seen. When several
//!    inputs are ready at once, the lowest index wins.
//!
//! If every guard-true input is closed the select fails with
//! [`ChannelError::Closed`].
//!
//! ```
//! use switchyard::channel;
//! use switchyard::select::Selector;
//!
//! let (tx_a, rx_a) = channel::unbounded::<&str>();
//! let (tx_b, rx_b) = channel::unbounded::<&str>();
//! let mut selector = Selector::new();
//! selector.push(rx_a.clone());
//! selector.push(rx_b.clone());
//!
//! tx_b.write("b").unwrap();
//! tx_a.write("a").unwrap();
//! // Both ready: the lower index wins.
//! assert_eq!(selector.select().unwrap(), 0);
//! assert_eq!(rx_a.read().unwrap(), "a");
//! ```

pub(crate) mod core;
mod input;

pub use self::core::SelectorHandle;
pub use input::{AlwaysReady, SelectableInput, Timer};

use self::core::SelectorCore;
use crate::error::ChannelError;
use crate::sync_util;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a single pass may block.
#[derive(Debug, Clone, Copy)]
enum Wait {
  /// Enable then immediately disable.
  Poll,
  /// Block until ready, closed, or the deadline (`None` = no caller deadline).
  Until(Option<Instant>),
}

/// Multi-input alternation.
///
/// `select*` methods take `&mut self`, so a selector is only ever driven by
/// one thread at a time. Each channel tracks a single registered selector, so
/// two selectors must not wait on the same channel concurrently either.
pub struct Selector {
  inputs: Vec<Box<dyn SelectableInput>>,
  core: Arc<SelectorCore>,
}

impl Selector {
  /// An empty selector. Add inputs with [`push`](Self::push).
  pub fn new() -> Self {
    Self {
      inputs: Vec::new(),
      core: Arc::new(SelectorCore::default()),
    }
  }

  /// A selector over already-boxed inputs.
  pub fn from_inputs(inputs: Vec<Box<dyn SelectableInput>>) -> Self {
    Self {
      inputs,
      core: Arc::new(SelectorCore::default()),
    }
  }

  /// Appends an input and returns its index.
  pub fn push<I: SelectableInput + 'static>(&mut self, input: I) -> usize {
    self.inputs.push(Box::new(input));
    self.inputs.len() - 1
  }

  /// Builder-style [`push`](Self::push).
  pub fn with<I: SelectableInput + 'static>(mut self, input: I) -> Self {
    self.push(input);
    self
  }

  pub fn len(&self) -> usize {
    self.inputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inputs.is_empty()
  }

  /// The input at `index`.
  pub fn input(&self, index: usize) -> Option<&dyn SelectableInput> {
    self.inputs.get(index).map(|input| input.as_ref())
  }

  /// Blocks until some input is ready and returns its index.
  pub fn select(&mut self) -> Result<usize, ChannelError> {
    self.select_blocking(None)
  }

  /// Like [`select`](Self::select), considering only inputs whose guard is `true`.
  pub fn select_guarded(&mut self, guards: &[bool]) -> Result<usize, ChannelError> {
    self.select_blocking(Some(guards))
  }

  /// Blocks for at most `timeout`. Returns `Ok(None)` if nothing became ready.
  pub fn select_timeout(&mut self, timeout: Duration) -> Result<Option<usize>, ChannelError> {
    self.select_until(sync_util::deadline_after(Some(timeout)), None)
  }

  pub fn select_guarded_timeout(
    &mut self,
    guards: &[bool],
    timeout: Duration,
  ) -> Result<Option<usize>, ChannelError> {
    self.select_until(sync_util::deadline_after(Some(timeout)), Some(guards))
  }

  /// Never blocks. Returns `Ok(None)` if no input is ready right now.
  pub fn poll(&mut self) -> Result<Option<usize>, ChannelError> {
    self.check_guards(None)?;
    self.pass(None, Wait::Poll)
  }

  pub fn poll_guarded(&mut self, guards: &[bool]) -> Result<Option<usize>, ChannelError> {
    self.check_guards(Some(guards))?;
    self.pass(Some(guards), Wait::Poll)
  }

  fn select_blocking(&mut self, guards: Option<&[bool]>) -> Result<usize, ChannelError> {
    self.check_guards(guards)?;
    loop {
      // A pass can come back empty when a ready value was taken by someone
      // else between wake-up and the disable scan; just go again.
      if let Some(index) = self.pass(guards, Wait::Until(None))? {
        return Ok(index);
      }
    }
  }

  fn select_until(
    &mut self,
    deadline: Option<Instant>,
    guards: Option<&[bool]>,
  ) -> Result<Option<usize>, ChannelError> {
    self.check_guards(guards)?;
    loop {
      if let Some(index) = self.pass(guards, Wait::Until(deadline))? {
        return Ok(Some(index));
      }
      if sync_util::expired(deadline) {
        return Ok(None);
      }
    }
  }

  fn check_guards(&self, guards: Option<&[bool]>) -> Result<(), ChannelError> {
    match guards {
      Some(g) if g.len() != self.inputs.len() => Err(ChannelError::ProtocolViolation(
        "guard count does not match input count",
      )),
      _ => Ok(()),
    }
  }

  /// One enable/block/disable cycle.
  fn pass(&mut self, guards: Option<&[bool]>, wait: Wait) -> Result<Option<usize>, ChannelError> {
    let guard = |i: usize| guards.map_or(true, |g| g[i]);
    let handle = SelectorHandle::new(&self.core);
    self.core.reset();

    // Enable pass.
    let mut ready = false;
    let mut open = 0usize;
    let mut max_wait: Option<Duration> = None;
    for (i, input) in self.inputs.iter().enumerate() {
      if !guard(i) || input.is_closed() {
        continue;
      }
      open += 1;
      if let Some(remaining) = input.remaining_wait() {
        max_wait = Some(max_wait.map_or(remaining, |m| m.min(remaining)));
      }
      if input.enable(&handle) {
        ready = true;
        break;
      }
    }

    // Block.
    if !ready && open > 0 {
      if let Wait::Until(deadline) = wait {
        let timer_deadline = max_wait.and_then(|w| Instant::now().checked_add(w));
        let passive = open > self.core.enrolled();
        self
          .core
          .block(sync_util::earliest(deadline, timer_deadline), passive);
      }
    }

    // Disable pass, high to low so the lowest ready index is kept.
    let mut selected = None;
    let mut active = 0usize;
    let mut closed = 0usize;
    for i in (0..self.inputs.len()).rev() {
      if !guard(i) {
        continue;
      }
      active += 1;
      let input = &self.inputs[i];
      if input.disable() {
        selected = Some(i);
      } else if input.is_closed() {
        closed += 1;
      }
    }

    if selected.is_none() && closed == active {
      return Err(ChannelError::Closed);
    }
    Ok(selected)
  }
}

impl Default for Selector {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Selector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Selector")
      .field("inputs", &self.inputs.len())
      .finish_non_exhaustive()
  }
}
