//! Declarative channel configuration.
//!
//! With the `serde` feature both types deserialize, so pipeline edges can be
//! described in JSON/YAML:
//!
//! ```json
//! { "name": "decoded-rows", "store": { "kind": "buffered", "capacity": 64 } }
//! ```

use crate::error::ChannelError;
use crate::store::{Buffer, InfiniteBuffer, OverwriteOldest, ValueStore, ZeroBuffer};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which [`ValueStore`] a channel is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum StoreConfig {
  /// [`ZeroBuffer`]: synchronous hand-off.
  #[default]
  Zero,
  /// [`Buffer`] of the given capacity.
  Buffered { capacity: usize },
  /// [`InfiniteBuffer`].
  Unbounded,
  /// [`OverwriteOldest`] of the given capacity.
  OverwriteOldest { capacity: usize },
}

impl StoreConfig {
  /// Builds the configured store.
  ///
  /// # Errors
  ///
  /// `InvalidConfig` for a bounded store with zero capacity.
  pub fn build<T: Send + 'static>(&self) -> Result<Box<dyn ValueStore<T>>, ChannelError> {
    let store: Box<dyn ValueStore<T>> = match *self {
      StoreConfig::Zero => Box::new(ZeroBuffer::new()),
      StoreConfig::Buffered { capacity } => Box::new(
        Buffer::new(capacity).ok_or_else(|| zero_capacity("buffered"))?,
      ),
      StoreConfig::Unbounded => Box::new(InfiniteBuffer::new()),
      StoreConfig::OverwriteOldest { capacity } => Box::new(
        OverwriteOldest::new(capacity).ok_or_else(|| zero_capacity("overwrite_oldest"))?,
      ),
    };
    Ok(store)
  }
}

fn zero_capacity(kind: &str) -> ChannelError {
  ChannelError::InvalidConfig(format!("{kind} store needs a capacity of at least 1"))
}

/// Everything needed to build a [`Channel`](crate::channel::Channel).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChannelConfig {
  /// Shown on every log event the channel emits.
  pub name: Option<String>,
  pub store: StoreConfig,
}

impl ChannelConfig {
  /// A named zero-buffer channel.
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: Some(name.into()),
      store: StoreConfig::Zero,
    }
  }

  pub fn with_store(mut self, store: StoreConfig) -> Self {
    self.store = store;
    self
  }
}
