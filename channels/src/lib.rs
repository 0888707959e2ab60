//! Rendezvous channels, guarded select, and a name-multiplexed mailbox for
//! threaded pipelines.
//!
//! Switchyard is built around one primitive, the [`Channel`]: a reader/writer
//! reference-counted handle over a pluggable [`ValueStore`]. With the default
//! zero-capacity store a write only returns once a reader has taken the value,
//! which gives communicating-sequential-process style hand-off. Other stores
//! buffer, overwrite, or replay an iterator.
//!
//! On top of that:
//!
//! - [`Selector`] waits on many inputs at once, honouring per-input guards and
//!   always preferring the lowest ready index.
//! - [`NamedMailbox`] multiplexes many named queues behind one sequence
//!   counter, so readers of any subset of names see values in write order.
//! - [`Endpoint`] is the storeless point-to-point variant with pluggable read
//!   and write hooks.
//! - [`ThreadConnectionCache`] keeps one write connection per thread and
//!   releases it when the thread exits.
//!
//! All objects close when their last reader leaves and close-on-drain when
//! their last writer leaves.

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod channel;
pub mod config;
pub mod conn_cache;
pub mod endpoint;
pub mod error;
pub mod mailbox;
pub mod select;
pub mod store;
pub mod telemetry;

// Internal utilities
mod sync_util;

pub use channel::{Channel, Reader, Writer};
pub use config::{ChannelConfig, StoreConfig};
pub use conn_cache::{ThreadConnectionCache, WriteConnect};
pub use endpoint::{Endpoint, EndpointHooks};
pub use error::ChannelError;
pub use mailbox::NamedMailbox;
pub use select::{AlwaysReady, SelectableInput, Selector, Timer};
pub use store::{StoreState, ValueStore};
