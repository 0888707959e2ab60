// src/telemetry.rs

//! Feature-gated blocking counters.
//!
//! With the `telemetry` feature, every suspension point bumps a process-global
//! counter keyed by `(location, counter)`. Without it, the functions below are
//! empty and inlined away.

#[cfg(feature = "telemetry")]
pub mod enabled {
  use std::collections::BTreeMap;
  use std::fmt::Write as _;
  use std::time::Instant;

  use parking_lot::Mutex;

  type CounterKey = (&'static str, &'static str); // (location, counter_name)

  struct CollectorData {
    counters: BTreeMap<CounterKey, u64>,
    start_time: Instant,
  }

  impl CollectorData {
    fn new() -> Self {
      CollectorData {
        counters: BTreeMap::new(),
        start_time: Instant::now(),
      }
    }
  }

  lazy_static::lazy_static! {
    static ref GLOBAL_COLLECTOR: Mutex<CollectorData> = Mutex::new(CollectorData::new());
  }

  pub fn increment_counter_fn(location: &'static str, counter_name: &'static str) {
    *GLOBAL_COLLECTOR
      .lock()
      .counters
      .entry((location, counter_name))
      .or_insert(0) += 1;
  }

  pub fn counter_value_fn(location: &str, counter_name: &str) -> u64 {
    GLOBAL_COLLECTOR
      .lock()
      .counters
      .iter()
      .find(|((loc, name), _)| *loc == location && *name == counter_name)
      .map_or(0, |(_, count)| *count)
  }

  /// Renders all counters, one per line, sorted by location.
  pub fn telemetry_report_fn() -> String {
    let collector = GLOBAL_COLLECTOR.lock();
    let mut out = format!(
      "--- switchyard telemetry ({:.3}s) ---\n",
      collector.start_time.elapsed().as_secs_f64()
    );
    if collector.counters.is_empty() {
      out.push_str("no counters recorded\n");
    }
    for ((loc, name), count) in collector.counters.iter() {
      let _ = writeln!(out, "{:<24} {:<20} {}", loc, name, count);
    }
    out
  }

  pub fn clear_telemetry_fn() {
    let mut collector = GLOBAL_COLLECTOR.lock();
    collector.counters.clear();
    collector.start_time = Instant::now();
  }
} // mod enabled

#[cfg(not(feature = "telemetry"))]
pub mod disabled {
  #[inline(always)]
  pub fn increment_counter_fn(_location: &'static str, _counter_name: &'static str) {}
  #[inline(always)]
  pub fn counter_value_fn(_location: &str, _counter_name: &str) -> u64 {
    0
  }
  #[inline(always)]
  pub fn telemetry_report_fn() -> String {
    String::new()
  }
  #[inline(always)]
  pub fn clear_telemetry_fn() {}
}

#[cfg(feature = "telemetry")]
pub use enabled::{
  clear_telemetry_fn as clear_telemetry, counter_value_fn as counter_value,
  increment_counter_fn as increment_counter, telemetry_report_fn as telemetry_report,
};

#[cfg(not(feature = "telemetry"))]
pub use disabled::{
  clear_telemetry_fn as clear_telemetry, counter_value_fn as counter_value,
  increment_counter_fn as increment_counter, telemetry_report_fn as telemetry_report,
};

#[cfg(all(test, not(feature = "telemetry")))]
mod tests {
  use super::*;

  #[test]
  fn disabled_counters_stay_at_zero() {
    increment_counter("channel::read", "Parked");
    assert_eq!(counter_value("channel::read", "Parked"), 0);
    assert!(telemetry_report().is_empty());
  }
}
