// tests/telemetry.rs

mod common;
use common::*;

use serial_test::serial;
use std::thread;

use switchyard::channel;
use switchyard::endpoint::{Endpoint, EndpointHooks};
use switchyard::mailbox::NamedMailbox;
use switchyard::telemetry;

#[test]
#[serial]
fn parked_rendezvous_read_is_counted() {
  telemetry::clear_telemetry();
  let (tx, rx) = channel::rendezvous::<u8>();
  let producer = thread::spawn(move || {
    thread::sleep(SHORT_TIMEOUT);
    tx.write(1).unwrap();
  });
  assert_eq!(rx.read().unwrap(), 1);
  producer.join().unwrap();

  assert!(telemetry::counter_value("channel::read", "Parked") >= 1);
  // The writer always waits for the reader on a zero buffer.
  assert!(telemetry::counter_value("channel::write", "Parked") >= 1);
}

#[test]
#[serial]
fn report_lists_recorded_counters() {
  telemetry::clear_telemetry();
  let mailbox: NamedMailbox<u8> = NamedMailbox::new();
  assert_eq!(mailbox.read_timeout(SHORT_TIMEOUT, &["x"]), Ok(None));

  let report = telemetry::telemetry_report();
  assert!(report.contains("mailbox::read"), "report was:\n{report}");
  assert!(report.contains("Parked"));

  telemetry::clear_telemetry();
  assert_eq!(telemetry::counter_value("mailbox::read", "Parked"), 0);
  assert!(telemetry::telemetry_report().contains("no counters recorded"));
}

/// Yields the sum of every two writes.
#[derive(Default)]
struct Summed {
  pending: Vec<u32>,
}

impl EndpointHooks<u32> for Summed {
  fn read_do(&mut self) -> Option<u32> {
    if self.pending.len() < 2 {
      return None;
    }
    Some(self.pending.drain(..2).sum())
  }

  fn write_do(&mut self, value: u32) {
    self.pending.push(value);
  }

  fn is_drained(&self) -> bool {
    self.pending.len() < 2
  }
}

#[test]
#[serial]
fn endpoint_read_parks_once_across_wakes() {
  telemetry::clear_telemetry();
  let endpoint: Endpoint<u32, Summed> = Endpoint::new(Summed::default());
  let reader_end = endpoint.clone();
  let reader = thread::spawn(move || reader_end.read());

  thread::sleep(SHORT_TIMEOUT);
  // Wakes the reader without releasing a value.
  endpoint.write(1).unwrap();
  thread::sleep(SHORT_TIMEOUT);
  endpoint.write(2).unwrap();

  assert_eq!(reader.join().unwrap(), Ok(3));
  assert_eq!(telemetry::counter_value("endpoint::read", "Parked"), 1);
}
