use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::thread;

use switchyard::channel;
use switchyard::mailbox::NamedMailbox;
use switchyard::select::Selector;

const ITEMS: u64 = 10_000;

fn hand_off(c: &mut Criterion) {
  let mut group = c.benchmark_group("channel_hand_off");
  group.throughput(Throughput::Elements(ITEMS));

  for capacity in [0usize, 1, 64] {
    group.bench_with_input(
      BenchmarkId::from_parameter(capacity),
      &capacity,
      |b, &capacity| {
        b.iter(|| {
          let (tx, rx) = channel::buffered::<u64>(capacity);
          let producer = thread::spawn(move || {
            for i in 0..ITEMS {
              tx.write(i).unwrap();
            }
          });
          let mut sum = 0u64;
          while let Ok(value) = rx.read() {
            sum += value;
          }
          producer.join().unwrap();
          sum
        })
      },
    );
  }
  group.finish();
}

fn two_way_select(c: &mut Criterion) {
  let mut group = c.benchmark_group("select_two_inputs");
  group.throughput(Throughput::Elements(ITEMS * 2));
  group.bench_function("rendezvous", |b| {
    b.iter(|| {
      let (tx_a, rx_a) = channel::rendezvous::<u64>();
      let (tx_b, rx_b) = channel::rendezvous::<u64>();
      let producers: Vec<_> = [tx_a, tx_b]
        .into_iter()
        .map(|tx| {
          thread::spawn(move || {
            for i in 0..ITEMS {
              tx.write(i).unwrap();
            }
          })
        })
        .collect();

      let readers = [rx_a.clone(), rx_b.clone()];
      let mut selector = Selector::new().with(rx_a).with(rx_b);
      let mut received = 0u64;
      while let Ok(index) = selector.select() {
        if readers[index].try_read().ok().flatten().is_some() {
          received += 1;
        }
      }
      for p in producers {
        p.join().unwrap();
      }
      received
    })
  });
  group.finish();
}

fn mailbox_round_robin(c: &mut Criterion) {
  let names = ["a", "b", "c", "d"];
  let mut group = c.benchmark_group("mailbox");
  group.throughput(Throughput::Elements(ITEMS));
  group.bench_function("write_then_read_all", |b| {
    b.iter(|| {
      let mailbox = NamedMailbox::new();
      for i in 0..ITEMS {
        mailbox.write(names[(i % 4) as usize], i).unwrap();
      }
      let mut last = None;
      for _ in 0..ITEMS {
        last = Some(mailbox.read(&names).unwrap().1);
      }
      last
    })
  });
  group.finish();
}

criterion_group!(benches, hand_off, two_way_select, mailbox_round_robin);
criterion_main!(benches);
