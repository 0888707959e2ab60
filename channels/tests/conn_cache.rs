// tests/conn_cache.rs

mod common;
use common::*;

use std::sync::{Arc, Barrier};
use std::thread;

use switchyard::channel::Channel;
use switchyard::conn_cache::ThreadConnectionCache;
use switchyard::error::ChannelError;
use switchyard::mailbox::NamedMailbox;
use switchyard::store::InfiniteBuffer;

#[test]
fn thread_exit_releases_cached_connection() {
  let channel: Channel<usize> = Channel::new(Box::new(InfiniteBuffer::new()));
  let reader = channel.reader().unwrap();
  let writers = 3;
  // No writer may exit (and write-close the channel) before all have connected.
  let barrier = Arc::new(Barrier::new(writers + 1));

  let mut handles = Vec::new();
  for t in 0..writers {
    let channel = channel.clone();
    let barrier = barrier.clone();
    handles.push(thread::spawn(move || {
      ThreadConnectionCache::ensure_connected(&channel).unwrap();
      barrier.wait();
      for i in 0..ITEMS_LOW {
        assert!(!ThreadConnectionCache::ensure_connected(&channel).unwrap());
        channel.write(t * ITEMS_LOW + i).unwrap();
      }
    }));
  }
  barrier.wait();
  assert_eq!(channel.writer_count(), writers);
  for h in handles {
    h.join().unwrap();
  }

  // Every writer thread has exited, so the channel is write-closed.
  assert_eq!(channel.writer_count(), 0);
  assert!(channel.is_write_closed());

  let mut count = 0;
  while reader.read().is_ok() {
    count += 1;
  }
  assert_eq!(count, writers * ITEMS_LOW);
  assert!(reader.is_closed());
}

#[test]
fn thread_connecting_after_last_cached_writer_exits_sees_closed() {
  let channel: Channel<u8> = Channel::new(Box::new(InfiniteBuffer::new()));
  let _reader = channel.reader().unwrap();

  let first = channel.clone();
  thread::spawn(move || {
    ThreadConnectionCache::ensure_connected(&first).unwrap();
    first.write(1).unwrap();
  })
  .join()
  .unwrap();
  assert!(channel.is_write_closed());

  let second = channel.clone();
  let late = thread::spawn(move || {
    ThreadConnectionCache::ensure_connected(&second)?;
    second.write(2)
  })
  .join()
  .unwrap();
  assert_eq!(late, Err(ChannelError::Closed));
  assert_eq!(channel.read(), Ok(1));
  assert!(channel.is_closed());
}

#[test]
fn one_connection_per_thread() {
  let mailbox: NamedMailbox<u8> = NamedMailbox::new();
  let worker_box = mailbox.clone();
  let worker = thread::spawn(move || {
    let first = ThreadConnectionCache::ensure_connected(&worker_box).unwrap();
    let second = ThreadConnectionCache::ensure_connected(&worker_box).unwrap();
    worker_box.write("n", 1).unwrap();
    (first, second)
  });
  assert_eq!(worker.join().unwrap(), (true, false));

  // The worker's exit write-closed the mailbox; the pending value still drains.
  assert_eq!(mailbox.read(&["n"]).unwrap(), ("n".to_string(), 1));
  assert!(mailbox.is_closed());
}

#[test]
fn ensure_on_closed_channel_fails_and_caches_nothing() {
  let channel: Channel<u8> = Channel::zero();
  channel.close();
  assert_eq!(
    ThreadConnectionCache::ensure_connected(&channel),
    Err(ChannelError::Closed)
  );
  assert!(!ThreadConnectionCache::is_connected(&channel));
}

#[test]
fn explicit_release_write_closes() {
  let channel: Channel<u8> = Channel::new(Box::new(InfiniteBuffer::new()));
  ThreadConnectionCache::ensure_connected(&channel).unwrap();
  channel.write(1).unwrap();
  assert!(ThreadConnectionCache::release(&channel).unwrap());
  assert!(channel.is_write_closed());
  assert_eq!(channel.read(), Ok(1));
  assert!(channel.is_closed());
}
