//! Single-threaded bus behavior: attach handshake, round-trips, boundary
//! cases, and the post-condition state of the ring image.

mod common;

use common::RegionBuilder;
use dmxp::constants::{MAGIC, MSG_INLINE, REGION_MIN_SIZE, RUNTIME_RUST};
use dmxp::{DmxpError, Region};
use std::time::Duration;

#[test]
fn test_attach_hello_roundtrip() {
    let fixture = RegionBuilder::new("hello").channel(0, 4).build();
    let region = Region::attach(&fixture.path).unwrap();

    let info = region.channel_info(0).unwrap();
    assert_eq!(info.channel_id, 0);
    assert_eq!(info.capacity, 4);
    assert_eq!(info.band_offset, REGION_MIN_SIZE as u64);
    assert_eq!(info.depth(), 0);

    let mut producer = region.producer(0).unwrap();
    let consumer = region.consumer(0).unwrap();

    producer.send(b"Hello").unwrap();
    let message = consumer.try_recv().unwrap();

    assert_eq!(message.payload(), b"Hello");
    let meta = message.meta();
    assert_eq!(meta.channel_id, 0);
    assert_eq!(meta.payload_len, 5);
    assert_eq!(meta.sender_pid, std::process::id());
    assert_eq!(meta.sender_runtime, RUNTIME_RUST);
    assert_eq!(meta.message_id, 0);
    assert_eq!(meta.message_type, 0);
    assert_eq!(meta.flags, 0);
    assert!(meta.timestamp_ns > 0);
}

#[test]
fn test_full_ring_rejects_then_recovers() {
    let fixture = RegionBuilder::new("full").channel(0, 2).build();
    let region = Region::attach(&fixture.path).unwrap();
    let mut producer = region.producer(0).unwrap();
    let consumer = region.consumer(0).unwrap();

    producer.send(b"A").unwrap();
    producer.send(b"B").unwrap();
    assert!(matches!(
        producer.send(b"C"),
        Err(DmxpError::ChannelFull { channel_id: 0 })
    ));
    // The rejected send must not have claimed a position.
    assert_eq!(region.channel_info(0).unwrap().tail, 2);

    assert_eq!(consumer.try_recv().unwrap().payload(), b"A");
    producer.send(b"C").unwrap();
    assert_eq!(consumer.try_recv().unwrap().payload(), b"B");
    assert_eq!(consumer.try_recv().unwrap().payload(), b"C");
}

#[test]
fn test_fifo_then_empty() {
    let fixture = RegionBuilder::new("fifo").channel(0, 4).build();
    let region = Region::attach(&fixture.path).unwrap();
    let mut producer = region.producer(0).unwrap();
    let consumer = region.consumer(0).unwrap();

    for i in 0..4u32 {
        producer.send(format!("msg-{i}").as_bytes()).unwrap();
    }
    for i in 0..4u32 {
        let message = consumer.try_recv().unwrap();
        assert_eq!(message.payload(), format!("msg-{i}").as_bytes());
        assert_eq!(message.meta().message_id, i as u64);
    }
    assert!(matches!(consumer.try_recv(), Err(DmxpError::Empty)));

    let info = region.channel_info(0).unwrap();
    assert_eq!(info.head, info.tail);
    assert_eq!(info.head, 4);
}

#[test]
fn test_drain_leaves_recycled_markers() {
    let fixture = RegionBuilder::new("markers").channel(0, 4).build();
    let region = Region::attach(&fixture.path).unwrap();
    let mut producer = region.producer(0).unwrap();
    let consumer = region.consumer(0).unwrap();

    let batch: Vec<&[u8]> = vec![b"a", b"b", b"c", b"d", b"e"];
    let sent = producer.send_batch(batch).unwrap();
    assert_eq!(sent, 4);

    let drained = consumer.drain(usize::MAX).unwrap();
    assert_eq!(drained.len(), 4);

    // Every slot now carries the empty marker for its next cycle.
    for i in 0..4u64 {
        let sequence = fixture.read_u64(fixture.first_band_slot_offset(i));
        assert_eq!(sequence, i + 4);
    }
}

#[test]
fn test_wrap_around_cycles() {
    let fixture = RegionBuilder::new("wrap").channel(0, 2).build();
    let region = Region::attach(&fixture.path).unwrap();
    let mut producer = region.producer(0).unwrap();
    let consumer = region.consumer(0).unwrap();

    for i in 0..10u64 {
        producer.send(&i.to_le_bytes()).unwrap();
        let message = consumer.try_recv().unwrap();
        assert_eq!(message.payload(), &i.to_le_bytes());
    }
    assert_eq!(region.channel_info(0).unwrap().head, 10);
}

#[test]
fn test_payload_bounds() {
    let fixture = RegionBuilder::new("bounds").channel(0, 4).build();
    let region = Region::attach(&fixture.path).unwrap();
    let mut producer = region.producer(0).unwrap();
    let consumer = region.consumer(0).unwrap();

    // One past the inline capacity is rejected before any shared state
    // moves.
    let oversize = vec![0xabu8; MSG_INLINE + 1];
    assert!(matches!(
        producer.send(&oversize),
        Err(DmxpError::PayloadTooLarge { len }) if len == MSG_INLINE + 1
    ));
    assert_eq!(region.channel_info(0).unwrap().tail, 0);

    // Exactly the inline capacity round-trips.
    let max = vec![0xcdu8; MSG_INLINE];
    producer.send(&max).unwrap();
    let message = consumer.try_recv().unwrap();
    assert_eq!(message.payload(), max.as_slice());

    // So does the empty payload.
    producer.send(b"").unwrap();
    let message = consumer.try_recv().unwrap();
    assert_eq!(message.payload(), b"");
    assert_eq!(message.meta().payload_len, 0);
}

#[test]
fn test_attach_wrong_magic() {
    let fixture = RegionBuilder::new("magic").magic(0).channel(0, 4).build();
    let before = fixture.bytes();

    assert!(matches!(
        Region::attach(&fixture.path),
        Err(DmxpError::InvalidMagic { found: 0 })
    ));
    // Attach performs no writes.
    assert_eq!(fixture.bytes(), before);
}

#[test]
fn test_attach_version_mismatch() {
    let fixture = RegionBuilder::new("version").version(99).channel(0, 4).build();
    assert!(matches!(
        Region::attach(&fixture.path),
        Err(DmxpError::VersionMismatch { found: 99 })
    ));
}

#[test]
fn test_attach_path_missing() {
    let path = std::env::temp_dir().join(format!("dmxp-nonexistent-{}", std::process::id()));
    assert!(matches!(
        Region::attach(&path),
        Err(DmxpError::PathMissing { .. })
    ));
}

#[test]
fn test_attach_truncated_region() {
    let path = std::env::temp_dir().join(format!("dmxp-truncated-{}", std::process::id()));
    std::fs::write(&path, MAGIC.to_le_bytes()).unwrap();
    assert!(matches!(
        Region::attach(&path),
        Err(DmxpError::RegionTruncated { len: 8 })
    ));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_channel_enumeration() {
    let fixture = RegionBuilder::new("enum")
        .channel(0, 4)
        .channel(3, 8)
        .channel(7, 2)
        .build();
    let region = Region::attach(&fixture.path).unwrap();

    assert_eq!(region.list_channels(), vec![0, 3, 7]);
    assert_eq!(region.channel_count(), 3);
    assert_eq!(region.channel_info(3).unwrap().capacity, 8);
    assert!(region.channel_info(1).is_none());
    assert!(region.channel_info(9999).is_none());

    let capacities: Vec<u64> = region.channels().map(|c| c.capacity).collect();
    assert_eq!(capacities, vec![4, 8, 2]);
}

#[test]
fn test_unknown_channel_endpoints() {
    let fixture = RegionBuilder::new("unknown").channel(0, 4).build();
    let region = Region::attach(&fixture.path).unwrap();

    assert!(matches!(
        region.producer(5),
        Err(DmxpError::UnknownChannel { channel_id: 5 })
    ));
    assert!(matches!(
        region.consumer(5),
        Err(DmxpError::UnknownChannel { channel_id: 5 })
    ));
}

#[test]
fn test_recv_timeout_and_blocking() {
    let fixture = RegionBuilder::new("timeout").channel(0, 4).build();
    let region = Region::attach(&fixture.path).unwrap();
    let consumer = region.consumer(0).unwrap();

    let err = consumer.recv_timeout(Duration::from_millis(20)).unwrap_err();
    assert!(matches!(err, DmxpError::Timeout));
    assert_eq!(region.channel_info(0).unwrap().head, 0);

    // Blocking receive wakes once a producer publishes.
    let region_producer = region.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        let mut producer = region_producer.producer(0).unwrap();
        producer.send(b"late").unwrap();
    });
    let message = consumer.recv().unwrap();
    assert_eq!(message.payload(), b"late");
    handle.join().unwrap();
}

#[test]
fn test_corrupt_sequence_fails_send() {
    let fixture = RegionBuilder::new("corrupt-send").channel(0, 4).build();
    let region = Region::attach(&fixture.path).unwrap();
    let mut producer = region.producer(0).unwrap();

    // 99 & 3 == 3: congruent to neither index 0 nor 1.
    fixture.write_u64(fixture.first_band_slot_offset(0), 99);
    assert!(matches!(
        producer.send(b"x"),
        Err(DmxpError::ChannelCorrupt { channel_id: 0, .. })
    ));
}

#[test]
fn test_corrupt_sequence_fails_recv() {
    let fixture = RegionBuilder::new("corrupt-recv").channel(0, 4).build();
    let region = Region::attach(&fixture.path).unwrap();
    let consumer = region.consumer(0).unwrap();

    // Ahead of any possible publication at head 0 while head is pinned.
    fixture.write_u64(fixture.first_band_slot_offset(0), 9);
    assert!(matches!(
        consumer.try_recv(),
        Err(DmxpError::ChannelCorrupt { channel_id: 0, .. })
    ));
    assert_eq!(region.metrics().corrupt_events, 1);
}

#[test]
fn test_metrics_follow_traffic() {
    let fixture = RegionBuilder::new("metrics").channel(0, 2).build();
    let region = Region::attach(&fixture.path).unwrap();
    let mut producer = region.producer(0).unwrap();
    let consumer = region.consumer(0).unwrap();

    producer.send(b"12345").unwrap();
    producer.send(b"").unwrap();
    let _ = producer.send(b"rejected");
    consumer.drain(usize::MAX).unwrap();

    let snapshot = region.metrics();
    assert_eq!(snapshot.messages_sent, 2);
    assert_eq!(snapshot.bytes_sent, 5);
    assert_eq!(snapshot.messages_received, 2);
    assert_eq!(snapshot.bytes_received, 5);
    assert_eq!(snapshot.full_events, 1);
}

#[test]
fn test_region_handle_clones_share_mapping() {
    let fixture = RegionBuilder::new("clone").channel(0, 4).build();
    let region = Region::attach(&fixture.path).unwrap();
    let alias = region.clone();

    let mut producer = region.producer(0).unwrap();
    producer.send(b"shared").unwrap();
    drop(region);

    // The mapping lives while any clone does.
    let consumer = alias.consumer(0).unwrap();
    assert_eq!(consumer.try_recv().unwrap().payload(), b"shared");

    let debug = format!("{alias:?}");
    assert!(debug.contains("Region"));
    assert!(debug.contains("channels"));
}
