//! # Laserstream Throughput Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | Recent-key window | insert + lookup per delivered item |
//! | Progress tracker | duplicate check and resume bookkeeping |
//! | Bincode decoding | one frame to one typed record |
//! | Session end to end | frames pushed by the server to updates read by the consumer |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use tokio_stream::StreamExt;

use laserstream_session::domain::{EntityType, ItemKey, SlotStatus};
use laserstream_session::{
    BincodeDecoder, FrameDecoder, ProgressTracker, RecentKeys, SubscriptionApi,
};
use laserstream_tests::fixtures::{
    accept_subscription, bincode_client, quiet_config, slot_frame, slot_update, slots_filter,
    test_client,
};

// ============================================================================
// Duplicate suppression
// ============================================================================

fn bench_recent_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("recent-keys");

    for capacity in [256usize, 2048, 16_384] {
        group.throughput(Throughput::Elements(10_000));
        group.bench_with_input(
            BenchmarkId::new("insert_rolling", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let mut window = RecentKeys::new(capacity);
                    for key in 0u64..10_000 {
                        black_box(window.insert(key));
                    }
                    window.len()
                })
            },
        );
    }

    let mut full = RecentKeys::new(2048);
    for key in 0u64..2048 {
        full.insert(key);
    }
    group.bench_function("contains_hit", |b| b.iter(|| full.contains(black_box(&1024))));
    group.bench_function("contains_miss", |b| b.iter(|| full.contains(black_box(&9999))));

    group.finish();
}

fn bench_progress_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("progress-tracker");
    group.throughput(Throughput::Elements(10_000));

    group.bench_function("record_fresh_slots", |b| {
        b.iter(|| {
            let mut tracker = ProgressTracker::new(Some(0), 2048, 0);
            for slot in 0u64..10_000 {
                let key = ItemKey::Slot {
                    slot,
                    status: SlotStatus::Processed,
                };
                black_box(tracker.record_delivered(slot, EntityType::Slot, Some(key)));
            }
            tracker.resume_point()
        })
    });

    group.bench_function("record_replayed_slots", |b| {
        let mut tracker = ProgressTracker::new(Some(0), 2048, 0);
        for slot in 0u64..2048 {
            let key = ItemKey::Slot {
                slot,
                status: SlotStatus::Processed,
            };
            tracker.record_delivered(slot, EntityType::Slot, Some(key));
        }
        b.iter(|| {
            for slot in 0u64..2048 {
                let key = ItemKey::Slot {
                    slot,
                    status: SlotStatus::Processed,
                };
                black_box(tracker.record_delivered(slot, EntityType::Slot, Some(key)));
            }
        })
    });

    group.finish();
}

// ============================================================================
// Decoding
// ============================================================================

fn bench_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoding");
    let frames: Vec<Vec<u8>> = (0u64..1_000).map(slot_frame).collect();

    group.throughput(Throughput::Elements(frames.len() as u64));
    group.bench_function("bincode_slot_frames", |b| {
        b.iter(|| {
            for frame in &frames {
                black_box(BincodeDecoder.decode(frame.clone()).is_ok());
            }
        })
    });

    group.bench_function("bincode_garbage_frame", |b| {
        b.iter(|| black_box(BincodeDecoder.decode(vec![0xFF; 7]).is_err()))
    });

    group.finish();
}

// ============================================================================
// End to end
// ============================================================================

fn bench_session_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("session-delivery");
    group.measurement_time(Duration::from_secs(10));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => panic!("benchmark runtime: {e}"),
    };

    for count in [1_000u64, 10_000] {
        group.throughput(Throughput::Elements(count));

        group.bench_with_input(BenchmarkId::new("typed_stream", count), &count, |b, &count| {
            b.iter(|| {
                runtime.block_on(async {
                    let (client, mut server) = test_client(quiet_config());
                    let (handle, mut stream) = client.subscribe_stream(slots_filter(None));
                    let (conn, _) = accept_subscription(&mut server).await;
                    for slot in 0..count {
                        conn.send(slot_update(slot));
                    }
                    let mut received = 0;
                    while received < count {
                        match stream.next().await {
                            Some(Ok(_)) => received += 1,
                            _ => break,
                        }
                    }
                    handle.cancel();
                    received
                })
            })
        });

        let frames: Vec<Vec<u8>> = (0..count).map(slot_frame).collect();
        group.bench_with_input(
            BenchmarkId::new("bincode_stream", count),
            &frames,
            |b, frames| {
                b.iter(|| {
                    runtime.block_on(async {
                        let (client, mut server) = bincode_client(quiet_config());
                        let (handle, mut stream) = client.subscribe_stream(slots_filter(None));
                        let (conn, _) = accept_subscription(&mut server).await;
                        for frame in frames {
                            conn.send(frame.clone());
                        }
                        let mut received = 0;
                        while received < frames.len() {
                            match stream.next().await {
                                Some(Ok(_)) => received += 1,
                                _ => break,
                            }
                        }
                        handle.cancel();
                        received
                    })
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_recent_keys,
    bench_progress_tracker,
    bench_decoding,
    bench_session_delivery,
);
criterion_main!(benches);
