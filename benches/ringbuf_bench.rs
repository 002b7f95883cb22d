use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use framecast::{AttachedChannel, Channel, ChannelLayout};
use std::thread;

const RESOLUTIONS: [(u32, u32); 3] = [(320, 240), (1280, 720), (1920, 1080)];

fn benchmark_claim_commit_acquire(c: &mut Criterion) {
    let mut group = c.benchmark_group("FrameRing_SingleThreaded");

    for &(width, height) in RESOLUTIONS.iter() {
        let frame_bytes = width as u64 * height as u64 * 4;
        group.throughput(Throughput::Bytes(frame_bytes));
        group.bench_with_input(
            BenchmarkId::new("fill_commit_consume", format!("{}x{}", width, height)),
            &(width, height),
            |b, &(width, height)| {
                let channel = Channel::create(ChannelLayout::new(5, width * height)).unwrap();
                let mut producer = channel.producer().unwrap();
                let mut consumer = channel.consumer().unwrap();
                let mut value = 0u8;

                b.iter(|| {
                    let mut claim = producer.try_claim().unwrap();
                    claim.pixels_mut().fill(value);
                    claim.commit(width, height).unwrap();

                    let frame = consumer.try_acquire().unwrap();
                    criterion::black_box(frame.pixels()[0]);
                    value = value.wrapping_add(1);
                });
            },
        );
    }

    group.finish();
}

fn benchmark_cursor_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("FrameRing_Cursors");

    for capacity in [2u32, 5, 64].iter() {
        group.throughput(Throughput::Elements(*capacity as u64));
        group.bench_with_input(
            BenchmarkId::new("claim_commit_release", capacity),
            capacity,
            |b, &capacity| {
                let channel = Channel::create(ChannelLayout::new(capacity, 1)).unwrap();
                let mut producer = channel.producer().unwrap();
                let mut consumer = channel.consumer().unwrap();

                b.iter(|| {
                    // Fill the ring completely
                    for _ in 0..capacity {
                        producer.try_claim().unwrap().commit(1, 1).unwrap();
                    }

                    // Drain it
                    for _ in 0..capacity {
                        consumer.try_acquire().unwrap().release();
                    }
                });
            },
        );
    }

    group.finish();
}

fn benchmark_cross_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("FrameRing_CrossThread");
    let frames = 500u32;

    group.throughput(Throughput::Elements(frames as u64));
    group.bench_function("attached_producer_720p", |b| {
        let channel = Channel::create(ChannelLayout::new(5, 1280 * 720)).unwrap();
        let channel_id = channel.id();

        b.iter(|| {
            let producer_handle = thread::spawn(move || {
                let attached = AttachedChannel::attach(channel_id).unwrap();
                let mut producer = attached.producer().unwrap();
                for i in 0..frames {
                    loop {
                        match producer.try_claim() {
                            Ok(mut claim) => {
                                claim.pixels_mut()[0] = i as u8;
                                claim.commit(1280, 720).unwrap();
                                break;
                            }
                            Err(_) => thread::yield_now(),
                        }
                    }
                }
            });

            let mut consumer = channel.consumer().unwrap();
            let mut count = 0;
            while count < frames {
                match consumer.try_acquire() {
                    Ok(frame) => {
                        criterion::black_box(frame.pixels()[0]);
                        count += 1;
                    }
                    Err(_) => thread::yield_now(),
                }
            }

            producer_handle.join().unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_claim_commit_acquire,
    benchmark_cursor_only,
    benchmark_cross_thread
);
criterion_main!(benches);
