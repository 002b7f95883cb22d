//! Integration tests for the frame ring across creator and attacher handles

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use framecast::{
    structured_layout::occupancy, AttachedChannel, Channel, ChannelLayout, FramecastError,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_ring_with_default_geometry() {
        let channel = Channel::create(ChannelLayout::new(5, 1920 * 1080)).unwrap();
        let mut producer = channel.producer().unwrap();

        for expected_slot in 0..5 {
            let mut claim = producer.try_claim().unwrap();
            claim.pixels_mut()[0] = expected_slot as u8;
            assert_eq!(claim.commit(1920, 1080).unwrap(), expected_slot);
        }

        // The sixth commit must see a full ring rather than reuse slot 0.
        assert!(matches!(
            producer.try_claim(),
            Err(FramecastError::RingFull { capacity: 5 })
        ));
        let stats = channel.stats();
        assert_eq!(stats.occupancy, 5);
        assert!(stats.is_full());

        let mut consumer = channel.consumer().unwrap();
        let frame = consumer.try_acquire().unwrap();
        assert_eq!(frame.slot(), 0);
        assert_eq!(frame.pixels()[0], 0);
        assert_eq!(frame.pixels().len(), 1920 * 1080 * 4);
        frame.release();

        assert_eq!(producer.try_claim().unwrap().slot(), 0);
    }

    #[test]
    fn test_current_size_visible_after_commit() {
        let channel = Channel::create(ChannelLayout::new(3, 1280 * 720)).unwrap();
        let attached = AttachedChannel::attach(channel.id()).unwrap();

        let mut producer = attached.producer().unwrap();
        producer.try_claim().unwrap().commit(1280, 720).unwrap();

        let mut consumer = channel.consumer().unwrap();
        let frame = consumer.try_acquire().unwrap();
        assert_eq!((frame.width(), frame.height()), (1280, 720));
        assert_eq!(channel.current_size(), (1280, 720));
    }

    #[test]
    fn test_resolution_change_mid_stream() {
        let channel = Channel::create(ChannelLayout::new(4, 100)).unwrap();
        let mut producer = channel.producer().unwrap();
        let mut consumer = channel.consumer().unwrap();

        producer.publish(10, 10, &[1; 400]).unwrap();
        let frame = consumer.try_acquire().unwrap();
        assert_eq!((frame.width(), frame.height()), (10, 10));
        drop(frame);

        producer.publish(5, 4, &[2; 80]).unwrap();
        let frame = consumer.try_acquire().unwrap();
        assert_eq!((frame.width(), frame.height()), (5, 4));
        assert_eq!(frame.pixels(), &[2; 80][..]);
    }

    #[test]
    fn test_attached_channel_shares_slots() {
        let channel = Channel::create(ChannelLayout::new(2, 64)).unwrap();
        let attached = AttachedChannel::attach(channel.id()).unwrap();

        assert_eq!(attached.layout(), channel.layout());
        assert_eq!(attached.stats().slot_ids, channel.frames().ids());

        let pixels: Vec<u8> = (0..=255).collect();
        attached.producer().unwrap().publish(8, 8, &pixels).unwrap();

        let mut consumer = channel.consumer().unwrap();
        let frame = consumer.try_acquire().unwrap();
        assert_eq!(frame.pixels(), &pixels[..]);
        drop(frame);

        assert!(attached.consumer().unwrap().is_empty());
    }

    #[test]
    fn test_cursor_invariants_under_random_schedule() {
        let capacity = 5;
        let channel = Channel::create(ChannelLayout::new(capacity, 4)).unwrap();
        let mut producer = channel.producer().unwrap();
        let mut consumer = channel.consumer().unwrap();

        let mut committed = 0u64;
        let mut consumed = 0u64;
        let mut state = 0x2545_f491_4f6c_dd1du64;

        for _ in 0..5000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;

            if state % 3 != 0 {
                match producer.try_claim() {
                    Ok(mut claim) => {
                        claim.pixels_mut()[..4].copy_from_slice(&(committed as u32).to_le_bytes());
                        claim.commit(1, 1).unwrap();
                        committed += 1;
                    }
                    Err(FramecastError::RingFull { .. }) => {
                        assert_eq!(committed - consumed, capacity as u64)
                    }
                    Err(e) => panic!("unexpected error: {}", e),
                }
            } else {
                match consumer.try_acquire() {
                    Ok(frame) => {
                        let value = u32::from_le_bytes(frame.pixels().try_into().unwrap());
                        assert_eq!(value as u64, consumed);
                        consumed += 1;
                    }
                    Err(FramecastError::RingEmpty) => assert_eq!(committed, consumed),
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }

            let header = channel.header();
            let distance = occupancy(header.read_cursor(), header.write_cursor(), capacity);
            assert!(distance <= capacity);
            assert_eq!(distance as u64, committed - consumed);
        }

        assert!(committed > 0 && consumed > 0);
    }

    #[test]
    fn test_cross_thread_producer_never_overwrites_unconsumed_frames() {
        const FRAMES: u32 = 2000;

        let channel = Channel::create(ChannelLayout::new(3, 256)).unwrap();
        let channel_id = channel.id();
        let done = Arc::new(AtomicBool::new(false));

        let producer_done = done.clone();
        let producer = thread::spawn(move || {
            let attached = AttachedChannel::attach(channel_id).unwrap();
            let mut producer = attached.producer().unwrap();
            let mut next = 0u32;
            while next < FRAMES {
                match producer.try_claim() {
                    Ok(mut claim) => {
                        let pixels = claim.pixels_mut();
                        for chunk in pixels.chunks_exact_mut(4) {
                            chunk.copy_from_slice(&next.to_le_bytes());
                        }
                        claim.commit(16, 16).unwrap();
                        next += 1;
                    }
                    Err(FramecastError::RingFull { .. }) => thread::yield_now(),
                    Err(e) => panic!("producer failed: {}", e),
                }
            }
            producer_done.store(true, Ordering::Release);
        });

        let mut consumer = channel.consumer().unwrap();
        let mut expected = 0u32;
        while expected < FRAMES {
            let frame = consumer
                .wait_frame(Duration::from_secs(5))
                .unwrap()
                .expect("producer stalled");
            for chunk in frame.pixels().chunks_exact(4) {
                assert_eq!(u32::from_le_bytes(chunk.try_into().unwrap()), expected);
            }
            expected += 1;
        }

        producer.join().unwrap();
        assert!(done.load(Ordering::Acquire));
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_vanished_producer_leaves_channel_closable() {
        let channel = Channel::create(ChannelLayout::new(2, 16)).unwrap();
        let ids = channel.segment_ids();

        {
            let attached = AttachedChannel::attach(channel.id()).unwrap();
            let mut producer = attached.producer().unwrap();
            let mut claim = producer.try_claim().unwrap();
            claim.pixels_mut()[0] = 7;
            // Producer goes away mid-frame without committing.
        }

        let mut consumer = channel.consumer().unwrap();
        assert!(consumer
            .wait_frame(Duration::from_millis(20))
            .unwrap()
            .is_none());
        drop(consumer);

        channel.close().unwrap();
        assert!(ids.iter().all(|&id| !framecast::segment_exists(id)));
    }
}
