//! Consumer side of the frame ring

use std::{
    marker::PhantomData,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use log::debug;

use crate::{
    error::{FramecastError, Result},
    structured_layout::{advance_cursor, slot_index, HeaderRef},
};

use super::{frames::FramePool, producer::frame_bytes};

/// Sleep between polls in [`FrameConsumer::wait_frame`]
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Consumer handle reading committed frames from the ring
///
/// A channel handle gives out at most one live consumer, and the consumer
/// lends out at most one frame at a time.
#[derive(Debug)]
pub struct FrameConsumer<'a> {
    header: HeaderRef<'a>,
    frames: &'a FramePool,
    taken: &'a AtomicBool,
}

impl<'a> FrameConsumer<'a> {
    pub(crate) fn new(
        header: HeaderRef<'a>,
        frames: &'a FramePool,
        taken: &'a AtomicBool,
    ) -> Result<Self> {
        if taken.swap(true, Ordering::AcqRel) {
            return Err(FramecastError::HandleInUse { role: "consumer" });
        }
        Ok(Self {
            header,
            frames,
            taken,
        })
    }

    /// Borrow the frame at the read cursor
    ///
    /// Fails with [`FramecastError::RingEmpty`] when the cursors are equal.
    /// The dimensions are the header's current size at the time of the call.
    ///
    /// The frame borrows the consumer until it is released:
    ///
    /// ```compile_fail
    /// # use framecast::{Channel, ChannelLayout};
    /// let channel = Channel::create(ChannelLayout::new(2, 16)).unwrap();
    /// let mut consumer = channel.consumer().unwrap();
    /// let first = consumer.try_acquire().unwrap();
    /// let second = consumer.try_acquire().unwrap();
    /// drop(first);
    /// drop(second);
    /// ```
    pub fn try_acquire(&mut self) -> Result<FrameRef<'_>> {
        let read_cursor = self.header.read_cursor();
        let write_cursor = self.header.write_cursor();

        if read_cursor == write_cursor {
            return Err(FramecastError::RingEmpty);
        }

        let capacity = self.header.capacity();
        let index = slot_index(read_cursor, capacity);
        let segment = self.frames.slot(index).ok_or_else(|| {
            FramecastError::layout(format!("slot {} has no frame segment", index))
        })?;

        let (width, height) = self.header.current_size();
        // A producer reporting more than max_pixels is out of protocol; never read past the slot.
        let len = frame_bytes(width, height).min(self.frames.slot_bytes() as u64) as usize;

        Ok(FrameRef {
            header: self.header,
            ptr: segment.as_ptr(),
            len,
            index,
            cursor: read_cursor,
            width,
            height,
            _marker: PhantomData,
        })
    }

    /// Poll for a frame until `timeout` elapses
    ///
    /// Returns `Ok(None)` on timeout, which is also what a vanished producer
    /// looks like.
    pub fn wait_frame(&mut self, timeout: Duration) -> Result<Option<FrameRef<'_>>> {
        self.wait_frame_with_interval(timeout, DEFAULT_POLL_INTERVAL)
    }

    /// Poll for a frame with a custom sleep between attempts
    pub fn wait_frame_with_interval(
        &mut self,
        timeout: Duration,
        interval: Duration,
    ) -> Result<Option<FrameRef<'_>>> {
        let deadline = Instant::now() + timeout;
        // Only this consumer moves the read cursor, so a non-empty ring stays non-empty.
        while self.header.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(interval.min(deadline - now));
        }
        self.try_acquire().map(Some)
    }

    /// Number of committed frames waiting
    pub fn available(&self) -> u32 {
        self.header.occupancy()
    }

    /// Check if no frame is waiting
    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }
}

/// A committed frame borrowed from the ring
///
/// The slot goes back to the producer when this is released or dropped.
#[derive(Debug)]
pub struct FrameRef<'a> {
    header: HeaderRef<'a>,
    ptr: *const u8,
    len: usize,
    index: usize,
    cursor: u32,
    width: u32,
    height: u32,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> FrameRef<'a> {
    /// Get the slot index holding this frame
    pub fn slot(&self) -> usize {
        self.index
    }

    /// Get the frame width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the frame height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get the frame pixels, `width * height * 4` bytes
    pub fn pixels(&self) -> &[u8] {
        // The producer does not touch this slot until the read cursor moves past it.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Hand the slot back to the producer
    pub fn release(self) {}
}

impl Drop for FrameRef<'_> {
    fn drop(&mut self) {
        let next = advance_cursor(self.cursor, self.header.capacity());
        if !self.header.advance_read(self.cursor, next) {
            debug!("read cursor moved past slot {}, release ignored", self.index);
        }
    }
}

impl Drop for FrameConsumer<'_> {
    fn drop(&mut self) {
        self.taken.store(false, Ordering::Release);
    }
}
