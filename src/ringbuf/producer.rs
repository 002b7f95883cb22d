//! Producer side of the frame ring

use std::{
    marker::PhantomData,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    error::{FramecastError, Result},
    structured_layout::{advance_cursor, occupancy, slot_index, HeaderRef, BYTES_PER_PIXEL},
};

use super::frames::FramePool;

/// Producer handle writing frames into the ring
///
/// A channel handle gives out at most one live producer, and the producer
/// holds at most one claim at a time. Across processes the protocol allows
/// one producer per channel, normally the injected shim.
#[derive(Debug)]
pub struct FrameProducer<'a> {
    header: HeaderRef<'a>,
    frames: &'a FramePool,
    taken: &'a AtomicBool,
}

impl<'a> FrameProducer<'a> {
    pub(crate) fn new(
        header: HeaderRef<'a>,
        frames: &'a FramePool,
        taken: &'a AtomicBool,
    ) -> Result<Self> {
        if taken.swap(true, Ordering::AcqRel) {
            return Err(FramecastError::HandleInUse { role: "producer" });
        }
        Ok(Self {
            header,
            frames,
            taken,
        })
    }

    /// Claim the slot at the write cursor
    ///
    /// Fails with [`FramecastError::RingFull`] while every slot still holds an
    /// unconsumed frame; the caller decides whether to drop the frame or retry.
    ///
    /// The claim borrows the producer, so a second claim cannot alias it:
    ///
    /// ```compile_fail
    /// # use framecast::{Channel, ChannelLayout};
    /// let channel = Channel::create(ChannelLayout::new(2, 16)).unwrap();
    /// let mut producer = channel.producer().unwrap();
    /// let mut first = producer.try_claim().unwrap();
    /// let mut second = producer.try_claim().unwrap();
    /// first.pixels_mut()[0] = 1;
    /// second.pixels_mut()[0] = 2;
    /// ```
    pub fn try_claim(&mut self) -> Result<SlotClaim<'_>> {
        let capacity = self.header.capacity();
        let write_cursor = self.header.write_cursor();
        let read_cursor = self.header.read_cursor();

        if occupancy(read_cursor, write_cursor, capacity) >= capacity {
            return Err(FramecastError::RingFull { capacity });
        }

        let index = slot_index(write_cursor, capacity);
        let segment = self.frames.slot(index).ok_or_else(|| {
            FramecastError::layout(format!("slot {} has no frame segment", index))
        })?;

        Ok(SlotClaim {
            header: self.header,
            ptr: segment.as_ptr(),
            len: self.frames.slot_bytes(),
            index,
            cursor: write_cursor,
            _marker: PhantomData,
        })
    }

    /// Copy one tightly packed frame into the ring and commit it
    ///
    /// Returns the slot index the frame was written to.
    pub fn publish(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<usize> {
        let expected = frame_bytes(width, height);
        if pixels.len() as u64 != expected {
            return Err(FramecastError::invalid_parameter(
                "pixels",
                format!(
                    "{}x{} frame needs {} bytes, got {}",
                    width,
                    height,
                    expected,
                    pixels.len()
                ),
            ));
        }
        check_dimensions(width, height, self.header.max_pixels())?;

        let mut claim = self.try_claim()?;
        claim.pixels_mut()[..pixels.len()].copy_from_slice(pixels);
        claim.commit(width, height)
    }

    /// Number of committed frames the consumer has not released yet
    pub fn in_flight(&self) -> u32 {
        self.header.occupancy()
    }

    /// Check if a claim would currently fail
    pub fn is_full(&self) -> bool {
        self.header.is_full()
    }
}

impl Drop for FrameProducer<'_> {
    fn drop(&mut self) {
        self.taken.store(false, Ordering::Release);
    }
}

/// A slot owned by the producer between claim and commit
///
/// Dropping a claim without committing abandons it; the write cursor does
/// not move and the slot is claimed again next time.
#[derive(Debug)]
pub struct SlotClaim<'a> {
    header: HeaderRef<'a>,
    ptr: *mut u8,
    len: usize,
    index: usize,
    cursor: u32,
    _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> SlotClaim<'a> {
    /// Get the slot index being written
    pub fn slot(&self) -> usize {
        self.index
    }

    /// Get the whole slot buffer, sized for `max_pixels`
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        // The consumer never reads a slot between the read and write cursors.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    /// Publish the frame with its dimensions
    ///
    /// The dimensions are stored before the write cursor advances, so the
    /// consumer sees them no later than the frame itself.
    /// A second producer on another attachment that committed first makes
    /// this claim stale; it then fails with [`FramecastError::HandleInUse`].
    pub fn commit(self, width: u32, height: u32) -> Result<usize> {
        check_dimensions(width, height, self.header.max_pixels())?;

        self.header.set_current_size(width, height);
        let next = advance_cursor(self.cursor, self.header.capacity());
        if !self.header.advance_write(self.cursor, next) {
            return Err(FramecastError::HandleInUse { role: "producer" });
        }
        Ok(self.index)
    }
}

pub(crate) fn frame_bytes(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * BYTES_PER_PIXEL as u64
}

fn check_dimensions(width: u32, height: u32, max_pixels: u32) -> Result<()> {
    if width as u64 * height as u64 > max_pixels as u64 {
        return Err(FramecastError::FrameTooLarge {
            width,
            height,
            max_pixels,
        });
    }
    Ok(())
}
