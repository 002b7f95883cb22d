//! Fixed pool of frame segments, one per ring slot

use log::{debug, warn};

use crate::{
    allocators::SegmentAllocator,
    error::{FramecastError, Result},
    memory::{SegmentConfig, SegmentId, SharedSegment},
    structured_layout::ChannelLayout,
};

/// Frame buffers keyed by slot index
///
/// Every buffer is sized for a maximum-resolution frame up front and reused
/// in place for the whole session. Releasing walks the slots back to front.
#[derive(Debug)]
pub struct FramePool {
    slots: Vec<SharedSegment>,
    slot_bytes: usize,
}

impl FramePool {
    /// Allocate `layout.capacity` zero-filled buffers of `layout.slot_bytes()` each
    ///
    /// If any allocation fails, the buffers obtained so far are released
    /// before the error is returned.
    pub fn allocate(allocator: &dyn SegmentAllocator, layout: &ChannelLayout) -> Result<Self> {
        layout.validate()?;

        let config = SegmentConfig::new(layout.slot_bytes());
        let mut pool = Self {
            slots: Vec::with_capacity(layout.capacity as usize),
            slot_bytes: layout.slot_bytes(),
        };

        for index in 0..layout.capacity {
            let segment = allocator.allocate(&config).map_err(|e| {
                warn!(
                    "frame slot {} of {} could not be allocated, releasing {} slots",
                    index,
                    layout.capacity,
                    pool.len()
                );
                e
            })?;
            pool.slots.push(segment);
        }

        debug!(
            "allocated {} frame slots of {} bytes",
            pool.len(),
            pool.slot_bytes
        );
        Ok(pool)
    }

    /// Attach the frame segments named by a channel's slot table
    pub fn attach(
        allocator: &dyn SegmentAllocator,
        ids: impl IntoIterator<Item = SegmentId>,
        slot_bytes: usize,
    ) -> Result<Self> {
        let mut pool = Self {
            slots: Vec::new(),
            slot_bytes,
        };

        for id in ids {
            let segment = allocator.attach(id)?;
            if segment.size() < slot_bytes {
                return Err(FramecastError::layout(format!(
                    "frame segment {} holds {} bytes, slots need {}",
                    id,
                    segment.size(),
                    slot_bytes
                )));
            }
            pool.slots.push(segment);
        }

        Ok(pool)
    }

    /// Get the number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the pool holds no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get the usable size of every slot
    pub fn slot_bytes(&self) -> usize {
        self.slot_bytes
    }

    /// Get the segment backing slot `index`
    pub fn slot(&self, index: usize) -> Option<&SharedSegment> {
        self.slots.get(index)
    }

    /// Get the segment ids in slot order
    pub fn ids(&self) -> Vec<SegmentId> {
        self.slots.iter().map(SharedSegment::id).collect()
    }

    /// Release every slot, last slot first
    ///
    /// Keeps going past failures and reports the first one.
    pub fn release(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(mut segment) = self.slots.pop() {
            if let Err(e) = segment.release() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for FramePool {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("failed to release frame pool: {}", e);
        }
    }
}
