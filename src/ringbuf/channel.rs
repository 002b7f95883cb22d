//! Channel: header segment plus frame pool

use std::sync::atomic::AtomicBool;

use log::{info, warn};

use crate::{
    allocators::{SegmentAllocator, SysvAllocator},
    error::Result,
    memory::{SegmentConfig, SegmentId, SharedSegment},
    structured_layout::{ChannelLayout, HeaderRef},
};

use super::{
    consumer::FrameConsumer, frames::FramePool, producer::FrameProducer, stats::ChannelStats,
};

/// Creator side of a frame channel
///
/// Owns the header segment and every frame segment. Dropping the channel
/// (or calling [`Channel::close`]) releases the frame segments last to
/// first, then the header. A channel that fails halfway through
/// construction is dropped the same way, so nothing outlives the error.
#[derive(Debug)]
pub struct Channel {
    header: SharedSegment,
    frames: FramePool,
    layout: ChannelLayout,
    roles: Roles,
    released: bool,
}

/// Whether a producer or consumer borrowed from a channel handle is live
#[derive(Debug, Default)]
struct Roles {
    producer: AtomicBool,
    consumer: AtomicBool,
}

impl Channel {
    /// Create a channel backed by SysV shared memory
    pub fn create(layout: ChannelLayout) -> Result<Self> {
        Self::create_with(&SysvAllocator::new(), layout)
    }

    /// Create a channel using `allocator` for every segment
    ///
    /// Allocation order: header segment, then frame segments 0..capacity.
    pub fn create_with(allocator: &dyn SegmentAllocator, layout: ChannelLayout) -> Result<Self> {
        layout.validate()?;

        let header = allocator.allocate(&SegmentConfig::new(layout.header_bytes()))?;
        let frames = match FramePool::allocate(allocator, &layout) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("rolling back header segment {}", header.id());
                return Err(e);
            }
        };

        let mut channel = Self {
            header,
            frames,
            layout,
            roles: Roles::default(),
            released: false,
        };

        let slot_ids = channel.frames.ids();
        HeaderRef::initialize(&mut channel.header, layout, &slot_ids)?;

        info!(
            "created channel {} ({} slots of {} bytes)",
            channel.id(),
            layout.capacity,
            layout.slot_bytes()
        );
        Ok(channel)
    }

    /// Get the channel identifier (the header segment id)
    pub fn id(&self) -> SegmentId {
        self.header.id()
    }

    /// Get the channel geometry
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Get typed access to the header
    pub fn header(&self) -> HeaderRef<'_> {
        // Validated at construction; the mapping lives as long as `self`.
        unsafe { HeaderRef::from_validated(&self.header, self.layout.capacity) }
    }

    /// Get the frame pool
    pub fn frames(&self) -> &FramePool {
        &self.frames
    }

    /// Create the producer handle (for in-process producers and tests)
    ///
    /// Fails with [`HandleInUse`](crate::FramecastError::HandleInUse) while
    /// an earlier producer from this channel is still alive.
    pub fn producer(&self) -> Result<FrameProducer<'_>> {
        FrameProducer::new(self.header(), &self.frames, &self.roles.producer)
    }

    /// Create the consumer handle
    ///
    /// Fails with [`HandleInUse`](crate::FramecastError::HandleInUse) while
    /// an earlier consumer from this channel is still alive.
    pub fn consumer(&self) -> Result<FrameConsumer<'_>> {
        FrameConsumer::new(self.header(), &self.frames, &self.roles.consumer)
    }

    /// Last resolution reported by the producer
    pub fn current_size(&self) -> (u32, u32) {
        self.header().current_size()
    }

    /// Snapshot the header state
    pub fn stats(&self) -> ChannelStats {
        ChannelStats::capture(self.id(), &self.header())
    }

    /// Every segment id owned by the channel, header first
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        std::iter::once(self.header.id())
            .chain(self.frames.ids())
            .collect()
    }

    /// Release every segment and report the first failure
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let id = self.header.id();
        let frames = self.frames.release();
        let header = self.header.destroy();
        info!("released channel {}", id);
        frames.and(header)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("failed to release channel: {}", e);
        }
    }
}

/// Attacher side of a frame channel
///
/// Maps an existing channel by its identifier. Dropping it only detaches;
/// the segments stay owned by the creating [`Channel`].
#[derive(Debug)]
pub struct AttachedChannel {
    header: SharedSegment,
    frames: FramePool,
    layout: ChannelLayout,
    roles: Roles,
}

impl AttachedChannel {
    /// Attach to the channel whose header segment is `id`
    pub fn attach(id: SegmentId) -> Result<Self> {
        Self::attach_with(&SysvAllocator::new(), id)
    }

    /// Attach using `allocator` for every segment
    pub fn attach_with(allocator: &dyn SegmentAllocator, id: SegmentId) -> Result<Self> {
        let header = allocator.attach(id)?;
        let (layout, slot_ids) = {
            let view = HeaderRef::open(&header)?;
            (view.layout(), view.slot_ids().collect::<Vec<_>>())
        };
        let frames = FramePool::attach(allocator, slot_ids, layout.slot_bytes())?;

        info!("attached channel {} ({} slots)", id, layout.capacity);
        Ok(Self {
            header,
            frames,
            layout,
            roles: Roles::default(),
        })
    }

    /// Get the channel identifier
    pub fn id(&self) -> SegmentId {
        self.header.id()
    }

    /// Get the channel geometry
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Get typed access to the header
    pub fn header(&self) -> HeaderRef<'_> {
        // Validated at construction; the mapping lives as long as `self`.
        unsafe { HeaderRef::from_validated(&self.header, self.layout.capacity) }
    }

    /// Create the producer handle, as used by the injected side
    pub fn producer(&self) -> Result<FrameProducer<'_>> {
        FrameProducer::new(self.header(), &self.frames, &self.roles.producer)
    }

    /// Create the consumer handle
    pub fn consumer(&self) -> Result<FrameConsumer<'_>> {
        FrameConsumer::new(self.header(), &self.frames, &self.roles.consumer)
    }

    /// Last resolution reported by the producer
    pub fn current_size(&self) -> (u32, u32) {
        self.header().current_size()
    }

    /// Snapshot the header state
    pub fn stats(&self) -> ChannelStats {
        ChannelStats::capture(self.id(), &self.header())
    }
}
