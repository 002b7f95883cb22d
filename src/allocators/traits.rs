//! Segment allocator trait definition

use crate::{
    error::Result,
    memory::{SegmentConfig, SegmentId, SharedSegment},
};

/// Source of shared memory segments for a channel
///
/// Channel construction only talks to the OS through this trait, so a
/// caller can substitute an allocator that records or refuses requests.
pub trait SegmentAllocator: Send + Sync + std::fmt::Debug {
    /// Allocate a new zero-filled segment owned by the caller
    fn allocate(&self, config: &SegmentConfig) -> Result<SharedSegment>;

    /// Attach an existing segment without taking ownership of it
    fn attach(&self, id: SegmentId) -> Result<SharedSegment> {
        SharedSegment::attach(id)
    }

    /// Get allocator type name for debugging
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Common allocator operations
pub trait SegmentAllocatorExt: SegmentAllocator {
    /// Allocate a segment of `size` bytes with default permissions
    fn allocate_bytes(&self, size: usize) -> Result<SharedSegment> {
        self.allocate(&SegmentConfig::new(size))
    }
}

impl<T: SegmentAllocator + ?Sized> SegmentAllocatorExt for T {}
