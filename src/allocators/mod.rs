//! Segment allocation seam used by channel construction

pub mod sysv;
pub mod traits;

pub use sysv::SysvAllocator;
pub use traits::{SegmentAllocator, SegmentAllocatorExt};
