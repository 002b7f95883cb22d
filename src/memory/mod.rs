//! SysV shared memory segments: allocate, attach, detach, destroy

pub mod config;
pub mod segment;

pub use config::{SegmentConfig, DEFAULT_PERMISSIONS};
pub use segment::{segment_exists, Ownership, SegmentId, SharedSegment};
