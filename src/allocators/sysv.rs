//! Production allocator backed by `shmget`/`shmat`

use crate::{
    error::Result,
    memory::{SegmentConfig, SharedSegment, DEFAULT_PERMISSIONS},
};

use super::traits::SegmentAllocator;

/// Allocates private SysV segments with a fixed permission mask
#[derive(Debug, Clone, Copy)]
pub struct SysvAllocator {
    permissions: u32,
}

impl SysvAllocator {
    /// Create an allocator using world-accessible segments
    pub fn new() -> Self {
        Self {
            permissions: DEFAULT_PERMISSIONS,
        }
    }

    /// Create an allocator applying `permissions` to every segment
    pub fn with_permissions(permissions: u32) -> Self {
        Self { permissions }
    }

    /// Get the permission bits applied to new segments
    pub fn permissions(&self) -> u32 {
        self.permissions
    }
}

impl Default for SysvAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentAllocator for SysvAllocator {
    fn allocate(&self, config: &SegmentConfig) -> Result<SharedSegment> {
        SharedSegment::allocate(&config.with_permissions(self.permissions))
    }
}
