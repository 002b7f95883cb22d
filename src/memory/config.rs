//! Configuration types for shared memory segments

use serde::{Deserialize, Serialize};

use crate::error::{FramecastError, Result};

/// Default mode bits for new segments.
///
/// World read/write so a target started under another user can attach.
pub const DEFAULT_PERMISSIONS: u32 = 0o777;

/// Configuration for allocating a SysV shared memory segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Size of the segment in bytes
    pub size: usize,
    /// Unix permission bits applied to the segment
    pub permissions: u32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            size: 0,
            permissions: DEFAULT_PERMISSIONS,
        }
    }
}

impl SegmentConfig {
    /// Create a new segment configuration
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Set the permissions for the segment
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(FramecastError::invalid_parameter(
                "size",
                "Segment size must be greater than 0",
            ));
        }

        if self.permissions & !0o777 != 0 {
            return Err(FramecastError::invalid_parameter(
                "permissions",
                format!("Mode {:#o} has bits outside 0o777", self.permissions),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_config_default() {
        let config = SegmentConfig::default();
        assert_eq!(config.permissions, 0o777);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_segment_config_validation() {
        assert!(SegmentConfig::new(4096).validate().is_ok());
        assert!(SegmentConfig::new(4096).with_permissions(0o600).validate().is_ok());
        assert!(SegmentConfig::new(4096).with_permissions(0o4777).validate().is_err());
    }
}
