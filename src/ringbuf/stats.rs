//! Point-in-time channel statistics

use serde::{Deserialize, Serialize};

use crate::{
    memory::SegmentId,
    structured_layout::{version_parts, HeaderRef},
};

/// Snapshot of a channel header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Header segment id, the channel identifier
    pub channel_id: SegmentId,
    /// Protocol version as "major.minor"
    pub protocol: String,
    /// Number of ring slots
    pub capacity: u32,
    /// Pixel limit per frame
    pub max_pixels: u32,
    /// Consumer cursor
    pub read_cursor: u32,
    /// Producer cursor
    pub write_cursor: u32,
    /// Committed frames not yet consumed
    pub occupancy: u32,
    /// Last width reported by the producer
    pub current_width: u32,
    /// Last height reported by the producer
    pub current_height: u32,
    /// Frame segment ids in slot order
    pub slot_ids: Vec<SegmentId>,
}

impl ChannelStats {
    /// Capture the current state of a header
    pub fn capture(channel_id: SegmentId, header: &HeaderRef<'_>) -> Self {
        let (major, minor) = version_parts(header.version());
        let read_cursor = header.read_cursor();
        let write_cursor = header.write_cursor();
        let (current_width, current_height) = header.current_size();

        Self {
            channel_id,
            protocol: format!("{}.{}", major, minor),
            capacity: header.capacity(),
            max_pixels: header.max_pixels(),
            read_cursor,
            write_cursor,
            occupancy: crate::structured_layout::occupancy(
                read_cursor,
                write_cursor,
                header.capacity(),
            ),
            current_width,
            current_height,
            slot_ids: header.slot_ids().collect(),
        }
    }

    /// Check if every slot was in flight at capture time
    pub fn is_full(&self) -> bool {
        self.occupancy >= self.capacity
    }

    /// Get ring utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.occupancy as f64 / self.capacity as f64
    }
}
