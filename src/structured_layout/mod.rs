//! Versioned binary schema of the channel header segment
//!
//! The header segment holds:
//! 1. Fixed header (magic, version, geometry, cursors, current size)
//! 2. Slot table (one descriptor per ring slot naming its frame segment)

pub mod constants;
pub mod headers;
pub mod view;

// Re-export main types
pub use constants::*;
pub use headers::{ChannelHeader, SlotDescriptor};
pub use view::{advance_cursor, occupancy, slot_index, ChannelLayout, HeaderRef};
