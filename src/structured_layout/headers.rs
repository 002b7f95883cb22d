//! Header structures shared byte-for-byte with the injected producer
//!
//! ```text
//! off  size  field
//!   0     8  magic "FCASTRNG"
//!   8     4  protocol version (major << 16 | minor), stored last
//!  12     4  total header size including the slot table
//!  16     4  capacity (slot count)
//!  20     4  max_pixels per frame
//!  24     4  read_cursor     (atomic, consumer-owned)
//!  28     4  write_cursor    (atomic, producer-owned)
//!  32     4  current_width   (atomic, producer-owned)
//!  36     4  current_height  (atomic, producer-owned)
//!  40    24  reserved, zero
//!  64   8*N  slot descriptors { shm_id: i32, reserved: u32 }
//! ```
//!
//! Fields use host byte order. Only little-endian hosts are supported, so
//! the schema is little-endian in practice.

use std::mem::{offset_of, size_of};
use std::sync::atomic::AtomicU32;

use super::constants::{HEADER_SIZE, SLOT_DESCRIPTOR_SIZE};

#[cfg(target_endian = "big")]
compile_error!("the channel header schema is defined for little-endian hosts only");

/// Fixed part of the channel header at offset 0 of the header segment
#[repr(C)]
#[derive(Debug)]
pub struct ChannelHeader {
    /// Magic bytes: "FCASTRNG"
    pub magic: [u8; 8],
    /// Protocol version; zero until the header is fully initialized
    pub version: AtomicU32,
    /// Total header size in bytes, slot table included
    pub header_size: u32,
    /// Number of ring slots
    pub capacity: u32,
    /// Upper bound on pixels per frame
    pub max_pixels: u32,
    /// Consumer progress, modulo `2 * capacity`
    pub read_cursor: AtomicU32,
    /// Producer progress, modulo `2 * capacity`
    pub write_cursor: AtomicU32,
    /// Width of the frames currently produced
    pub current_width: AtomicU32,
    /// Height of the frames currently produced
    pub current_height: AtomicU32,
    /// Reserved for future fields
    pub _reserved: [u8; 24],
}

const _: () = assert!(size_of::<ChannelHeader>() == HEADER_SIZE);
const _: () = assert!(offset_of!(ChannelHeader, version) == 8);
const _: () = assert!(offset_of!(ChannelHeader, capacity) == 16);
const _: () = assert!(offset_of!(ChannelHeader, read_cursor) == 24);
const _: () = assert!(offset_of!(ChannelHeader, write_cursor) == 28);
const _: () = assert!(offset_of!(ChannelHeader, current_width) == 32);
const _: () = assert!(offset_of!(ChannelHeader, current_height) == 36);

/// Names the segment backing one ring slot
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDescriptor {
    /// SysV id of the frame segment
    pub shm_id: i32,
    pub _reserved: u32,
}

const _: () = assert!(size_of::<SlotDescriptor>() == SLOT_DESCRIPTOR_SIZE);

impl SlotDescriptor {
    /// Create a descriptor for the given segment id
    pub fn new(shm_id: i32) -> Self {
        Self {
            shm_id,
            _reserved: 0,
        }
    }
}
