//! Constants of the channel header schema

/// Magic bytes identifying a channel header segment
pub const CHANNEL_MAGIC: [u8; 8] = *b"FCASTRNG";

/// Current protocol version (major.minor packed into u32).
/// Major = high 16 bits, minor = low 16 bits.
pub const PROTOCOL_VERSION: u32 = 1 << 16; // v1.0

/// Size of the fixed part of the header
pub const HEADER_SIZE: usize = 64;

/// Size of one slot descriptor in the slot table
pub const SLOT_DESCRIPTOR_SIZE: usize = 8;

/// Bytes per pixel in every frame slot (BGRA/RGBA, 8 bits per channel)
pub const BYTES_PER_PIXEL: usize = 4;

/// Default number of ring slots
pub const DEFAULT_SLOT_COUNT: u32 = 5;

/// Largest accepted number of ring slots
pub const MAX_SLOT_COUNT: u32 = 4096;

/// Split a packed protocol version into (major, minor)
pub const fn version_parts(version: u32) -> (u16, u16) {
    ((version >> 16) as u16, version as u16)
}
