//! Typed access to a mapped channel header

use std::{
    mem::align_of,
    sync::atomic::Ordering,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{FramecastError, Result},
    memory::{SegmentId, SharedSegment},
};

use super::{
    constants::*,
    headers::{ChannelHeader, SlotDescriptor},
};

/// Geometry of a channel, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLayout {
    /// Number of ring slots
    pub capacity: u32,
    /// Upper bound on pixels per frame
    pub max_pixels: u32,
}

impl ChannelLayout {
    /// Create a layout for `capacity` slots of `max_pixels` pixels each
    pub fn new(capacity: u32, max_pixels: u32) -> Self {
        Self {
            capacity,
            max_pixels,
        }
    }

    /// Validate the layout
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 || self.capacity > MAX_SLOT_COUNT {
            return Err(FramecastError::invalid_parameter(
                "capacity",
                format!("Capacity must be between 1 and {}", MAX_SLOT_COUNT),
            ));
        }

        if self.max_pixels == 0 {
            return Err(FramecastError::invalid_parameter(
                "max_pixels",
                "Pixel limit must be greater than 0",
            ));
        }

        if (self.max_pixels as usize).checked_mul(BYTES_PER_PIXEL).is_none() {
            return Err(FramecastError::invalid_parameter(
                "max_pixels",
                "Slot size overflows the address space",
            ));
        }

        Ok(())
    }

    /// Size of the header segment, slot table included
    pub fn header_bytes(&self) -> usize {
        HEADER_SIZE + self.capacity as usize * SLOT_DESCRIPTOR_SIZE
    }

    /// Size of each frame segment
    pub fn slot_bytes(&self) -> usize {
        self.max_pixels as usize * BYTES_PER_PIXEL
    }
}

/// Next value of a cursor after one commit or release
pub fn advance_cursor(cursor: u32, capacity: u32) -> u32 {
    let modulus = 2 * capacity;
    (cursor % modulus + 1) % modulus
}

/// Number of committed, unconsumed slots between the two cursors
pub fn occupancy(read_cursor: u32, write_cursor: u32, capacity: u32) -> u32 {
    let modulus = 2 * capacity;
    (write_cursor % modulus + modulus - read_cursor % modulus) % modulus
}

/// Ring slot addressed by a cursor value
pub fn slot_index(cursor: u32, capacity: u32) -> usize {
    (cursor % capacity) as usize
}

/// Typed accessors over a mapped header segment
///
/// Cursors and the current size are read with `Acquire` and written with
/// `Release`; they are the only fields either side touches after setup.
#[derive(Debug, Clone, Copy)]
pub struct HeaderRef<'a> {
    header: &'a ChannelHeader,
    slots: &'a [SlotDescriptor],
}

impl<'a> HeaderRef<'a> {
    /// Write a fresh header and slot table into `segment`
    ///
    /// The version field is stored last so an attacher never validates a
    /// partially written header.
    pub fn initialize(
        segment: &'a mut SharedSegment,
        layout: ChannelLayout,
        slot_ids: &[SegmentId],
    ) -> Result<Self> {
        layout.validate()?;

        if slot_ids.len() != layout.capacity as usize {
            return Err(FramecastError::invalid_parameter(
                "slot_ids",
                format!(
                    "Expected {} slot ids, got {}",
                    layout.capacity,
                    slot_ids.len()
                ),
            ));
        }

        let base = checked_base(segment, layout.header_bytes())?;

        unsafe {
            let header = &mut *(base as *mut ChannelHeader);
            header.magic = CHANNEL_MAGIC;
            header.header_size = layout.header_bytes() as u32;
            header.capacity = layout.capacity;
            header.max_pixels = layout.max_pixels;
            header.read_cursor.store(0, Ordering::Relaxed);
            header.write_cursor.store(0, Ordering::Relaxed);
            header.current_width.store(0, Ordering::Relaxed);
            header.current_height.store(0, Ordering::Relaxed);
            header._reserved = [0; 24];

            let slots = base.add(HEADER_SIZE) as *mut SlotDescriptor;
            for (i, &id) in slot_ids.iter().enumerate() {
                std::ptr::write(slots.add(i), SlotDescriptor::new(id));
            }

            header.version.store(PROTOCOL_VERSION, Ordering::Release);
        }

        Self::open(segment)
    }

    /// Validate and wrap an already initialized header segment
    pub fn open(segment: &'a SharedSegment) -> Result<Self> {
        let base = checked_base(segment, HEADER_SIZE)?;
        let header = unsafe { &*(base as *const ChannelHeader) };

        let version = header.version.load(Ordering::Acquire);
        if header.magic != CHANNEL_MAGIC {
            return Err(FramecastError::layout(format!(
                "segment {} is not a channel header (bad magic)",
                segment.id()
            )));
        }
        if version == 0 {
            return Err(FramecastError::layout(format!(
                "segment {} header is not initialized yet",
                segment.id()
            )));
        }
        if version_parts(version).0 != version_parts(PROTOCOL_VERSION).0 {
            return Err(FramecastError::version_mismatch(PROTOCOL_VERSION, version));
        }

        let layout = ChannelLayout::new(header.capacity, header.max_pixels);
        layout
            .validate()
            .map_err(|e| FramecastError::layout(format!("invalid geometry: {}", e)))?;

        if header.header_size as usize != layout.header_bytes()
            || layout.header_bytes() > segment.size()
        {
            return Err(FramecastError::layout(format!(
                "header declares {} bytes for {} slots in a {} byte segment",
                header.header_size,
                layout.capacity,
                segment.size()
            )));
        }

        let slots = unsafe {
            std::slice::from_raw_parts(
                base.add(HEADER_SIZE) as *const SlotDescriptor,
                layout.capacity as usize,
            )
        };

        Ok(Self { header, slots })
    }

    /// Wrap a header that was validated when its owner was constructed
    ///
    /// # Safety
    /// `segment` must still be attached and must have passed [`HeaderRef::open`]
    /// or [`HeaderRef::initialize`] with the same `capacity`.
    pub(crate) unsafe fn from_validated(segment: &'a SharedSegment, capacity: u32) -> Self {
        let base = segment.as_ptr();
        Self {
            header: &*(base as *const ChannelHeader),
            slots: std::slice::from_raw_parts(
                base.add(HEADER_SIZE) as *const SlotDescriptor,
                capacity as usize,
            ),
        }
    }

    /// Get the packed protocol version
    pub fn version(&self) -> u32 {
        self.header.version.load(Ordering::Acquire)
    }

    /// Get the number of ring slots
    pub fn capacity(&self) -> u32 {
        self.header.capacity
    }

    /// Get the pixel limit per frame
    pub fn max_pixels(&self) -> u32 {
        self.header.max_pixels
    }

    /// Get the channel geometry
    pub fn layout(&self) -> ChannelLayout {
        ChannelLayout::new(self.header.capacity, self.header.max_pixels)
    }

    /// Get the consumer cursor
    pub fn read_cursor(&self) -> u32 {
        self.header.read_cursor.load(Ordering::Acquire)
    }

    /// Get the producer cursor
    pub fn write_cursor(&self) -> u32 {
        self.header.write_cursor.load(Ordering::Acquire)
    }

    /// Number of committed frames not yet consumed
    pub fn occupancy(&self) -> u32 {
        occupancy(self.read_cursor(), self.write_cursor(), self.capacity())
    }

    /// True when no committed frame is waiting
    pub fn is_empty(&self) -> bool {
        self.read_cursor() == self.write_cursor()
    }

    /// True when every slot holds an unconsumed frame
    pub fn is_full(&self) -> bool {
        self.occupancy() >= self.capacity()
    }

    /// Last resolution reported by the producer
    pub fn current_size(&self) -> (u32, u32) {
        (
            self.header.current_width.load(Ordering::Acquire),
            self.header.current_height.load(Ordering::Acquire),
        )
    }

    /// Report a new resolution; call before committing the first frame using it
    pub fn set_current_size(&self, width: u32, height: u32) {
        self.header.current_width.store(width, Ordering::Release);
        self.header.current_height.store(height, Ordering::Release);
    }

    /// Get the descriptor of slot `index`
    pub fn slot(&self, index: usize) -> Option<SlotDescriptor> {
        self.slots.get(index).copied()
    }

    /// Iterate over the frame segment ids in slot order
    pub fn slot_ids(&self) -> impl Iterator<Item = SegmentId> + 'a {
        self.slots.iter().map(|slot| slot.shm_id)
    }

    /// Move the write cursor from `expected` to `next`
    ///
    /// Fails when the cursor is no longer at `expected`, which means the
    /// caller's claim went stale.
    pub(crate) fn advance_write(&self, expected: u32, next: u32) -> bool {
        self.header
            .write_cursor
            .compare_exchange(expected, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move the read cursor from `expected` to `next`; a stale release is ignored
    pub(crate) fn advance_read(&self, expected: u32, next: u32) -> bool {
        self.header
            .read_cursor
            .compare_exchange(expected, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

fn checked_base(segment: &SharedSegment, required: usize) -> Result<*mut u8> {
    let base = segment.as_ptr();
    if base.is_null() {
        return Err(FramecastError::layout(format!(
            "segment {} is not attached",
            segment.id()
        )));
    }
    if segment.size() < required {
        return Err(FramecastError::layout(format!(
            "segment {} holds {} bytes, header needs {}",
            segment.id(),
            segment.size(),
            required
        )));
    }
    if (base as usize) % align_of::<ChannelHeader>() != 0 {
        return Err(FramecastError::layout("header segment is misaligned"));
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SegmentConfig;

    #[test]
    fn test_cursor_arithmetic() {
        assert_eq!(advance_cursor(0, 5), 1);
        assert_eq!(advance_cursor(9, 5), 0);
        assert_eq!(occupancy(0, 0, 5), 0);
        assert_eq!(occupancy(0, 5, 5), 5);
        assert_eq!(occupancy(8, 3, 5), 5);
        assert_eq!(occupancy(9, 0, 5), 1);
        assert_eq!(slot_index(7, 5), 2);
    }

    #[test]
    fn test_layout_sizes() {
        let layout = ChannelLayout::new(5, 1920 * 1080);
        assert!(layout.validate().is_ok());
        assert_eq!(layout.header_bytes(), 64 + 5 * 8);
        assert_eq!(layout.slot_bytes(), 1920 * 1080 * 4);

        assert!(ChannelLayout::new(0, 100).validate().is_err());
        assert!(ChannelLayout::new(5, 0).validate().is_err());
        assert!(ChannelLayout::new(MAX_SLOT_COUNT + 1, 100).validate().is_err());
    }

    #[test]
    fn test_initialize_and_open() {
        let layout = ChannelLayout::new(3, 64);
        let mut segment = SharedSegment::allocate(&SegmentConfig::new(layout.header_bytes())).unwrap();

        let header = HeaderRef::initialize(&mut segment, layout, &[11, 12, 13]).unwrap();
        assert_eq!(header.version(), PROTOCOL_VERSION);
        assert_eq!(header.layout(), layout);
        assert!(header.is_empty());
        assert_eq!(header.slot_ids().collect::<Vec<_>>(), vec![11, 12, 13]);
        assert_eq!(header.slot(3), None);

        let bytes = segment.as_slice();
        assert_eq!(&bytes[0..8], b"FCASTRNG");
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 3);
        assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), 64);
        assert_eq!(i32::from_le_bytes(bytes[64..68].try_into().unwrap()), 11);
        assert_eq!(i32::from_le_bytes(bytes[72..76].try_into().unwrap()), 12);
    }

    #[test]
    fn test_open_rejects_uninitialized_segment() {
        let segment = SharedSegment::allocate(&SegmentConfig::new(4096)).unwrap();
        assert!(matches!(
            HeaderRef::open(&segment),
            Err(FramecastError::Layout { .. })
        ));
    }

    #[test]
    fn test_open_rejects_other_major_version() {
        let layout = ChannelLayout::new(1, 16);
        let mut segment = SharedSegment::allocate(&SegmentConfig::new(4096)).unwrap();
        HeaderRef::initialize(&mut segment, layout, &[1]).unwrap();

        segment.as_mut_slice()[8..12].copy_from_slice(&(2u32 << 16).to_le_bytes());
        assert!(matches!(
            HeaderRef::open(&segment),
            Err(FramecastError::VersionMismatch { .. })
        ));

        // A newer minor version of the same major is accepted.
        segment.as_mut_slice()[8..12].copy_from_slice(&((1u32 << 16) | 3).to_le_bytes());
        assert!(HeaderRef::open(&segment).is_ok());
    }

    #[test]
    fn test_current_size_round_trip() {
        let layout = ChannelLayout::new(2, 640 * 480);
        let mut segment = SharedSegment::allocate(&SegmentConfig::new(layout.header_bytes())).unwrap();
        let header = HeaderRef::initialize(&mut segment, layout, &[1, 2]).unwrap();

        assert_eq!(header.current_size(), (0, 0));
        header.set_current_size(640, 480);
        assert_eq!(header.current_size(), (640, 480));
    }
}
