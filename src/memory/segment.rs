//! SysV shared memory segment handle

use std::{mem::MaybeUninit, ptr};

use log::{debug, warn};

use crate::error::{FramecastError, Result};

use super::config::SegmentConfig;

#[cfg(not(target_os = "linux"))]
compile_error!("framecast requires SysV shared memory and currently supports Linux only");

/// Kernel identifier of a shared memory segment, as returned by `shmget`
pub type SegmentId = i32;

const INVALID_ID: SegmentId = -1;

/// What dropping a [`SharedSegment`] releases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Created by this process: drop detaches and removes the segment
    Owned,
    /// Attached to someone else's segment: drop only detaches
    Attached,
}

/// A SysV shared memory segment mapped into this process
///
/// Every release operation is idempotent: detaching a detached segment or
/// destroying a destroyed one is a no-op.
#[derive(Debug)]
pub struct SharedSegment {
    /// Segment id, `-1` once destroyed
    id: SegmentId,
    /// Mapping base, null once detached
    ptr: *mut u8,
    /// Mapping size in bytes
    size: usize,
    ownership: Ownership,
}

impl SharedSegment {
    /// Allocate a new private segment, attach it and zero-fill it
    pub fn allocate(config: &SegmentConfig) -> Result<Self> {
        config.validate()?;

        let flags = libc::IPC_CREAT | config.permissions as libc::c_int;
        let id = unsafe { libc::shmget(libc::IPC_PRIVATE, config.size, flags) };
        if id == INVALID_ID {
            return Err(FramecastError::allocation(format!(
                "shmget refused {} bytes",
                config.size
            )));
        }

        // From here on `segment` owns the id, so an attach failure below removes it.
        let mut segment = Self {
            id,
            ptr: ptr::null_mut(),
            size: config.size,
            ownership: Ownership::Owned,
        };

        segment.ptr = map(id).ok_or_else(|| {
            FramecastError::allocation(format!("shmat refused new segment {}", id))
        })?;

        unsafe {
            ptr::write_bytes(segment.ptr, 0, segment.size);
        }

        debug!("allocated segment {} ({} bytes)", id, segment.size);
        Ok(segment)
    }

    /// Attach an existing segment created by another handle or process
    pub fn attach(id: SegmentId) -> Result<Self> {
        let size = stat(id).ok_or_else(|| FramecastError::attach(id))?;
        let ptr = map(id).ok_or_else(|| FramecastError::attach(id))?;

        debug!("attached segment {} ({} bytes)", id, size);
        Ok(Self {
            id,
            ptr,
            size,
            ownership: Ownership::Attached,
        })
    }

    /// Unmap the segment from this process
    pub fn detach(&mut self) -> Result<()> {
        if self.ptr.is_null() {
            return Ok(());
        }

        let rc = unsafe { libc::shmdt(self.ptr as *const libc::c_void) };
        self.ptr = ptr::null_mut();
        if rc == -1 {
            return Err(FramecastError::release(format!(
                "shmdt failed for segment {}",
                self.id
            )));
        }

        debug!("detached segment {}", self.id);
        Ok(())
    }

    /// Detach and mark the segment for removal by the kernel
    ///
    /// The kernel frees the memory once every other process has detached too.
    pub fn destroy(&mut self) -> Result<()> {
        let detached = self.detach();

        if self.id == INVALID_ID {
            return detached;
        }

        let id = std::mem::replace(&mut self.id, INVALID_ID);
        let rc = unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) };
        if rc == -1 {
            return Err(FramecastError::release(format!(
                "IPC_RMID failed for segment {}",
                id
            )));
        }

        debug!("destroyed segment {}", id);
        detached
    }

    /// Release according to ownership: destroy owned segments, detach attached ones
    pub fn release(&mut self) -> Result<()> {
        match self.ownership {
            Ownership::Owned => self.destroy(),
            Ownership::Attached => self.detach(),
        }
    }

    /// Get the kernel id of the segment (`-1` once destroyed)
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Get the size of the segment in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the ownership mode of this handle
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Check whether the segment is still mapped
    pub fn is_attached(&self) -> bool {
        !self.ptr.is_null()
    }

    /// Get a raw pointer to the start of the mapping
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Get the mapped bytes (empty once detached)
    pub fn as_slice(&self) -> &[u8] {
        if self.ptr.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }

    /// Get the mapped bytes mutably (empty once detached)
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.ptr.is_null() {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("failed to release segment: {}", e);
        }
    }
}

// Payload bytes are handed between processes by the ring cursors, never
// written concurrently from two sides.
unsafe impl Send for SharedSegment {}
unsafe impl Sync for SharedSegment {}

/// Check whether a segment id still names a live segment
pub fn segment_exists(id: SegmentId) -> bool {
    id != INVALID_ID && stat(id).is_some()
}

fn map(id: SegmentId) -> Option<*mut u8> {
    let ptr = unsafe { libc::shmat(id, ptr::null(), 0) };
    if ptr as isize == -1 {
        None
    } else {
        Some(ptr as *mut u8)
    }
}

fn stat(id: SegmentId) -> Option<usize> {
    let mut ds = MaybeUninit::<libc::shmid_ds>::uninit();
    let rc = unsafe { libc::shmctl(id, libc::IPC_STAT, ds.as_mut_ptr()) };
    if rc == -1 {
        return None;
    }
    Some(unsafe { ds.assume_init() }.shm_segsz as usize)
}
