//! # Framecast - Cross-Process Frame Ring Buffer
//!
//! Framecast lets a recorder receive rendered frames from an unrelated
//! application. A capture shim is preloaded into the target and writes
//! frames into a ring of SysV shared memory segments; the recorder reads
//! them back without any graphics-API screenshot call.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────┐        ┌──────────────────────────────┐
//! │ Recorder (this crate)     │        │ Target + preloaded shim      │
//! │  CaptureSession           │ launch │  reads FRAMECAST_CHANNEL_SHM │
//! │   ├─ Channel (owner)      ├───────►│  attaches header + slots     │
//! │   │   ├─ header segment   │        │                              │
//! │   │   └─ FramePool (N)    │◄───────┤  producer: claim/commit      │
//! │   └─ FrameConsumer        │ cursors│                              │
//! └───────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! The header layout in [`structured_layout`] is the contract between the
//! two binaries; it carries a magic and a protocol version that attachers
//! check before touching anything else.

pub mod allocators;
pub mod error;
pub mod launcher;
pub mod memory;
pub mod ringbuf;
pub mod session;
pub mod structured_layout;

// Main API re-exports
pub use allocators::{SegmentAllocator, SegmentAllocatorExt, SysvAllocator};
pub use error::{FramecastError, Result};
pub use launcher::{
    launch, InjectionEnvironment, LaunchConfig, LaunchOutcome, LaunchedProcess, ShimBinary,
    ShimSource, StagedShims, CHANNEL_ENV_VAR,
};
pub use memory::{segment_exists, SegmentConfig, SegmentId, SharedSegment};
pub use ringbuf::{
    AttachedChannel, Channel, ChannelStats, FrameConsumer, FramePool, FrameProducer, FrameRef,
    SlotClaim,
};
pub use session::{CaptureSession, SessionBuilder, SessionConfig};
pub use structured_layout::{ChannelLayout, HeaderRef, PROTOCOL_VERSION};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
