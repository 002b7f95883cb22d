//! Cross-process frame ring over one header segment and N frame segments

pub mod channel;
pub mod consumer;
pub mod frames;
pub mod producer;
pub mod stats;


// Re-export main types for convenience
pub use channel::{AttachedChannel, Channel};
pub use consumer::{FrameConsumer, FrameRef, DEFAULT_POLL_INTERVAL};
pub use frames::FramePool;
pub use producer::{FrameProducer, SlotClaim};
pub use stats::ChannelStats;
