//! Error types and handling for Framecast

use std::path::PathBuf;

use nix::errno::Errno;

/// Result type alias for Framecast operations
pub type Result<T> = std::result::Result<T, FramecastError>;

/// Error types for channel construction, attachment and frame exchange
#[derive(Debug, thiserror::Error)]
pub enum FramecastError {
    /// The OS refused a shared memory request (exhaustion, permissions, limits)
    #[error("Allocation error: {message} ({errno})")]
    Allocation { message: String, errno: Errno },

    /// An existing segment id could not be attached
    #[error("Attach error: segment {id}: {errno}")]
    Attach { id: i32, errno: Errno },

    /// Detaching or removing a segment failed
    #[error("Release error: {message} ({errno})")]
    Release { message: String, errno: Errno },

    /// Shim binaries could not be written to the private directory
    #[error("Staging error: {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target process could not be started
    #[error("Launch error: failed to start `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Attached header does not describe a valid channel
    #[error("Layout error: {message}")]
    Layout { message: String },

    /// Attached header was written by an incompatible protocol version
    #[error("Version mismatch: expected {expected:#x}, got {actual:#x}")]
    VersionMismatch { expected: u32, actual: u32 },

    /// Every slot is committed and not yet consumed
    #[error("Ring full: all {capacity} slots are in flight")]
    RingFull { capacity: u32 },

    /// No committed frame is waiting
    #[error("Ring empty")]
    RingEmpty,

    /// The channel handle already gave out its producer or consumer
    #[error("Handle in use: this channel already has a live {role}")]
    HandleInUse { role: &'static str },

    /// Frame dimensions exceed the slot size fixed at construction
    #[error("Frame too large: {width}x{height} exceeds {max_pixels} pixels")]
    FrameTooLarge {
        width: u32,
        height: u32,
        max_pixels: u32,
    },

    /// Other I/O failures
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl FramecastError {
    /// Create an allocation error from the current `errno`
    pub fn allocation(message: impl Into<String>) -> Self {
        Self::Allocation {
            message: message.into(),
            errno: Errno::last(),
        }
    }

    /// Create an attach error from the current `errno`
    pub fn attach(id: i32) -> Self {
        Self::Attach {
            id,
            errno: Errno::last(),
        }
    }

    /// Create a release error from the current `errno`
    pub fn release(message: impl Into<String>) -> Self {
        Self::Release {
            message: message.into(),
            errno: Errno::last(),
        }
    }

    /// Create a staging error for the given path
    pub fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Staging {
            path: path.into(),
            source,
        }
    }

    /// Create a launch error for the given command
    pub fn launch(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::Launch {
            command: command.into(),
            source,
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a layout error
    pub fn layout(message: impl Into<String>) -> Self {
        Self::Layout {
            message: message.into(),
        }
    }

    /// Create a version mismatch error
    pub fn version_mismatch(expected: u32, actual: u32) -> Self {
        Self::VersionMismatch { expected, actual }
    }

    /// Create an I/O error with context
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// True for the failures that abort session construction
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            Self::Allocation { .. } | Self::Staging { .. } | Self::Launch { .. }
        )
    }
}

impl From<std::io::Error> for FramecastError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}
