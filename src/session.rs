//! Capture session lifecycle
//!
//! A session is built in a fixed order: header segment, frame segments,
//! header initialization, shim staging, target launch. Every step hands
//! back an owning guard, so the first failing step drops everything
//! acquired before it in reverse order and no segment outlives the error.

use std::{path::PathBuf, sync::Arc};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    allocators::{SegmentAllocator, SysvAllocator},
    error::Result,
    launcher::{launch, InjectionEnvironment, LaunchConfig, LaunchedProcess, ShimBinary},
    memory::SegmentId,
    ringbuf::{Channel, ChannelStats},
    structured_layout::{ChannelLayout, DEFAULT_SLOT_COUNT},
};

/// Everything needed to construct a capture session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Ring geometry
    pub layout: ChannelLayout,
    /// Target command and injection settings
    pub launch: LaunchConfig,
}

impl SessionConfig {
    /// Create a configuration for `command` with the default slot count
    pub fn new(command: impl Into<String>, max_pixels: u32) -> Self {
        Self {
            layout: ChannelLayout::new(DEFAULT_SLOT_COUNT, max_pixels),
            launch: LaunchConfig::new(command),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        self.launch.validate()
    }
}

/// Builder for [`CaptureSession`]
#[derive(Debug)]
pub struct SessionBuilder {
    config: SessionConfig,
    allocator: Arc<dyn SegmentAllocator>,
}

impl SessionBuilder {
    /// Start building a session for `command`
    pub fn new(command: impl Into<String>) -> Self {
        Self::from_config(SessionConfig::new(command, 0))
    }

    /// Start from a complete configuration
    pub fn from_config(config: SessionConfig) -> Self {
        Self {
            config,
            allocator: Arc::new(SysvAllocator::new()),
        }
    }

    /// Set the number of ring slots
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.config.layout.capacity = capacity;
        self
    }

    /// Set the pixel limit per frame; must cover any resolution the target reaches
    pub fn max_pixels(mut self, max_pixels: u32) -> Self {
        self.config.layout.max_pixels = max_pixels;
        self
    }

    /// Set whether the target is started immediately
    pub fn autostart(mut self, autostart: bool) -> Self {
        self.config.launch.autostart = autostart;
        self
    }

    /// Set the private shim directory
    pub fn shim_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.launch.shim_dir = dir.into();
        self
    }

    /// Set the directory bundled shims are read from
    pub fn resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.launch.resource_dir = Some(dir.into());
        self
    }

    /// Replace the shim list
    pub fn shims(mut self, shims: Vec<ShimBinary>) -> Self {
        self.config.launch.shims = shims;
        self
    }

    /// Set the shell used to run the command
    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.config.launch.shell = shell.into();
        self
    }

    /// Set the working directory of the target
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.launch.working_dir = Some(dir.into());
        self
    }

    /// Use a custom segment allocator
    pub fn allocator(mut self, allocator: Arc<dyn SegmentAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Get the configuration built so far
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Allocate the channel, stage the shims and launch the target
    pub fn build(self) -> Result<CaptureSession> {
        self.config.validate()?;

        let channel = Channel::create_with(self.allocator.as_ref(), self.config.layout)?;

        let outcome = match launch(&self.config.launch, channel.id()) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("rolling back channel {}: {}", channel.id(), e);
                return Err(e);
            }
        };

        let shim_paths = outcome.staged.keep();
        info!(
            "capture session ready on channel {} ({})",
            channel.id(),
            if outcome.process.is_some() {
                "target started"
            } else {
                "waiting for manual start"
            }
        );

        Ok(CaptureSession {
            channel: Some(channel),
            process: outcome.process,
            full_command: outcome.full_command,
            environment: outcome.environment,
            shim_paths,
        })
    }
}

/// A channel paired with the target process writing into it
///
/// The target runs independently: closing the session releases the channel
/// but does not stop the target, and a crashed target leaves the session
/// fully closable.
#[derive(Debug)]
pub struct CaptureSession {
    channel: Option<Channel>,
    process: Option<LaunchedProcess>,
    full_command: String,
    environment: InjectionEnvironment,
    shim_paths: Vec<PathBuf>,
}

impl CaptureSession {
    /// Start building a session for `command`
    pub fn builder(command: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(command)
    }

    /// Build a session from a complete configuration
    pub fn launch(config: SessionConfig) -> Result<Self> {
        SessionBuilder::from_config(config).build()
    }

    /// Get the channel, `None` once closed
    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    /// Get the channel identifier, `None` once closed
    pub fn channel_id(&self) -> Option<SegmentId> {
        self.channel.as_ref().map(Channel::id)
    }

    /// Last resolution reported by the target, `None` once closed
    pub fn current_size(&self) -> Option<(u32, u32)> {
        self.channel.as_ref().map(Channel::current_size)
    }

    /// Snapshot the channel header, `None` once closed
    pub fn stats(&self) -> Option<ChannelStats> {
        self.channel.as_ref().map(Channel::stats)
    }

    /// Get the command with the injection variables prefixed
    pub fn full_command(&self) -> &str {
        &self.full_command
    }

    /// Get the variables passed to the target
    pub fn environment(&self) -> &InjectionEnvironment {
        &self.environment
    }

    /// Get the staged shim files
    pub fn shim_paths(&self) -> &[PathBuf] {
        &self.shim_paths
    }

    /// Get the target process, if it was started
    pub fn process(&self) -> Option<&LaunchedProcess> {
        self.process.as_ref()
    }

    /// Get the target process mutably, if it was started
    pub fn process_mut(&mut self) -> Option<&mut LaunchedProcess> {
        self.process.as_mut()
    }

    /// Check whether the channel has been released
    pub fn is_closed(&self) -> bool {
        self.channel.is_none()
    }

    /// Release the channel; later calls do nothing
    pub fn close(&mut self) -> Result<()> {
        match self.channel.take() {
            Some(channel) => channel.close(),
            None => Ok(()),
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close capture session: {}", e);
        }
    }
}
