//! Capture session launcher
//!
//! Stages the injection shims into a private directory, composes the
//! loader environment naming the channel, and starts the target through a
//! shell without waiting for it.

pub mod config;
pub mod environment;
pub mod process;
pub mod shims;

pub use config::{default_shim_dir, LaunchConfig, DEFAULT_SHELL};
pub use environment::{
    InjectionEnvironment, CHANNEL_ENV_VAR, LIBRARY_PATH_ENV_VAR, PRELOAD_ENV_VAR,
};
pub use process::{launch, LaunchOutcome, LaunchedProcess};
pub use shims::{
    default_shims, stage_shims, ShimBinary, ShimSource, StagedShims, DEFAULT_SHIM_NAMES,
};
