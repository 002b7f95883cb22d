//! Configuration for launching a capture target

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{FramecastError, Result};

use super::shims::{default_shims, ShimBinary};

/// Shell used to run the user command
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Name of the private shim directory under the home directory
const SHIM_DIR_NAME: &str = ".framecast";

/// Default private shim directory: `$HOME/.framecast`
pub fn default_shim_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(SHIM_DIR_NAME),
        None => std::env::temp_dir().join("framecast"),
    }
}

/// How to start the capture target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Command line handed to the shell
    pub command: String,
    /// Start the target immediately; otherwise only compose the command
    pub autostart: bool,
    /// Private directory the shims are staged into
    pub shim_dir: PathBuf,
    /// Where bundled shims are read from (defaults to the executable's directory)
    pub resource_dir: Option<PathBuf>,
    /// Shim libraries to stage and preload
    pub shims: Vec<ShimBinary>,
    /// Shell that runs `command` with `-c`
    pub shell: PathBuf,
    /// Working directory of the target (defaults to the home directory)
    pub working_dir: Option<PathBuf>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            autostart: true,
            shim_dir: default_shim_dir(),
            resource_dir: None,
            shims: default_shims(),
            shell: PathBuf::from(DEFAULT_SHELL),
            working_dir: dirs::home_dir(),
        }
    }
}

impl LaunchConfig {
    /// Create a launch configuration for `command`
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Set whether the target is started immediately
    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    /// Set the private shim directory
    pub fn with_shim_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shim_dir = dir.into();
        self
    }

    /// Set the directory bundled shims are read from
    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }

    /// Replace the shim list
    pub fn with_shims(mut self, shims: Vec<ShimBinary>) -> Self {
        self.shims = shims;
        self
    }

    /// Set the shell used to run the command
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set the working directory of the target
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Resolve the directory holding bundled shims
    pub fn resource_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.resource_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe()
            .map_err(|e| FramecastError::from_io(e, "Failed to locate executable"))?;
        exe.parent().map(PathBuf::from).ok_or_else(|| {
            FramecastError::invalid_parameter("resource_dir", "Executable has no parent directory")
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(FramecastError::invalid_parameter(
                "command",
                "Command cannot be empty",
            ));
        }

        if self.shims.is_empty() {
            return Err(FramecastError::invalid_parameter(
                "shims",
                "At least one shim library is required",
            ));
        }

        for shim in &self.shims {
            shim.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_config_defaults() {
        let config = LaunchConfig::new("glxgears");
        assert!(config.autostart);
        assert_eq!(config.shell, PathBuf::from("/bin/sh"));
        assert_eq!(config.shims.len(), 2);
        assert!(config.shim_dir.ends_with(".framecast") || config.shim_dir.ends_with("framecast"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_launch_config_validation() {
        assert!(LaunchConfig::new("  ").validate().is_err());
        assert!(LaunchConfig::new("glxgears")
            .with_shims(Vec::new())
            .validate()
            .is_err());
        assert!(LaunchConfig::new("glxgears")
            .with_shims(vec![ShimBinary::bundled("../escape.so")])
            .validate()
            .is_err());
    }

    #[test]
    fn test_defaults_follow_home_directory() {
        let config = LaunchConfig::default();
        match dirs::home_dir() {
            Some(home) => {
                assert_eq!(config.shim_dir, home.join(".framecast"));
                assert_eq!(config.working_dir, Some(home));
            }
            None => {
                assert_eq!(config.shim_dir, std::env::temp_dir().join("framecast"));
                assert_eq!(config.working_dir, None);
            }
        }
    }

    #[test]
    fn test_explicit_resource_dir() {
        let config = LaunchConfig::new("true").with_resource_dir("/opt/framecast/lib");
        assert_eq!(config.resource_dir().unwrap(), PathBuf::from("/opt/framecast/lib"));
    }
}
