//! Injection shim binaries and their staging

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{FramecastError, Result};

use super::config::LaunchConfig;

/// Default shim file names, one per supported architecture
pub const DEFAULT_SHIM_NAMES: [&str; 2] = ["libframecast-shim32.so", "libframecast-shim64.so"];

/// Where a shim's bytes come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShimSource {
    /// A file of the same name in the application's resource directory
    Bundled,
    /// An explicit file on disk
    File(PathBuf),
    /// Bytes compiled into the application
    Embedded(Vec<u8>),
}

/// One shim library to stage and preload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShimBinary {
    /// File name inside the shim directory, as listed in the preload list
    pub name: String,
    /// Source of the library bytes
    pub source: ShimSource,
}

impl ShimBinary {
    /// A shim read from the resource directory
    pub fn bundled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ShimSource::Bundled,
        }
    }

    /// A shim copied from an explicit path; the file name is kept
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                FramecastError::invalid_parameter(
                    "shim",
                    format!("{} has no usable file name", path.display()),
                )
            })?
            .to_string();
        Ok(Self {
            name,
            source: ShimSource::File(path),
        })
    }

    /// A shim written from in-memory bytes
    pub fn embedded(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            source: ShimSource::Embedded(bytes.into()),
        }
    }

    /// Check that the name is a plain file name usable in a preload list
    pub fn validate(&self) -> Result<()> {
        let valid = !self.name.is_empty()
            && self.name != "."
            && self.name != ".."
            && !self
                .name
                .chars()
                .any(|c| c == '/' || c == ':' || c.is_whitespace());
        if !valid {
            return Err(FramecastError::invalid_parameter(
                "shim",
                format!("`{}` is not a plain library file name", self.name),
            ));
        }
        Ok(())
    }
}

/// The default per-architecture shim pair, read from the resource directory
pub fn default_shims() -> Vec<ShimBinary> {
    DEFAULT_SHIM_NAMES
        .iter()
        .map(|name| ShimBinary::bundled(*name))
        .collect()
}

/// Shim files written into the shim directory
///
/// Dropping the guard deletes the staged files unless [`StagedShims::keep`]
/// was called, so a failed launch leaves nothing behind.
#[derive(Debug)]
pub struct StagedShims {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    keep: bool,
}

impl StagedShims {
    /// Get the shim directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the staged file paths in preload order
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Leave the staged files in place for the running target
    pub fn keep(mut self) -> Vec<PathBuf> {
        self.keep = true;
        std::mem::take(&mut self.paths)
    }
}

impl Drop for StagedShims {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        while let Some(path) = self.paths.pop() {
            match fs::remove_file(&path) {
                Ok(()) => debug!("removed staged shim {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("failed to remove staged shim {}: {}", path.display(), e),
            }
        }
    }
}

/// Copy every shim of `config` into its shim directory, replacing stale copies
pub fn stage_shims(config: &LaunchConfig) -> Result<StagedShims> {
    let dir = config.shim_dir.clone();
    fs::create_dir_all(&dir).map_err(|e| FramecastError::staging(&dir, e))?;

    let mut staged = StagedShims {
        dir,
        paths: Vec::with_capacity(config.shims.len()),
        keep: false,
    };

    for shim in &config.shims {
        shim.validate()?;
        let target = staged.dir.join(&shim.name);

        match fs::remove_file(&target) {
            Ok(()) => debug!("removed stale shim {}", target.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(FramecastError::staging(&target, e)),
        }

        let written = match &shim.source {
            ShimSource::Bundled => {
                let resources = config
                    .resource_dir()
                    .map_err(|e| unresolved_resources(&target, e))?;
                fs::copy(resources.join(&shim.name), &target).map(|_| ())
            }
            ShimSource::File(source) => fs::copy(source, &target).map(|_| ()),
            ShimSource::Embedded(bytes) => fs::write(&target, bytes),
        };
        written.map_err(|e| FramecastError::staging(&target, e))?;

        debug!("staged shim {}", target.display());
        staged.paths.push(target);
    }

    Ok(staged)
}

/// A bundled shim whose resource directory cannot be found is a staging failure
fn unresolved_resources(target: &Path, cause: FramecastError) -> FramecastError {
    FramecastError::staging(target, io::Error::new(io::ErrorKind::NotFound, cause))
}
