//! Starting the capture target

use std::process::{Child, Command, ExitStatus, Stdio};

use log::{debug, error, info, warn};
use nix::{
    sys::signal::{kill, Signal},
    unistd::Pid,
};

use crate::{
    error::{FramecastError, Result},
    memory::SegmentId,
};

use super::{
    config::LaunchConfig,
    environment::InjectionEnvironment,
    shims::{stage_shims, StagedShims},
};

/// Handle to a started target; the launcher never blocks on it
///
/// Dropping the handle reaps a target that has already exited. A target
/// still running at that point is left alone; call [`LaunchedProcess::wait`]
/// or [`LaunchedProcess::try_wait`] before dropping to collect it later.
#[derive(Debug)]
pub struct LaunchedProcess {
    child: Child,
}

impl LaunchedProcess {
    /// Get the process id of the shell running the target
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Check for exit without blocking
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        self.child
            .try_wait()
            .map_err(|e| FramecastError::from_io(e, "Failed to poll target process"))
    }

    /// Block until the target exits
    pub fn wait(&mut self) -> Result<ExitStatus> {
        self.child
            .wait()
            .map_err(|e| FramecastError::from_io(e, "Failed to wait for target process"))
    }

    /// Check whether the target is still running
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Ask the target to exit with SIGTERM
    pub fn terminate(&self) -> Result<()> {
        kill(Pid::from_raw(self.child.id() as i32), Signal::SIGTERM).map_err(|errno| {
            FramecastError::from_io(errno.into(), "Failed to signal target process")
        })
    }

    /// Kill the target with SIGKILL
    pub fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .map_err(|e| FramecastError::from_io(e, "Failed to kill target process"))
    }
}

impl Drop for LaunchedProcess {
    fn drop(&mut self) {
        let pid = self.child.id();
        match self.child.try_wait() {
            Ok(Some(status)) => debug!("reaped target {} ({})", pid, status),
            Ok(None) => debug!("target {} still running, detaching", pid),
            Err(e) => warn!("failed to poll target {}: {}", pid, e),
        }
    }
}

/// Result of a successful launch
#[derive(Debug)]
pub struct LaunchOutcome {
    /// Command with the injection variables prefixed, as a user would type it
    pub full_command: String,
    /// Variables passed to the target
    pub environment: InjectionEnvironment,
    /// Staged shim files
    pub staged: StagedShims,
    /// The running target, when `autostart` was set
    pub process: Option<LaunchedProcess>,
}

/// Stage the shims and start `config.command` against channel `channel_id`
///
/// With `autostart` off the target is not started; the returned
/// `full_command` is what the caller runs instead. A spawn failure returns
/// [`FramecastError::Launch`], removes the staged shims and leaves the
/// channel untouched.
pub fn launch(config: &LaunchConfig, channel_id: SegmentId) -> Result<LaunchOutcome> {
    config.validate()?;

    let staged = stage_shims(config)?;
    let environment = InjectionEnvironment::new(
        staged.dir(),
        config.shims.iter().map(|shim| shim.name.as_str()),
        channel_id,
    );
    let full_command = environment.render_command(&config.command);
    info!("full command: {}", full_command);

    if !config.autostart {
        return Ok(LaunchOutcome {
            full_command,
            environment,
            staged,
            process: None,
        });
    }

    let mut command = Command::new(&config.shell);
    command
        .arg("-c")
        .arg(&config.command)
        .envs(environment.vars())
        .stdin(Stdio::null());
    if let Some(dir) = &config.working_dir {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(|e| {
        error!("failed to start target: {}", e);
        FramecastError::launch(full_command.clone(), e)
    })?;
    info!("started target as pid {}", child.id());

    Ok(LaunchOutcome {
        full_command,
        environment,
        staged,
        process: Some(LaunchedProcess { child }),
    })
}
