//! Shim staging and target launch against a scratch directory

use std::{
    fs, thread,
    time::{Duration, Instant},
};

use framecast::{
    launch, launcher::stage_shims, FramecastError, LaunchConfig, ShimBinary, CHANNEL_ENV_VAR,
};
use tempfile::TempDir;

fn scratch_config(dir: &TempDir, command: &str) -> LaunchConfig {
    LaunchConfig::new(command)
        .with_autostart(false)
        .with_shim_dir(dir.path().join("shims"))
        .with_working_dir(dir.path())
        .with_shims(vec![
            ShimBinary::embedded("libcap32.so", b"thirty-two".to_vec()),
            ShimBinary::embedded("libcap64.so", b"sixty-four".to_vec()),
        ])
}

/// Scheduler state letter of `pid`, `None` once the process is fully gone
fn process_state(pid: u32) -> Option<char> {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    stat.rsplit(')').next()?.trim_start().chars().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_embedded_and_file_shims() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("libexternal.so");
        fs::write(&source, b"external").unwrap();

        let config = scratch_config(&dir, "true").with_shims(vec![
            ShimBinary::embedded("libcap32.so", b"thirty-two".to_vec()),
            ShimBinary::from_file(&source).unwrap(),
        ]);
        let staged = stage_shims(&config).unwrap();

        assert_eq!(staged.dir(), dir.path().join("shims"));
        assert_eq!(staged.paths().len(), 2);
        assert_eq!(fs::read(&staged.paths()[0]).unwrap(), b"thirty-two");
        assert_eq!(fs::read(&staged.paths()[1]).unwrap(), b"external");

        let kept = staged.keep();
        assert!(kept.iter().all(|path| path.exists()));
    }

    #[test]
    fn test_stale_shim_is_replaced() {
        let dir = TempDir::new().unwrap();
        let shim_dir = dir.path().join("shims");
        fs::create_dir_all(&shim_dir).unwrap();
        fs::write(shim_dir.join("libcap32.so"), b"stale build").unwrap();

        let staged = stage_shims(&scratch_config(&dir, "true")).unwrap();
        assert_eq!(fs::read(shim_dir.join("libcap32.so")).unwrap(), b"thirty-two");
        staged.keep();
    }

    #[test]
    fn test_dropped_staging_removes_files() {
        let dir = TempDir::new().unwrap();
        let staged = stage_shims(&scratch_config(&dir, "true")).unwrap();
        let paths = staged.paths().to_vec();
        assert!(paths.iter().all(|path| path.exists()));

        drop(staged);
        assert!(paths.iter().all(|path| !path.exists()));
    }

    #[test]
    fn test_launch_without_autostart_only_composes_command() {
        let dir = TempDir::new().unwrap();
        let outcome = launch(&scratch_config(&dir, "glxgears -info"), 31337).unwrap();

        assert!(outcome.process.is_none());
        assert!(outcome.full_command.ends_with(" glxgears -info"));
        assert!(outcome
            .full_command
            .contains(&format!("{}=31337", CHANNEL_ENV_VAR)));
        assert!(outcome
            .full_command
            .contains("LD_PRELOAD=\"libcap32.so libcap64.so\""));
        assert_eq!(outcome.environment.get(CHANNEL_ENV_VAR), Some("31337"));
        assert_eq!(outcome.staged.paths().len(), 2);
    }

    #[test]
    fn test_launched_target_sees_injected_environment() {
        let dir = TempDir::new().unwrap();
        let config = scratch_config(
            &dir,
            "echo \"$FRAMECAST_CHANNEL_SHM|$LD_LIBRARY_PATH\" > channel.txt",
        )
        .with_autostart(true);

        let outcome = launch(&config, 99).unwrap();
        let mut process = outcome.process.unwrap();
        assert!(process.wait().unwrap().success());

        let written = fs::read_to_string(dir.path().join("channel.txt")).unwrap();
        let expected = format!("99|{}\n", dir.path().join("shims").display());
        assert_eq!(written, expected);

        // The recorder's own environment is untouched.
        assert!(std::env::var_os(CHANNEL_ENV_VAR).is_none());
    }

    #[test]
    fn test_missing_shell_reports_launch_error() {
        let dir = TempDir::new().unwrap();
        let config = scratch_config(&dir, "true")
            .with_autostart(true)
            .with_shell(dir.path().join("no-such-shell"));

        match launch(&config, 1) {
            Err(FramecastError::Launch { command, .. }) => {
                assert!(command.contains("FRAMECAST_CHANNEL_SHM=1"))
            }
            other => panic!("expected launch error, got {:?}", other.map(|o| o.full_command)),
        }
        assert!(!dir.path().join("shims").join("libcap32.so").exists());
    }

    #[test]
    fn test_invalid_shim_name_stages_nothing() {
        let dir = TempDir::new().unwrap();
        let config = scratch_config(&dir, "true")
            .with_shims(vec![ShimBinary::embedded("bad name.so", b"x".to_vec())]);

        assert!(matches!(
            launch(&config, 1),
            Err(FramecastError::InvalidParameter { .. })
        ));
        assert!(!dir.path().join("shims").exists());
    }

    #[test]
    fn test_dropping_exited_target_reaps_it() {
        let dir = TempDir::new().unwrap();
        let config = scratch_config(&dir, "exit 0").with_autostart(true);

        let outcome = launch(&config, 5).unwrap();
        let process = outcome.process.unwrap();
        let pid = process.pid();

        let deadline = Instant::now() + Duration::from_secs(5);
        while process_state(pid) != Some('Z') {
            assert!(Instant::now() < deadline, "target {} never exited", pid);
            thread::sleep(Duration::from_millis(5));
        }

        drop(process);
        assert_eq!(process_state(pid), None);
    }
}
