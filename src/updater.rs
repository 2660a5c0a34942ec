use log::{error, info, warn};
use std::{ffi::OsString, path::Path, process::exit};

use premedia_update::{
    UpdateError, UpdaterConfig, logging,
    process::SystemProcessTable,
    relaunch::{RelaunchTimings, Relauncher},
};

const EXIT_USAGE: i32 = 1;
const EXIT_LAUNCH_FAILED: i32 = 2;
const EXIT_STILL_RUNNING: i32 = 3;

fn init_logger() -> Option<flexi_logger::LoggerHandle> {
    // The helper must keep going even without a usable config or log dir.
    let config = UpdaterConfig::load_or_default(None).unwrap_or_default();
    match logging::init_logging(&config.log_dir(), "updater", &config.log_level) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("updater: logging disabled: {:#}", e);
            None
        }
    }
}

fn main() {
    let logger = init_logger();
    info!("Premedia updater started.");

    let args: Vec<OsString> = std::env::args_os().collect();
    if args.len() != 3 {
        error!("Usage: updater <new_executable_path> <old_executable_path>");
        if logger.is_none() {
            eprintln!("Usage: updater <new_executable_path> <old_executable_path>");
        }
        exit(EXIT_USAGE);
    }

    let new_path = Path::new(&args[1]);
    let old_path = Path::new(&args[2]);

    let mut relauncher = Relauncher::new(SystemProcessTable::new(), RelaunchTimings::default());
    match relauncher.relaunch(new_path, old_path) {
        Ok(report) => {
            info!(
                "Update complete: {} running as pid {} (stopped {:?}, force killed {:?})",
                report.launched_path.display(),
                report.launched_pid,
                report.matched,
                report.force_killed
            );
        }
        Err(
            e @ UpdateError::LaunchFailed {
                after_termination: false,
                ..
            },
        ) => {
            warn!("[{}] {}", e.kind(), e);
            warn!(
                "Update not installed; the previous version of Premedia is still running from {}.",
                old_path.display()
            );
            exit(EXIT_STILL_RUNNING);
        }
        Err(e @ UpdateError::LaunchFailed { .. }) => {
            warn!("[{}] {}", e.kind(), e);
            warn!(
                "The previous version was already stopped; Premedia is NOT running. Start {} manually.",
                old_path.display()
            );
            exit(EXIT_LAUNCH_FAILED);
        }
        Err(e) => {
            error!("[{}] {}", e.kind(), e);
            exit(EXIT_LAUNCH_FAILED);
        }
    }
}
