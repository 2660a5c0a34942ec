//! Helper side of the update handoff.
//!
//! The running client cannot replace its own executable, so the helper stops
//! it, moves the verified artifact into place and starts the new version.

use log::{error, info, warn};
use std::{
    fs, io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use crate::{
    error::UpdateError,
    process::{ProcessInfo, ProcessTable, current_pid},
};

#[derive(Debug, Clone, Copy)]
pub struct RelaunchTimings {
    /// How long terminated processes get to exit on their own.
    pub grace_period: Duration,
    /// How long a force kill gets to take effect before the update is abandoned.
    pub kill_wait: Duration,
    pub poll_interval: Duration,
    /// Pause after the old process is gone, so the OS releases the executable.
    pub settle_delay: Duration,
    pub replace_attempts: u32,
    pub replace_retry_delay: Duration,
}

impl Default for RelaunchTimings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            kill_wait: Duration::from_secs(2),
            poll_interval: Duration::from_millis(200),
            settle_delay: Duration::from_secs(1),
            replace_attempts: 8,
            replace_retry_delay: Duration::from_millis(800),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaunchReport {
    /// Pids that matched the old executable's name.
    pub matched: Vec<u32>,
    /// Pids that ignored the termination request and were killed.
    pub force_killed: Vec<u32>,
    /// Whether the artifact replaced the old executable on disk.
    pub installed: bool,
    pub launched_path: PathBuf,
    pub launched_pid: u32,
}

pub struct Relauncher<T: ProcessTable> {
    table: T,
    timings: RelaunchTimings,
    own_pid: Option<u32>,
}

impl<T: ProcessTable> Relauncher<T> {
    pub fn new(table: T, timings: RelaunchTimings) -> Self {
        Self {
            table,
            timings,
            own_pid: current_pid(),
        }
    }

    pub fn into_table(self) -> T {
        self.table
    }

    /// Stop every process running `old_exe`, install `new_exe` and launch it.
    ///
    /// Nothing is installed or launched while a matching process survives the
    /// force kill; that error leaves the old installation and the artifact in
    /// place. A failed launch after the old process is gone is not recoverable.
    pub fn relaunch(&mut self, new_exe: &Path, old_exe: &Path) -> Result<RelaunchReport, UpdateError> {
        let base_name = process_base_name(old_exe);
        let matched: Vec<u32> = self.find_matches(&base_name).iter().map(|p| p.pid).collect();

        if matched.is_empty() {
            info!("No running process matches '{}'", base_name);
        }

        for &pid in &matched {
            info!("Requesting termination of pid {} ('{}')", pid, base_name);
            if !self.table.request_termination(pid) {
                warn!("Termination request for pid {} was not delivered", pid);
            }
        }

        let survivors = self.wait_for_exit(&matched, self.timings.grace_period);
        let mut force_killed = Vec::new();
        for &pid in &survivors {
            warn!(
                "pid {} still running after {:?}, forcing it to stop",
                pid, self.timings.grace_period
            );
            if self.table.force_kill(pid) {
                force_killed.push(pid);
            } else {
                warn!("Force kill of pid {} failed", pid);
            }
        }

        let stubborn = self.wait_for_exit(&survivors, self.timings.kill_wait);
        if !stubborn.is_empty() {
            error!("Processes still running after force kill: {:?}", stubborn);
            return Err(UpdateError::LaunchFailed {
                path: new_exe.display().to_string(),
                reason: format!("previous instance still running (pids {:?})", stubborn),
                after_termination: false,
            });
        }

        thread::sleep(self.timings.settle_delay);

        let (launch_path, installed) = match install_binary(new_exe, old_exe, &self.timings) {
            Ok(()) => {
                info!("Installed {} over {}", new_exe.display(), old_exe.display());
                (old_exe.to_path_buf(), true)
            }
            Err(e) => {
                warn!(
                    "Could not replace {} ({}); launching {} in place",
                    old_exe.display(),
                    e,
                    new_exe.display()
                );
                if let Err(e) = make_executable(new_exe) {
                    warn!("Could not mark {} executable: {}", new_exe.display(), e);
                }
                (new_exe.to_path_buf(), false)
            }
        };

        info!("Launching {}", launch_path.display());
        match self.table.launch_detached(&launch_path) {
            Ok(pid) => {
                info!("Started pid {}", pid);
                Ok(RelaunchReport {
                    matched,
                    force_killed,
                    installed,
                    launched_path: launch_path,
                    launched_pid: pid,
                })
            }
            Err(e) => Err(UpdateError::LaunchFailed {
                path: launch_path.display().to_string(),
                reason: e.to_string(),
                after_termination: true,
            }),
        }
    }

    fn find_matches(&mut self, base_name: &str) -> Vec<ProcessInfo> {
        if base_name.is_empty() {
            return Vec::new();
        }
        let needle = base_name.to_lowercase();
        let own_pid = self.own_pid;
        self.table
            .list_processes()
            .into_iter()
            .filter(|p| Some(p.pid) != own_pid)
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect()
    }

    fn still_running(&mut self, pids: &[u32]) -> Vec<u32> {
        if pids.is_empty() {
            return Vec::new();
        }
        let listed = self.table.list_processes();
        pids.iter()
            .copied()
            .filter(|pid| listed.iter().any(|p| p.pid == *pid))
            .collect()
    }

    /// Poll until every pid is gone or `limit` runs out. Returns survivors.
    fn wait_for_exit(&mut self, pids: &[u32], limit: Duration) -> Vec<u32> {
        let deadline = Instant::now() + limit;
        loop {
            let alive = self.still_running(pids);
            if alive.is_empty() || Instant::now() >= deadline {
                return alive;
            }
            thread::sleep(self.timings.poll_interval);
        }
    }
}

/// File name used to find the old executable among running processes.
pub fn process_base_name(exe: &Path) -> String {
    exe.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Move `new_exe` over `old_exe`, retrying while the OS still holds the file.
pub fn install_binary(new_exe: &Path, old_exe: &Path, timings: &RelaunchTimings) -> io::Result<()> {
    install_with(new_exe, old_exe, timings, make_executable)
}

fn install_with(
    new_exe: &Path,
    old_exe: &Path,
    timings: &RelaunchTimings,
    mark_executable: impl Fn(&Path) -> io::Result<()>,
) -> io::Result<()> {
    let attempts = timings.replace_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match replace_once(new_exe, old_exe) {
            Ok(()) => {
                // The artifact has already moved, so the install stands either way.
                if let Err(e) = mark_executable(old_exe) {
                    warn!("Could not mark {} executable: {}", old_exe.display(), e);
                }
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "Failed to replace binary ({}). Retries left: {}",
                    e,
                    attempts - attempt
                );
                last_err = Some(e);
                if attempt < attempts {
                    thread::sleep(timings.replace_retry_delay);
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| io::Error::other("replace not attempted")))
}

fn replace_once(new_exe: &Path, old_exe: &Path) -> io::Result<()> {
    if !new_exe.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", new_exe.display()),
        ));
    }
    if fs::rename(new_exe, old_exe).is_ok() {
        return Ok(());
    }

    // Rename fails across filesystems; stage a copy beside the target instead.
    let staged = staging_path(old_exe);
    fs::copy(new_exe, &staged)?;
    if let Err(e) = fs::rename(&staged, old_exe) {
        let _ = fs::remove_file(&staged);
        return Err(e);
    }
    if let Err(e) = fs::remove_file(new_exe) {
        warn!("Could not remove {}: {}", new_exe.display(), e);
    }
    Ok(())
}

fn staging_path(old_exe: &Path) -> PathBuf {
    let mut name = old_exe.file_name().unwrap_or_default().to_os_string();
    name.push(".new");
    old_exe.with_file_name(name)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
