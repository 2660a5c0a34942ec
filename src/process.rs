use std::{
    io,
    path::Path,
    process::{Command, Stdio},
};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

/// A running process, identified by pid and executable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// Process operations the relaunch helper needs from the OS.
pub trait ProcessTable {
    fn list_processes(&mut self) -> Vec<ProcessInfo>;

    /// Ask a process to exit. Returns false when the request could not be sent.
    fn request_termination(&mut self, pid: u32) -> bool;

    fn force_kill(&mut self, pid: u32) -> bool;

    /// Start `program` detached from the caller. Returns the new pid.
    fn launch_detached(&mut self, program: &Path) -> io::Result<u32>;
}

/// `ProcessTable` backed by the live process list.
pub struct SystemProcessTable {
    sys: System,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }

    fn refresh(&mut self) {
        self.sys.refresh_processes(ProcessesToUpdate::All, true);
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn list_processes(&mut self) -> Vec<ProcessInfo> {
        self.refresh();
        self.sys
            .processes()
            .iter()
            // An exited child still listed until its parent reaps it is not running.
            .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
            })
            .collect()
    }

    #[cfg(unix)]
    fn request_termination(&mut self, pid: u32) -> bool {
        self.refresh();
        self.sys
            .process(Pid::from_u32(pid))
            .and_then(|p| p.kill_with(sysinfo::Signal::Term))
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn request_termination(&mut self, pid: u32) -> bool {
        // Without /F, taskkill posts WM_CLOSE and lets the app shut down.
        Command::new("taskkill")
            .args(["/PID", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn force_kill(&mut self, pid: u32) -> bool {
        self.refresh();
        self.sys
            .process(Pid::from_u32(pid))
            .map(|p| p.kill())
            .unwrap_or(false)
    }

    fn launch_detached(&mut self, program: &Path) -> io::Result<u32> {
        spawn_detached(program, &[])
    }
}

/// Spawn a process that outlives the caller, without going through a shell.
pub fn spawn_detached(program: &Path, args: &[&Path]) -> io::Result<u32> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    if let Some(dir) = program.parent().filter(|d| !d.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let child = cmd.spawn()?;
    Ok(child.id())
}

/// Pid of the calling process, used so the helper never matches itself.
pub fn current_pid() -> Option<u32> {
    sysinfo::get_current_pid().ok().map(|pid| pid.as_u32())
}
