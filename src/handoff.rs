use std::path::{Path, PathBuf};

use crate::{error::UpdateError, process::spawn_detached};

/// Starts the companion helper that swaps the executables.
pub trait HelperLauncher {
    /// Launch `helper` with `<new_exe> <old_exe>`. Returns the helper pid.
    fn launch(&self, helper: &Path, new_exe: &Path, old_exe: &Path) -> Result<u32, UpdateError>;
}

/// Launches the helper as a detached OS process.
pub struct DetachedHelper;

impl HelperLauncher for DetachedHelper {
    fn launch(&self, helper: &Path, new_exe: &Path, old_exe: &Path) -> Result<u32, UpdateError> {
        log::info!(
            "Launching updater: {} {} {}",
            helper.display(),
            new_exe.display(),
            old_exe.display()
        );
        spawn_detached(helper, &[new_exe, old_exe]).map_err(|e| UpdateError::LaunchFailed {
            path: helper.display().to_string(),
            reason: e.to_string(),
            after_termination: false,
        })
    }
}

/// Path of the helper inside the install directory, if it is there.
pub fn locate_helper(install_dir: &Path, helper_name: &str) -> Result<PathBuf, UpdateError> {
    let path = install_dir.join(helper_name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(UpdateError::HelperMissing(format!("no file at {}", path.display())))
    }
}
