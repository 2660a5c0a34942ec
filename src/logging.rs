use anyhow::{Context, Result};
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};
use std::path::Path;

/// Initialize file logging for one of the update binaries.
///
/// `basename` names the log file (`premedia_update`, `updater`). The returned
/// handle must be kept alive for the lifetime of the process.
pub fn init_logging(log_dir: &Path, basename: &str, level: &str) -> Result<LoggerHandle> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let handle = Logger::try_with_env_or_str(level)?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(basename)
                .suffix("log"),
        )
        .rotate(
            Criterion::Size(5_000_000),
            Naming::Numbers,
            Cleanup::KeepLogFiles(10),
        )
        .duplicate_to_stderr(Duplicate::Info)
        .start()
        .context("Failed to start logger")?;

    Ok(handle)
}
