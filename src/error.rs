use thiserror::Error;

/// Every way an update attempt can stop short.
///
/// All kinds are terminal for the attempt. Apart from a `LaunchFailed`
/// raised by the helper, the old installation is left untouched.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("failed to fetch version manifest: {0}")]
    FetchFailed(String),

    #[error("platform '{0}' is not supported by this release")]
    Unsupported(String),

    #[error("failed to download update: {0}")]
    DownloadFailed(String),

    #[error("checksum mismatch (expected {expected}, got {actual})")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("update helper unavailable: {0}")]
    HelperMissing(String),

    #[error("failed to launch {path}: {reason}")]
    LaunchFailed {
        path: String,
        reason: String,
        /// Set when the old process was already stopped before the launch failed.
        after_termination: bool,
    },
}

impl UpdateError {
    /// Whether the previous installation is still runnable after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            UpdateError::LaunchFailed {
                after_termination: true,
                ..
            }
        )
    }

    /// Short stable name, used in log lines and by the front end.
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateError::FetchFailed(_) => "FetchFailed",
            UpdateError::Unsupported(_) => "Unsupported",
            UpdateError::DownloadFailed(_) => "DownloadFailed",
            UpdateError::ChecksumMismatch { .. } => "ChecksumMismatch",
            UpdateError::HelperMissing(_) => "HelperMissing",
            UpdateError::LaunchFailed { .. } => "LaunchFailed",
        }
    }
}
