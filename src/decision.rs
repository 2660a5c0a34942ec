use crate::manifest::VersionManifest;

/// What a single update check concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDecision {
    UpToDate,
    /// A newer version exists; the user must confirm before it is installed.
    OptionalAvailable(String),
    /// A newer version exists and is installed without asking.
    MandatoryAvailable(String),
    /// A newer version exists but the manifest has nothing for this platform.
    Unsupported(String),
}

impl UpdateDecision {
    /// The version to install, when there is one.
    pub fn target_version(&self) -> Option<&str> {
        match self {
            UpdateDecision::OptionalAvailable(v) | UpdateDecision::MandatoryAvailable(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn needs_confirmation(&self) -> bool {
        matches!(self, UpdateDecision::OptionalAvailable(_))
    }
}

/// Decide what to do with a fetched manifest. Pure; performs no I/O.
///
/// Versions are compared for equality only; any difference counts as an update.
pub fn decide(current: &str, manifest: &VersionManifest, platform: &str) -> UpdateDecision {
    let latest = manifest.version.trim();
    if latest == current.trim() {
        return UpdateDecision::UpToDate;
    }

    if manifest.target_for(platform).is_none() {
        return UpdateDecision::Unsupported(platform.to_string());
    }

    if manifest.mandatory {
        UpdateDecision::MandatoryAvailable(latest.to_string())
    } else {
        UpdateDecision::OptionalAvailable(latest.to_string())
    }
}
