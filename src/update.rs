use log::{error, info};
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    checksum::{normalize_expected, verify},
    config::UpdaterConfig,
    decision::{UpdateDecision, decide},
    download::{discard, download_artifact},
    error::UpdateError,
    handoff::{HelperLauncher, locate_helper},
    manifest::{VersionManifest, fetch_manifest},
    platform::current_platform,
    prompt::Prompt,
};

/// Shared flag checked between pipeline stages.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    /// The user turned down an optional update.
    Declined(String),
    Cancelled,
    /// The helper is running; the caller should exit so it can replace us.
    HandedOff { version: String, helper_pid: u32 },
}

/// A verified artifact waiting for the helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub local_path: PathBuf,
    pub actual_checksum: String,
}

/// Runs one update attempt: fetch, decide, confirm, download, verify, hand off.
pub struct Updater<P: Prompt, H: HelperLauncher> {
    config: UpdaterConfig,
    platform: String,
    prompt: P,
    launcher: H,
    cancel: CancelToken,
}

impl<P: Prompt, H: HelperLauncher> Updater<P, H> {
    pub fn new(config: UpdaterConfig, prompt: P, launcher: H) -> Self {
        Self {
            config,
            platform: current_platform().to_string(),
            prompt,
            launcher,
            cancel: CancelToken::new(),
        }
    }

    /// Override the host platform key.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Fetch the manifest and decide, without side effects.
    pub fn check(&self) -> Result<(VersionManifest, UpdateDecision), UpdateError> {
        let manifest = fetch_manifest(&self.config.manifest_url, self.config.fetch_timeout())?;
        let decision = decide(&self.config.current_version, &manifest, &self.platform);
        info!(
            "Current version {} on '{}': {:?}",
            self.config.current_version, self.platform, decision
        );
        Ok((manifest, decision))
    }

    pub fn run(&self) -> Result<UpdateOutcome, UpdateError> {
        let result = self.run_stages();
        if let Err(e) = &result {
            error!("Update aborted [{}]: {}", e.kind(), e);
        }
        result
    }

    fn run_stages(&self) -> Result<UpdateOutcome, UpdateError> {
        let (manifest, decision) = self.check()?;
        if self.cancel.is_cancelled() {
            return Ok(UpdateOutcome::Cancelled);
        }

        let version = match decision {
            UpdateDecision::UpToDate => {
                info!("Already up-to-date: {}", manifest.version);
                return Ok(UpdateOutcome::UpToDate);
            }
            UpdateDecision::Unsupported(platform) => {
                return Err(UpdateError::Unsupported(platform));
            }
            UpdateDecision::OptionalAvailable(version) => {
                if !self.prompt.confirm(&self.config.current_version, &version) {
                    info!("Update to {} declined", version);
                    return Ok(UpdateOutcome::Declined(version));
                }
                version
            }
            UpdateDecision::MandatoryAvailable(version) => {
                info!("Mandatory update to {}", version);
                version
            }
        };

        let target = manifest
            .target_for(&self.platform)
            .ok_or_else(|| UpdateError::Unsupported(self.platform.clone()))?;
        let expected = normalize_expected(&target.expected_checksum)?;

        let unresolved = |e: anyhow::Error| {
            UpdateError::HelperMissing(format!("cannot resolve install location: {:#}", e))
        };
        let old_exe = self.config.target_executable().map_err(unresolved)?;
        let install_dir = self.config.install_dir().map_err(unresolved)?;
        let helper = locate_helper(&install_dir, self.config.helper_name())?;

        if self.cancel.is_cancelled() {
            return Ok(UpdateOutcome::Cancelled);
        }

        let local_path = download_artifact(
            &target.download_url,
            &self.config.download_dir(),
            self.config.download_timeout(),
        )?;

        if self.cancel.is_cancelled() {
            discard(&local_path);
            return Ok(UpdateOutcome::Cancelled);
        }

        let artifact = match verify(&local_path, &expected) {
            Ok(actual_checksum) => DownloadedArtifact {
                local_path,
                actual_checksum,
            },
            Err(e) => {
                discard(&local_path);
                return Err(e);
            }
        };
        info!("Checksum verified: {}", artifact.actual_checksum);

        if self.cancel.is_cancelled() {
            discard(&artifact.local_path);
            return Ok(UpdateOutcome::Cancelled);
        }

        match self.launcher.launch(&helper, &artifact.local_path, &old_exe) {
            Ok(helper_pid) => {
                info!("Update to {} handed off to updater (pid {})", version, helper_pid);
                Ok(UpdateOutcome::HandedOff { version, helper_pid })
            }
            Err(e) => {
                discard(&artifact.local_path);
                Err(e)
            }
        }
    }
}
