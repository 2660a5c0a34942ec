//! Self-update for the Premedia desktop client.
//!
//! The front binary checks the manifest and downloads a verified build; the
//! `updater` helper stops the old process and starts the new one.

pub mod checksum;
pub mod config;
pub mod decision;
pub mod download;
pub mod error;
pub mod handoff;
pub mod logging;
pub mod manifest;
pub mod platform;
pub mod process;
pub mod prompt;
pub mod relaunch;
pub mod update;

pub use config::UpdaterConfig;
pub use decision::{UpdateDecision, decide};
pub use error::UpdateError;
pub use manifest::{PlatformTarget, VersionManifest};
pub use update::{CancelToken, DownloadedArtifact, UpdateOutcome, Updater};

pub(crate) const USER_AGENT: &str = "PremediaUpdater";
