use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::platform;

pub const CONFIG_FILE_NAME: &str = "premedia_update.toml";
pub const MANIFEST_URL_ENV: &str = "PREMEDIA_MANIFEST_URL";

/// Update settings, loaded from `premedia_update.toml`.
///
/// Every field has a default so a config file only needs the keys it changes.
/// `manifest_url` has no usable default and must be set either in the file or
/// through `PREMEDIA_MANIFEST_URL`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Endpoint serving the version manifest JSON.
    pub manifest_url: String,
    /// Version of the installed client.
    pub current_version: String,
    pub fetch_timeout_secs: u64,
    pub download_timeout_secs: u64,
    /// Where artifacts are downloaded (system temp dir when unset).
    pub download_dir: Option<PathBuf>,
    /// Executable being replaced (the running binary when unset).
    pub target_executable: Option<PathBuf>,
    /// Directory holding the helper (the target executable's directory when unset).
    pub install_dir: Option<PathBuf>,
    pub helper_name: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            manifest_url: String::new(),
            current_version: env!("CARGO_PKG_VERSION").to_string(),
            fetch_timeout_secs: 8,
            download_timeout_secs: 300,
            download_dir: None,
            target_executable: None,
            install_dir: None,
            helper_name: None,
            log_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl UpdaterConfig {
    /// Read a config file. A missing file is an error here.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let cfg: UpdaterConfig = toml::from_str(&data)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(cfg)
    }

    /// Load the explicit path if given, else `premedia_update.toml` beside the
    /// executable when present, else defaults. Environment overrides apply last.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match explicit {
            Some(path) => Self::load(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(&path)?,
                _ => Self::default(),
            },
        };
        cfg.apply_overrides(std::env::var(MANIFEST_URL_ENV).ok());
        Ok(cfg)
    }

    /// Replace the manifest URL with a non-empty override.
    pub fn apply_overrides(&mut self, manifest_url: Option<String>) {
        if let Some(url) = manifest_url {
            let url = url.trim();
            if !url.is_empty() {
                self.manifest_url = url.to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.manifest_url.trim().is_empty() {
            bail!(
                "manifest_url is not configured (set it in {} or {})",
                CONFIG_FILE_NAME,
                MANIFEST_URL_ENV
            );
        }
        if self.current_version.trim().is_empty() {
            bail!("current_version must not be empty");
        }
        if self.fetch_timeout_secs == 0 || self.download_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn target_executable(&self) -> Result<PathBuf> {
        match &self.target_executable {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe().context("Failed to resolve the running executable"),
        }
    }

    pub fn install_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.install_dir {
            return Ok(dir.clone());
        }
        let exe = self.target_executable()?;
        exe.parent()
            .map(Path::to_path_buf)
            .with_context(|| format!("{} has no parent directory", exe.display()))
    }

    pub fn helper_name(&self) -> &str {
        self.helper_name.as_deref().unwrap_or(platform::HELPER_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(platform::default_log_dir)
    }
}

/// `premedia_update.toml` in the directory of the running executable.
pub fn default_config_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(CONFIG_FILE_NAME))
}
