use std::path::PathBuf;

/// Manifest keys this client knows how to install.
pub const SUPPORTED_PLATFORMS: [&str; 2] = ["windows", "mac"];

// ---- Helper Names ----

#[cfg(target_os = "windows")]
pub const HELPER_NAME: &str = "updater.exe";

#[cfg(not(target_os = "windows"))]
pub const HELPER_NAME: &str = "updater.sh";

/// Maps a Rust `std::env::consts::OS` value to its manifest key.
///
/// Hosts without a mapping keep their own name, which never matches a
/// manifest entry.
pub fn platform_id(os: &str) -> &str {
    match os {
        "windows" => "windows",
        "macos" => "mac",
        other => other,
    }
}

/// Manifest key for the host this binary runs on.
pub fn current_platform() -> &'static str {
    platform_id(std::env::consts::OS)
}

/// Default directory for log files.
pub fn default_log_dir() -> PathBuf {
    std::env::temp_dir().join("premedia").join("logs")
}
