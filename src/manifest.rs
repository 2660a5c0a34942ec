use chrono::Utc;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, time::Duration};

use crate::{USER_AGENT, error::UpdateError, platform::SUPPORTED_PLATFORMS};

/// Download metadata for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTarget {
    #[serde(rename = "url")]
    pub download_url: String,
    /// Lowercase hex SHA-256 of the artifact. Validated before any download.
    #[serde(rename = "sha256", default)]
    pub expected_checksum: String,
}

/// The latest published release, as described by the remote manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionManifest {
    pub version: String,
    pub mandatory: bool,
    pub platform_targets: BTreeMap<String, PlatformTarget>,
}

impl VersionManifest {
    pub fn target_for(&self, platform: &str) -> Option<&PlatformTarget> {
        self.platform_targets.get(platform)
    }
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    mandatory: bool,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// Parse a manifest body. Keys other than the supported platforms are ignored.
pub fn parse_manifest(body: &str) -> Result<VersionManifest, UpdateError> {
    let raw: RawManifest = serde_json::from_str(body)
        .map_err(|e| UpdateError::FetchFailed(format!("malformed manifest: {}", e)))?;

    let version = raw
        .version
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| UpdateError::FetchFailed("manifest has no version field".into()))?;

    let mut platform_targets = BTreeMap::new();
    for key in SUPPORTED_PLATFORMS {
        match raw.rest.get(key) {
            None | Some(Value::Null) => {}
            Some(entry) => {
                let target: PlatformTarget = serde_json::from_value(entry.clone()).map_err(|e| {
                    UpdateError::FetchFailed(format!("invalid '{}' entry in manifest: {}", key, e))
                })?;
                platform_targets.insert(key.to_string(), target);
            }
        }
    }

    Ok(VersionManifest {
        version,
        mandatory: raw.mandatory,
        platform_targets,
    })
}

/// Fetch the manifest once, with a cache-busting `t=<unix-seconds>` query.
///
/// Single attempt, no retry. Any failure is `FetchFailed`.
pub fn fetch_manifest(url: &str, timeout: Duration) -> Result<VersionManifest, UpdateError> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| UpdateError::FetchFailed(e.to_string()))?;

    let stamp = Utc::now().timestamp().to_string();
    log::info!("Fetching version manifest: {}", url);

    let body = client
        .get(url)
        .query(&[("t", stamp.as_str())])
        .send()
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.text())
        .map_err(|e| UpdateError::FetchFailed(e.to_string()))?;

    let manifest = parse_manifest(&body)?;
    log::info!(
        "Manifest: latest {} (mandatory: {}, platforms: {:?})",
        manifest.version,
        manifest.mandatory,
        manifest.platform_targets.keys().collect::<Vec<_>>()
    );
    Ok(manifest)
}
