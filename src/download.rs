use reqwest::blocking::Client;
use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{USER_AGENT, checksum::CHUNK_SIZE, error::UpdateError};

const CONNECT_TIMEOUT_SECS: u64 = 15;
const FALLBACK_FILE_NAME: &str = "premedia_update.download";

/// File name for a downloaded artifact: the last path segment of the URL.
pub fn artifact_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let without_scheme = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
    // Only a path segment can name the file, never the host.
    let name = match without_scheme.split_once('/') {
        Some((_, rest)) => rest.rsplit('/').next().unwrap_or_default(),
        None => "",
    };
    match name {
        "" | "." | ".." => FALLBACK_FILE_NAME.to_string(),
        name if name.contains('\\') => FALLBACK_FILE_NAME.to_string(),
        name => name.to_string(),
    }
}

/// Stream `url` into `dest_dir` and return the local path.
///
/// Any failure removes the partially written file.
pub fn download_artifact(url: &str, dest_dir: &Path, timeout: Duration) -> Result<PathBuf, UpdateError> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| UpdateError::DownloadFailed(e.to_string()))?;

    log::info!("Downloading: {}", url);

    let mut resp = client
        .get(url)
        .send()
        .and_then(|resp| resp.error_for_status())
        .map_err(|e| UpdateError::DownloadFailed(e.to_string()))?;

    fs::create_dir_all(dest_dir).map_err(|e| {
        UpdateError::DownloadFailed(format!("cannot create {}: {}", dest_dir.display(), e))
    })?;

    let dest = dest_dir.join(artifact_file_name(url));
    let expected_len = resp.content_length();
    log::info!("Saving to: {}", dest.display());

    let written = File::create(&dest).and_then(|mut file| {
        let n = copy_chunks(&mut resp, &mut file, expected_len)?;
        file.sync_all()?;
        Ok(n)
    });

    let written = match written {
        Ok(n) => n,
        Err(e) => {
            discard(&dest);
            return Err(UpdateError::DownloadFailed(format!(
                "transfer of {} interrupted: {}",
                url, e
            )));
        }
    };

    if let Some(expected) = expected_len {
        if written != expected {
            discard(&dest);
            return Err(UpdateError::DownloadFailed(format!(
                "partial transfer: wrote {} of {} bytes",
                written, expected
            )));
        }
    }

    log::info!("Download complete ({} bytes).", written);
    Ok(dest)
}

/// Remove a downloaded artifact, logging instead of failing.
pub fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::info!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

fn copy_chunks<R: Read, W: Write>(reader: &mut R, writer: &mut W, total: Option<u64>) -> io::Result<u64> {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut written = 0u64;
    let mut next_report = 0u8;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        written += n as u64;

        if let Some(total) = total.filter(|t| *t > 0) {
            let pct = (written.saturating_mul(100) / total).min(100) as u8;
            if pct >= next_report {
                log::debug!("Downloaded {}% ({} of {} bytes)", pct, written, total);
                next_report = pct.saturating_add(10);
            }
        }
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_url_basename() {
        assert_eq!(artifact_file_name("https://x/app-2.0.exe"), "app-2.0.exe");
        assert_eq!(
            artifact_file_name("https://cdn.example.com/releases/2.0/Premedia.dmg?sig=abc#frag"),
            "Premedia.dmg"
        );
    }

    #[test]
    fn file_name_falls_back_when_url_has_no_basename() {
        assert_eq!(artifact_file_name("https://x/releases/"), FALLBACK_FILE_NAME);
        assert_eq!(artifact_file_name("https://x"), FALLBACK_FILE_NAME);
        assert_eq!(artifact_file_name("https://x/a/.."), FALLBACK_FILE_NAME);
    }

    #[test]
    fn copy_chunks_copies_everything() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 5)).map(|i| (i % 251) as u8).collect();
        let mut out = Vec::new();
        let n = copy_chunks(&mut data.as_slice(), &mut out, Some(data.len() as u64)).unwrap();
        assert_eq!(n as usize, data.len());
        assert_eq!(out, data);
    }

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            self.served = true;
            buf[..4].copy_from_slice(b"MZ\x90\x00");
            Ok(4)
        }
    }

    #[test]
    fn copy_chunks_surfaces_mid_stream_errors() {
        let mut out = Vec::new();
        let err = copy_chunks(&mut FailingReader { served: false }, &mut out, None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn discard_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        discard(&dir.path().join("never-downloaded.exe"));
    }
}
