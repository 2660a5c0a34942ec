//! SHA-256 verification of downloaded artifacts.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::UpdateError;

pub const CHUNK_SIZE: usize = 8 * 1024;

/// Compute SHA-256 of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Normalize a manifest checksum to lowercase hex.
///
/// An empty or malformed value is incomplete metadata, never "skip verification".
pub fn normalize_expected(raw: &str) -> Result<String, UpdateError> {
    let digest = raw.trim().to_ascii_lowercase();
    if digest.is_empty() {
        return Err(UpdateError::FetchFailed(
            "incomplete metadata: no sha256 for this platform".into(),
        ));
    }
    if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(UpdateError::FetchFailed(format!(
            "incomplete metadata: malformed sha256 '{}'",
            raw.trim()
        )));
    }
    Ok(digest)
}

/// Hash `path` and compare against an already normalized digest.
/// Returns the actual digest on success.
pub fn verify(path: &Path, expected: &str) -> Result<String, UpdateError> {
    let actual = sha256_file(path).map_err(|e| {
        UpdateError::DownloadFailed(format!("cannot read {}: {}", path.display(), e))
    })?;
    if actual != expected {
        return Err(UpdateError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const HELLO: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[test]
    fn sha256_file_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(sha256_file(f.path()).unwrap(), EMPTY);
    }

    #[test]
    fn sha256_file_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        assert_eq!(sha256_file(f.path()).unwrap(), HELLO);
    }

    #[test]
    fn sha256_file_spans_several_chunks() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        let data = vec![0x5au8; CHUNK_SIZE * 3 + 17];
        f.write_all(&data).unwrap();
        f.flush().unwrap();
        let expected = format!("{:x}", Sha256::digest(&data));
        assert_eq!(sha256_file(f.path()).unwrap(), expected);
    }

    #[test]
    fn verify_reports_both_digests_on_mismatch() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"tampered").unwrap();
        f.flush().unwrap();
        match verify(f.path(), HELLO) {
            Err(UpdateError::ChecksumMismatch { expected, actual }) => {
                assert_eq!(expected, HELLO);
                assert_ne!(actual, HELLO);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn verify_accepts_matching_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        assert_eq!(verify(f.path(), HELLO).unwrap(), HELLO);
    }

    #[test]
    fn empty_expected_is_incomplete_metadata() {
        let err = normalize_expected("  ").unwrap_err();
        assert!(matches!(err, UpdateError::FetchFailed(ref m) if m.contains("incomplete metadata")));
    }

    #[test]
    fn short_or_non_hex_expected_is_rejected() {
        assert!(normalize_expected("abc123").is_err());
        assert!(normalize_expected(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn uppercase_expected_is_normalized() {
        assert_eq!(normalize_expected(&HELLO.to_uppercase()).unwrap(), HELLO);
    }
}
