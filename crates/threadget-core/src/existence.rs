//! Existence check: is a descriptor's target already fully present?
//!
//! Read-only look at the final target name. When the expected size is known
//! the file must match it exactly; when it is unknown, presence is enough.
//! With MD5 verification on, a file whose descriptor carries a digest must
//! also hash to it. `.part` temp files are never consulted.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

use crate::checksum::{md5_path, Md5Digest};
use crate::descriptor::Descriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Target exists and satisfies the size policy; `size` is its length.
    Present { size: u64 },
    Absent,
}

/// Checks the target of `descriptor` inside `target_dir`.
///
/// A missing file is `Absent`, never an error. A file of the wrong size is also
/// `Absent`: the next successful fetch replaces it through the final rename.
/// Only hard I/O failures (permission denied, a directory squatting the name)
/// are returned as `Err`.
///
/// `verify_md5` additionally hashes a size-matching file (on the blocking
/// pool) when the descriptor has a digest; a mismatch is `Absent`.
pub async fn check(
    descriptor: &Descriptor,
    target_dir: &Path,
    verify_md5: bool,
) -> io::Result<Presence> {
    let path = target_dir.join(descriptor.target_name());
    let presence = match tokio::fs::metadata(&path).await {
        Ok(meta) => presence_from_metadata(&meta, descriptor.expected_size(), &path)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Presence::Absent),
        Err(e) => return Err(e),
    };
    match (presence, descriptor.expected_md5()) {
        (Presence::Present { .. }, Some(expected)) if verify_md5 => {
            if digest_matches(path, *expected).await? {
                Ok(presence)
            } else {
                Ok(Presence::Absent)
            }
        }
        _ => Ok(presence),
    }
}

async fn digest_matches(path: PathBuf, expected: Md5Digest) -> io::Result<bool> {
    let (path, actual) = tokio::task::spawn_blocking(move || {
        let digest = md5_path(&path);
        (path, digest)
    })
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let matches = actual? == expected;
    if !matches {
        tracing::debug!(path = %path.display(), "existing file fails md5 check, will re-fetch");
    }
    Ok(matches)
}

fn presence_from_metadata(
    meta: &Metadata,
    expected_size: Option<u64>,
    path: &Path,
) -> io::Result<Presence> {
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} exists but is not a regular file", path.display()),
        ));
    }
    let size = meta.len();
    match expected_size {
        Some(expected) if expected != size => {
            tracing::debug!(
                path = %path.display(),
                expected,
                actual = size,
                "existing file has wrong size, will re-fetch"
            );
            Ok(Presence::Absent)
        }
        _ => Ok(Presence::Present { size }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, size: Option<u64>) -> Descriptor {
        Descriptor::new("https://i.4cdn.org/g/1.jpg", name, 1, size).unwrap()
    }

    fn hello_digest() -> Md5Digest {
        crate::checksum::decode_md5("XrY7u+Ae7tCTyyK7j1rNww==").unwrap()
    }

    #[tokio::test]
    async fn missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let p = check(&descriptor("nope.jpg", Some(10)), dir.path(), false).await.unwrap();
        assert_eq!(p, Presence::Absent);
    }

    #[tokio::test]
    async fn full_size_file_is_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), vec![7u8; 100]).unwrap();
        let p = check(&descriptor("a.jpg", Some(100)), dir.path(), false).await.unwrap();
        assert_eq!(p, Presence::Present { size: 100 });
    }

    #[tokio::test]
    async fn short_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), vec![7u8; 40]).unwrap();
        let p = check(&descriptor("a.jpg", Some(100)), dir.path(), false).await.unwrap();
        assert_eq!(p, Presence::Absent);
    }

    #[tokio::test]
    async fn unknown_size_accepts_any_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        let p = check(&descriptor("a.jpg", None), dir.path(), false).await.unwrap();
        assert_eq!(p, Presence::Present { size: 1 });
    }

    #[tokio::test]
    async fn temp_file_does_not_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg.part"), vec![0u8; 100]).unwrap();
        let p = check(&descriptor("a.jpg", Some(100)), dir.path(), false).await.unwrap();
        assert_eq!(p, Presence::Absent);
    }

    #[tokio::test]
    async fn directory_under_target_name_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a.jpg")).unwrap();
        assert!(check(&descriptor("a.jpg", None), dir.path(), false).await.is_err());
    }

    #[tokio::test]
    async fn digest_is_ignored_unless_verification_is_on() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"hello there").unwrap();
        let d = descriptor("a.jpg", Some(11)).with_md5(hello_digest());
        let p = check(&d, dir.path(), false).await.unwrap();
        assert_eq!(p, Presence::Present { size: 11 });
    }

    #[tokio::test]
    async fn verification_rejects_content_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"hello there").unwrap();
        let d = descriptor("a.jpg", Some(11)).with_md5(hello_digest());
        let p = check(&d, dir.path(), true).await.unwrap();
        assert_eq!(p, Presence::Absent);
    }

    #[tokio::test]
    async fn verification_accepts_matching_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"hello world").unwrap();
        let d = descriptor("a.jpg", None).with_md5(hello_digest());
        let p = check(&d, dir.path(), true).await.unwrap();
        assert_eq!(p, Presence::Present { size: 11 });
    }

    #[tokio::test]
    async fn verification_without_digest_falls_back_to_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"anything").unwrap();
        let p = check(&descriptor("a.jpg", Some(8)), dir.path(), true).await.unwrap();
        assert_eq!(p, Presence::Present { size: 8 });
    }
}
