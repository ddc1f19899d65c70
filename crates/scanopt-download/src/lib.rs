#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Provenance downloader: materializes a [`KnownProvenance`] as a local
//! directory.
//!
//! The actual network fetch (HTTP GET for an archive, `git clone` for a
//! repository) is an external collaborator — this crate owns the local side
//! of the contract: archive extraction and directory staging. Production
//! deployments plug in their own [`Downloader`] for the network leg and
//! reuse [`extract_tar_gz`] once bytes are local.

use async_trait::async_trait;
use scanopt_core::KnownProvenance;
use scanopt_error::{ErrorCode, ScanOptError};
use std::path::Path;

/// Materializes a provenance as a local directory.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `known` into `dir`, which is guaranteed to exist and be empty.
    async fn download(&self, known: &KnownProvenance, dir: &Path) -> Result<(), ScanOptError>;
}

/// Extracts a local `.tar.gz` archive into `dest`.
///
/// Runs on a blocking thread since the `tar`/`flate2` crates are synchronous.
pub async fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<(), ScanOptError> {
    let archive_path = archive_path.to_owned();
    let dest = dest.to_owned();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive_path).map_err(|err| {
            ScanOptError::new(ErrorCode::DownloadFailed, "failed to open archive")
                .with_context("path", archive_path.display().to_string())
                .with_source(err)
        })?;
        let decoder = flate2::read::GzDecoder::new(file);
        let mut archive = tar::Archive::new(decoder);
        archive.unpack(&dest).map_err(|err| {
            ScanOptError::new(ErrorCode::DownloadFailed, "failed to extract archive")
                .with_context("path", archive_path.display().to_string())
                .with_source(err)
        })
    })
    .await
    .map_err(|err| {
        ScanOptError::new(ErrorCode::DownloadFailed, "archive extraction task panicked")
            .with_source(std::io::Error::other(err))
    })?
}

/// A [`Downloader`] for sources that are already present on the local
/// filesystem: an extracted directory, a local `.tar.gz` archive path (for
/// [`KnownProvenance::Artifact`]), or an already-checked-out working copy at
/// the provenance's in-repo path (for [`KnownProvenance::Repository`]).
///
/// This is the reference implementation grounded purely in local-filesystem
/// operations; a production deployment wraps the network fetch around it
/// and hands this crate the resulting local path or archive.
pub struct LocalArchiveDownloader;

impl LocalArchiveDownloader {
    /// Construct the downloader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn source_path(known: &KnownProvenance) -> &str {
        match known {
            KnownProvenance::Artifact { url, .. } => url,
            KnownProvenance::Repository { url, .. } => url,
        }
    }
}

impl Default for LocalArchiveDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for LocalArchiveDownloader {
    async fn download(&self, known: &KnownProvenance, dir: &Path) -> Result<(), ScanOptError> {
        tokio::fs::create_dir_all(dir).await.map_err(|err| {
            ScanOptError::new(ErrorCode::DownloadFailed, "failed to create scratch directory")
                .with_context("path", dir.display().to_string())
                .with_source(err)
        })?;

        let source = Self::source_path(known);
        let source_path = Path::new(source);

        match known {
            KnownProvenance::Artifact { .. } => {
                if source_path.extension().and_then(|e| e.to_str()) == Some("gz")
                    || source.ends_with(".tar.gz")
                    || source.ends_with(".tgz")
                {
                    extract_tar_gz(source_path, dir).await
                } else {
                    copy_tree(source_path, dir).await
                }
            }
            KnownProvenance::Repository { path, .. } => {
                let checkout_root = if path.is_empty() {
                    source_path.to_path_buf()
                } else {
                    source_path.join(path)
                };
                copy_tree(&checkout_root, dir).await
            }
        }
    }
}

async fn copy_tree(source: &Path, dest: &Path) -> Result<(), ScanOptError> {
    let source = source.to_owned();
    let dest = dest.to_owned();
    tokio::task::spawn_blocking(move || {
        for entry in walkdir::WalkDir::new(&source).into_iter() {
            let entry = entry.map_err(|err| {
                ScanOptError::new(ErrorCode::DownloadFailed, "failed to walk source tree")
                    .with_context("path", source.display().to_string())
                    .with_source(std::io::Error::other(err))
            })?;
            let relative = entry.path().strip_prefix(&source).unwrap_or(entry.path());
            let target = dest.join(relative);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target).map_err(|err| {
                    ScanOptError::new(ErrorCode::DownloadFailed, "failed to create directory")
                        .with_context("path", target.display().to_string())
                        .with_source(err)
                })?;
            } else {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent).ok();
                }
                std::fs::copy(entry.path(), &target).map_err(|err| {
                    ScanOptError::new(ErrorCode::DownloadFailed, "failed to copy file")
                        .with_context("path", target.display().to_string())
                        .with_source(err)
                })?;
            }
        }
        Ok(())
    })
    .await
    .map_err(|err| {
        ScanOptError::new(ErrorCode::DownloadFailed, "copy task panicked")
            .with_source(std::io::Error::other(err))
    })?
}

/// A [`Downloader`] test double that always succeeds, writing a single
/// marker file into the target directory.
pub struct FakeDownloader {
    fail: bool,
}

impl FakeDownloader {
    /// A downloader that always succeeds.
    #[must_use]
    pub fn succeeding() -> Self {
        Self { fail: false }
    }

    /// A downloader that always fails with a [`ErrorCode::DownloadFailed`] error.
    #[must_use]
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, _known: &KnownProvenance, dir: &Path) -> Result<(), ScanOptError> {
        if self.fail {
            return Err(ScanOptError::new(
                ErrorCode::DownloadFailed,
                "simulated download failure",
            ));
        }
        tokio::fs::create_dir_all(dir).await.ok();
        tokio::fs::write(dir.join(".fake-downloaded"), b"ok")
            .await
            .map_err(|err| {
                ScanOptError::new(ErrorCode::DownloadFailed, "failed to write marker file")
                    .with_source(err)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn fake_downloader_succeeding_creates_marker() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out");
        let downloader = FakeDownloader::succeeding();
        let known = KnownProvenance::Artifact {
            url: "https://example.com/a.tar.gz".into(),
            hash: None,
        };
        downloader.download(&known, &dest).await.unwrap();
        assert!(dest.join(".fake-downloaded").exists());
    }

    #[tokio::test]
    async fn fake_downloader_failing_returns_error() {
        let dir = tempdir().unwrap();
        let downloader = FakeDownloader::failing();
        let known = KnownProvenance::Artifact {
            url: "https://example.com/a.tar.gz".into(),
            hash: None,
        };
        let err = downloader
            .download(&known, &dir.path().join("out"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DownloadFailed);
    }

    #[tokio::test]
    async fn local_archive_downloader_extracts_tar_gz() {
        let src_dir = tempdir().unwrap();
        std::fs::write(src_dir.path().join("NOTICE"), b"hello").unwrap();

        let archive_dir = tempdir().unwrap();
        let archive_path = archive_dir.path().join("out.tar.gz");
        {
            let file = std::fs::File::create(&archive_path).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            builder.append_dir_all(".", src_dir.path()).unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = tempdir().unwrap();
        let downloader = LocalArchiveDownloader::new();
        let known = KnownProvenance::Artifact {
            url: archive_path.display().to_string(),
            hash: None,
        };
        downloader.download(&known, dest.path()).await.unwrap();
        assert!(dest.path().join("NOTICE").exists());
    }

    #[tokio::test]
    async fn local_archive_downloader_copies_plain_directory() {
        let src_dir = tempdir().unwrap();
        std::fs::write(src_dir.path().join("README"), b"hi").unwrap();

        let dest = tempdir().unwrap();
        let downloader = LocalArchiveDownloader::new();
        let known = KnownProvenance::Artifact {
            url: src_dir.path().display().to_string(),
            hash: None,
        };
        downloader.download(&known, dest.path()).await.unwrap();
        assert!(dest.path().join("README").exists());
    }
}
