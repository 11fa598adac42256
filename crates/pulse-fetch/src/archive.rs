//! Immutable archive of raw fetched payloads.
//!
//! Bodies are stored hash-addressed under `<source>/<stamp>/<hash>.<ext>`
//! via a temp-file write and atomic rename, so a re-fetch of identical
//! bytes deduplicates instead of rewriting.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredPayload {
    pub content_hash: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub byte_size: usize,
    pub deduplicated: bool,
}

#[derive(Debug, Clone)]
pub struct RawArchive {
    root: PathBuf,
}

impl RawArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    pub fn payload_relative_path(
        &self,
        source_id: &str,
        fetched_at: DateTime<Utc>,
        content_hash: &str,
        extension: &str,
    ) -> PathBuf {
        let stamp = fetched_at.format("%Y%m%d_%H%M%S").to_string();
        let ext = extension.trim_start_matches('.').trim();
        let ext = if ext.is_empty() { "bin" } else { ext };
        PathBuf::from(source_id)
            .join(stamp)
            .join(format!("{content_hash}.{ext}"))
    }

    /// Store one payload immutably. Identical bytes at the same path are a
    /// no-op reported as deduplicated.
    pub async fn store_bytes(
        &self,
        fetched_at: DateTime<Utc>,
        source_id: &str,
        extension: &str,
        bytes: &[u8],
    ) -> anyhow::Result<StoredPayload> {
        let content_hash = Self::sha256_hex(bytes);
        let relative_path =
            self.payload_relative_path(source_id, fetched_at, &content_hash, extension);
        let absolute_path = self.root.join(&relative_path);

        let parent = absolute_path
            .parent()
            .context("payload path always has a parent")?;
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating archive directory {}", parent.display()))?;

        if fs::try_exists(&absolute_path)
            .await
            .with_context(|| format!("checking archive path {}", absolute_path.display()))?
        {
            return Ok(StoredPayload {
                content_hash,
                relative_path,
                absolute_path,
                byte_size: bytes.len(),
                deduplicated: true,
            });
        }

        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        let write_result = async {
            let mut file = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&temp_path)
                .await
                .with_context(|| format!("opening temp file {}", temp_path.display()))?;
            file.write_all(bytes)
                .await
                .with_context(|| format!("writing temp file {}", temp_path.display()))?;
            file.flush()
                .await
                .with_context(|| format!("flushing temp file {}", temp_path.display()))?;
            drop(file);
            fs::rename(&temp_path, &absolute_path).await.map_err(|err| {
                anyhow::Error::from(err).context(format!(
                    "renaming {} -> {}",
                    temp_path.display(),
                    absolute_path.display()
                ))
            })
        }
        .await;

        match write_result {
            Ok(()) => Ok(StoredPayload {
                content_hash,
                relative_path,
                absolute_path,
                byte_size: bytes.len(),
                deduplicated: false,
            }),
            Err(err) => {
                let _ = fs::remove_file(&temp_path).await;
                // A concurrent writer landing the same hash first is fine.
                if fs::try_exists(&absolute_path).await.unwrap_or(false) {
                    return Ok(StoredPayload {
                        content_hash,
                        relative_path,
                        absolute_path,
                        byte_size: bytes.len(),
                        deduplicated: true,
                    });
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn payload_hashing_is_stable() {
        let hash = RawArchive::sha256_hex(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn identical_payloads_deduplicate_by_hash_path() {
        let dir = tempdir().expect("tempdir");
        let archive = RawArchive::new(dir.path());
        let fetched_at = DateTime::parse_from_rfc3339("2026-08-01T06:00:00Z")
            .expect("ts")
            .with_timezone(&Utc);

        let body = br#"{"values": [["Client"], ["Acme"]]}"#;
        let first = archive
            .store_bytes(fetched_at, "directory", "json", body)
            .await
            .expect("first store");
        let second = archive
            .store_bytes(fetched_at, "directory", "json", body)
            .await
            .expect("second store");

        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(first.relative_path, second.relative_path);
        assert!(first.absolute_path.exists());
    }

    #[tokio::test]
    async fn different_sources_archive_under_their_own_roots() {
        let dir = tempdir().expect("tempdir");
        let archive = RawArchive::new(dir.path());
        let fetched_at = Utc::now();

        let stored = archive
            .store_bytes(fetched_at, "budget-status", "json", b"{}")
            .await
            .expect("store");
        assert!(stored
            .relative_path
            .starts_with(Path::new("budget-status")));
    }
}
