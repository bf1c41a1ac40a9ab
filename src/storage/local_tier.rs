//! Local filesystem tier
//!
//! ## Layout
//!
//! ```text
//! <root>/objects/
//!   3f/
//!     3f2a9c1e-....   (document id as file name)
//!   b7/
//!     b71d0e44-....
//! ```
//!
//! The first two characters of the document id pick the fan-out directory so
//! no single directory grows unbounded. Owner ids never appear in local paths.
//!
//! Writes go to a `.partial` sibling first and are renamed into place only
//! after flush + fsync, so the canonical path never holds a torn file.

use crate::error::{Result, VaultError};
use crate::storage::tier::{StorageTier, TierKind};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Clone)]
pub struct LocalTier {
    objects_dir: PathBuf,
    write_timeout: Duration,
}

impl LocalTier {
    pub fn new(objects_dir: PathBuf, write_timeout: Duration) -> Self {
        Self {
            objects_dir,
            write_timeout,
        }
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    pub fn object_path(&self, document_id: &str) -> PathBuf {
        let fan_out: String = document_id.chars().take(2).collect();
        let fan_out = if fan_out.is_empty() {
            "__".to_string()
        } else {
            fan_out
        };
        self.objects_dir.join(fan_out).join(document_id)
    }

    fn partial_path(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(PARTIAL_SUFFIX);
        target.with_file_name(name)
    }

    async fn write_durably(partial: &Path, target: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = fs::File::create(partial).await.map_err(|e| {
            VaultError::write_failed(
                format!("Failed to create file: {}", e),
                Some(partial.to_path_buf()),
            )
        })?;

        file.write_all(bytes).await.map_err(|e| {
            VaultError::write_failed(format!("Failed to write file: {}", e), Some(partial.to_path_buf()))
        })?;

        file.flush().await.map_err(|e| {
            VaultError::write_failed(format!("Failed to flush file: {}", e), Some(partial.to_path_buf()))
        })?;

        // Durable before it becomes visible under the canonical name
        file.sync_all().await.map_err(|e| {
            VaultError::write_failed(format!("Failed to sync file: {}", e), Some(partial.to_path_buf()))
        })?;
        drop(file);

        fs::rename(partial, target).await.map_err(|e| {
            VaultError::write_failed(
                format!("Failed to move file into place: {}", e),
                Some(target.to_path_buf()),
            )
        })
    }

    async fn cleanup_partial(partial: &Path) {
        match fs::remove_file(partial).await {
            Ok(()) => debug!(path = %partial.display(), "Removed partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!(
                path = %partial.display(),
                error = %e,
                "Failed to clean up partial file"
            ),
        }
    }
}

#[async_trait]
impl StorageTier for LocalTier {
    fn kind(&self) -> TierKind {
        TierKind::Local
    }

    fn locate(&self, _owner_id: &str, document_id: &str) -> String {
        self.object_path(document_id).to_string_lossy().into_owned()
    }

    async fn put(&self, location: &str, bytes: Bytes) -> Result<()> {
        let target = PathBuf::from(location);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                VaultError::write_failed(
                    format!("Failed to create object directory: {}", e),
                    Some(parent.to_path_buf()),
                )
            })?;
        }

        let partial = Self::partial_path(&target);
        match timeout(
            self.write_timeout,
            Self::write_durably(&partial, &target, &bytes),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!(path = %target.display(), bytes = bytes.len(), "Local write complete");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(path = %target.display(), error = %e, "Local write failed");
                Self::cleanup_partial(&partial).await;
                Err(e)
            }
            Err(_) => {
                error!(
                    path = %target.display(),
                    timeout_secs = self.write_timeout.as_secs(),
                    "Local write timed out"
                );
                Self::cleanup_partial(&partial).await;
                Err(VaultError::write_failed(
                    format!("Write timed out after {:?}", self.write_timeout),
                    Some(target),
                ))
            }
        }
    }

    async fn get(&self, location: &str) -> Result<Option<Bytes>> {
        match fs::read(location).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VaultError::io_error(
                format!("Failed to read file: {}", e),
                Some(PathBuf::from(location)),
            )),
        }
    }

    async fn exists(&self, location: &str) -> Result<bool> {
        fs::try_exists(location).await.map_err(|e| {
            VaultError::io_error(
                format!("Failed to probe file: {}", e),
                Some(PathBuf::from(location)),
            )
        })
    }

    async fn remove(&self, location: &str) -> Result<()> {
        match fs::remove_file(location).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::io_error(
                format!("Failed to remove file: {}", e),
                Some(PathBuf::from(location)),
            )),
        }
    }

    async fn list_locations(&self) -> Result<Vec<String>> {
        let objects_dir = self.objects_dir.clone();
        tokio::task::spawn_blocking(move || {
            if !objects_dir.exists() {
                return Vec::new();
            }
            WalkDir::new(&objects_dir)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable entry while listing objects");
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| {
                    !entry
                        .file_name()
                        .to_string_lossy()
                        .ends_with(PARTIAL_SUFFIX)
                })
                .map(|entry| entry.path().to_string_lossy().into_owned())
                .collect()
        })
        .await
        .map_err(|e| VaultError::Internal(format!("Object listing task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tier(dir: &TempDir) -> LocalTier {
        LocalTier::new(dir.path().join("objects"), Duration::from_secs(5))
    }

    #[test]
    fn test_locate_fans_out_by_id_prefix() {
        let dir = TempDir::new().unwrap();
        let tier = tier(&dir);
        let location = tier.locate("owner-1", "ab12cd");
        assert!(location.ends_with(&format!("ab{}ab12cd", std::path::MAIN_SEPARATOR)));
        assert!(!location.contains("owner-1"));
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let dir = TempDir::new().unwrap();
        let tier = tier(&dir);
        let location = tier.locate("o", "doc-1");

        tier.put(&location, Bytes::from_static(b"payload")).await.unwrap();
        assert!(tier.exists(&location).await.unwrap());
        assert_eq!(
            tier.get(&location).await.unwrap().unwrap(),
            Bytes::from_static(b"payload")
        );

        tier.remove(&location).await.unwrap();
        assert!(!tier.exists(&location).await.unwrap());
        assert!(tier.get(&location).await.unwrap().is_none());
        // Second remove is a no-op
        tier.remove(&location).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_replaces_existing_bytes() {
        let dir = TempDir::new().unwrap();
        let tier = tier(&dir);
        let location = tier.locate("o", "doc-2");

        tier.put(&location, Bytes::from_static(b"corrupt")).await.unwrap();
        tier.put(&location, Bytes::from_static(b"good")).await.unwrap();
        assert_eq!(
            tier.get(&location).await.unwrap().unwrap(),
            Bytes::from_static(b"good")
        );
    }

    #[tokio::test]
    async fn test_list_locations_skips_partials() {
        let dir = TempDir::new().unwrap();
        let tier = tier(&dir);
        let a = tier.locate("o", "aa-1");
        let b = tier.locate("o", "bb-2");
        tier.put(&a, Bytes::from_static(b"a")).await.unwrap();
        tier.put(&b, Bytes::from_static(b"b")).await.unwrap();
        std::fs::write(format!("{}{}", a, PARTIAL_SUFFIX), b"torn").unwrap();

        let mut listed = tier.list_locations().await.unwrap();
        listed.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn test_list_locations_on_fresh_root() {
        let dir = TempDir::new().unwrap();
        assert!(tier(&dir).list_locations().await.unwrap().is_empty());
    }
}
