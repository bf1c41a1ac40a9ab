//! SHA-256 digests and on-demand integrity validation
//!
//! The digest recorded at ingest is the only baseline. Validation never
//! replaces it, even when the bytes have visibly changed.

use crate::error::{Result, VaultError};
use crate::models::{CatalogEntry, RecoveryEvent, RecoveryEventType};
use crate::storage::audit_log::AuditLog;
use crate::storage::catalog::CatalogStore;
use crate::storage::tier::{SharedTier, TierKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{debug, warn};

/// Lowercase hex SHA-256 of `content`.
pub fn compute_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Stream a file through SHA-256 with an 8KB buffer.
pub async fn compute_digest_file(file_path: &Path) -> Result<String> {
    const BUFFER_SIZE: usize = 8 * 1024;

    let file = fs::File::open(file_path).await.map_err(|e| {
        VaultError::io_error(
            format!("Failed to open file for hashing: {}", e),
            Some(file_path.to_path_buf()),
        )
    })?;

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer).await.map_err(|e| {
            VaultError::io_error(
                format!("Failed to read file for hashing: {}", e),
                Some(file_path.to_path_buf()),
            )
        })?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Hex digests compare case-insensitively.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// Entry has no recorded digest
    NoBaseline,
    /// Neither tier returned bytes
    Unreachable,
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub document_id: String,
    pub valid: bool,
    pub stored_digest: Option<String>,
    pub computed_digest: Option<String>,
    /// Tier that supplied the bytes
    pub source: Option<TierKind>,
    pub reason: Option<InvalidReason>,
}

impl ValidationResult {
    fn invalid(entry: &CatalogEntry, reason: InvalidReason) -> Self {
        Self {
            document_id: entry.id.clone(),
            valid: false,
            stored_digest: entry.digest.clone(),
            computed_digest: None,
            source: None,
            reason: Some(reason),
        }
    }
}

#[derive(Clone)]
pub struct ChecksumValidator {
    catalog: Arc<CatalogStore>,
    local: SharedTier,
    remote: SharedTier,
    audit: Arc<AuditLog>,
}

impl ChecksumValidator {
    pub fn new(
        catalog: Arc<CatalogStore>,
        local: SharedTier,
        remote: SharedTier,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            catalog,
            local,
            remote,
            audit,
        }
    }

    /// Re-hash a document's bytes and compare against its baseline.
    ///
    /// A mismatch appends a `corruption_detected` event. Failing to find the
    /// document in the catalog is an error; every other outcome is a result.
    pub async fn validate(&self, document_id: &str) -> Result<ValidationResult> {
        let entry = self
            .catalog
            .get(document_id)
            .await?
            .ok_or_else(|| VaultError::not_found(format!("Document {}", document_id)))?;

        let result = self.check_entry(&entry).await;

        if result.reason == Some(InvalidReason::Mismatch) {
            warn!(
                document_id = %entry.id,
                expected = ?result.stored_digest,
                actual = ?result.computed_digest,
                source = ?result.source,
                "Checksum mismatch"
            );
            let location = match result.source {
                Some(TierKind::Remote) => entry.remote_key.clone(),
                _ => entry.local_path.clone(),
            };
            self.audit
                .append_recovery_event(
                    &RecoveryEvent::system(&entry.id, RecoveryEventType::CorruptionDetected)
                        .with_strategy("checksum_validation")
                        .with_paths(location, None)
                        .with_detail("checksum_mismatch"),
                )
                .await;
        }

        Ok(result)
    }

    /// Side-effect-free check used by validation and health scans.
    pub async fn check_entry(&self, entry: &CatalogEntry) -> ValidationResult {
        let Some(stored) = entry.digest.as_deref() else {
            return ValidationResult::invalid(entry, InvalidReason::NoBaseline);
        };

        let Some((bytes, source)) = self.read_any(entry).await else {
            return ValidationResult::invalid(entry, InvalidReason::Unreachable);
        };

        let computed = compute_digest(&bytes);
        let valid = digests_match(stored, &computed);
        debug!(
            document_id = %entry.id,
            source = %source,
            valid = valid,
            "Checksum computed"
        );

        ValidationResult {
            document_id: entry.id.clone(),
            valid,
            stored_digest: Some(stored.to_string()),
            computed_digest: Some(computed),
            source: Some(source),
            reason: if valid {
                None
            } else {
                Some(InvalidReason::Mismatch)
            },
        }
    }

    async fn read_any(&self, entry: &CatalogEntry) -> Option<(bytes::Bytes, TierKind)> {
        let tiers = [
            (&self.local, entry.local_path.as_deref()),
            (&self.remote, entry.remote_key.as_deref()),
        ];
        for (tier, location) in tiers {
            let Some(location) = location else { continue };
            match tier.get(location).await {
                Ok(Some(bytes)) => return Some((bytes, tier.kind())),
                Ok(None) => {}
                Err(e) => {
                    debug!(
                        document_id = %entry.id,
                        tier = %tier.kind(),
                        error = %e,
                        "Tier read failed during validation"
                    );
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_compute_digest_known_value() {
        assert_eq!(
            compute_digest(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(compute_digest(b"").len(), 64);
    }

    #[test]
    fn test_digests_match_ignores_case() {
        let digest = compute_digest(b"abc");
        assert!(digests_match(&digest, &digest.to_uppercase()));
        assert!(!digests_match(&digest, &compute_digest(b"abd")));
    }

    #[tokio::test]
    async fn test_file_digest_matches_in_memory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        let content: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        assert_eq!(
            compute_digest_file(&path).await.unwrap(),
            compute_digest(&content)
        );
    }

    mod validator_tests {
        use super::*;
        use crate::infrastructure::config::AuditConfig;
        use crate::models::{AuditRecord, DocumentStatus};
        use crate::storage::local_tier::LocalTier;
        use crate::storage::object_store::MemoryObjectStore;
        use crate::storage::remote_tier::RemoteTier;
        use crate::utils::retry::RetryPolicy;
        use chrono::Utc;
        use std::time::Duration;

        struct Fixture {
            validator: ChecksumValidator,
            catalog: Arc<CatalogStore>,
            audit: Arc<AuditLog>,
            local: SharedTier,
            store: Arc<MemoryObjectStore>,
            _dir: TempDir,
        }

        async fn fixture() -> Fixture {
            let dir = TempDir::new().unwrap();
            let catalog = Arc::new(CatalogStore::open(dir.path()).await.unwrap());
            let audit = Arc::new(
                AuditLog::open(dir.path(), AuditConfig::default())
                    .await
                    .unwrap(),
            );
            let local: SharedTier = Arc::new(LocalTier::new(
                dir.path().join("objects"),
                Duration::from_secs(5),
            ));
            let store = Arc::new(MemoryObjectStore::new());
            let policy = RetryPolicy {
                max_retries: 0,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                attempt_timeout: Duration::from_secs(1),
            };
            let remote: SharedTier =
                Arc::new(RemoteTier::new(store.clone(), "documents", policy, 100));
            Fixture {
                validator: ChecksumValidator::new(
                    catalog.clone(),
                    local.clone(),
                    remote,
                    audit.clone(),
                ),
                catalog,
                audit,
                local,
                store,
                _dir: dir,
            }
        }

        fn entry(id: &str, digest: Option<String>, local_path: String) -> CatalogEntry {
            CatalogEntry {
                id: id.to_string(),
                owner_id: "owner-1".to_string(),
                file_name: "deed.pdf".to_string(),
                size_bytes: 7,
                type_tag: "property".to_string(),
                digest,
                local_path: Some(local_path),
                remote_key: Some(format!("documents/owner-1/{}", id)),
                created_at: Utc::now(),
                last_verified_at: None,
                status: DocumentStatus::Stored,
            }
        }

        async fn corruption_events(audit: &AuditLog) -> usize {
            audit
                .get_recent(50)
                .await
                .unwrap()
                .iter()
                .filter(|r| {
                    matches!(r, AuditRecord::RecoveryEvent(e)
                        if e.event_type == RecoveryEventType::CorruptionDetected)
                })
                .count()
        }

        #[tokio::test]
        async fn test_both_tiers_down_is_unreachable_not_mismatch() {
            let f = fixture().await;
            let path = f.local.locate("owner-1", "doc-1");
            f.catalog
                .insert(&entry("doc-1", Some(compute_digest(b"payload")), path))
                .await
                .unwrap();
            f.store.set_available(false);

            let result = f.validator.validate("doc-1").await.unwrap();
            assert!(!result.valid);
            assert_eq!(result.reason, Some(InvalidReason::Unreachable));
            assert!(result.computed_digest.is_none());
            assert!(result.source.is_none());
            assert_eq!(corruption_events(&f.audit).await, 0);
        }

        #[tokio::test]
        async fn test_missing_digest_is_no_baseline() {
            let f = fixture().await;
            let path = f.local.locate("owner-1", "doc-2");
            f.local
                .put(&path, bytes::Bytes::from_static(b"payload"))
                .await
                .unwrap();
            f.catalog.insert(&entry("doc-2", None, path)).await.unwrap();

            let result = f.validator.validate("doc-2").await.unwrap();
            assert!(!result.valid);
            assert_eq!(result.reason, Some(InvalidReason::NoBaseline));
            assert!(result.stored_digest.is_none());
            assert_eq!(corruption_events(&f.audit).await, 0);
        }

        #[tokio::test]
        async fn test_unknown_id_is_an_error() {
            let f = fixture().await;
            assert!(matches!(
                f.validator.validate("ghost").await,
                Err(VaultError::NotFound(_))
            ));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_digest_is_stable_hex(content in prop::collection::vec(any::<u8>(), 0..2048)) {
                let digest = compute_digest(&content);
                prop_assert_eq!(digest.len(), 64);
                prop_assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
                prop_assert_eq!(digest, compute_digest(&content));
            }

            #[test]
            fn prop_single_bit_flip_changes_digest(
                content in prop::collection::vec(any::<u8>(), 1..1024),
                index in any::<prop::sample::Index>(),
                bit in 0u8..8,
            ) {
                let mut flipped = content.clone();
                let i = index.index(flipped.len());
                flipped[i] ^= 1 << bit;
                prop_assert!(!digests_match(&compute_digest(&content), &compute_digest(&flipped)));
            }
        }
    }
}
