//! Shared harness for vault integration tests
//!
//! Each test gets its own temp storage root and an in-memory bucket whose
//! availability can be toggled to simulate a remote outage.

#![allow(dead_code)]

use doc_vault::models::{AuditRecord, RecoveryEventType};
use doc_vault::storage::MemoryObjectStore;
use doc_vault::{DocumentVault, VaultConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestVault {
    pub vault: DocumentVault,
    pub remote: Arc<MemoryObjectStore>,
    pub temp_dir: TempDir,
}

impl TestVault {
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn orphan_dir(&self) -> PathBuf {
        self.vault.config().storage.orphan_dir()
    }

    /// Recovery events of one type recorded for `document_id`.
    pub async fn count_events(&self, document_id: &str, event_type: RecoveryEventType) -> usize {
        self.vault
            .get_audit_events_for(document_id)
            .await
            .unwrap()
            .iter()
            .filter(|record| {
                matches!(record, AuditRecord::RecoveryEvent(e) if e.event_type == event_type)
            })
            .count()
    }
}

/// Defaults tuned so failing remote calls give up within milliseconds.
pub fn fast_config(root: &Path) -> VaultConfig {
    let mut config = VaultConfig::with_root(root);
    config.remote.max_retries = 1;
    config.remote.retry_base_delay_ms = 1;
    config.remote.retry_max_delay_ms = 5;
    config.remote.timeout_seconds = 2;
    config.recovery.batch_delay_ms = 0;
    config
}

pub async fn open_with(config: VaultConfig, temp_dir: TempDir) -> TestVault {
    let remote = Arc::new(MemoryObjectStore::new());
    let vault = DocumentVault::open_with_object_store(config, remote.clone())
        .await
        .expect("vault should open");
    TestVault {
        vault,
        remote,
        temp_dir,
    }
}

pub async fn open_vault() -> TestVault {
    let temp_dir = TempDir::new().unwrap();
    let config = fast_config(temp_dir.path());
    open_with(config, temp_dir).await
}

/// Deterministic, non-repeating payload of `len` bytes.
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}
