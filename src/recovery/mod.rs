//! Recovery engine
//!
//! Reattaches lost bytes to a catalog entry by walking an ordered chain of
//! disk-side strategies, then falling back to the remote object. A candidate
//! is only accepted when its SHA-256 equals the entry's baseline digest, and
//! only after it has been copied to the canonical local path and verified
//! again there. Anything short of that leaves the catalog untouched.
//!
//! When the local copy is intact but the remote object is gone (or was never
//! written), the verified local bytes are uploaded again.
//!
//! Every call appends `recovery_initiated` and ends in exactly one of:
//! - no further event (both copies already intact),
//! - one `recovered` event,
//! - one `recovery_failed` event plus a `recovery_needed` alert when no
//!   verified copy exists anywhere,
//! - one `recovery_failed` event alone when only the re-upload failed.

pub mod fuzzy;
pub mod strategies;

use crate::error::{Result, VaultError};
use crate::infrastructure::config::{RecoveryConfig, StorageConfig};
use crate::models::{
    AlertSeverity, AlertType, CatalogEntry, DocumentStatus, RecoveryEvent, RecoveryEventType,
};
use crate::monitoring::alerting::AlertManager;
use crate::storage::audit_log::AuditLog;
use crate::storage::catalog::CatalogStore;
use crate::storage::checksum::{compute_digest, digests_match};
use crate::storage::tier::SharedTier;
use crate::utils::locks::DocumentLocks;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use strategies::{
    AlternateLocationScan, BackupLocationScan, OrphanScan, RecoveryStrategy, StrategyKind,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryOutcome {
    pub document_id: String,
    pub success: bool,
    pub strategy: Option<StrategyKind>,
    /// Canonical local path holding verified bytes
    pub new_path: Option<String>,
    pub error: Option<String>,
}

impl RecoveryOutcome {
    fn recovered(document_id: &str, strategy: StrategyKind, new_path: String) -> Self {
        Self {
            document_id: document_id.to_string(),
            success: true,
            strategy: Some(strategy),
            new_path: Some(new_path),
            error: None,
        }
    }

    fn failed(document_id: &str, error: impl Into<String>) -> Self {
        Self {
            document_id: document_id.to_string(),
            success: false,
            strategy: None,
            new_path: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecoveryReport {
    pub outcomes: Vec<RecoveryOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct RecoveryEngine {
    catalog: Arc<CatalogStore>,
    local: SharedTier,
    remote: SharedTier,
    audit: Arc<AuditLog>,
    alerts: Arc<AlertManager>,
    locks: DocumentLocks,
    strategies: Vec<Box<dyn RecoveryStrategy>>,
    batch_delay: Duration,
}

impl RecoveryEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<CatalogStore>,
        local: SharedTier,
        remote: SharedTier,
        audit: Arc<AuditLog>,
        alerts: Arc<AlertManager>,
        locks: DocumentLocks,
        strategies: Vec<Box<dyn RecoveryStrategy>>,
        batch_delay: Duration,
    ) -> Self {
        Self {
            catalog,
            local,
            remote,
            audit,
            alerts,
            locks,
            strategies,
            batch_delay,
        }
    }

    /// Default chain: orphan holding area, alternate layouts, backup roots.
    pub fn default_strategies(
        storage: &StorageConfig,
        recovery: &RecoveryConfig,
    ) -> Vec<Box<dyn RecoveryStrategy>> {
        vec![
            Box::new(OrphanScan::new(
                storage.orphan_dir(),
                recovery.fuzzy_match_threshold,
            )),
            Box::new(AlternateLocationScan::new(storage.alternate_roots())),
            Box::new(BackupLocationScan::new(
                storage.backup_roots.clone(),
                storage.backup_scan_max_depth,
            )),
        ]
    }

    /// Attempt recovery of one document. Never returns an error; failures
    /// are reported in the outcome.
    pub async fn recover(&self, document_id: &str) -> RecoveryOutcome {
        let guard = self.locks.lock(document_id).await;
        let outcome = self.recover_locked(document_id).await;
        drop(guard);
        self.locks.prune_idle();
        outcome
    }

    /// Sequential, with a pause between documents so a large batch does not
    /// saturate disk I/O.
    pub async fn recover_many(&self, document_ids: &[String]) -> BatchRecoveryReport {
        let mut outcomes = Vec::with_capacity(document_ids.len());
        for (index, id) in document_ids.iter().enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            outcomes.push(self.recover(id).await);
        }

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let failed = outcomes.len() - succeeded;
        info!(
            total = outcomes.len(),
            succeeded = succeeded,
            failed = failed,
            "Batch recovery finished"
        );
        BatchRecoveryReport {
            outcomes,
            succeeded,
            failed,
        }
    }

    async fn recover_locked(&self, document_id: &str) -> RecoveryOutcome {
        let entry = match self.catalog.get(document_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                return RecoveryOutcome::failed(
                    document_id,
                    VaultError::not_found(format!("Document {}", document_id)).to_string(),
                )
            }
            Err(e) => return RecoveryOutcome::failed(document_id, e.to_string()),
        };

        let canonical = entry
            .local_path
            .clone()
            .unwrap_or_else(|| self.local.locate(&entry.owner_id, &entry.id));

        info!(document_id = %entry.id, status = %entry.status, "Recovery initiated");
        self.audit
            .append_recovery_event(
                &RecoveryEvent::system(&entry.id, RecoveryEventType::RecoveryInitiated)
                    .with_paths(entry.local_path.clone(), None),
            )
            .await;

        let Some(digest) = entry.digest.clone() else {
            return self
                .give_up(&entry, "no baseline digest; candidates cannot be verified")
                .await;
        };

        if let Some(bytes) = self.intact_canonical(&canonical, &digest).await {
            debug!(document_id = %entry.id, "Canonical copy already intact");
            if matches!(
                entry.status,
                DocumentStatus::Missing | DocumentStatus::Unrecoverable
            ) {
                if let Err(e) = self
                    .catalog
                    .record_recovery(&entry.id, &canonical, Utc::now())
                    .await
                {
                    warn!(document_id = %entry.id, error = %e, "Failed to update catalog");
                }
            }
            if self.remote_copy_missing(&entry).await {
                return self.reupload(&entry, bytes, canonical).await;
            }
            return RecoveryOutcome::recovered(&entry.id, StrategyKind::AlreadyIntact, canonical);
        }

        for strategy in &self.strategies {
            let kind = strategy.kind();
            let candidates = strategy.candidates(&entry).await;
            debug!(
                document_id = %entry.id,
                strategy = %kind,
                candidates = candidates.len(),
                "Strategy produced candidates"
            );

            for candidate in candidates {
                match self.try_candidate(&entry, &digest, &canonical, &candidate).await {
                    Ok(true) => {
                        let source = candidate.to_string_lossy();
                        return self.finish(&entry, kind, &canonical, &source).await;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        // A failed copy is treated like a rejected candidate
                        warn!(
                            document_id = %entry.id,
                            candidate = %candidate.display(),
                            error = %e,
                            "Candidate could not be restored"
                        );
                    }
                }
            }
        }

        if let Some(remote_key) = entry.remote_key.as_deref() {
            match self.try_remote(&entry, &digest, &canonical, remote_key).await {
                Ok(true) => {
                    return self
                        .finish(&entry, StrategyKind::RemoteTier, &canonical, remote_key)
                        .await;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        document_id = %entry.id,
                        key = %remote_key,
                        error = %e,
                        "Remote copy could not be restored"
                    );
                }
            }
        }

        self.give_up(&entry, "all recovery strategies exhausted").await
    }

    /// Verified bytes at the canonical path, if any.
    async fn intact_canonical(&self, canonical: &str, digest: &str) -> Option<Bytes> {
        match self.local.get(canonical).await {
            Ok(Some(bytes)) if digests_match(digest, &compute_digest(&bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// An unreachable remote is not treated as missing; the next call retries.
    async fn remote_copy_missing(&self, entry: &CatalogEntry) -> bool {
        let Some(key) = entry.remote_key.as_deref() else {
            return true;
        };
        match self.remote.exists(key).await {
            Ok(present) => !present,
            Err(e) => {
                debug!(document_id = %entry.id, key = %key, error = %e, "Remote probe failed");
                false
            }
        }
    }

    async fn reupload(
        &self,
        entry: &CatalogEntry,
        bytes: Bytes,
        canonical: String,
    ) -> RecoveryOutcome {
        let key = self.remote.locate(&entry.owner_id, &entry.id);
        if let Err(e) = self.remote.put(&key, bytes).await {
            warn!(document_id = %entry.id, key = %key, error = %e, "Remote re-upload failed");
            self.audit
                .append_recovery_event(
                    &RecoveryEvent::system(&entry.id, RecoveryEventType::RecoveryFailed)
                        .with_strategy(StrategyKind::RemoteReupload.as_str())
                        .with_paths(entry.remote_key.clone(), Some(canonical))
                        .with_detail(format!("remote re-upload failed: {}", e)),
                )
                .await;
            return RecoveryOutcome::failed(&entry.id, e.to_string());
        }

        if let Err(e) = self.catalog.record_remote_copy(&entry.id, &key).await {
            warn!(document_id = %entry.id, error = %e, "Remote copy written but catalog update failed");
            return RecoveryOutcome::failed(&entry.id, e.to_string());
        }

        self.audit
            .append_recovery_event(
                &RecoveryEvent::system(&entry.id, RecoveryEventType::Recovered)
                    .with_strategy(StrategyKind::RemoteReupload.as_str())
                    .with_paths(entry.remote_key.clone(), Some(canonical.clone()))
                    .with_detail(format!("re-uploaded to {}", key)),
            )
            .await;

        info!(document_id = %entry.id, key = %key, "Remote copy restored from local tier");
        RecoveryOutcome::recovered(&entry.id, StrategyKind::RemoteReupload, canonical)
    }

    async fn try_remote(
        &self,
        entry: &CatalogEntry,
        digest: &str,
        canonical: &str,
        remote_key: &str,
    ) -> Result<bool> {
        let Some(bytes) = self.remote.get(remote_key).await? else {
            debug!(document_id = %entry.id, key = %remote_key, "Remote object absent");
            return Ok(false);
        };
        if !digests_match(digest, &compute_digest(&bytes)) {
            debug!(
                document_id = %entry.id,
                key = %remote_key,
                "Remote digest differs, rejected"
            );
            return Ok(false);
        }
        self.restore(entry, digest, canonical, bytes).await
    }

    /// Verify, copy into place, and verify again. Ok(false) means rejected.
    async fn try_candidate(
        &self,
        entry: &CatalogEntry,
        digest: &str,
        canonical: &str,
        candidate: &Path,
    ) -> Result<bool> {
        let bytes = match tokio::fs::read(candidate).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                debug!(candidate = %candidate.display(), error = %e, "Candidate unreadable");
                return Ok(false);
            }
        };

        if !digests_match(digest, &compute_digest(&bytes)) {
            debug!(
                document_id = %entry.id,
                candidate = %candidate.display(),
                "Candidate digest differs, rejected"
            );
            return Ok(false);
        }

        self.restore(entry, digest, canonical, bytes).await
    }

    /// Copy verified bytes to the canonical path and verify them there.
    async fn restore(
        &self,
        entry: &CatalogEntry,
        digest: &str,
        canonical: &str,
        bytes: Bytes,
    ) -> Result<bool> {
        self.local.put(canonical, bytes).await?;

        let verified = match self.local.get(canonical).await? {
            Some(written) => digests_match(digest, &compute_digest(&written)),
            None => false,
        };
        if !verified {
            warn!(
                document_id = %entry.id,
                path = %canonical,
                "Restored copy failed verification, removing"
            );
            self.local.remove(canonical).await?;
        }
        Ok(verified)
    }

    async fn finish(
        &self,
        entry: &CatalogEntry,
        kind: StrategyKind,
        canonical: &str,
        source: &str,
    ) -> RecoveryOutcome {
        if let Err(e) = self
            .catalog
            .record_recovery(&entry.id, canonical, Utc::now())
            .await
        {
            warn!(document_id = %entry.id, error = %e, "Bytes restored but catalog update failed");
            return RecoveryOutcome::failed(&entry.id, e.to_string());
        }

        self.audit
            .append_recovery_event(
                &RecoveryEvent::system(&entry.id, RecoveryEventType::Recovered)
                    .with_strategy(kind.as_str())
                    .with_paths(entry.local_path.clone(), Some(source.to_string()))
                    .with_detail(format!("restored to {}", canonical)),
            )
            .await;

        info!(
            document_id = %entry.id,
            strategy = %kind,
            source = %source,
            path = %canonical,
            "Document recovered"
        );
        RecoveryOutcome::recovered(&entry.id, kind, canonical.to_string())
    }

    async fn give_up(&self, entry: &CatalogEntry, reason: &str) -> RecoveryOutcome {
        if let Err(e) = self
            .catalog
            .update_status(&entry.id, DocumentStatus::Unrecoverable)
            .await
        {
            warn!(document_id = %entry.id, error = %e, "Failed to mark unrecoverable");
        }

        self.audit
            .append_recovery_event(
                &RecoveryEvent::system(&entry.id, RecoveryEventType::RecoveryFailed)
                    .with_paths(entry.local_path.clone(), None)
                    .with_detail(reason),
            )
            .await;

        self.alerts
            .raise(
                AlertType::RecoveryNeeded,
                AlertSeverity::High,
                format!(
                    "Recovery failed for {} ({}): {}",
                    entry.id, entry.file_name, reason
                ),
                Some(&entry.id),
            )
            .await;

        RecoveryOutcome::failed(
            &entry.id,
            VaultError::Unrecoverable(format!("{}: {}", entry.id, reason)).to_string(),
        )
    }
}
