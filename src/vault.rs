//! `DocumentVault`: the engine's public facade
//!
//! Wires the tiers, catalog, audit log, alerting, health monitor, recovery
//! engine and reconciliation together from one [`VaultConfig`].

use crate::error::{Result, VaultError};
use crate::infrastructure::config::{RemoteEndpoint, VaultConfig};
use crate::models::{
    Actor, Alert, AuditRecord, AuditSummary, CatalogEntry, DocumentRef, HealthReport,
    RecoveryEvent, RecoveryEventType,
};
use crate::monitoring::alerting::{AlertManager, Notifier};
use crate::monitoring::health::{HealthMonitor, HealthScanScheduler};
use crate::recovery::{BatchRecoveryReport, RecoveryEngine, RecoveryOutcome};
use crate::storage::audit_log::AuditLog;
use crate::storage::catalog::CatalogStore;
use crate::storage::checksum::{compute_digest, digests_match, ChecksumValidator, ValidationResult};
use crate::storage::ingest::{IngestWriter, UploadRequest};
use crate::storage::integrity::{IntegrityAuditor, ReconciliationReport};
use crate::storage::local_tier::LocalTier;
use crate::storage::object_store::{FsObjectStore, MemoryObjectStore, ObjectStore};
use crate::storage::remote_tier::RemoteTier;
use crate::storage::tier::SharedTier;
use crate::utils::locks::DocumentLocks;
use crate::utils::retry::RetryPolicy;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Operator confirmation required to purge a catalog row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeConfirmation {
    /// Must repeat the id being purged
    pub document_id: String,
    pub actor: String,
    pub reason: String,
}

pub struct DocumentVault {
    config: VaultConfig,
    catalog: Arc<CatalogStore>,
    audit: Arc<AuditLog>,
    alerts: Arc<AlertManager>,
    local: SharedTier,
    remote: SharedTier,
    locks: DocumentLocks,
    ingest: IngestWriter,
    validator: ChecksumValidator,
    health: Arc<HealthMonitor>,
    recovery: RecoveryEngine,
    auditor: IntegrityAuditor,
}

impl DocumentVault {
    /// Open with the object store selected by `remote.endpoint`.
    pub async fn open(config: VaultConfig) -> Result<Self> {
        config.check()?;
        let store: Arc<dyn ObjectStore> = match config.remote.endpoint(&config.storage.root)? {
            RemoteEndpoint::Directory(dir) => Arc::new(FsObjectStore::new(dir)),
            RemoteEndpoint::Memory => Arc::new(MemoryObjectStore::new()),
        };
        Self::open_with_object_store(config, store).await
    }

    /// Open with a caller-supplied object store client.
    pub async fn open_with_object_store(
        config: VaultConfig,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        config.check()?;
        let root = config.storage.root.clone();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            VaultError::io_error(
                format!("Failed to create storage root: {}", e),
                Some(root.clone()),
            )
        })?;

        let catalog = Arc::new(CatalogStore::open(&root).await?);
        let audit = Arc::new(AuditLog::open(&root, config.audit.clone()).await?);
        let alerts = Arc::new(AlertManager::new(audit.clone(), config.alerts.clone()));

        let local: SharedTier = Arc::new(LocalTier::new(
            config.storage.objects_dir(),
            config.storage.write_timeout(),
        ));
        let remote: SharedTier = Arc::new(RemoteTier::new(
            store,
            config.remote.key_prefix.clone(),
            RetryPolicy::from_remote_config(&config.remote),
            config.remote.list_page_size,
        ));
        let locks = DocumentLocks::new();

        let ingest = IngestWriter::new(
            local.clone(),
            remote.clone(),
            catalog.clone(),
            audit.clone(),
            alerts.clone(),
            config.storage.max_file_size_bytes,
        );
        let validator =
            ChecksumValidator::new(catalog.clone(), local.clone(), remote.clone(), audit.clone());
        let health = Arc::new(HealthMonitor::new(
            catalog.clone(),
            local.clone(),
            remote.clone(),
            validator.clone(),
            audit.clone(),
            alerts.clone(),
            locks.clone(),
            config.health.clone(),
        ));
        let recovery = RecoveryEngine::new(
            catalog.clone(),
            local.clone(),
            remote.clone(),
            audit.clone(),
            alerts.clone(),
            locks.clone(),
            RecoveryEngine::default_strategies(&config.storage, &config.recovery),
            config.recovery.batch_delay(),
        );
        let auditor = IntegrityAuditor::new(catalog.clone(), local.clone(), remote.clone());

        info!(
            root = %root.display(),
            key_prefix = %config.remote.key_prefix,
            purge_allowed = config.catalog.allow_purge,
            "Document vault opened"
        );

        Ok(Self {
            config,
            catalog,
            audit,
            alerts,
            local,
            remote,
            locks,
            ingest,
            validator,
            health,
            recovery,
            auditor,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // ========== ingest & reads ==========

    pub async fn store(
        &self,
        owner_id: &str,
        file_name: &str,
        type_tag: &str,
        bytes: impl Into<Bytes>,
    ) -> Result<DocumentRef> {
        self.ingest
            .store(UploadRequest::new(owner_id, file_name, type_tag, bytes))
            .await
    }

    pub async fn get_document(&self, document_id: &str) -> Result<Option<CatalogEntry>> {
        self.catalog.get(document_id).await
    }

    pub async fn list_documents(&self, owner_id: Option<&str>) -> Result<Vec<CatalogEntry>> {
        match owner_id {
            Some(owner) => self.catalog.list_by_owner(owner).await,
            None => self.catalog.list_all().await,
        }
    }

    /// Verified bytes, local tier first, then remote.
    ///
    /// A copy whose digest no longer matches the baseline is skipped.
    pub async fn read_bytes(&self, document_id: &str) -> Result<Bytes> {
        let entry = self
            .catalog
            .get(document_id)
            .await?
            .ok_or_else(|| VaultError::not_found(format!("Document {}", document_id)))?;

        let mut corrupt_digest: Option<String> = None;
        let sources = [
            (&self.local, entry.local_path.as_deref()),
            (&self.remote, entry.remote_key.as_deref()),
        ];
        for (tier, location) in sources {
            let Some(location) = location else { continue };
            let bytes = match tier.get(location).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    warn!(document_id = %entry.id, tier = %tier.kind(), error = %e, "Read failed");
                    continue;
                }
            };
            match entry.digest.as_deref() {
                None => return Ok(bytes),
                Some(expected) => {
                    let actual = compute_digest(&bytes);
                    if digests_match(expected, &actual) {
                        debug!(document_id = %entry.id, tier = %tier.kind(), "Served verified bytes");
                        return Ok(bytes);
                    }
                    warn!(document_id = %entry.id, tier = %tier.kind(), "Skipping corrupt copy");
                    corrupt_digest = Some(actual);
                }
            }
        }

        match (corrupt_digest, entry.digest) {
            (Some(actual), Some(expected)) => Err(VaultError::IntegrityFailure {
                document_id: entry.id,
                expected,
                actual,
            }),
            _ => Err(VaultError::not_found(format!(
                "No tier holds bytes for {}",
                document_id
            ))),
        }
    }

    // ========== integrity, health, recovery ==========

    pub async fn validate(&self, document_id: &str) -> Result<ValidationResult> {
        self.validator.validate(document_id).await
    }

    pub async fn get_health_report(&self, owner_id: Option<&str>) -> Result<HealthReport> {
        match owner_id {
            Some(owner) => self.health.scan_owner(owner).await,
            None => self.health.scan_all().await,
        }
    }

    pub async fn recover(&self, document_id: &str) -> RecoveryOutcome {
        self.recovery.recover(document_id).await
    }

    pub async fn recover_many(&self, document_ids: &[String]) -> BatchRecoveryReport {
        self.recovery.recover_many(document_ids).await
    }

    pub async fn reconcile(&self) -> Result<ReconciliationReport> {
        self.auditor.reconcile().await
    }

    /// Background scans every `health.scan_interval_seconds`.
    pub fn start_health_scheduler(&self) -> HealthScanScheduler {
        HealthScanScheduler::start(self.health.clone(), self.config.health.scan_interval())
    }

    // ========== audit & alerts ==========

    pub async fn get_recent_audit_events(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        self.audit.get_recent(limit).await
    }

    pub async fn get_audit_events_for(&self, document_id: &str) -> Result<Vec<AuditRecord>> {
        self.audit.get_by_document(document_id).await
    }

    pub async fn audit_summary(&self) -> Result<AuditSummary> {
        self.audit.summarize().await
    }

    pub async fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>> {
        self.alerts.recent(limit).await
    }

    pub async fn unresolved_alerts(&self) -> Result<Vec<Alert>> {
        self.alerts.unresolved().await
    }

    pub async fn resolve_alert(&self, alert_id: &str) -> Result<bool> {
        self.alerts.resolve(alert_id).await
    }

    /// Per-document locks currently tracked; idle ones are pruned after
    /// every scan and recovery.
    pub fn tracked_document_locks(&self) -> usize {
        self.locks.len()
    }

    pub fn register_notifier(&self, notifier: Arc<dyn Notifier>) -> bool {
        self.alerts.register_notifier(notifier)
    }

    // ========== purge ==========

    /// Remove a catalog row. Tier bytes are left in place.
    ///
    /// # Errors
    ///
    /// - `PurgeDisabled` unless `catalog.allow_purge` is set
    /// - `PurgeNotConfirmed` when the confirmation names another id
    /// - `NotFound` when the id is not cataloged
    pub async fn purge_document(
        &self,
        document_id: &str,
        confirmation: &PurgeConfirmation,
    ) -> Result<()> {
        if !self.config.catalog.allow_purge {
            warn!(document_id = %document_id, actor = %confirmation.actor, "Purge refused: disabled");
            return Err(VaultError::PurgeDisabled);
        }
        if confirmation.document_id != document_id {
            return Err(VaultError::PurgeNotConfirmed(document_id.to_string()));
        }
        if confirmation.actor.trim().is_empty() {
            return Err(VaultError::validation_error("purge actor must not be empty"));
        }

        let _guard = self.locks.lock(document_id).await;
        let entry = self
            .catalog
            .get(document_id)
            .await?
            .ok_or_else(|| VaultError::not_found(format!("Document {}", document_id)))?;
        self.catalog.delete(document_id).await?;

        self.audit
            .append_recovery_event(
                &RecoveryEvent::system(document_id, RecoveryEventType::Purged)
                    .by(Actor::Human)
                    .with_paths(entry.local_path.clone(), entry.remote_key.clone())
                    .with_detail(format!(
                        "actor={} reason={}",
                        confirmation.actor, confirmation.reason
                    )),
            )
            .await;

        warn!(
            document_id = %document_id,
            actor = %confirmation.actor,
            reason = %confirmation.reason,
            "Catalog entry purged"
        );
        Ok(())
    }
}
