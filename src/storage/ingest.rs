//! Two-tier ingest pipeline
//!
//! Order of operations for every upload:
//!
//! 1. Mint a fresh document id and compute the SHA-256 of the payload
//! 2. Write locally (fsync'd); failure stops here, nothing is cataloged
//! 3. Re-read the local copy and compare digests; a mismatch removes the
//!    file and stops, nothing is cataloged
//! 4. Write to the remote tier with bounded retry; failure only downgrades
//!    the entry to `at_risk`
//! 5. Append the upload attempt record
//! 6. Insert the catalog entry
//!
//! A catalog row therefore always points at bytes that were verified on disk.
//! The pipeline runs on its own task so a caller that drops the future
//! mid-upload cannot leave written bytes without their bookkeeping.

use crate::error::{Result, VaultError};
use crate::models::{
    AlertSeverity, AlertType, CatalogEntry, DocumentRef, DocumentStatus, UploadAttempt,
};
use crate::monitoring::alerting::AlertManager;
use crate::storage::audit_log::AuditLog;
use crate::storage::catalog::CatalogStore;
use crate::storage::checksum::compute_digest;
use crate::storage::tier::SharedTier;
use crate::utils::retry::{with_retry, RetryPolicy};
use bytes::Bytes;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Caller-supplied description of an upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub owner_id: String,
    pub file_name: String,
    pub type_tag: String,
    pub bytes: Bytes,
}

impl UploadRequest {
    pub fn new(
        owner_id: impl Into<String>,
        file_name: impl Into<String>,
        type_tag: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            file_name: file_name.into(),
            type_tag: type_tag.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Clone)]
pub struct IngestWriter {
    local: SharedTier,
    remote: SharedTier,
    catalog: Arc<CatalogStore>,
    audit: Arc<AuditLog>,
    alerts: Arc<AlertManager>,
    max_file_size: u64,
    catalog_retry: RetryPolicy,
}

impl IngestWriter {
    pub fn new(
        local: SharedTier,
        remote: SharedTier,
        catalog: Arc<CatalogStore>,
        audit: Arc<AuditLog>,
        alerts: Arc<AlertManager>,
        max_file_size: u64,
    ) -> Self {
        Self {
            local,
            remote,
            catalog,
            audit,
            alerts,
            max_file_size,
            catalog_retry: RetryPolicy::default(),
        }
    }

    fn check_request(&self, request: &UploadRequest) -> Result<()> {
        let size = request.bytes.len() as u64;
        if size == 0 {
            return Err(VaultError::EmptyUpload);
        }
        if size > self.max_file_size {
            return Err(VaultError::FileTooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        if request.owner_id.trim().is_empty() {
            return Err(VaultError::validation_error("owner_id must not be empty"));
        }
        if request.file_name.trim().is_empty() {
            return Err(VaultError::validation_error("file_name must not be empty"));
        }
        Ok(())
    }

    /// Store one document. Size and shape checks run before any I/O.
    pub async fn store(&self, request: UploadRequest) -> Result<DocumentRef> {
        self.check_request(&request)?;

        let writer = self.clone();
        tokio::spawn(async move { writer.run(request).await })
            .await
            .map_err(|e| VaultError::Internal(format!("Ingest task failed: {}", e)))?
    }

    async fn run(&self, request: UploadRequest) -> Result<DocumentRef> {
        let document_id = Uuid::new_v4().to_string();
        let digest = compute_digest(&request.bytes);
        let size_bytes = request.bytes.len() as u64;
        let mut attempt = UploadAttempt::new(&document_id);

        let local_path = self.local.locate(&request.owner_id, &document_id);
        if let Err(e) = self.local.put(&local_path, request.bytes.clone()).await {
            attempt.error_message = Some(e.to_string());
            return Err(self
                .abort(attempt, &local_path, into_write_failure(e, &local_path))
                .await);
        }
        attempt.disk_write_succeeded = true;

        let read_back = match self.local.get(&local_path).await {
            Ok(Some(bytes)) => compute_digest(&bytes),
            Ok(None) => "<missing>".to_string(),
            Err(e) => format!("<unreadable: {}>", e),
        };
        if read_back != digest {
            if let Err(e) = self.local.remove(&local_path).await {
                error!(document_id = %document_id, error = %e, "Failed to remove unverified file");
            }
            let failure = VaultError::IntegrityFailure {
                document_id: document_id.clone(),
                expected: digest.clone(),
                actual: read_back,
            };
            attempt.error_message = Some(failure.to_string());
            return Err(self.abort(attempt, &local_path, failure).await);
        }
        attempt.checksum_verified = true;

        let remote_key = self.remote.locate(&request.owner_id, &document_id);
        let remote_result = self.remote.put(&remote_key, request.bytes).await;
        attempt.remote_write_succeeded = remote_result.is_ok();
        if let Err(e) = &remote_result {
            warn!(
                document_id = %document_id,
                key = %remote_key,
                error = %e,
                "Remote write failed, document stored locally only"
            );
            attempt.error_message = Some(format!("remote: {}", e));
        }

        self.audit.append_upload_attempt(&attempt).await;

        let now = Utc::now();
        let entry = CatalogEntry {
            id: document_id.clone(),
            owner_id: request.owner_id,
            file_name: request.file_name,
            size_bytes,
            type_tag: request.type_tag,
            digest: Some(digest),
            local_path: Some(local_path),
            remote_key: remote_result.is_ok().then_some(remote_key),
            created_at: now,
            last_verified_at: Some(now),
            status: if remote_result.is_ok() {
                DocumentStatus::Stored
            } else {
                DocumentStatus::AtRisk
            },
        };

        with_retry(&self.catalog_retry, "catalog_insert", || {
            self.catalog.insert_or_confirm(&entry)
        })
        .await
        .map_err(|e| {
            // Verified bytes stay on disk; reconcile reports them as orphaned
            error!(document_id = %entry.id, error = %e, "Catalog insert failed after write");
            e
        })?;

        if let Err(e) = remote_result {
            self.alerts
                .raise(
                    AlertType::UploadFailure,
                    AlertSeverity::Medium,
                    format!("Remote write failed for {}: {}", entry.id, e),
                    Some(&entry.id),
                )
                .await;
            self.alerts
                .record_upload_failure(&entry.id, "remote write failed")
                .await;
        }

        info!(
            document_id = %entry.id,
            owner_id = %entry.owner_id,
            size = entry.size_bytes,
            status = %entry.status,
            "Document stored"
        );
        Ok(DocumentRef::from_entry(&entry))
    }

    async fn abort(&self, attempt: UploadAttempt, local_path: &str, failure: VaultError) -> VaultError {
        error!(
            document_id = %attempt.document_id,
            path = %local_path,
            error = %failure,
            "Upload aborted before cataloging"
        );
        self.audit.append_upload_attempt(&attempt).await;
        self.alerts
            .record_upload_failure(&attempt.document_id, failure.kind())
            .await;
        failure
    }
}

fn into_write_failure(error: VaultError, local_path: &str) -> VaultError {
    match error {
        VaultError::WriteFailed { .. } => error,
        other => VaultError::write_failed(other.to_string(), Some(PathBuf::from(local_path))),
    }
}
