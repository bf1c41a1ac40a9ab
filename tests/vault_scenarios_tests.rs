//! End-to-end vault behavior
//!
//! Store, scan, recover and reconcile against a temp storage root and an
//! in-memory bucket.

mod common;

use common::{fast_config, open_vault, open_with, payload};
use doc_vault::models::{AlertType, AuditRecord, HealthClass, RecoveryEventType};
use doc_vault::storage::{InvalidReason, TierKind};
use doc_vault::{DocumentStatus, PurgeConfirmation, StrategyKind, VaultError};
use tempfile::TempDir;

#[tokio::test]
async fn test_empty_upload_is_rejected_without_catalog_row() {
    let t = open_vault().await;

    let err = t
        .vault
        .store("owner-1", "empty.pdf", "pdf", Vec::<u8>::new())
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::EmptyUpload));
    assert!(t.vault.list_documents(None).await.unwrap().is_empty());
    assert_eq!(t.remote.put_calls(), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected_before_any_write() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = fast_config(temp_dir.path());
    config.storage.max_file_size_bytes = 512;
    let t = open_with(config, temp_dir).await;

    let err = t
        .vault
        .store("owner-1", "big.pdf", "pdf", payload(513, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::FileTooLarge { size: 513, limit: 512 }));
    assert!(t.vault.list_documents(None).await.unwrap().is_empty());
    assert!(!t.vault.config().storage.objects_dir().exists());
}

#[tokio::test]
async fn test_clean_store_lands_in_both_tiers() {
    let t = open_vault().await;
    let bytes = payload(2048, 7);

    let doc = t
        .vault
        .store("owner-1", "paystub.pdf", "income", bytes.clone())
        .await
        .unwrap();

    assert_eq!(doc.status, DocumentStatus::Stored);
    assert_eq!(doc.size_bytes, 2048);
    assert!(doc.remote_key.is_some());
    assert_eq!(t.remote.len(), 1);

    let entry = t.vault.get_document(&doc.document_id).await.unwrap().unwrap();
    assert_eq!(entry.file_name, "paystub.pdf");
    assert_eq!(entry.digest.as_deref(), Some(doc.digest.as_str()));

    let read = t.vault.read_bytes(&doc.document_id).await.unwrap();
    assert_eq!(read.as_ref(), bytes.as_slice());

    let validation = t.vault.validate(&doc.document_id).await.unwrap();
    assert!(validation.valid);
    assert_eq!(validation.source, Some(TierKind::Local));
}

#[tokio::test]
async fn test_remote_outage_degrades_to_at_risk() {
    let t = open_vault().await;
    t.remote.set_available(false);

    let doc = t
        .vault
        .store("owner-1", "w2.pdf", "income", payload(1024, 3))
        .await
        .expect("remote outage must not fail the upload");

    assert_eq!(doc.status, DocumentStatus::AtRisk);
    assert!(doc.remote_key.is_none());

    let entry = t.vault.get_document(&doc.document_id).await.unwrap().unwrap();
    assert_eq!(entry.status, DocumentStatus::AtRisk);

    let report = t.vault.get_health_report(None).await.unwrap();
    let snapshot = report.snapshot(&doc.document_id).unwrap();
    assert!(snapshot.missing_remote);
    assert!(!snapshot.missing_local);
    assert_eq!(snapshot.class, HealthClass::AtRisk);
    assert_eq!(report.at_risk, 1);

    let alerts = t.vault.recent_alerts(10).await.unwrap();
    assert!(alerts.iter().any(|a| a.alert_type == AlertType::UploadFailure
        && a.document_id.as_deref() == Some(doc.document_id.as_str())));
}

#[tokio::test]
async fn test_missing_local_file_is_logged_once_across_scans() {
    let t = open_vault().await;
    let doc = t
        .vault
        .store("owner-1", "id_card.png", "identity", payload(4096, 11))
        .await
        .unwrap();

    tokio::fs::remove_file(doc.local_path.as_deref().unwrap())
        .await
        .unwrap();

    let first = t.vault.get_health_report(None).await.unwrap();
    let snapshot = first.snapshot(&doc.document_id).unwrap();
    assert!(snapshot.missing_local);
    assert!(!snapshot.missing_remote);
    assert_eq!(snapshot.class, HealthClass::AtRisk);
    assert_eq!(
        t.count_events(&doc.document_id, RecoveryEventType::MissingDetected)
            .await,
        1
    );

    let second = t.vault.get_health_report(None).await.unwrap();
    assert_eq!(second.at_risk, 1);
    assert_eq!(
        t.count_events(&doc.document_id, RecoveryEventType::MissingDetected)
            .await,
        1
    );

    let entry = t.vault.get_document(&doc.document_id).await.unwrap().unwrap();
    assert_eq!(entry.status, DocumentStatus::AtRisk);
}

#[tokio::test]
async fn test_read_falls_back_to_remote_when_local_is_gone() {
    let t = open_vault().await;
    let bytes = payload(300, 5);
    let doc = t
        .vault
        .store("owner-1", "lease.pdf", "housing", bytes.clone())
        .await
        .unwrap();

    tokio::fs::remove_file(doc.local_path.as_deref().unwrap())
        .await
        .unwrap();

    let read = t.vault.read_bytes(&doc.document_id).await.unwrap();
    assert_eq!(read.as_ref(), bytes.as_slice());
}

#[tokio::test]
async fn test_read_refuses_corrupt_copies() {
    let t = open_vault().await;
    t.remote.set_available(false);
    let doc = t
        .vault
        .store("owner-1", "lease.pdf", "housing", payload(300, 5))
        .await
        .unwrap();

    tokio::fs::write(doc.local_path.as_deref().unwrap(), b"tampered")
        .await
        .unwrap();

    let err = t.vault.read_bytes(&doc.document_id).await.unwrap_err();
    assert!(matches!(err, VaultError::IntegrityFailure { .. }));

    let validation = t.vault.validate(&doc.document_id).await.unwrap();
    assert!(!validation.valid);
    assert_eq!(
        t.count_events(&doc.document_id, RecoveryEventType::CorruptionDetected)
            .await,
        1
    );
}

#[tokio::test]
async fn test_unknown_document_is_not_found() {
    let t = open_vault().await;
    assert!(matches!(
        t.vault.read_bytes("nope").await.unwrap_err(),
        VaultError::NotFound(_)
    ));
    assert!(matches!(
        t.vault.validate("nope").await.unwrap_err(),
        VaultError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_recovery_from_orphan_area_with_copy_suffix() {
    let t = open_vault().await;
    let bytes = payload(1500, 21);
    let doc = t
        .vault
        .store("owner-1", "bank_statement_march.pdf", "assets", bytes.clone())
        .await
        .unwrap();
    let local_path = doc.local_path.clone().unwrap();
    tokio::fs::remove_file(&local_path).await.unwrap();

    let orphan_dir = t.orphan_dir();
    tokio::fs::create_dir_all(&orphan_dir).await.unwrap();
    let orphan = orphan_dir.join("bank_statement_march (1).pdf");
    tokio::fs::write(&orphan, &bytes).await.unwrap();
    // Same size, different bytes: must be rejected on digest
    tokio::fs::write(orphan_dir.join("bank_statement_march.pdf"), payload(1500, 99))
        .await
        .unwrap();

    let outcome = t.vault.recover(&doc.document_id).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.strategy, Some(StrategyKind::OrphanScan));
    assert_eq!(outcome.new_path.as_deref(), Some(local_path.as_str()));

    let restored = tokio::fs::read(&local_path).await.unwrap();
    assert_eq!(restored, bytes);

    let entry = t.vault.get_document(&doc.document_id).await.unwrap().unwrap();
    assert_eq!(entry.status, DocumentStatus::Recovered);
    assert_eq!(entry.file_name, "bank_statement_march.pdf");

    let events = t.vault.get_audit_events_for(&doc.document_id).await.unwrap();
    let recovered: Vec<_> = events
        .iter()
        .filter_map(|record| match record {
            AuditRecord::RecoveryEvent(e) if e.event_type == RecoveryEventType::Recovered => {
                Some(e)
            }
            _ => None,
        })
        .collect();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].original_path.as_deref(), Some(local_path.as_str()));
    assert_eq!(
        recovered[0].resolved_path.as_deref(),
        Some(orphan.to_string_lossy().as_ref())
    );

    // Second call finds the canonical copy intact and logs no new success
    let again = t.vault.recover(&doc.document_id).await;
    assert!(again.success);
    assert_eq!(again.strategy, Some(StrategyKind::AlreadyIntact));
    assert_eq!(
        t.count_events(&doc.document_id, RecoveryEventType::Recovered)
            .await,
        1
    );
}

#[tokio::test]
async fn test_recovery_from_alternate_owner_layout() {
    let t = open_vault().await;
    let bytes = payload(640, 42);
    let doc = t
        .vault
        .store("owner-7", "tax_return.pdf", "income", bytes.clone())
        .await
        .unwrap();
    tokio::fs::remove_file(doc.local_path.as_deref().unwrap())
        .await
        .unwrap();

    let legacy_dir = t.root().join("uploads").join("owner-7");
    tokio::fs::create_dir_all(&legacy_dir).await.unwrap();
    tokio::fs::write(legacy_dir.join("tax_return.pdf"), &bytes)
        .await
        .unwrap();

    let outcome = t.vault.recover(&doc.document_id).await;
    assert!(outcome.success);
    assert_eq!(outcome.strategy, Some(StrategyKind::AlternateLocationScan));
}

#[tokio::test]
async fn test_exhausted_recovery_marks_unrecoverable_and_alerts() {
    let t = open_vault().await;
    let doc = t
        .vault
        .store("owner-1", "gone.pdf", "misc", payload(256, 8))
        .await
        .unwrap();
    tokio::fs::remove_file(doc.local_path.as_deref().unwrap())
        .await
        .unwrap();
    t.remote.remove_raw(doc.remote_key.as_deref().unwrap());

    let outcome = t.vault.recover(&doc.document_id).await;
    assert!(!outcome.success);
    assert!(outcome.error.is_some());
    assert!(outcome.new_path.is_none());

    let entry = t.vault.get_document(&doc.document_id).await.unwrap().unwrap();
    assert_eq!(entry.status, DocumentStatus::Unrecoverable);
    // Nothing was fabricated in place of the lost bytes
    assert!(!std::path::Path::new(doc.local_path.as_deref().unwrap()).exists());

    assert_eq!(
        t.count_events(&doc.document_id, RecoveryEventType::RecoveryFailed)
            .await,
        1
    );
    let alerts = t.vault.unresolved_alerts().await.unwrap();
    assert!(alerts.iter().any(|a| a.alert_type == AlertType::RecoveryNeeded));
}

#[tokio::test]
async fn test_recovery_restores_local_copy_from_remote() {
    let t = open_vault().await;
    let bytes = payload(1024, 17);
    let doc = t
        .vault
        .store("owner-1", "will.pdf", "estate", bytes.clone())
        .await
        .unwrap();
    let local_path = doc.local_path.clone().unwrap();
    tokio::fs::remove_file(&local_path).await.unwrap();

    let outcome = t.vault.recover(&doc.document_id).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.strategy, Some(StrategyKind::RemoteTier));
    assert_eq!(outcome.new_path.as_deref(), Some(local_path.as_str()));
    assert_eq!(tokio::fs::read(&local_path).await.unwrap(), bytes);

    let entry = t.vault.get_document(&doc.document_id).await.unwrap().unwrap();
    assert_eq!(entry.status, DocumentStatus::Recovered);
    assert_eq!(
        t.count_events(&doc.document_id, RecoveryEventType::RecoveryFailed)
            .await,
        0
    );
    let alerts = t.vault.unresolved_alerts().await.unwrap();
    assert!(alerts
        .iter()
        .all(|a| a.alert_type != AlertType::RecoveryNeeded));

    let report = t.vault.get_health_report(None).await.unwrap();
    assert_eq!(report.healthy, 1);
}

#[tokio::test]
async fn test_recovery_rejects_corrupt_remote_copy() {
    let t = open_vault().await;
    let doc = t
        .vault
        .store("owner-1", "will.pdf", "estate", payload(512, 3))
        .await
        .unwrap();
    tokio::fs::remove_file(doc.local_path.as_deref().unwrap())
        .await
        .unwrap();
    t.remote
        .insert_raw(doc.remote_key.clone().unwrap(), payload(512, 4));

    let outcome = t.vault.recover(&doc.document_id).await;
    assert!(!outcome.success);
    assert!(!std::path::Path::new(doc.local_path.as_deref().unwrap()).exists());
    let entry = t.vault.get_document(&doc.document_id).await.unwrap().unwrap();
    assert_eq!(entry.status, DocumentStatus::Unrecoverable);
}

#[tokio::test]
async fn test_recovery_reuploads_after_remote_outage() {
    let t = open_vault().await;
    t.remote.set_available(false);
    let bytes = payload(800, 6);
    let doc = t
        .vault
        .store("owner-1", "title.pdf", "property", bytes.clone())
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::AtRisk);
    assert!(doc.remote_key.is_none());

    // Still down: the local copy is fine, only the re-upload fails
    let blocked = t.vault.recover(&doc.document_id).await;
    assert!(!blocked.success);
    let entry = t.vault.get_document(&doc.document_id).await.unwrap().unwrap();
    assert_eq!(entry.status, DocumentStatus::AtRisk);
    assert!(t
        .vault
        .unresolved_alerts()
        .await
        .unwrap()
        .iter()
        .all(|a| a.alert_type != AlertType::RecoveryNeeded));

    t.remote.set_available(true);
    let outcome = t.vault.recover(&doc.document_id).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.strategy, Some(StrategyKind::RemoteReupload));

    let entry = t.vault.get_document(&doc.document_id).await.unwrap().unwrap();
    assert_eq!(entry.status, DocumentStatus::Stored);
    let key = entry.remote_key.clone().expect("remote key recorded");
    assert_eq!(t.remote.remove_raw(&key).unwrap().as_ref(), bytes.as_slice());
    t.remote.insert_raw(key, bytes);

    let again = t.vault.recover(&doc.document_id).await;
    assert_eq!(again.strategy, Some(StrategyKind::AlreadyIntact));
    assert_eq!(
        t.count_events(&doc.document_id, RecoveryEventType::Recovered)
            .await,
        1
    );
    assert!(t.vault.reconcile().await.unwrap().missing_storage_keys.is_empty());
}

#[tokio::test]
async fn test_concurrent_recover_restores_once() {
    let t = open_vault().await;
    let bytes = payload(900, 31);
    let doc = t
        .vault
        .store("owner-1", "passport.png", "identity", bytes.clone())
        .await
        .unwrap();
    tokio::fs::remove_file(doc.local_path.as_deref().unwrap())
        .await
        .unwrap();
    let orphan_dir = t.orphan_dir();
    tokio::fs::create_dir_all(&orphan_dir).await.unwrap();
    tokio::fs::write(orphan_dir.join(&doc.document_id), &bytes)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        t.vault.recover(&doc.document_id),
        t.vault.recover(&doc.document_id)
    );
    assert!(a.success && b.success);
    let mut strategies = vec![a.strategy.unwrap(), b.strategy.unwrap()];
    strategies.sort_by_key(|s| s.as_str());
    assert_eq!(
        strategies,
        vec![StrategyKind::AlreadyIntact, StrategyKind::OrphanScan]
    );
    assert_eq!(
        t.count_events(&doc.document_id, RecoveryEventType::Recovered)
            .await,
        1
    );
    assert_eq!(t.vault.tracked_document_locks(), 0);
}

#[tokio::test]
async fn test_validate_with_both_tiers_down_is_unreachable() {
    let t = open_vault().await;
    let doc = t
        .vault
        .store("owner-1", "deed.pdf", "property", payload(128, 2))
        .await
        .unwrap();
    tokio::fs::remove_file(doc.local_path.as_deref().unwrap())
        .await
        .unwrap();
    t.remote.set_available(false);

    let result = t.vault.validate(&doc.document_id).await.unwrap();
    assert!(!result.valid);
    assert_eq!(result.reason, Some(InvalidReason::Unreachable));
    assert_eq!(
        t.count_events(&doc.document_id, RecoveryEventType::CorruptionDetected)
            .await,
        0
    );
}

#[tokio::test]
async fn test_recover_many_reports_each_outcome() {
    let t = open_vault().await;
    let intact = t
        .vault
        .store("owner-1", "a.pdf", "misc", payload(100, 1))
        .await
        .unwrap();
    let lost = t
        .vault
        .store("owner-1", "b.pdf", "misc", payload(100, 2))
        .await
        .unwrap();
    tokio::fs::remove_file(lost.local_path.as_deref().unwrap())
        .await
        .unwrap();
    t.remote.remove_raw(lost.remote_key.as_deref().unwrap());

    let report = t
        .vault
        .recover_many(&[
            intact.document_id.clone(),
            lost.document_id.clone(),
            "unknown".to_string(),
        ])
        .await;

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 2);
    assert!(report.outcomes[0].success);
    assert!(!report.outcomes[1].success);
    assert!(!report.outcomes[2].success);
}

#[tokio::test]
async fn test_reconcile_reports_untracked_remote_key() {
    let t = open_vault().await;
    for seed in 0..4u8 {
        t.vault
            .store("owner-1", &format!("doc{}.pdf", seed), "misc", payload(64, seed))
            .await
            .unwrap();
    }
    t.remote.set_available(false);
    let local_only = t
        .vault
        .store("owner-1", "doc4.pdf", "misc", payload(64, 4))
        .await
        .unwrap();
    t.remote.set_available(true);
    t.remote.insert_raw("documents/owner-1/untracked", &b"stray"[..]);

    let report = t.vault.reconcile().await.unwrap();
    assert_eq!(report.total_entries, 5);
    assert_eq!(report.orphaned_in_remote, vec!["documents/owner-1/untracked"]);
    assert!(report.missing_in_remote.is_empty());
    assert_eq!(report.missing_storage_keys, vec![local_only.document_id]);
    assert!(report.missing_local.is_empty());
    assert!(report.orphaned_local.is_empty());
    assert!(!report.is_consistent());
}

#[tokio::test]
async fn test_owner_scan_only_covers_that_owner() {
    let t = open_vault().await;
    t.vault
        .store("owner-a", "a.pdf", "misc", payload(10, 1))
        .await
        .unwrap();
    t.vault
        .store("owner-b", "b.pdf", "misc", payload(10, 2))
        .await
        .unwrap();

    let report = t.vault.get_health_report(Some("owner-a")).await.unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.healthy, 1);
    assert_eq!(report.per_document[0].owner_id, "owner-a");
}

#[tokio::test]
async fn test_purge_is_locked_down_by_default() {
    let t = open_vault().await;
    let doc = t
        .vault
        .store("owner-1", "keep.pdf", "misc", payload(10, 1))
        .await
        .unwrap();

    let confirmation = PurgeConfirmation {
        document_id: doc.document_id.clone(),
        actor: "ops@example.com".to_string(),
        reason: "duplicate".to_string(),
    };
    let err = t
        .vault
        .purge_document(&doc.document_id, &confirmation)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::PurgeDisabled));
    assert!(t.vault.get_document(&doc.document_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_purge_requires_matching_confirmation() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = fast_config(temp_dir.path());
    config.catalog.allow_purge = true;
    let t = open_with(config, temp_dir).await;

    let doc = t
        .vault
        .store("owner-1", "dup.pdf", "misc", payload(10, 1))
        .await
        .unwrap();
    let local_path = doc.local_path.clone().unwrap();

    let wrong = PurgeConfirmation {
        document_id: "something-else".to_string(),
        actor: "ops".to_string(),
        reason: "duplicate".to_string(),
    };
    assert!(matches!(
        t.vault.purge_document(&doc.document_id, &wrong).await,
        Err(VaultError::PurgeNotConfirmed(_))
    ));

    let confirmed = PurgeConfirmation {
        document_id: doc.document_id.clone(),
        ..wrong
    };
    t.vault
        .purge_document(&doc.document_id, &confirmed)
        .await
        .unwrap();

    assert!(t.vault.get_document(&doc.document_id).await.unwrap().is_none());
    assert!(std::path::Path::new(&local_path).exists());
    assert_eq!(t.remote.len(), 1);
    assert_eq!(
        t.count_events(&doc.document_id, RecoveryEventType::Purged)
            .await,
        1
    );
    assert!(matches!(
        t.vault.read_bytes(&doc.document_id).await,
        Err(VaultError::NotFound(_))
    ));
}
