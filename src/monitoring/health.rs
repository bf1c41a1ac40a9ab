//! Periodic two-tier health scans
//!
//! For each non-pending catalog entry: probe both tiers, run a deep digest
//! check when one is due, classify, and reconcile the entry's status.
//! Findings go to the recovery event log, suppressed when the newest event
//! for the document already says the same thing. Aggregate alerts are raised
//! once per scan.
//!
//! A scan never repairs anything. It only observes and records.

use crate::error::Result;
use crate::infrastructure::config::HealthConfig;
use crate::models::{
    AlertSeverity, AlertType, CatalogEntry, DigestState, DocumentStatus, HealthClass,
    HealthReport, HealthSnapshot, RecoveryEvent, RecoveryEventType,
};
use crate::monitoring::alerting::AlertManager;
use crate::storage::audit_log::AuditLog;
use crate::storage::catalog::CatalogStore;
use crate::storage::checksum::{ChecksumValidator, InvalidReason};
use crate::storage::tier::SharedTier;
use crate::utils::locks::DocumentLocks;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pure classification of one document's probe results.
///
/// | local | remote | digest   | class    |
/// |-------|--------|----------|----------|
/// | yes   | yes    | match/unchecked | healthy |
/// | yes   | yes    | mismatch | at_risk  |
/// | one missing    | match/unchecked | at_risk |
/// | one missing    | mismatch | failed   |
/// | no    | no     | any      | failed   |
pub fn classify(local_present: bool, remote_present: bool, digest: DigestState) -> HealthClass {
    let mismatch = digest == DigestState::Mismatch;
    match (local_present, remote_present) {
        (false, false) => HealthClass::Failed,
        (true, true) if !mismatch => HealthClass::Healthy,
        (true, true) => HealthClass::AtRisk,
        _ if mismatch => HealthClass::Failed,
        _ => HealthClass::AtRisk,
    }
}

/// Status an entry should move to after being classified.
pub fn reconciled_status(current: DocumentStatus, class: HealthClass) -> DocumentStatus {
    match class {
        HealthClass::Failed => match current {
            DocumentStatus::Unrecoverable => DocumentStatus::Unrecoverable,
            _ => DocumentStatus::Missing,
        },
        HealthClass::AtRisk => DocumentStatus::AtRisk,
        HealthClass::Healthy => match current {
            DocumentStatus::AtRisk | DocumentStatus::Missing | DocumentStatus::Unrecoverable => {
                DocumentStatus::Stored
            }
            other => other,
        },
    }
}

/// Machine-readable finding, compared against the last event to dedupe.
fn finding(snapshot: &HealthSnapshot) -> (RecoveryEventType, &'static str) {
    if snapshot.checksum_mismatch {
        (RecoveryEventType::CorruptionDetected, "checksum_mismatch")
    } else if snapshot.missing_local && snapshot.missing_remote {
        (RecoveryEventType::MissingDetected, "missing_both")
    } else if snapshot.missing_local {
        (RecoveryEventType::MissingDetected, "missing_local")
    } else {
        (RecoveryEventType::MissingDetected, "missing_remote")
    }
}

pub struct HealthMonitor {
    catalog: Arc<CatalogStore>,
    local: SharedTier,
    remote: SharedTier,
    validator: ChecksumValidator,
    audit: Arc<AuditLog>,
    alerts: Arc<AlertManager>,
    locks: DocumentLocks,
    config: HealthConfig,
}

impl HealthMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<CatalogStore>,
        local: SharedTier,
        remote: SharedTier,
        validator: ChecksumValidator,
        audit: Arc<AuditLog>,
        alerts: Arc<AlertManager>,
        locks: DocumentLocks,
        config: HealthConfig,
    ) -> Self {
        Self {
            catalog,
            local,
            remote,
            validator,
            audit,
            alerts,
            locks,
            config,
        }
    }

    pub async fn scan_all(&self) -> Result<HealthReport> {
        self.scan(None).await
    }

    pub async fn scan_owner(&self, owner_id: &str) -> Result<HealthReport> {
        self.scan(Some(owner_id)).await
    }

    async fn scan(&self, owner_id: Option<&str>) -> Result<HealthReport> {
        let started_at = Utc::now();
        let entries = self.catalog.list_scan_candidates(owner_id).await?;
        info!(
            owner_id = ?owner_id,
            candidates = entries.len(),
            "Health scan started"
        );

        let snapshots: Vec<HealthSnapshot> = stream::iter(entries)
            .map(|entry| self.inspect(entry))
            .buffered(self.config.scan_concurrency.max(1))
            .collect()
            .await;

        self.locks.prune_idle();

        let report = HealthReport::from_snapshots(snapshots, started_at);
        self.raise_aggregate_alerts(&report).await;

        info!(
            total = report.total,
            healthy = report.healthy,
            at_risk = report.at_risk,
            failed = report.failed,
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Health scan finished"
        );
        Ok(report)
    }

    async fn probe(&self, tier: &SharedTier, location: Option<&str>, document_id: &str) -> bool {
        let Some(location) = location else {
            return false;
        };
        match tier.exists(location).await {
            Ok(present) => present,
            Err(e) => {
                // An unreachable tier is indistinguishable from a missing copy here
                warn!(
                    document_id = %document_id,
                    tier = %tier.kind(),
                    error = %e,
                    "Tier probe failed"
                );
                false
            }
        }
    }

    async fn inspect(&self, entry: CatalogEntry) -> HealthSnapshot {
        let _guard = self.locks.lock(&entry.id).await;

        // Re-read under the lock; a recovery may have just moved the entry
        let entry = match self.catalog.get(&entry.id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => entry,
            Err(e) => {
                warn!(document_id = %entry.id, error = %e, "Catalog re-read failed");
                entry
            }
        };

        let local_present = self
            .probe(&self.local, entry.local_path.as_deref(), &entry.id)
            .await;
        let remote_present = self
            .probe(&self.remote, entry.remote_key.as_deref(), &entry.id)
            .await;

        let now = Utc::now();
        let digest = if (local_present || remote_present)
            && entry.deep_check_due(now, self.config.deep_check_cadence())
        {
            let result = self.validator.check_entry(&entry).await;
            if result.valid {
                if let Err(e) = self.catalog.mark_verified(&entry.id, now).await {
                    warn!(document_id = %entry.id, error = %e, "Failed to record verification time");
                }
                DigestState::Match
            } else if result.reason == Some(InvalidReason::Mismatch) {
                DigestState::Mismatch
            } else {
                DigestState::Unchecked
            }
        } else {
            DigestState::Unchecked
        };

        let class = classify(local_present, remote_present, digest);
        let snapshot = HealthSnapshot {
            document_id: entry.id.clone(),
            owner_id: entry.owner_id.clone(),
            missing_local: !local_present,
            missing_remote: !remote_present,
            checksum_mismatch: digest == DigestState::Mismatch,
            digest_checked: digest != DigestState::Unchecked,
            class,
            risk: class.risk(),
        };

        if class != HealthClass::Healthy {
            self.record_finding(&entry, &snapshot).await;
        }
        self.reconcile_status(&entry, class).await;

        snapshot
    }

    async fn record_finding(&self, entry: &CatalogEntry, snapshot: &HealthSnapshot) {
        let (event_type, detail) = finding(snapshot);

        match self.audit.latest_recovery_event(&entry.id).await {
            Ok(Some(latest))
                if latest.event_type == event_type && latest.detail.as_deref() == Some(detail) =>
            {
                debug!(document_id = %entry.id, detail = detail, "Finding unchanged, not re-logged");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(document_id = %entry.id, error = %e, "Could not read last event; logging finding");
            }
        }

        warn!(
            document_id = %entry.id,
            owner_id = %entry.owner_id,
            detail = detail,
            class = ?snapshot.class,
            "Health finding"
        );
        let original = entry.local_path.clone().or_else(|| entry.remote_key.clone());
        self.audit
            .append_recovery_event(
                &RecoveryEvent::system(&entry.id, event_type)
                    .with_strategy("health_scan")
                    .with_paths(original, None)
                    .with_detail(detail),
            )
            .await;
    }

    async fn reconcile_status(&self, entry: &CatalogEntry, class: HealthClass) {
        let next = reconciled_status(entry.status, class);
        if next == entry.status {
            return;
        }
        match self.catalog.update_status(&entry.id, next).await {
            Ok(_) => debug!(
                document_id = %entry.id,
                from = %entry.status,
                to = %next,
                "Status reconciled"
            ),
            Err(e) => warn!(document_id = %entry.id, error = %e, "Failed to update status"),
        }
    }

    async fn raise_aggregate_alerts(&self, report: &HealthReport) {
        if report.failed > 0 {
            self.alerts
                .raise(
                    AlertType::DataLoss,
                    AlertSeverity::Critical,
                    format!(
                        "{} of {} documents are missing or corrupt in every reachable tier",
                        report.failed, report.total
                    ),
                    None,
                )
                .await;
        }

        if report.at_risk > self.config.at_risk_alert_threshold {
            self.alerts
                .raise(
                    AlertType::RecoveryNeeded,
                    AlertSeverity::Medium,
                    format!(
                        "{} documents are at risk (threshold {})",
                        report.at_risk, self.config.at_risk_alert_threshold
                    ),
                    None,
                )
                .await;
        }
    }
}

/// Runs `scan_all` on a fixed interval until stopped.
pub struct HealthScanScheduler {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HealthScanScheduler {
    /// Spawn the loop. The first scan runs one full interval after start.
    pub fn start(monitor: Arc<HealthMonitor>, interval: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_flag = running.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            while running_flag.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !running_flag.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = monitor.scan_all().await {
                    warn!(error = %e, "Scheduled health scan failed");
                }
            }
            debug!("Health scan scheduler exited");
        });

        info!(interval_secs = interval.as_secs(), "Health scan scheduler started");
        Self {
            running,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop after the in-flight scan, waiting at most five seconds.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let abort = handle.abort_handle();
            if tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .is_err()
            {
                abort.abort();
            }
        }
        info!("Health scan scheduler stopped");
    }
}

impl Drop for HealthScanScheduler {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, true, DigestState::Match, HealthClass::Healthy)]
    #[case(true, true, DigestState::Unchecked, HealthClass::Healthy)]
    #[case(true, true, DigestState::Mismatch, HealthClass::AtRisk)]
    #[case(true, false, DigestState::Match, HealthClass::AtRisk)]
    #[case(false, true, DigestState::Unchecked, HealthClass::AtRisk)]
    #[case(true, false, DigestState::Mismatch, HealthClass::Failed)]
    #[case(false, true, DigestState::Mismatch, HealthClass::Failed)]
    #[case(false, false, DigestState::Unchecked, HealthClass::Failed)]
    #[case(false, false, DigestState::Match, HealthClass::Failed)]
    fn test_classify(
        #[case] local: bool,
        #[case] remote: bool,
        #[case] digest: DigestState,
        #[case] expected: HealthClass,
    ) {
        assert_eq!(classify(local, remote, digest), expected);
    }

    #[rstest]
    #[case(DocumentStatus::Stored, HealthClass::Healthy, DocumentStatus::Stored)]
    #[case(DocumentStatus::Recovered, HealthClass::Healthy, DocumentStatus::Recovered)]
    #[case(DocumentStatus::AtRisk, HealthClass::Healthy, DocumentStatus::Stored)]
    #[case(DocumentStatus::Missing, HealthClass::Healthy, DocumentStatus::Stored)]
    #[case(DocumentStatus::Stored, HealthClass::AtRisk, DocumentStatus::AtRisk)]
    #[case(DocumentStatus::Stored, HealthClass::Failed, DocumentStatus::Missing)]
    #[case(DocumentStatus::Unrecoverable, HealthClass::Failed, DocumentStatus::Unrecoverable)]
    fn test_reconciled_status(
        #[case] current: DocumentStatus,
        #[case] class: HealthClass,
        #[case] expected: DocumentStatus,
    ) {
        assert_eq!(reconciled_status(current, class), expected);
    }

    #[test]
    fn test_finding_prefers_corruption() {
        let snapshot = HealthSnapshot {
            document_id: "d".into(),
            owner_id: "o".into(),
            missing_local: false,
            missing_remote: true,
            checksum_mismatch: true,
            digest_checked: true,
            class: HealthClass::Failed,
            risk: HealthClass::Failed.risk(),
        };
        assert_eq!(
            finding(&snapshot),
            (RecoveryEventType::CorruptionDetected, "checksum_mismatch")
        );
    }
}
