//! Append-only audit log
//!
//! Stored in `<root>/audit.db`, separate from the catalog so a corrupted
//! catalog never takes the history with it.
//!
//! ## Tables
//!
//! - `upload_attempts`: one row per pass through the ingest pipeline
//! - `recovery_events`: detection and recovery history
//! - `alerts`: raised alerts (the only table with a mutable column, `resolved`)
//! - `notification_failures`: failed notifier deliveries
//!
//! Attempt and event rows reject UPDATE at the schema level. Retention is
//! enforced at write time by trimming the oldest rows past the configured cap.
//!
//! The `append_*` methods never return an error: a failed audit write is
//! logged and swallowed so it cannot fail the caller's operation.

use crate::error::{Result, VaultError};
use crate::infrastructure::config::AuditConfig;
use crate::models::{
    Actor, Alert, AlertSeverity, AlertType, AuditRecord, AuditSummary, RecoveryEvent,
    RecoveryEventType, UploadAttempt,
};
use crate::storage::sqlite::{connect, from_millis, to_millis};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, error, info};

pub const AUDIT_DB_FILE: &str = "audit.db";

/// Failed delivery of an alert to one notifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationFailure {
    pub alert_id: String,
    pub channel: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

pub struct AuditLog {
    pool: SqlitePool,
    config: AuditConfig,
}

impl AuditLog {
    pub async fn open(root: &Path, config: AuditConfig) -> Result<Self> {
        let db_path = root.join(AUDIT_DB_FILE);
        info!(path = %db_path.display(), "Initializing audit log");

        let pool = connect(&db_path, 4).await?;
        Self::init_schema(&pool).await?;
        Ok(Self { pool, config })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS upload_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                disk_write_succeeded INTEGER NOT NULL,
                remote_write_succeeded INTEGER NOT NULL,
                checksum_verified INTEGER NOT NULL,
                error_message TEXT,
                recovery_attempted_at INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS recovery_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                strategy TEXT,
                original_path TEXT,
                resolved_path TEXT,
                detail TEXT,
                timestamp INTEGER NOT NULL,
                actor TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                message TEXT NOT NULL,
                document_id TEXT,
                resolved INTEGER NOT NULL DEFAULT 0,
                timestamp INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS notification_failures (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                alert_id TEXT NOT NULL,
                channel TEXT NOT NULL,
                error TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_upload_attempts_document ON upload_attempts(document_id)",
            "CREATE INDEX IF NOT EXISTS idx_recovery_events_document ON recovery_events(document_id)",
            r#"
            CREATE TRIGGER IF NOT EXISTS upload_attempts_append_only
            BEFORE UPDATE ON upload_attempts
            BEGIN
                SELECT RAISE(ABORT, 'upload_attempts is append-only');
            END
            "#,
            r#"
            CREATE TRIGGER IF NOT EXISTS recovery_events_append_only
            BEFORE UPDATE ON recovery_events
            BEGIN
                SELECT RAISE(ABORT, 'recovery_events is append-only');
            END
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(pool).await.map_err(|e| {
                VaultError::database_error(format!("Failed to initialize audit schema: {}", e))
            })?;
        }

        debug!("Audit schema ready");
        Ok(())
    }

    /// Keep only the newest `max_rows` rows of `table` (ordered by `key`).
    async fn enforce_retention(&self, table: &str, key: &str, max_rows: usize) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {table} WHERE {key} <= (SELECT {key} FROM {table} ORDER BY {key} DESC LIMIT 1 OFFSET ?)"
        );
        let deleted = sqlx::query(&sql)
            .bind(max_rows as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to trim {}: {}", table, e)))?
            .rows_affected();

        if deleted > 0 {
            debug!(table = table, deleted = deleted, "Trimmed audit rows past retention");
        }
        Ok(deleted)
    }

    // ========== upload attempts ==========

    async fn try_append_upload_attempt(&self, attempt: &UploadAttempt) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO upload_attempts (
                document_id, timestamp, disk_write_succeeded, remote_write_succeeded,
                checksum_verified, error_message, recovery_attempted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attempt.document_id)
        .bind(to_millis(attempt.timestamp))
        .bind(attempt.disk_write_succeeded)
        .bind(attempt.remote_write_succeeded)
        .bind(attempt.checksum_verified)
        .bind(&attempt.error_message)
        .bind(attempt.recovery_attempted_at.map(to_millis))
        .execute(&self.pool)
        .await
        .map_err(|e| VaultError::database_error(format!("Failed to append upload attempt: {}", e)))?;

        self.enforce_retention("upload_attempts", "id", self.config.max_upload_attempts)
            .await?;
        Ok(())
    }

    pub async fn append_upload_attempt(&self, attempt: &UploadAttempt) {
        if let Err(e) = self.try_append_upload_attempt(attempt).await {
            error!(
                document_id = %attempt.document_id,
                error = %e,
                "Failed to write upload attempt to audit log"
            );
        }
    }

    fn row_to_attempt(row: &SqliteRow) -> UploadAttempt {
        let recovery_attempted_at: Option<i64> = row.get("recovery_attempted_at");
        UploadAttempt {
            document_id: row.get("document_id"),
            timestamp: from_millis(row.get("timestamp")),
            disk_write_succeeded: row.get("disk_write_succeeded"),
            remote_write_succeeded: row.get("remote_write_succeeded"),
            checksum_verified: row.get("checksum_verified"),
            error_message: row.get("error_message"),
            recovery_attempted_at: recovery_attempted_at.map(from_millis),
        }
    }

    pub async fn upload_attempts_for(&self, document_id: &str) -> Result<Vec<UploadAttempt>> {
        let rows = sqlx::query("SELECT * FROM upload_attempts WHERE document_id = ? ORDER BY id DESC")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to query upload attempts: {}", e)))?;
        Ok(rows.iter().map(Self::row_to_attempt).collect())
    }

    pub async fn count_upload_attempts(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM upload_attempts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to count upload attempts: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    // ========== recovery events ==========

    async fn try_append_recovery_event(&self, event: &RecoveryEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recovery_events (
                document_id, event_type, strategy, original_path,
                resolved_path, detail, timestamp, actor
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.document_id)
        .bind(event.event_type.as_str())
        .bind(&event.strategy)
        .bind(&event.original_path)
        .bind(&event.resolved_path)
        .bind(&event.detail)
        .bind(to_millis(event.timestamp))
        .bind(event.actor.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| VaultError::database_error(format!("Failed to append recovery event: {}", e)))?;

        self.enforce_retention("recovery_events", "id", self.config.max_recovery_events)
            .await?;
        Ok(())
    }

    pub async fn append_recovery_event(&self, event: &RecoveryEvent) {
        if let Err(e) = self.try_append_recovery_event(event).await {
            error!(
                document_id = %event.document_id,
                event_type = %event.event_type.as_str(),
                error = %e,
                "Failed to write recovery event to audit log"
            );
        }
    }

    fn row_to_event(row: &SqliteRow) -> Result<RecoveryEvent> {
        let event_type: String = row.get("event_type");
        let actor: String = row.get("actor");
        Ok(RecoveryEvent {
            document_id: row.get("document_id"),
            event_type: event_type.parse::<RecoveryEventType>()?,
            strategy: row.get("strategy"),
            original_path: row.get("original_path"),
            resolved_path: row.get("resolved_path"),
            detail: row.get("detail"),
            timestamp: from_millis(row.get("timestamp")),
            actor: actor.parse::<Actor>()?,
        })
    }

    pub async fn recovery_events_for(&self, document_id: &str) -> Result<Vec<RecoveryEvent>> {
        let rows = sqlx::query("SELECT * FROM recovery_events WHERE document_id = ? ORDER BY id DESC")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to query recovery events: {}", e)))?;
        rows.iter().map(Self::row_to_event).collect()
    }

    /// Most recent event for a document, used to suppress repeat findings.
    pub async fn latest_recovery_event(&self, document_id: &str) -> Result<Option<RecoveryEvent>> {
        let row = sqlx::query(
            "SELECT * FROM recovery_events WHERE document_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| VaultError::database_error(format!("Failed to query recovery events: {}", e)))?;
        row.as_ref().map(Self::row_to_event).transpose()
    }

    pub async fn count_recovery_events(
        &self,
        document_id: &str,
        event_type: RecoveryEventType,
    ) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM recovery_events WHERE document_id = ? AND event_type = ?",
        )
        .bind(document_id)
        .bind(event_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| VaultError::database_error(format!("Failed to count recovery events: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    // ========== unified reads ==========

    fn merge_newest_first(
        attempts: Vec<UploadAttempt>,
        events: Vec<RecoveryEvent>,
        limit: Option<usize>,
    ) -> Vec<AuditRecord> {
        let mut records: Vec<AuditRecord> = attempts
            .into_iter()
            .map(AuditRecord::UploadAttempt)
            .chain(events.into_iter().map(AuditRecord::RecoveryEvent))
            .collect();
        records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        records
    }

    /// The `limit` newest records across both logs.
    pub async fn get_recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let attempt_rows = sqlx::query("SELECT * FROM upload_attempts ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to query upload attempts: {}", e)))?;
        let event_rows = sqlx::query("SELECT * FROM recovery_events ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to query recovery events: {}", e)))?;

        let attempts = attempt_rows.iter().map(Self::row_to_attempt).collect();
        let events = event_rows
            .iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::merge_newest_first(attempts, events, Some(limit)))
    }

    /// Full history of one document, newest first.
    pub async fn get_by_document(&self, document_id: &str) -> Result<Vec<AuditRecord>> {
        let attempts = self.upload_attempts_for(document_id).await?;
        let events = self.recovery_events_for(document_id).await?;
        Ok(Self::merge_newest_first(attempts, events, None))
    }

    pub async fn summarize(&self) -> Result<AuditSummary> {
        let mut summary = AuditSummary::default();

        let attempt_rows = sqlx::query(
            r#"
            SELECT disk_write_succeeded, remote_write_succeeded, checksum_verified, COUNT(*) AS n
            FROM upload_attempts
            GROUP BY disk_write_succeeded, remote_write_succeeded, checksum_verified
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| VaultError::database_error(format!("Failed to summarize uploads: {}", e)))?;

        for row in attempt_rows {
            let mut attempt = UploadAttempt::new("");
            attempt.disk_write_succeeded = row.get("disk_write_succeeded");
            attempt.remote_write_succeeded = row.get("remote_write_succeeded");
            attempt.checksum_verified = row.get("checksum_verified");
            let n: i64 = row.get("n");
            let action = AuditRecord::UploadAttempt(attempt).action();
            *summary.by_action.entry(action.to_string()).or_default() += n.max(0) as u64;
        }

        let event_rows =
            sqlx::query("SELECT event_type, COUNT(*) AS n FROM recovery_events GROUP BY event_type")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| VaultError::database_error(format!("Failed to summarize events: {}", e)))?;
        for row in event_rows {
            let n: i64 = row.get("n");
            *summary
                .by_action
                .entry(row.get::<String, _>("event_type"))
                .or_default() += n.max(0) as u64;
        }

        let alert_rows = sqlx::query("SELECT severity, COUNT(*) AS n FROM alerts GROUP BY severity")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to summarize alerts: {}", e)))?;
        for row in alert_rows {
            let n: i64 = row.get("n");
            summary
                .alerts_by_severity
                .insert(row.get::<String, _>("severity"), n.max(0) as u64);
        }

        let unresolved: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE resolved = 0")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to count alerts: {}", e)))?;
        summary.unresolved_alerts = unresolved.max(0) as u64;

        Ok(summary)
    }

    // ========== alerts ==========

    pub async fn insert_alert(&self, alert: &Alert, max_retained: usize) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, alert_type, severity, message, document_id, resolved, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&alert.id)
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(&alert.document_id)
        .bind(alert.resolved)
        .bind(to_millis(alert.timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| VaultError::database_error(format!("Failed to insert alert: {}", e)))?;

        self.enforce_retention("alerts", "seq", max_retained).await?;
        Ok(())
    }

    fn row_to_alert(row: &SqliteRow) -> Result<Alert> {
        let alert_type: String = row.get("alert_type");
        let severity: String = row.get("severity");
        Ok(Alert {
            id: row.get("id"),
            alert_type: alert_type.parse::<AlertType>()?,
            severity: severity.parse::<AlertSeverity>()?,
            message: row.get("message"),
            document_id: row.get("document_id"),
            resolved: row.get("resolved"),
            timestamp: from_millis(row.get("timestamp")),
        })
    }

    pub async fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>> {
        let rows = sqlx::query("SELECT * FROM alerts ORDER BY seq DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to query alerts: {}", e)))?;
        rows.iter().map(Self::row_to_alert).collect()
    }

    pub async fn unresolved_alerts(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query("SELECT * FROM alerts WHERE resolved = 0 ORDER BY seq DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to query alerts: {}", e)))?;
        rows.iter().map(Self::row_to_alert).collect()
    }

    pub async fn count_alerts(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alerts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to count alerts: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    /// Returns false when no unresolved alert has that id.
    pub async fn resolve_alert(&self, alert_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE alerts SET resolved = 1 WHERE id = ? AND resolved = 0")
            .bind(alert_id)
            .execute(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to resolve alert: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }

    // ========== notification failures ==========

    pub async fn record_notification_failure(&self, alert_id: &str, channel: &str, error_text: &str) {
        let result = sqlx::query(
            "INSERT INTO notification_failures (alert_id, channel, error, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(alert_id)
        .bind(channel)
        .bind(error_text)
        .bind(to_millis(Utc::now()))
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(
                alert_id = %alert_id,
                channel = %channel,
                error = %e,
                "Failed to record notification failure"
            );
        }
    }

    pub async fn notification_failures(&self) -> Result<Vec<NotificationFailure>> {
        let rows = sqlx::query("SELECT * FROM notification_failures ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                VaultError::database_error(format!("Failed to query notification failures: {}", e))
            })?;
        Ok(rows
            .iter()
            .map(|r| NotificationFailure {
                alert_id: r.get("alert_id"),
                channel: r.get("channel"),
                error: r.get("error"),
                timestamp: from_millis(r.get("timestamp")),
            })
            .collect())
    }

    #[cfg(test)]
    pub(crate) async fn try_rewrite_first_event(&self) -> Result<()> {
        sqlx::query("UPDATE recovery_events SET detail = 'rewritten' WHERE id = (SELECT MIN(id) FROM recovery_events)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_log(max_rows: usize) -> (AuditLog, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log = AuditLog::open(
            temp_dir.path(),
            AuditConfig {
                max_upload_attempts: max_rows,
                max_recovery_events: max_rows,
            },
        )
        .await
        .unwrap();
        (log, temp_dir)
    }

    #[tokio::test]
    async fn test_append_and_query_by_document() {
        let (log, _dir) = create_test_log(100).await;

        let mut attempt = UploadAttempt::new("doc-1");
        attempt.disk_write_succeeded = true;
        attempt.checksum_verified = true;
        log.append_upload_attempt(&attempt).await;

        let event = RecoveryEvent::system("doc-1", RecoveryEventType::MissingDetected)
            .with_strategy("health_scan")
            .with_detail("missing_local");
        log.append_recovery_event(&event).await;
        log.append_recovery_event(&RecoveryEvent::system(
            "doc-2",
            RecoveryEventType::RecoveryInitiated,
        ))
        .await;

        let history = log.get_by_document("doc-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.document_id() == "doc-1"));

        let latest = log.latest_recovery_event("doc-1").await.unwrap().unwrap();
        assert_eq!(latest.event_type, RecoveryEventType::MissingDetected);
        assert_eq!(latest.detail.as_deref(), Some("missing_local"));
        assert_eq!(latest.actor, Actor::System);
    }

    #[tokio::test]
    async fn test_recovery_events_reject_updates() {
        let (log, _dir) = create_test_log(100).await;
        log.append_recovery_event(
            &RecoveryEvent::system("doc-1", RecoveryEventType::Recovered).with_detail("original"),
        )
        .await;

        assert!(log.try_rewrite_first_event().await.is_err());
        let latest = log.latest_recovery_event("doc-1").await.unwrap().unwrap();
        assert_eq!(latest.detail.as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn test_retention_trims_oldest() {
        let (log, _dir) = create_test_log(3).await;
        for i in 0..5 {
            log.append_upload_attempt(&UploadAttempt::new(format!("doc-{}", i)))
                .await;
        }
        assert_eq!(log.count_upload_attempts().await.unwrap(), 3);
        assert!(log.upload_attempts_for("doc-0").await.unwrap().is_empty());
        assert_eq!(log.upload_attempts_for("doc-4").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_recent_is_bounded() {
        let (log, _dir) = create_test_log(100).await;
        for i in 0..4 {
            log.append_upload_attempt(&UploadAttempt::new(format!("doc-{}", i)))
                .await;
            log.append_recovery_event(&RecoveryEvent::system(
                format!("doc-{}", i),
                RecoveryEventType::MissingDetected,
            ))
            .await;
        }
        assert_eq!(log.get_recent(5).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_summarize() {
        let (log, _dir) = create_test_log(100).await;

        let mut clean = UploadAttempt::new("a");
        clean.disk_write_succeeded = true;
        clean.checksum_verified = true;
        clean.remote_write_succeeded = true;
        log.append_upload_attempt(&clean).await;
        log.append_upload_attempt(&clean).await;
        log.append_upload_attempt(&UploadAttempt::new("b")).await;
        log.append_recovery_event(&RecoveryEvent::system("a", RecoveryEventType::Recovered))
            .await;

        let alert = Alert::new(AlertType::DataLoss, AlertSeverity::Critical, "gone");
        log.insert_alert(&alert, 10).await.unwrap();

        let summary = log.summarize().await.unwrap();
        assert_eq!(summary.by_action.get("upload_succeeded"), Some(&2));
        assert_eq!(summary.by_action.get("upload_failed"), Some(&1));
        assert_eq!(summary.by_action.get("recovered"), Some(&1));
        assert_eq!(summary.alerts_by_severity.get("critical"), Some(&1));
        assert_eq!(summary.unresolved_alerts, 1);
    }

    #[tokio::test]
    async fn test_alert_retention_and_resolve() {
        let (log, _dir) = create_test_log(100).await;
        let mut ids = Vec::new();
        for i in 0..4 {
            let alert = Alert::new(
                AlertType::UploadFailure,
                AlertSeverity::Medium,
                format!("alert {}", i),
            );
            ids.push(alert.id.clone());
            log.insert_alert(&alert, 2).await.unwrap();
        }
        assert_eq!(log.count_alerts().await.unwrap(), 2);

        let recent = log.recent_alerts(10).await.unwrap();
        assert_eq!(recent[0].id, ids[3]);

        assert!(log.resolve_alert(&ids[3]).await.unwrap());
        assert!(!log.resolve_alert(&ids[3]).await.unwrap());
        assert_eq!(log.unresolved_alerts().await.unwrap().len(), 1);
    }
}
