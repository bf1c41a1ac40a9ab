//! Alert raising and notification fan-out
//!
//! Every alert is logged, persisted to the audit database (bounded by
//! `alerts.max_retained_alerts`), and pushed to registered notifiers when its
//! severity reaches `alerts.notify_min_severity`. A notifier that fails or
//! overruns `alerts.notify_timeout_seconds` is recorded and skipped.
//!
//! Upload failures are also counted in a rolling window. Crossing the
//! threshold raises one `upload_failure` alert, then the window cools down
//! for its own length before it can fire again.

use crate::error::{Result, VaultError};
use crate::infrastructure::config::AlertConfig;
use crate::models::{Alert, AlertSeverity, AlertType};
use crate::storage::audit_log::AuditLog;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Log,
    Chat,
    Email,
    Sms,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Log => "log",
            NotificationChannel::Chat => "chat",
            NotificationChannel::Email => "email",
            NotificationChannel::Sms => "sms",
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery target for high-severity alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> NotificationChannel;

    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Writes the alert to the structured log. Always registered.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Log
    }

    async fn notify(&self, alert: &Alert) -> Result<()> {
        error!(
            alert_id = %alert.id,
            alert_type = %alert.alert_type.as_str(),
            severity = %alert.severity,
            document_id = ?alert.document_id,
            message = %alert.message,
            "ALERT"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct FailureWindow {
    failures: VecDeque<Instant>,
    last_fired: Option<Instant>,
}

impl FailureWindow {
    /// Record one failure; returns the in-window count if the alert should fire.
    fn record(&mut self, now: Instant, window: Duration, threshold: usize) -> Option<usize> {
        self.failures.push_back(now);
        while let Some(oldest) = self.failures.front() {
            if now.duration_since(*oldest) > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }

        let count = self.failures.len();
        let cooled_down = self
            .last_fired
            .map_or(true, |fired| now.duration_since(fired) >= window);
        if count > threshold && cooled_down {
            self.last_fired = Some(now);
            Some(count)
        } else {
            None
        }
    }
}

pub struct AlertManager {
    audit: Arc<AuditLog>,
    config: AlertConfig,
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
    upload_failures: Mutex<FailureWindow>,
}

impl AlertManager {
    pub fn new(audit: Arc<AuditLog>, config: AlertConfig) -> Self {
        Self {
            audit,
            config,
            notifiers: RwLock::new(vec![Arc::new(LogNotifier)]),
            upload_failures: Mutex::new(FailureWindow::default()),
        }
    }

    fn channel_enabled(&self, channel: NotificationChannel) -> bool {
        match channel {
            NotificationChannel::Log => true,
            NotificationChannel::Chat => self.config.channels.chat,
            NotificationChannel::Email => self.config.channels.email,
            NotificationChannel::Sms => self.config.channels.sms,
        }
    }

    /// Returns false (and drops the notifier) when its channel is disabled.
    pub fn register_notifier(&self, notifier: Arc<dyn Notifier>) -> bool {
        let channel = notifier.channel();
        if !self.channel_enabled(channel) {
            warn!(channel = %channel, "Notifier channel disabled in config, not registering");
            return false;
        }
        self.notifiers.write().push(notifier);
        info!(channel = %channel, "Registered alert notifier");
        true
    }

    pub fn notifier_count(&self) -> usize {
        self.notifiers.read().len()
    }

    pub async fn raise(
        &self,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
        document_id: Option<&str>,
    ) -> Alert {
        let mut alert = Alert::new(alert_type, severity, message);
        if let Some(id) = document_id {
            alert = alert.for_document(id);
        }

        match severity {
            AlertSeverity::Low => info!(
                alert_id = %alert.id,
                alert_type = %alert_type.as_str(),
                document_id = ?alert.document_id,
                "{}",
                alert.message
            ),
            AlertSeverity::Medium => warn!(
                alert_id = %alert.id,
                alert_type = %alert_type.as_str(),
                document_id = ?alert.document_id,
                "{}",
                alert.message
            ),
            AlertSeverity::High | AlertSeverity::Critical => error!(
                alert_id = %alert.id,
                alert_type = %alert_type.as_str(),
                severity = %severity,
                document_id = ?alert.document_id,
                "{}",
                alert.message
            ),
        }

        if let Err(e) = self
            .audit
            .insert_alert(&alert, self.config.max_retained_alerts)
            .await
        {
            error!(alert_id = %alert.id, error = %e, "Failed to persist alert");
        }

        if severity >= self.config.notify_min_severity {
            self.dispatch(&alert).await;
        }

        alert
    }

    async fn dispatch(&self, alert: &Alert) {
        // Snapshot so the lock is not held across notifier awaits
        let notifiers: Vec<Arc<dyn Notifier>> = self.notifiers.read().clone();
        for notifier in notifiers {
            let channel = notifier.channel();
            let limit = self.config.notify_timeout();
            let delivery = tokio::time::timeout(limit, notifier.notify(alert))
                .await
                .unwrap_or_else(|_| {
                    Err(VaultError::Timeout(format!(
                        "{} notifier did not answer within {:?}",
                        channel, limit
                    )))
                });
            match delivery {
                Ok(()) => debug!(alert_id = %alert.id, channel = %channel, "Alert delivered"),
                Err(e) => {
                    error!(
                        alert_id = %alert.id,
                        channel = %channel,
                        error = %e,
                        "Alert delivery failed"
                    );
                    self.audit
                        .record_notification_failure(&alert.id, channel.as_str(), &e.to_string())
                        .await;
                }
            }
        }
    }

    /// Count one failed or degraded upload against the rolling window.
    pub async fn record_upload_failure(&self, document_id: &str, reason: &str) -> Option<Alert> {
        let window = self.config.upload_failure_window();
        let fired = self.upload_failures.lock().record(
            Instant::now(),
            window,
            self.config.upload_failure_threshold,
        );

        debug!(document_id = %document_id, reason = %reason, "Upload failure recorded");

        let count = fired?;
        Some(
            self.raise(
                AlertType::UploadFailure,
                AlertSeverity::High,
                format!(
                    "{} upload failures in the last {}s (latest: {} - {})",
                    count,
                    window.as_secs(),
                    document_id,
                    reason
                ),
                None,
            )
            .await,
        )
    }

    pub async fn resolve(&self, alert_id: &str) -> Result<bool> {
        let resolved = self.audit.resolve_alert(alert_id).await?;
        if resolved {
            info!(alert_id = %alert_id, "Alert resolved");
        }
        Ok(resolved)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Alert>> {
        self.audit.recent_alerts(limit).await
    }

    pub async fn unresolved(&self) -> Result<Vec<Alert>> {
        self.audit.unresolved_alerts().await
    }
}
