//! Append-only audit records
//!
//! Upload attempts and recovery events are written once and never edited.

use crate::error::VaultError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Outcome of one pass through the ingest pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadAttempt {
    pub document_id: String,
    pub timestamp: DateTime<Utc>,
    pub disk_write_succeeded: bool,
    pub remote_write_succeeded: bool,
    pub checksum_verified: bool,
    pub error_message: Option<String>,
    pub recovery_attempted_at: Option<DateTime<Utc>>,
}

impl UploadAttempt {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            timestamp: Utc::now(),
            disk_write_succeeded: false,
            remote_write_succeeded: false,
            checksum_verified: false,
            error_message: None,
            recovery_attempted_at: None,
        }
    }

    /// Fully successful on both tiers
    pub fn is_clean(&self) -> bool {
        self.disk_write_succeeded && self.checksum_verified && self.remote_write_succeeded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryEventType {
    MissingDetected,
    RecoveryInitiated,
    Recovered,
    RecoveryFailed,
    CorruptionDetected,
    /// Row removed by the confirmation-gated purge command
    Purged,
}

impl RecoveryEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryEventType::MissingDetected => "missing_detected",
            RecoveryEventType::RecoveryInitiated => "recovery_initiated",
            RecoveryEventType::Recovered => "recovered",
            RecoveryEventType::RecoveryFailed => "recovery_failed",
            RecoveryEventType::CorruptionDetected => "corruption_detected",
            RecoveryEventType::Purged => "purged",
        }
    }
}

impl fmt::Display for RecoveryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryEventType {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missing_detected" => Ok(RecoveryEventType::MissingDetected),
            "recovery_initiated" => Ok(RecoveryEventType::RecoveryInitiated),
            "recovered" => Ok(RecoveryEventType::Recovered),
            "recovery_failed" => Ok(RecoveryEventType::RecoveryFailed),
            "corruption_detected" => Ok(RecoveryEventType::CorruptionDetected),
            "purged" => Ok(RecoveryEventType::Purged),
            other => Err(VaultError::database_error(format!(
                "Unknown recovery event type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    System,
    Human,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::System => "system",
            Actor::Human => "human",
        }
    }
}

impl FromStr for Actor {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Actor::System),
            "human" => Ok(Actor::Human),
            other => Err(VaultError::database_error(format!("Unknown actor: {}", other))),
        }
    }
}

/// Record of an attempt to detect or reattach lost bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEvent {
    pub document_id: String,
    pub event_type: RecoveryEventType,
    pub strategy: Option<String>,
    pub original_path: Option<String>,
    pub resolved_path: Option<String>,
    /// Machine-readable reason; scans compare it to suppress repeats
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
}

impl RecoveryEvent {
    pub fn system(document_id: impl Into<String>, event_type: RecoveryEventType) -> Self {
        Self {
            document_id: document_id.into(),
            event_type,
            strategy: None,
            original_path: None,
            resolved_path: None,
            detail: None,
            timestamp: Utc::now(),
            actor: Actor::System,
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_paths(mut self, original: Option<String>, resolved: Option<String>) -> Self {
        self.original_path = original;
        self.resolved_path = resolved;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn by(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }
}

/// Unified view over both append-only logs, newest first when listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    UploadAttempt(UploadAttempt),
    RecoveryEvent(RecoveryEvent),
}

impl AuditRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AuditRecord::UploadAttempt(a) => a.timestamp,
            AuditRecord::RecoveryEvent(e) => e.timestamp,
        }
    }

    pub fn document_id(&self) -> &str {
        match self {
            AuditRecord::UploadAttempt(a) => &a.document_id,
            AuditRecord::RecoveryEvent(e) => &e.document_id,
        }
    }

    /// Action label used by `summarize()`
    pub fn action(&self) -> &'static str {
        match self {
            AuditRecord::UploadAttempt(a) if a.is_clean() => "upload_succeeded",
            AuditRecord::UploadAttempt(a) if a.checksum_verified => "upload_degraded",
            AuditRecord::UploadAttempt(_) => "upload_failed",
            AuditRecord::RecoveryEvent(e) => e.event_type.as_str(),
        }
    }
}

/// Counts for operational dashboards
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub by_action: BTreeMap<String, u64>,
    pub alerts_by_severity: BTreeMap<String, u64>,
    pub unresolved_alerts: u64,
}
