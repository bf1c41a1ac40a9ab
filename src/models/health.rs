//! Health scan results
//!
//! Snapshots are ephemeral: they are produced per scan and only survive
//! aggregated into a [`HealthReport`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the digest comparison for one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestState {
    Match,
    Mismatch,
    /// Not due for a deep check this pass, or no readable copy
    Unchecked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthClass {
    Healthy,
    AtRisk,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl HealthClass {
    pub fn risk(&self) -> RiskLevel {
        match self {
            HealthClass::Healthy => RiskLevel::Low,
            HealthClass::AtRisk => RiskLevel::Medium,
            HealthClass::Failed => RiskLevel::High,
        }
    }
}

/// Per-document scan result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub document_id: String,
    pub owner_id: String,
    pub missing_local: bool,
    pub missing_remote: bool,
    pub checksum_mismatch: bool,
    pub digest_checked: bool,
    pub class: HealthClass,
    pub risk: RiskLevel,
}

/// Aggregated scan output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub total: usize,
    pub healthy: usize,
    pub at_risk: usize,
    pub failed: usize,
    pub per_document: Vec<HealthSnapshot>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn from_snapshots(
        per_document: Vec<HealthSnapshot>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let count = |class: HealthClass| per_document.iter().filter(|s| s.class == class).count();
        Self {
            total: per_document.len(),
            healthy: count(HealthClass::Healthy),
            at_risk: count(HealthClass::AtRisk),
            failed: count(HealthClass::Failed),
            per_document,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn snapshot(&self, document_id: &str) -> Option<&HealthSnapshot> {
        self.per_document
            .iter()
            .find(|s| s.document_id == document_id)
    }
}
