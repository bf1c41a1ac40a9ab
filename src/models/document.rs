//! Catalog entry and related document types
//!
//! A catalog entry is the canonical record of one stored document: its
//! identity, where its bytes live in each tier, and its verification state.

use crate::error::VaultError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Imported without verified bytes yet; excluded from health scans
    Pending,
    /// Verified locally and written to the remote tier
    Stored,
    /// Present in only one tier, or failing checksum verification
    AtRisk,
    /// Absent from both tiers
    Missing,
    /// Bytes reattached by the recovery engine
    Recovered,
    /// Recovery chain exhausted; needs a human
    Unrecoverable,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Stored => "stored",
            DocumentStatus::AtRisk => "at_risk",
            DocumentStatus::Missing => "missing",
            DocumentStatus::Recovered => "recovered",
            DocumentStatus::Unrecoverable => "unrecoverable",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "stored" => Ok(DocumentStatus::Stored),
            "at_risk" => Ok(DocumentStatus::AtRisk),
            "missing" => Ok(DocumentStatus::Missing),
            "recovered" => Ok(DocumentStatus::Recovered),
            "unrecoverable" => Ok(DocumentStatus::Unrecoverable),
            other => Err(VaultError::database_error(format!(
                "Unknown document status: {}",
                other
            ))),
        }
    }
}

/// One row of the document catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Opaque id minted once per upload (UUID v4), never content-addressed
    pub id: String,
    pub owner_id: String,
    /// Display name as uploaded; survives every path change
    pub file_name: String,
    pub size_bytes: u64,
    pub type_tag: String,
    /// Hex SHA-256 baseline. Set once at ingest, never overwritten.
    pub digest: Option<String>,
    pub local_path: Option<String>,
    /// Only set when the remote write succeeded
    pub remote_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub status: DocumentStatus,
}

impl CatalogEntry {
    /// Whether a deep digest check is due given the configured cadence.
    pub fn deep_check_due(&self, now: DateTime<Utc>, cadence: chrono::Duration) -> bool {
        match self.last_verified_at {
            None => true,
            Some(verified) => now - verified >= cadence,
        }
    }
}

/// Handle returned to callers after a successful `store()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: String,
    pub digest: String,
    pub size_bytes: u64,
    pub status: DocumentStatus,
    pub local_path: Option<String>,
    pub remote_key: Option<String>,
}

impl DocumentRef {
    pub fn from_entry(entry: &CatalogEntry) -> Self {
        Self {
            document_id: entry.id.clone(),
            digest: entry.digest.clone().unwrap_or_default(),
            size_bytes: entry.size_bytes,
            status: entry.status,
            local_path: entry.local_path.clone(),
            remote_key: entry.remote_key.clone(),
        }
    }
}
