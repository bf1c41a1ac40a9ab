//! Catalog vs. storage reconciliation
//!
//! Cross-checks catalog rows against what each tier actually holds:
//! - cataloged remote keys absent from the bucket
//! - bucket keys no row references
//! - rows that never got a remote key
//! - local paths absent from disk, and local files no row references
//!
//! Purely diagnostic. Nothing is modified, and membership is resolved with
//! hash sets so large catalogs stay linear.

use crate::error::Result;
use crate::models::CatalogEntry;
use crate::storage::catalog::CatalogStore;
use crate::storage::tier::SharedTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Reconciliation report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub total_entries: usize,
    /// Document ids whose remote key is not in the bucket
    pub missing_in_remote: Vec<String>,
    /// Bucket keys with no catalog row
    pub orphaned_in_remote: Vec<String>,
    /// Document ids cataloged without a remote key
    pub missing_storage_keys: Vec<String>,
    /// Document ids whose local file is gone (or never recorded)
    pub missing_local: Vec<String>,
    /// Local files with no catalog row
    pub orphaned_local: Vec<String>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_in_remote.is_empty()
            && self.orphaned_in_remote.is_empty()
            && self.missing_storage_keys.is_empty()
            && self.missing_local.is_empty()
            && self.orphaned_local.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.missing_in_remote.len()
            + self.orphaned_in_remote.len()
            + self.missing_storage_keys.len()
            + self.missing_local.len()
            + self.orphaned_local.len()
    }
}

fn recommendations(report: &ReconciliationReport) -> Vec<String> {
    let mut out = Vec::new();
    if !report.missing_in_remote.is_empty() || !report.missing_storage_keys.is_empty() {
        out.push(format!(
            "{} document(s) have no remote copy; re-upload from the local tier or run recovery",
            report.missing_in_remote.len() + report.missing_storage_keys.len()
        ));
    }
    if !report.missing_local.is_empty() {
        out.push(format!(
            "{} document(s) are missing locally; run recovery for them",
            report.missing_local.len()
        ));
    }
    if !report.orphaned_in_remote.is_empty() {
        out.push(format!(
            "{} remote object(s) have no catalog row; review before deleting",
            report.orphaned_in_remote.len()
        ));
    }
    if !report.orphaned_local.is_empty() {
        out.push(format!(
            "{} local file(s) have no catalog row; move them to the orphan area so recovery can match them",
            report.orphaned_local.len()
        ));
    }
    if out.is_empty() {
        out.push("Catalog and storage are consistent".to_string());
    }
    out
}

pub struct IntegrityAuditor {
    catalog: Arc<CatalogStore>,
    local: SharedTier,
    remote: SharedTier,
}

impl IntegrityAuditor {
    pub fn new(catalog: Arc<CatalogStore>, local: SharedTier, remote: SharedTier) -> Self {
        Self {
            catalog,
            local,
            remote,
        }
    }

    /// Fails only when a tier listing or the catalog cannot be read.
    pub async fn reconcile(&self) -> Result<ReconciliationReport> {
        let entries = self.catalog.list_all().await?;
        let remote_keys: HashSet<String> = self.remote.list_locations().await?.into_iter().collect();
        let local_paths: HashSet<String> = self.local.list_locations().await?.into_iter().collect();

        let mut report = compare(&entries, &remote_keys, &local_paths);
        report.recommendations = recommendations(&report);

        info!(
            total_entries = report.total_entries,
            missing_in_remote = report.missing_in_remote.len(),
            orphaned_in_remote = report.orphaned_in_remote.len(),
            missing_storage_keys = report.missing_storage_keys.len(),
            missing_local = report.missing_local.len(),
            orphaned_local = report.orphaned_local.len(),
            "Reconciliation finished"
        );
        Ok(report)
    }
}

fn compare(
    entries: &[CatalogEntry],
    remote_keys: &HashSet<String>,
    local_paths: &HashSet<String>,
) -> ReconciliationReport {
    let mut missing_in_remote = Vec::new();
    let mut missing_storage_keys = Vec::new();
    let mut missing_local = Vec::new();
    let mut cataloged_keys: HashSet<&str> = HashSet::with_capacity(entries.len());
    let mut cataloged_paths: HashSet<&str> = HashSet::with_capacity(entries.len());

    for entry in entries {
        match entry.remote_key.as_deref() {
            Some(key) => {
                cataloged_keys.insert(key);
                if !remote_keys.contains(key) {
                    missing_in_remote.push(entry.id.clone());
                }
            }
            None => missing_storage_keys.push(entry.id.clone()),
        }

        match entry.local_path.as_deref() {
            Some(path) => {
                cataloged_paths.insert(path);
                if !local_paths.contains(path) {
                    missing_local.push(entry.id.clone());
                }
            }
            None => missing_local.push(entry.id.clone()),
        }
    }

    let mut orphaned_in_remote: Vec<String> = remote_keys
        .iter()
        .filter(|key| !cataloged_keys.contains(key.as_str()))
        .cloned()
        .collect();
    orphaned_in_remote.sort();

    let mut orphaned_local: Vec<String> = local_paths
        .iter()
        .filter(|path| !cataloged_paths.contains(path.as_str()))
        .cloned()
        .collect();
    orphaned_local.sort();

    ReconciliationReport {
        total_entries: entries.len(),
        missing_in_remote,
        orphaned_in_remote,
        missing_storage_keys,
        missing_local,
        orphaned_local,
        recommendations: Vec::new(),
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus;

    fn entry(id: &str, remote: Option<&str>, local: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            id: id.into(),
            owner_id: "o".into(),
            file_name: "f.pdf".into(),
            size_bytes: 1,
            type_tag: "pdf".into(),
            digest: Some("00".repeat(32)),
            local_path: local.map(str::to_string),
            remote_key: remote.map(str::to_string),
            created_at: Utc::now(),
            last_verified_at: None,
            status: DocumentStatus::Stored,
        }
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compare_finds_every_discrepancy() {
        let entries = vec![
            entry("a", Some("p/o/a"), Some("/l/a")),
            entry("b", Some("p/o/b"), Some("/l/b")),
            entry("c", None, Some("/l/c")),
            entry("d", Some("p/o/d"), None),
        ];
        let remote = set(&["p/o/a", "p/o/d", "p/o/stray"]);
        let local = set(&["/l/a", "/l/c", "/l/stray"]);

        let report = compare(&entries, &remote, &local);
        assert_eq!(report.total_entries, 4);
        assert_eq!(report.missing_in_remote, vec!["b"]);
        assert_eq!(report.orphaned_in_remote, vec!["p/o/stray"]);
        assert_eq!(report.missing_storage_keys, vec!["c"]);
        assert_eq!(report.missing_local, vec!["b", "d"]);
        assert_eq!(report.orphaned_local, vec!["/l/stray"]);
        assert_eq!(report.issue_count(), 6);
        assert!(!report.is_consistent());
    }

    #[test]
    fn test_consistent_catalog_gets_single_recommendation() {
        let entries = vec![entry("a", Some("k/a"), Some("/l/a"))];
        let mut report = compare(&entries, &set(&["k/a"]), &set(&["/l/a"]));
        report.recommendations = recommendations(&report);
        assert!(report.is_consistent());
        assert_eq!(report.recommendations.len(), 1);
    }
}
