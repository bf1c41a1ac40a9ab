//! Candidate search strategies
//!
//! A strategy only *proposes* files. It reads directory listings and file
//! sizes, never contents, and never writes. The engine verifies every
//! candidate against the baseline digest before touching the catalog.

use crate::models::CatalogEntry;
use crate::recovery::fuzzy::similarity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Canonical copy was already present and valid; nothing to do
    AlreadyIntact,
    OrphanScan,
    AlternateLocationScan,
    BackupLocationScan,
    /// Local copy rebuilt from the verified remote object
    RemoteTier,
    /// Local copy intact; remote object written again
    RemoteReupload,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::AlreadyIntact => "already_intact",
            StrategyKind::OrphanScan => "orphan_scan",
            StrategyKind::AlternateLocationScan => "alternate_location_scan",
            StrategyKind::BackupLocationScan => "backup_location_scan",
            StrategyKind::RemoteTier => "remote_tier",
            StrategyKind::RemoteReupload => "remote_reupload",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Candidate files for `entry`, most likely first.
    async fn candidates(&self, entry: &CatalogEntry) -> Vec<PathBuf>;
}

/// Size check without reading contents; unknown sizes pass.
fn size_matches(path: &Path, expected: u64) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() == expected,
        Err(_) => false,
    }
}

async fn blocking<T, F>(label: &'static str, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: FnOnce() -> Vec<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(found) => found,
        Err(e) => {
            warn!(strategy = label, error = %e, "Candidate scan task failed");
            Vec::new()
        }
    }
}

/// Holding area for bytes that lost their catalog row.
///
/// Exact id matches come first, then names at or above the similarity
/// threshold, best score first.
pub struct OrphanScan {
    dir: PathBuf,
    threshold: f64,
}

impl OrphanScan {
    pub fn new(dir: PathBuf, threshold: f64) -> Self {
        Self { dir, threshold }
    }
}

#[async_trait]
impl RecoveryStrategy for OrphanScan {
    fn kind(&self) -> StrategyKind {
        StrategyKind::OrphanScan
    }

    async fn candidates(&self, entry: &CatalogEntry) -> Vec<PathBuf> {
        let dir = self.dir.clone();
        let threshold = self.threshold;
        let id = entry.id.clone();
        let file_name = entry.file_name.clone();
        let size = entry.size_bytes;

        blocking("orphan_scan", move || {
            if !dir.is_dir() {
                return Vec::new();
            }
            let mut exact = Vec::new();
            let mut scored: Vec<(f64, PathBuf)> = Vec::new();

            for item in WalkDir::new(&dir).max_depth(2).into_iter().filter_map(|e| e.ok()) {
                if !item.file_type().is_file() {
                    continue;
                }
                let name = item.file_name().to_string_lossy();
                let path = item.path().to_path_buf();
                if name == id.as_str() || name.starts_with(&format!("{}_", id)) {
                    exact.push(path);
                    continue;
                }
                if !size_matches(&path, size) {
                    continue;
                }
                let score = similarity(&name, &file_name);
                if score >= threshold {
                    scored.push((score, path));
                }
            }

            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            exact.extend(scored.into_iter().map(|(_, p)| p));
            exact
        })
        .await
    }
}

/// Fixed, known layouts under each alternate root.
pub struct AlternateLocationScan {
    roots: Vec<PathBuf>,
}

impl AlternateLocationScan {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Every path this strategy would look at, in order.
    pub fn layouts(root: &Path, entry: &CatalogEntry) -> Vec<PathBuf> {
        let owner = sanitize_filename::sanitize(&entry.owner_id);
        let file_name = sanitize_filename::sanitize(&entry.file_name);
        let id = &entry.id;

        let mut paths = Vec::with_capacity(5);
        if !owner.is_empty() {
            let owner_dir = root.join(&owner);
            if !file_name.is_empty() {
                paths.push(owner_dir.join(&file_name));
            }
            paths.push(owner_dir.join(id));
            if !file_name.is_empty() {
                paths.push(owner_dir.join(format!("{}_{}", id, file_name)));
            }
        }
        if !file_name.is_empty() {
            paths.push(root.join(&file_name));
        }
        paths.push(root.join(id));
        paths
    }
}

#[async_trait]
impl RecoveryStrategy for AlternateLocationScan {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AlternateLocationScan
    }

    async fn candidates(&self, entry: &CatalogEntry) -> Vec<PathBuf> {
        let probes: Vec<PathBuf> = self
            .roots
            .iter()
            .flat_map(|root| Self::layouts(root, entry))
            .collect();
        let size = entry.size_bytes;

        blocking("alternate_location_scan", move || {
            probes
                .into_iter()
                .filter(|path| size_matches(path, size))
                .collect()
        })
        .await
    }
}

/// Bounded-depth walk of backup roots for an exact id or file name.
pub struct BackupLocationScan {
    roots: Vec<PathBuf>,
    max_depth: usize,
}

impl BackupLocationScan {
    pub fn new(roots: Vec<PathBuf>, max_depth: usize) -> Self {
        Self { roots, max_depth }
    }
}

#[async_trait]
impl RecoveryStrategy for BackupLocationScan {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BackupLocationScan
    }

    async fn candidates(&self, entry: &CatalogEntry) -> Vec<PathBuf> {
        let roots = self.roots.clone();
        let max_depth = self.max_depth;
        let id = entry.id.clone();
        let file_name = entry.file_name.clone();
        let size = entry.size_bytes;

        blocking("backup_location_scan", move || {
            let mut found = Vec::new();
            for root in roots.iter().filter(|r| r.is_dir()) {
                let mut visited = 0usize;
                for item in WalkDir::new(root)
                    .max_depth(max_depth)
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    visited += 1;
                    if !item.file_type().is_file() {
                        continue;
                    }
                    let name = item.file_name().to_string_lossy();
                    if (name == id.as_str() || name == file_name.as_str())
                        && size_matches(item.path(), size)
                    {
                        found.push(item.path().to_path_buf());
                    }
                }
                debug!(root = %root.display(), visited = visited, "Backup root scanned");
            }
            found
        })
        .await
    }
}
