//! Storage tier abstraction
//!
//! Both backends (local filesystem, remote object store) sit behind one
//! trait so the ingest writer can run an explicit two-tier protocol instead
//! of nesting fallbacks.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    Local,
    Remote,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Local => "local",
            TierKind::Remote => "remote",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independently-failing storage backend.
///
/// A *location* is the tier's own address for a blob: a filesystem path for
/// the local tier, an object key for the remote tier.
#[async_trait]
pub trait StorageTier: Send + Sync + fmt::Debug {
    fn kind(&self) -> TierKind;

    /// Deterministic location for a document's bytes.
    fn locate(&self, owner_id: &str, document_id: &str) -> String;

    /// Write `bytes` at `location`, replacing anything already there.
    async fn put(&self, location: &str, bytes: Bytes) -> Result<()>;

    /// `Ok(None)` when nothing is stored at `location`.
    async fn get(&self, location: &str) -> Result<Option<Bytes>>;

    /// Cheap existence probe.
    async fn exists(&self, location: &str) -> Result<bool>;

    /// Idempotent: removing an absent location succeeds.
    async fn remove(&self, location: &str) -> Result<()>;

    /// Every location currently held by the tier.
    async fn list_locations(&self) -> Result<Vec<String>>;
}

pub type SharedTier = Arc<dyn StorageTier>;
