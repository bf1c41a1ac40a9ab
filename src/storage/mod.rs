//! Storage layer
//!
//! - `tier` / `local_tier` / `remote_tier`: the two independently-failing
//!   byte stores behind one trait
//! - `object_store`: S3-shaped client surface used by the remote tier
//! - `catalog`: SQLite document catalog
//! - `audit_log`: append-only upload and recovery history, plus alerts
//! - `checksum`: SHA-256 digests and on-demand validation
//! - `ingest`: the ordered two-tier write pipeline
//! - `integrity`: catalog vs. tier reconciliation

pub mod audit_log;
pub mod catalog;
pub mod checksum;
pub mod ingest;
pub mod integrity;
pub mod local_tier;
pub mod object_store;
pub mod remote_tier;
mod sqlite;
pub mod tier;

pub use audit_log::{AuditLog, NotificationFailure};
pub use catalog::CatalogStore;
pub use checksum::{
    compute_digest, compute_digest_file, ChecksumValidator, InvalidReason, ValidationResult,
};
pub use ingest::{IngestWriter, UploadRequest};
pub use integrity::{IntegrityAuditor, ReconciliationReport};
pub use local_tier::LocalTier;
pub use object_store::{FsObjectStore, ListPage, MemoryObjectStore, ObjectStore};
pub use remote_tier::RemoteTier;
pub use tier::{SharedTier, StorageTier, TierKind};
