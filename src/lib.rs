//! Document vault - storage reliability engine
//!
//! Every uploaded document is written to two independently-failing tiers
//! (the local filesystem and a remote object store) and tracked in a SQLite
//! catalog with a write-once SHA-256 baseline. On top of that:
//!
//! - on-demand and scheduled integrity checks,
//! - health scans that classify every document and raise alerts,
//! - recovery of lost bytes from orphan, legacy and backup locations,
//! - catalog vs. storage reconciliation,
//! - an append-only audit trail of upload attempts and recovery events.
//!
//! [`DocumentVault`] is the entry point; `vaultctl` is the admin CLI.

pub mod error;
pub mod infrastructure;
pub mod models;
pub mod monitoring;
pub mod recovery;
pub mod storage;
pub mod utils;
pub mod vault;

pub use error::{Result, VaultError};
pub use infrastructure::config::VaultConfig;
pub use models::{
    Alert, AlertSeverity, AlertType, AuditRecord, CatalogEntry, DocumentRef, DocumentStatus,
    HealthClass, HealthReport, RecoveryEvent, RecoveryEventType, UploadAttempt,
};
pub use recovery::{BatchRecoveryReport, RecoveryOutcome, StrategyKind};
pub use storage::{ReconciliationReport, ValidationResult};
pub use vault::{DocumentVault, PurgeConfirmation};
