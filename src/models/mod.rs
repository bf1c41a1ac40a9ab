pub mod alert;
pub mod document;
pub mod events;
pub mod health;

// Re-export core types
pub use alert::{Alert, AlertSeverity, AlertType};
pub use document::{CatalogEntry, DocumentRef, DocumentStatus};
pub use events::{
    Actor, AuditRecord, AuditSummary, RecoveryEvent, RecoveryEventType, UploadAttempt,
};
pub use health::{DigestState, HealthClass, HealthReport, HealthSnapshot, RiskLevel};
