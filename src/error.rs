use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Engine error type - uses miette so the admin CLI can render diagnostics
///
/// Variants map onto the failure taxonomy callers are expected to handle:
/// `FileTooLarge` / `EmptyUpload` are caller errors, `WriteFailed` and
/// `IntegrityFailure` are retry-safe (each retry mints a fresh id),
/// `RemoteUnavailable` only ever degrades an entry, and `Unrecoverable`
/// needs a human.
#[derive(Error, Debug, Diagnostic)]
pub enum VaultError {
    #[error("IO error: {0}")]
    #[diagnostic(code(vault::io_error))]
    Io(#[from] std::io::Error),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    #[diagnostic(
        code(vault::file_too_large),
        help("Split the document or raise storage.max_file_size_bytes")
    )]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Empty upload rejected")]
    #[diagnostic(code(vault::empty_upload))]
    EmptyUpload,

    #[error("Local write failed: {message}")]
    #[diagnostic(
        code(vault::write_failed),
        help("The upload was not cataloged; retrying is safe")
    )]
    WriteFailed {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("Integrity failure for {document_id}: expected {expected}, read back {actual}")]
    #[diagnostic(
        code(vault::integrity_failure),
        help("The partial file was removed and nothing was cataloged; retrying is safe")
    )]
    IntegrityFailure {
        document_id: String,
        expected: String,
        actual: String,
    },

    #[error("Remote tier unavailable: {0}")]
    #[diagnostic(code(vault::remote_unavailable))]
    RemoteUnavailable(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(vault::not_found))]
    NotFound(String),

    #[error("Unrecoverable: {0}")]
    #[diagnostic(
        code(vault::unrecoverable),
        help("Every recovery strategy was exhausted; manual intervention is required")
    )]
    Unrecoverable(String),

    #[error("Purge is disabled by policy")]
    #[diagnostic(
        code(vault::purge_disabled),
        help("Set catalog.allow_purge = true for the maintenance window")
    )]
    PurgeDisabled,

    #[error("Purge not confirmed for {0}")]
    #[diagnostic(
        code(vault::purge_not_confirmed),
        help("The confirmation must repeat the exact document id")
    )]
    PurgeNotConfirmed(String),

    #[error("Validation error: {0}")]
    #[diagnostic(code(vault::validation_error))]
    Validation(String),

    #[error("Database error: {0}")]
    #[diagnostic(
        code(vault::database_error),
        help("Check database connection and schema integrity")
    )]
    Database(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(vault::config_error))]
    Config(String),

    #[error("Timeout error: {0}")]
    #[diagnostic(code(vault::timeout_error))]
    Timeout(String),

    #[error("Internal error: {0}")]
    #[diagnostic(code(vault::internal_error))]
    Internal(String),

    #[error("IO error: {message}")]
    #[diagnostic(code(vault::io_error_detailed))]
    IoDetailed {
        message: String,
        path: Option<PathBuf>,
    },
}

impl VaultError {
    /// Create a local write failure
    pub fn write_failed(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        VaultError::WriteFailed {
            message: message.into(),
            path,
        }
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        VaultError::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation_error(message: impl Into<String>) -> Self {
        VaultError::Validation(message.into())
    }

    /// Create a database error
    pub fn database_error(message: impl Into<String>) -> Self {
        VaultError::Database(message.into())
    }

    /// Create a remote tier error
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        VaultError::RemoteUnavailable(message.into())
    }

    /// Create a detailed IO error
    pub fn io_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        VaultError::IoDetailed {
            message: message.into(),
            path,
        }
    }

    /// Whether a caller may retry the failed operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VaultError::WriteFailed { .. }
                | VaultError::IntegrityFailure { .. }
                | VaultError::RemoteUnavailable(_)
                | VaultError::Timeout(_)
        )
    }

    /// Stable short code, used in upload attempt records and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::Io(_) | VaultError::IoDetailed { .. } => "io",
            VaultError::FileTooLarge { .. } => "file_too_large",
            VaultError::EmptyUpload => "empty_upload",
            VaultError::WriteFailed { .. } => "write_failed",
            VaultError::IntegrityFailure { .. } => "integrity_failure",
            VaultError::RemoteUnavailable(_) => "remote_unavailable",
            VaultError::NotFound(_) => "not_found",
            VaultError::Unrecoverable(_) => "unrecoverable",
            VaultError::PurgeDisabled => "purge_disabled",
            VaultError::PurgeNotConfirmed(_) => "purge_not_confirmed",
            VaultError::Validation(_) => "validation",
            VaultError::Database(_) => "database",
            VaultError::Config(_) => "config",
            VaultError::Timeout(_) => "timeout",
            VaultError::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for VaultError {
    fn from(e: sqlx::Error) -> Self {
        VaultError::Database(e.to_string())
    }
}

impl From<config::ConfigError> for VaultError {
    fn from(e: config::ConfigError) -> Self {
        VaultError::Config(e.to_string())
    }
}

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = VaultError::write_failed("disk full", None);
        assert!(matches!(error, VaultError::WriteFailed { .. }));

        let error = VaultError::validation_error("Invalid input");
        assert!(matches!(error, VaultError::Validation(_)));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(VaultError::write_failed("x", None).is_retryable());
        assert!(VaultError::IntegrityFailure {
            document_id: "d".into(),
            expected: "a".into(),
            actual: "b".into(),
        }
        .is_retryable());
        assert!(!VaultError::FileTooLarge { size: 2, limit: 1 }.is_retryable());
        assert!(!VaultError::Unrecoverable("gone".into()).is_retryable());
        assert!(!VaultError::EmptyUpload.is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let vault_error: VaultError = io_error.into();

        assert!(matches!(vault_error, VaultError::Io(_)));
        assert_eq!(vault_error.kind(), "io");
    }

    #[test]
    fn test_error_display() {
        let error = VaultError::FileTooLarge {
            size: 2048,
            limit: 1024,
        };
        let display = format!("{}", error);
        assert!(display.contains("2048"));
        assert!(display.contains("1024"));
    }
}
