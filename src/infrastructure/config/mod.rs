//! Engine configuration
//!
//! Layered the usual way:
//! - serde defaults (every field has one)
//! - optional TOML/JSON file
//! - `DOC_VAULT__SECTION__FIELD` environment overrides
//!
//! The merged result is checked with `validator` before anything is opened.

use crate::error::{Result, VaultError};
use crate::models::AlertSeverity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use validator::Validate;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "DOC_VAULT";

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VaultConfig {
    #[validate(nested)]
    pub storage: StorageConfig,

    #[validate(nested)]
    pub remote: RemoteConfig,

    #[validate(nested)]
    pub health: HealthConfig,

    #[validate(nested)]
    pub alerts: AlertConfig,

    #[validate(nested)]
    pub audit: AuditConfig,

    #[validate(nested)]
    pub recovery: RecoveryConfig,

    pub catalog: CatalogConfig,

    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// Local tier and recovery search locations
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,

    #[validate(range(min = 1, max = 1_073_741_824))]
    pub max_file_size_bytes: u64,

    #[validate(range(min = 1, max = 3600))]
    pub write_timeout_seconds: u64,

    /// Holding area for orphaned bytes; `<root>/orphans` when unset
    pub orphan_dir: Option<PathBuf>,

    /// Legacy / per-owner layouts; `[<root>/uploads]` when unset
    pub alternate_roots: Option<Vec<PathBuf>>,

    pub backup_roots: Vec<PathBuf>,

    #[validate(range(min = 1, max = 32))]
    pub backup_scan_max_depth: usize,
}

/// Remote object store tier
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RemoteConfig {
    /// `file:///path/to/bucket-mount` or `memory://`; `file://<root>/remote` when unset
    pub endpoint: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub bucket: String,

    #[validate(length(min = 1, max = 255))]
    pub key_prefix: String,

    pub access_key_id: Option<String>,

    pub secret_access_key: Option<String>,

    #[validate(range(min = 1, max = 600))]
    pub timeout_seconds: u64,

    #[validate(range(max = 10))]
    pub max_retries: usize,

    #[validate(range(min = 1, max = 60_000))]
    pub retry_base_delay_ms: u64,

    #[validate(range(min = 1, max = 300_000))]
    pub retry_max_delay_ms: u64,

    #[validate(range(min = 1, max = 10_000))]
    pub list_page_size: usize,
}

/// Health monitor cadence and thresholds
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HealthConfig {
    #[validate(range(min = 1, max = 8760))]
    pub deep_check_interval_hours: u64,

    #[validate(range(min = 1))]
    pub scan_interval_seconds: u64,

    pub at_risk_alert_threshold: usize,

    #[validate(range(min = 1, max = 256))]
    pub scan_concurrency: usize,
}

/// Which notifier channel kinds are switched on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierChannels {
    pub chat: bool,
    pub email: bool,
    pub sms: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AlertConfig {
    #[validate(range(min = 1))]
    pub upload_failure_threshold: usize,

    #[validate(range(min = 1))]
    pub upload_failure_window_seconds: u64,

    #[validate(range(min = 1, max = 1_000_000))]
    pub max_retained_alerts: usize,

    pub notify_min_severity: AlertSeverity,

    /// Upper bound on one notifier delivery
    #[validate(range(min = 1, max = 300))]
    pub notify_timeout_seconds: u64,

    pub channels: NotifierChannels,
}

/// Append-only log retention, enforced at write time
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AuditConfig {
    #[validate(range(min = 1))]
    pub max_upload_attempts: usize,

    #[validate(range(min = 1))]
    pub max_recovery_events: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RecoveryConfig {
    #[validate(range(max = 60_000))]
    pub batch_delay_ms: u64,

    #[validate(range(min = 0.5, max = 1.0))]
    pub fuzzy_match_threshold: f64,
}

/// Deletion lockdown policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Only the confirmation-gated purge command reads this
    pub allow_purge: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    #[validate(length(min = 1, max = 100))]
    pub level: String,

    pub json: bool,

    /// Daily rolling log files are written here when set
    pub directory: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./vault-data"),
            max_file_size_bytes: 25 * 1024 * 1024,
            write_timeout_seconds: 60,
            orphan_dir: None,
            alternate_roots: None,
            backup_roots: Vec::new(),
            backup_scan_max_depth: 4,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: "documents".to_string(),
            key_prefix: "documents".to_string(),
            access_key_id: None,
            secret_access_key: None,
            timeout_seconds: 10,
            max_retries: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 2000,
            list_page_size: 1000,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            deep_check_interval_hours: 24,
            scan_interval_seconds: 900,
            at_risk_alert_threshold: 10,
            scan_concurrency: 8,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            upload_failure_threshold: 5,
            upload_failure_window_seconds: 300,
            max_retained_alerts: 1000,
            notify_min_severity: AlertSeverity::Critical,
            notify_timeout_seconds: 10,
            channels: NotifierChannels::default(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_upload_attempts: 100_000,
            max_recovery_events: 100_000,
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            batch_delay_ms: 100,
            fuzzy_match_threshold: 0.8,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

impl StorageConfig {
    pub fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    pub fn orphan_dir(&self) -> PathBuf {
        self.orphan_dir
            .clone()
            .unwrap_or_else(|| self.root.join("orphans"))
    }

    pub fn alternate_roots(&self) -> Vec<PathBuf> {
        self.alternate_roots
            .clone()
            .unwrap_or_else(|| vec![self.root.join("uploads")])
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_seconds)
    }
}

/// Parsed form of `remote.endpoint`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEndpoint {
    Directory(PathBuf),
    Memory,
}

impl RemoteConfig {
    pub fn endpoint(&self, storage_root: &Path) -> Result<RemoteEndpoint> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Ok(RemoteEndpoint::Directory(storage_root.join("remote")));
        };

        if let Some(path) = endpoint.strip_prefix("file://") {
            if path.is_empty() {
                return Err(VaultError::Config(
                    "remote.endpoint file:// needs a path".to_string(),
                ));
            }
            Ok(RemoteEndpoint::Directory(PathBuf::from(path)))
        } else if endpoint == "memory://" {
            Ok(RemoteEndpoint::Memory)
        } else {
            Err(VaultError::Config(format!(
                "Unsupported remote.endpoint '{}': inject a custom ObjectStore for this scheme",
                endpoint
            )))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl HealthConfig {
    pub fn deep_check_cadence(&self) -> chrono::Duration {
        chrono::Duration::hours(self.deep_check_interval_hours as i64)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds)
    }
}

impl AlertConfig {
    pub fn upload_failure_window(&self) -> Duration {
        Duration::from_secs(self.upload_failure_window_seconds)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_seconds)
    }
}

impl RecoveryConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl VaultConfig {
    /// Defaults rooted at `root`; handy when embedding the engine.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.storage.root = root.into();
        config
    }

    /// Load defaults, then the optional file, then environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Config` if:
    /// - The given file does not exist or cannot be parsed
    /// - A merged value fails validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&VaultConfig::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            if !path.exists() {
                return Err(VaultError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: VaultConfig = builder.build()?.try_deserialize()?;
        loaded.check()?;

        info!(
            root = %loaded.storage.root.display(),
            file = ?path.map(|p| p.display().to_string()),
            "Configuration loaded"
        );

        Ok(loaded)
    }

    /// Run validator rules and the cross-field checks they cannot express.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| VaultError::Config(format!("Invalid configuration: {}", e)))?;

        if self.remote.retry_base_delay_ms > self.remote.retry_max_delay_ms {
            return Err(VaultError::Config(
                "remote.retry_base_delay_ms must not exceed remote.retry_max_delay_ms".to_string(),
            ));
        }
        self.remote.endpoint(&self.storage.root)?;
        Ok(())
    }
}
