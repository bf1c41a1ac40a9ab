//! Observability: structured logging, alerting, and periodic health scans

pub mod alerting;
pub mod health;
pub mod logging;

pub use alerting::{AlertManager, LogNotifier, NotificationChannel, Notifier};
pub use health::{classify, HealthMonitor, HealthScanScheduler};
pub use logging::init_logging;
