//! Shared helpers: remote retry policy and per-document locking.

pub mod locks;
pub mod retry;

pub use locks::DocumentLocks;
pub use retry::{with_retry, RetryPolicy};
