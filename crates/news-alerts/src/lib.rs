//! Breaking-news alerting with cross-run deduplication.
//!
//! A headline is alerted at most once over the lifetime of the persisted
//! seen-set. Identity is the exact headline text, so rephrased stories are
//! distinct items.

mod dedup;
mod matcher;
mod store;

use std::time::Duration;

use analysis_core::Retryable;

pub use dedup::{DedupPass, NewsAlert};
pub use matcher::{AlertTarget, InstrumentMatcher};
pub use store::{JsonFileStore, MemorySeenStore, SeenNewsStore, SqliteSeenStore, StoreGuard};

/// Errors from the seen-news storage layer.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt seen-news data: {0}")]
    Corrupt(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Storage timeout: {0}")]
    Timeout(String),
}

/// Transient storage failures are retried; a corrupt file or a lock that
/// could not be taken is reported as is.
impl Retryable for AlertError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            AlertError::Io(_) | AlertError::Database(_) | AlertError::Timeout(_)
        )
    }

    fn timed_out(what: &str, after: Duration) -> Self {
        AlertError::Timeout(format!("{} after {}ms", what, after.as_millis()))
    }
}
