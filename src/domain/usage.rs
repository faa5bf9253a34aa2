use async_trait::async_trait;
use chrono::NaiveDate;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::domain::error::Error;

/// Live access statistics for one chunk. Created on first access, mutated on
/// every subsequent access, never deleted by normal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub chunk_id: String,
    /// Monotonically incremented; at least 1 once the record exists.
    pub usage_count: u64,
    pub last_accessed: NaiveDate,
    /// Denormalized for reporting, so analytics never needs the vector store.
    pub source_doc_id: String,
}

/// Aggregate view over all usage records.
///
/// Invariant: `total_accesses >= total_chunks_accessed` whenever any record
/// exists, since every record's count is at least 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageAnalytics {
    pub total_chunks_accessed: usize,
    pub total_accesses: u64,
    pub most_popular: Vec<UsageRecord>,
    pub recent_activity: Vec<UsageRecord>,
}

/// Seam over the usage-tracking store. Persistence is independent of the
/// vector store; losing usage data never affects search correctness.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Increments the chunk's counter and stamps `last_accessed` with the
    /// current date, creating the record if absent. Returns the new count.
    /// Increments are atomic per chunk id under concurrent access.
    async fn record_access(&self, chunk_id: &str, source_doc_id: &str) -> Result<u64, Error>;

    /// Records ordered by `usage_count` desc, ties broken by most recent
    /// `last_accessed`.
    async fn most_popular(&self, limit: usize) -> Result<Vec<UsageRecord>, Error>;

    /// Records ordered by `last_accessed` desc, ties broken by `usage_count`
    /// desc.
    async fn recent_activity(&self, limit: usize) -> Result<Vec<UsageRecord>, Error>;

    async fn analytics(&self) -> Result<UsageAnalytics, Error>;
}
