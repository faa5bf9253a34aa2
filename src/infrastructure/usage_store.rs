use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::domain::error::Error;
use crate::domain::usage::{UsageAnalytics, UsageRecord, UsageRepository};

const USAGE_KEY_PREFIX: &str = "usage:";
const POPULAR_ZSET: &str = "popular_chunks";
const DATE_FORMAT: &str = "%Y-%m-%d";
/// How many records the aggregate analytics view carries per ranking.
const ANALYTICS_TOP: usize = 10;

/// Redis-backed access tracker. One hash per chunk (`usage:<chunk_id>`)
/// plus a sorted set mirroring the counters for popularity ranking.
///
/// The counter bump uses HINCRBY, so concurrent search requests never lose
/// an increment. This store is a pure side channel: it shares nothing with
/// the vector index.
pub struct RedisUsageTracker {
    manager: ConnectionManager,
}

impl RedisUsageTracker {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::UsageStore(format!("invalid redis url: {}", e)))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::UsageStore(format!("redis connection failed: {}", e)))?;
        Ok(Self::new(manager))
    }

    /// Fetches every usage record. SCAN first so the connection is not held
    /// across per-key reads.
    async fn load_all(&self) -> Result<Vec<UsageRecord>, Error> {
        let mut con = self.manager.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = con
                .scan_match::<_, String>(format!("{}*", USAGE_KEY_PREFIX))
                .await
                .map_err(|e| Error::UsageStore(format!("scan failed: {}", e)))?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let fields: HashMap<String, String> = con
                .hgetall(&key)
                .await
                .map_err(|e| Error::UsageStore(format!("hgetall {} failed: {}", key, e)))?;
            match parse_record(&key, &fields) {
                Some(record) => records.push(record),
                None => log::warn!("Skipping undecodable usage record at {}", key),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl UsageRepository for RedisUsageTracker {
    async fn record_access(&self, chunk_id: &str, source_doc_id: &str) -> Result<u64, Error> {
        let mut con = self.manager.clone();
        let key = format!("{}{}", USAGE_KEY_PREFIX, chunk_id);

        // HINCRBY is atomic server-side; it also creates the hash on first
        // access.
        let new_count: u64 = con
            .hincr(&key, "usage_count", 1)
            .await
            .map_err(|e| Error::UsageStore(format!("hincrby {} failed: {}", key, e)))?;

        let today = Utc::now().date_naive().format(DATE_FORMAT).to_string();
        let _: () = redis::pipe()
            .hset(&key, "chunk_id", chunk_id)
            .ignore()
            .hset(&key, "last_accessed", &today)
            .ignore()
            .hset(&key, "source_doc_id", source_doc_id)
            .ignore()
            .zadd(POPULAR_ZSET, chunk_id, new_count as f64)
            .ignore()
            .query_async(&mut con)
            .await
            .map_err(|e| Error::UsageStore(format!("usage update {} failed: {}", key, e)))?;

        Ok(new_count)
    }

    async fn most_popular(&self, limit: usize) -> Result<Vec<UsageRecord>, Error> {
        let mut records = self.load_all().await?;
        rank_by_popularity(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    async fn recent_activity(&self, limit: usize) -> Result<Vec<UsageRecord>, Error> {
        let mut records = self.load_all().await?;
        rank_by_recency(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    async fn analytics(&self) -> Result<UsageAnalytics, Error> {
        let records = self.load_all().await?;
        Ok(build_analytics(records, ANALYTICS_TOP))
    }
}

fn parse_record(key: &str, fields: &HashMap<String, String>) -> Option<UsageRecord> {
    let chunk_id = fields
        .get("chunk_id")
        .cloned()
        .or_else(|| key.strip_prefix(USAGE_KEY_PREFIX).map(str::to_string))?;
    let usage_count = fields.get("usage_count")?.parse().ok()?;
    let last_accessed = NaiveDate::parse_from_str(fields.get("last_accessed")?, DATE_FORMAT).ok()?;
    let source_doc_id = fields.get("source_doc_id")?.clone();
    Some(UsageRecord {
        chunk_id,
        usage_count,
        last_accessed,
        source_doc_id,
    })
}

/// Orders by `usage_count` desc, ties broken by most recent `last_accessed`,
/// then by chunk id for full determinism.
pub fn rank_by_popularity(records: &mut [UsageRecord]) {
    records.sort_by(|a, b| {
        b.usage_count
            .cmp(&a.usage_count)
            .then_with(|| b.last_accessed.cmp(&a.last_accessed))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

/// Orders by `last_accessed` desc, ties broken by `usage_count` desc, then
/// by chunk id.
pub fn rank_by_recency(records: &mut [UsageRecord]) {
    records.sort_by(|a, b| {
        b.last_accessed
            .cmp(&a.last_accessed)
            .then_with(|| b.usage_count.cmp(&a.usage_count))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

/// Builds the aggregate view. `total_chunks_accessed` counts distinct
/// tracked ids; `total_accesses` sums every counter, so the former never
/// exceeds the latter.
pub fn build_analytics(records: Vec<UsageRecord>, top: usize) -> UsageAnalytics {
    let total_chunks_accessed = records.len();
    let total_accesses = records.iter().map(|r| r.usage_count).sum();

    let mut most_popular = records.clone();
    rank_by_popularity(&mut most_popular);
    most_popular.truncate(top);

    let mut recent_activity = records;
    rank_by_recency(&mut recent_activity);
    recent_activity.truncate(top);

    UsageAnalytics {
        total_chunks_accessed,
        total_accesses,
        most_popular,
        recent_activity,
    }
}
