//! Ephemeral storage for in-progress stage records

use crate::error::Result;
use crate::model::StageRecord;
use async_trait::async_trait;
use cached::{Cached, TimedCache};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Identity of a stage record: one per (user, ticker)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageKey {
    namespace: String,
    pub user_id: String,
    pub ticker: String,
}

impl StageKey {
    pub fn new(
        namespace: impl Into<String>,
        user_id: impl Into<String>,
        ticker: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            user_id: user_id.into(),
            ticker: ticker.into(),
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.user_id, self.ticker)
    }
}

/// Keyed store whose entries expire a fixed time after their last write.
///
/// No locking is offered across a read-modify-write; concurrent writers for
/// one key resolve as last write wins.
#[async_trait]
pub trait StageStore: Send + Sync {
    /// Insert or replace a record, restarting its lifetime
    async fn put(&self, key: &StageKey, record: StageRecord) -> Result<()>;

    /// Fetch a live record. Reading does not extend its lifetime.
    async fn get(&self, key: &StageKey) -> Result<Option<StageRecord>>;

    async fn delete(&self, key: &StageKey) -> Result<()>;
}

/// In-process stage store backed by a timed cache
pub struct TimedStageStore {
    records: Arc<RwLock<TimedCache<StageKey, StageRecord>>>,
}

impl TimedStageStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Drop every expired record now instead of on next access
    pub async fn purge_expired(&self) {
        let mut records = self.records.write().await;
        records.flush();
    }

    /// Number of stored records, including expired ones not yet purged
    pub async fn len(&self) -> usize {
        let records = self.records.read().await;
        records.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Clone for TimedStageStore {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

#[async_trait]
impl StageStore for TimedStageStore {
    async fn put(&self, key: &StageKey, record: StageRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let _ = records.cache_set(key.clone(), record);
        tracing::debug!(key = %key, "Stage record stored");
        Ok(())
    }

    async fn get(&self, key: &StageKey) -> Result<Option<StageRecord>> {
        let mut records = self.records.write().await;
        let record = records.cache_get(key).cloned();
        if record.is_none() {
            tracing::debug!(key = %key, "Stage record missing or expired");
        }
        Ok(record)
    }

    async fn delete(&self, key: &StageKey) -> Result<()> {
        let mut records = self.records.write().await;
        let _ = records.cache_remove(key);
        Ok(())
    }
}
