use crate::domain::value_objects::CacheKey;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: Value,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: CacheKey, data: Value, cached_at: DateTime<Utc>) -> Self {
        Self {
            key,
            data,
            cached_at,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.cached_at
    }

    /// `now - cached_at > max_age`
    pub fn is_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > max_age
    }
}

/// UI 向けのキャッシュ読み出し結果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResult {
    pub data: Value,
    pub cached_at: DateTime<Utc>,
    pub is_stale: bool,
}
