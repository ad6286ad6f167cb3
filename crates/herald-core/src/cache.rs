//! [`MemorySentCache`]: an in-process [`SentCache`] on a `moka` cache.
//!
//! Retention: at most `capacity` entries, least recently used evicted first,
//! and entries older than `ttl` (relative to the caller's `now`) are treated
//! as absent. State is lost on restart; use the SQLite backend where that
//! matters.

use std::convert::Infallible;

use chrono::{DateTime, Duration, Utc};
use moka::{policy::EvictionPolicy, sync::Cache};
use uuid::Uuid;

use crate::store::SentCache;

pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Clone)]
struct Entry {
  content: serde_json::Value,
  sent_at: DateTime<Utc>,
}

pub struct MemorySentCache {
  ttl:     Duration,
  entries: Cache<Uuid, Entry>,
}

impl MemorySentCache {
  pub fn new(capacity: usize, ttl: Duration) -> Self {
    let mut builder = Cache::builder()
      .max_capacity(capacity.max(1) as u64)
      .eviction_policy(EvictionPolicy::lru());
    // Wall-clock expiry only reclaims memory; reads check `ttl` themselves.
    if let Ok(wall) = ttl.to_std() {
      builder = builder.time_to_live(wall);
    }
    Self { ttl, entries: builder.build() }
  }

  pub fn len(&self) -> usize {
    self.entries.run_pending_tasks();
    self.entries.entry_count() as usize
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Default for MemorySentCache {
  fn default() -> Self { Self::new(DEFAULT_CAPACITY, Duration::days(30)) }
}

impl SentCache for MemorySentCache {
  type Error = Infallible;

  async fn last_sent(
    &self,
    entity_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Option<serde_json::Value>, Infallible> {
    Ok(
      self
        .entries
        .get(&entity_id)
        .filter(|e| now - e.sent_at <= self.ttl)
        .map(|e| e.content),
    )
  }

  async fn record_sent(
    &self,
    entity_id: Uuid,
    content: serde_json::Value,
    at: DateTime<Utc>,
  ) -> Result<(), Infallible> {
    self.entries.insert(entity_id, Entry { content, sent_at: at });
    Ok(())
  }
}
