//! In-memory implementation of the CacheStore trait
//!
//! Identical TTL semantics to the durable store, but entries vanish with
//! the process. Intended for tests and for callers that explicitly opt
//! out of durability; it cannot observe entries written by other process
//! instances.

use crate::cache::{CacheStats, CacheStore};
use crate::error::Result;
use crate::model::{now_millis, CacheEntry, LookupKey, LookupKind};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// HashMap-backed cache store.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, (LookupKind, CacheEntry)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &LookupKey) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().await;
        match entries.get(&key.storage_key()) {
            Some((_, entry)) if entry.is_valid(now_millis()) => Ok(Some(entry.clone())),
            _ => Ok(None),
        }
    }

    async fn put(&self, key: &LookupKey, entry: &CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.storage_key(), (key.kind, entry.clone()));
        Ok(())
    }

    async fn remove(&self, key: &LookupKey) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(&key.storage_key());
        Ok(())
    }

    async fn stats(&self, kind: LookupKind) -> Result<CacheStats> {
        let entries = self.entries.read().await;
        let mut count = 0u64;
        let mut oldest: Option<i64> = None;
        for (entry_kind, entry) in entries.values() {
            if *entry_kind == kind {
                count += 1;
                oldest = Some(oldest.map_or(entry.resolved_at, |o: i64| o.min(entry.resolved_at)));
            }
        }
        Ok(CacheStats {
            count,
            oldest_resolved_at: oldest,
        })
    }

    async fn clear_all(&self, kind: LookupKind) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (entry_kind, _)| *entry_kind != kind);
        Ok((before - entries.len()) as u64)
    }
}
