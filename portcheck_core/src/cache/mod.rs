//! Cache store trait and implementations
//!
//! The cache is key-value persistence with TTL-aware validity, namespaced
//! by lookup kind. Callers cannot distinguish "never existed" from
//! "expired": both behave as a miss.

use crate::error::Result;
use crate::model::{CacheEntry, LookupKey, LookupKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

/// Cache usage summary for observability collaborators; not consulted by
/// resolution logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub count: u64,
    pub oldest_resolved_at: Option<i64>,
}

/// Trait for cache store implementations.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the entry for `key`, or `None` when no row exists or the
    /// row fails the TTL validity check.
    async fn get(&self, key: &LookupKey) -> Result<Option<CacheEntry>>;

    /// Unconditional overwrite by key; no merge semantics.
    async fn put(&self, key: &LookupKey, entry: &CacheEntry) -> Result<()>;

    /// Deletes one row if present. Used by force-refresh.
    async fn remove(&self, key: &LookupKey) -> Result<()>;

    /// Entry count and oldest resolution timestamp for one kind.
    async fn stats(&self, kind: LookupKind) -> Result<CacheStats>;

    /// Bulk delete of all entries of one kind; returns the number of rows
    /// removed. Triggered by explicit user action only.
    async fn clear_all(&self, kind: LookupKind) -> Result<u64>;
}
