//! SQLite-backed implementation of the CacheStore trait
//!
//! Rows live in a single table keyed by the namespaced storage key. Every
//! `get` hits the database: the resolver may run in multiple independent
//! process instances sharing the same file, so there is no in-memory fast
//! path that could serve entries written by another instance stale.

use crate::cache::{CacheStats, CacheStore};
use crate::error::{Error, Result};
use crate::model::{now_millis, CacheEntry, LookupKey, LookupKind, Payload, Provenance};
use async_trait::async_trait;
use log::warn;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

/// SQLite-backed cache store.
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Opens (creating if missing) the cache database at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Cache(format!("failed to create cache directory: {e}")))?;
        }

        let connect_options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
                .map_err(|e| Error::Cache(format!("invalid cache path: {e}")))?
                .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .map_err(|e| Error::Cache(format!("failed to connect to cache database: {e}")))?;

        Self::initialize_schema(&pool).await?;

        Ok(Self { pool })
    }

    async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
        let schema = r#"
            CREATE TABLE IF NOT EXISTS lookup_cache (
                cache_key TEXT PRIMARY KEY,
                item_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                display_name TEXT NOT NULL,
                payload TEXT NOT NULL,
                source TEXT NOT NULL,
                resolved_at INTEGER NOT NULL,
                ttl_days INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_lookup_cache_kind
                ON lookup_cache(kind);
        "#;

        sqlx::raw_sql(schema)
            .execute(pool)
            .await
            .map_err(|e| Error::Cache(format!("failed to initialize cache schema: {e}")))?;

        Ok(())
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<CacheEntry> {
        let payload_json: String = row.try_get("payload")?;
        let payload: Payload = serde_json::from_str(&payload_json)?;
        let source_str: String = row.try_get("source")?;
        let source = Provenance::parse(&source_str)
            .ok_or_else(|| Error::Cache(format!("unknown provenance tag '{source_str}'")))?;

        Ok(CacheEntry {
            item_id: row.try_get("item_id")?,
            display_name: row.try_get("display_name")?,
            payload,
            source,
            resolved_at: row.try_get("resolved_at")?,
            ttl_days: row.try_get::<i64, _>("ttl_days")? as u32,
        })
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &LookupKey) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            r#"
            SELECT item_id, display_name, payload, source, resolved_at, ttl_days
            FROM lookup_cache
            WHERE cache_key = ?
            "#,
        )
        .bind(key.storage_key())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let entry = match Self::row_to_entry(&row) {
            Ok(entry) => entry,
            Err(e) => {
                // A row we cannot decode behaves as a miss; it will be
                // overwritten by the next resolution.
                warn!("discarding undecodable cache row {}: {e}", key.storage_key());
                return Ok(None);
            }
        };

        // Expired rows are logically deleted: treated as absent, left in
        // place until overwritten or cleared in bulk.
        if !entry.is_valid(now_millis()) {
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn put(&self, key: &LookupKey, entry: &CacheEntry) -> Result<()> {
        let payload_json = serde_json::to_string(&entry.payload)?;

        sqlx::query(
            r#"
            INSERT INTO lookup_cache (
                cache_key, item_id, kind, display_name, payload, source,
                resolved_at, ttl_days
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                item_id = excluded.item_id,
                display_name = excluded.display_name,
                payload = excluded.payload,
                source = excluded.source,
                resolved_at = excluded.resolved_at,
                ttl_days = excluded.ttl_days
            "#,
        )
        .bind(key.storage_key())
        .bind(&entry.item_id)
        .bind(key.kind.as_str())
        .bind(&entry.display_name)
        .bind(payload_json)
        .bind(entry.source.as_str())
        .bind(entry.resolved_at)
        .bind(i64::from(entry.ttl_days))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &LookupKey) -> Result<()> {
        sqlx::query("DELETE FROM lookup_cache WHERE cache_key = ?")
            .bind(key.storage_key())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn stats(&self, kind: LookupKind) -> Result<CacheStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as entry_count, MIN(resolved_at) as oldest
            FROM lookup_cache
            WHERE kind = ?
            "#,
        )
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("entry_count")?;
        let oldest: Option<i64> = row.try_get("oldest")?;

        Ok(CacheStats {
            count: count as u64,
            oldest_resolved_at: oldest,
        })
    }

    async fn clear_all(&self, kind: LookupKind) -> Result<u64> {
        let result = sqlx::query("DELETE FROM lookup_cache WHERE kind = ?")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
