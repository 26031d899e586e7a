//! Resolution state machine
//!
//! Orchestrates one lookup: cache first, then manual overrides (for
//! availability), then the external source. Conclusive answers, positive
//! or negative, are persisted under the item's TTL; transient failures
//! produce an all-Unknown fallback that is returned but never cached, so
//! the next request retries the network.

use crate::cache::{CacheStats, CacheStore};
use crate::error::Result;
use crate::model::{
    now_millis, unknown_availability, CacheEntry, CatalogItem, LookupKey, LookupKind, Payload,
    Provenance, Resolution,
};
use crate::overrides::ManualOverrides;
use crate::source::{AvailabilitySource, ReviewSource, SourceOutcome};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolution policy knobs.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Validity window applied to every entry written, positive or
    /// negative.
    pub ttl_days: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { ttl_days: 7 }
    }
}

/// Coordinates cache, overrides and source adapters for both lookup kinds.
pub struct Resolver {
    cache: Arc<dyn CacheStore>,
    availability: Arc<dyn AvailabilitySource>,
    review: Arc<dyn ReviewSource>,
    overrides: ManualOverrides,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        availability: Arc<dyn AvailabilitySource>,
        review: Arc<dyn ReviewSource>,
        overrides: ManualOverrides,
        config: ResolverConfig,
    ) -> Self {
        Self {
            cache,
            availability,
            review,
            overrides,
            config,
        }
    }

    /// Resolves one item, serving from cache when a valid entry exists.
    pub async fn resolve(&self, item: &CatalogItem, kind: LookupKind) -> Result<Resolution> {
        let key = LookupKey::new(item.item_id.clone(), kind);

        if let Some(mut entry) = self.cache.get(&key).await? {
            // The display name is presentation metadata, not part of the
            // resolved answer: refresh it in place without touching the
            // entry's age.
            if entry.display_name != item.display_name {
                entry.display_name = item.display_name.clone();
                self.cache.put(&key, &entry).await?;
            }
            debug!("cache hit for {}", key.storage_key());
            return Ok(Resolution {
                entry,
                from_cache: true,
            });
        }

        if kind == LookupKind::Availability {
            if let Some(entry) = self.overrides.availability_entry(
                &item.item_id,
                &item.display_name,
                now_millis(),
                self.config.ttl_days,
            ) {
                info!("manual override applied for {}", item.item_id);
                self.cache.put(&key, &entry).await?;
                return Ok(Resolution {
                    entry,
                    from_cache: false,
                });
            }
        }

        let entry = match kind {
            LookupKind::Availability => self.resolve_availability(item).await?,
            LookupKind::ReviewScore => self.resolve_review(item).await?,
        };

        // Fallback entries are the one case that must not be persisted:
        // caching them would pin a transient failure for a full TTL.
        if entry.source != Provenance::FallbackUnknown {
            self.cache.put(&key, &entry).await?;
        }

        Ok(Resolution {
            entry,
            from_cache: false,
        })
    }

    /// Resolves many items of one kind, minimizing source round trips.
    /// Cached and overridden items never reach the network; an empty input
    /// makes zero source calls.
    pub async fn resolve_batch(
        &self,
        items: &[CatalogItem],
        kind: LookupKind,
    ) -> Result<HashMap<String, Resolution>> {
        let mut results = HashMap::new();
        let mut pending: Vec<CatalogItem> = Vec::new();

        for item in items {
            let key = LookupKey::new(item.item_id.clone(), kind);
            if let Some(mut entry) = self.cache.get(&key).await? {
                if entry.display_name != item.display_name {
                    entry.display_name = item.display_name.clone();
                    self.cache.put(&key, &entry).await?;
                }
                results.insert(
                    item.item_id.clone(),
                    Resolution {
                        entry,
                        from_cache: true,
                    },
                );
                continue;
            }

            if kind == LookupKind::Availability {
                if let Some(entry) = self.overrides.availability_entry(
                    &item.item_id,
                    &item.display_name,
                    now_millis(),
                    self.config.ttl_days,
                ) {
                    self.cache.put(&key, &entry).await?;
                    results.insert(
                        item.item_id.clone(),
                        Resolution {
                            entry,
                            from_cache: false,
                        },
                    );
                    continue;
                }
            }

            pending.push(item.clone());
        }

        if pending.is_empty() {
            return Ok(results);
        }
        debug!("batch {kind}: {} cached, {} pending", results.len(), pending.len());

        match kind {
            LookupKind::Availability => {
                let outcomes = self.availability.resolve_batch(&pending).await;
                for item in &pending {
                    let entry = match outcomes.get(&item.item_id) {
                        Some(outcome) => {
                            self.availability_entry(item, outcome.clone())
                        }
                        // Absent from the map: transient failure, fall
                        // back without caching.
                        None => self.fallback_entry(item, LookupKind::Availability),
                    };
                    if entry.source != Provenance::FallbackUnknown {
                        let key = LookupKey::new(item.item_id.clone(), kind);
                        self.cache.put(&key, &entry).await?;
                    }
                    results.insert(
                        item.item_id.clone(),
                        Resolution {
                            entry,
                            from_cache: false,
                        },
                    );
                }
            }
            LookupKind::ReviewScore => {
                // The review source has no batch endpoint; the rate
                // limiter paces the sequential calls.
                for item in &pending {
                    let entry = self.resolve_review(item).await?;
                    if entry.source != Provenance::FallbackUnknown {
                        let key = LookupKey::new(item.item_id.clone(), kind);
                        self.cache.put(&key, &entry).await?;
                    }
                    results.insert(
                        item.item_id.clone(),
                        Resolution {
                            entry,
                            from_cache: false,
                        },
                    );
                }
            }
        }

        Ok(results)
    }

    /// Drops any cached entry and resolves fresh from the sources.
    pub async fn force_refresh(&self, item: &CatalogItem, kind: LookupKind) -> Result<Resolution> {
        let key = LookupKey::new(item.item_id.clone(), kind);
        self.cache.remove(&key).await?;
        self.resolve(item, kind).await
    }

    pub async fn cache_stats(&self, kind: LookupKind) -> Result<CacheStats> {
        self.cache.stats(kind).await
    }

    /// Clears all cached entries of one kind; returns the number removed.
    pub async fn clear_cache(&self, kind: LookupKind) -> Result<u64> {
        let removed = self.cache.clear_all(kind).await?;
        info!("cleared {removed} {kind} cache entries");
        Ok(removed)
    }

    async fn resolve_availability(&self, item: &CatalogItem) -> Result<CacheEntry> {
        match self
            .availability
            .resolve(&item.item_id, &item.display_name)
            .await
        {
            Ok(outcome) => Ok(self.availability_entry(item, outcome)),
            Err(e) => {
                warn!("availability resolution failed for {}: {e}", item.item_id);
                Ok(self.fallback_entry(item, LookupKind::Availability))
            }
        }
    }

    async fn resolve_review(&self, item: &CatalogItem) -> Result<CacheEntry> {
        match self.review.resolve(&item.item_id, &item.display_name).await {
            Ok(SourceOutcome::Found(score)) => Ok(self.entry(
                item,
                Payload::Review(Some(score)),
                self.review.provenance(),
            )),
            // Conclusive miss: cached as a negative review entry.
            Ok(SourceOutcome::NotFound) => {
                Ok(self.entry(item, Payload::Review(None), self.review.provenance()))
            }
            Err(e) => {
                warn!("review resolution failed for {}: {e}", item.item_id);
                Ok(self.fallback_entry(item, LookupKind::ReviewScore))
            }
        }
    }

    fn availability_entry(
        &self,
        item: &CatalogItem,
        outcome: SourceOutcome<crate::model::AvailabilityMap>,
    ) -> CacheEntry {
        match outcome {
            SourceOutcome::Found(map) => self.entry(
                item,
                Payload::Availability(map),
                self.availability.provenance(),
            ),
            // Conclusive miss: an all-Unknown map cached under the source's
            // provenance, so repeat lookups stay off the network.
            SourceOutcome::NotFound => self.entry(
                item,
                Payload::Availability(unknown_availability(&item.display_name)),
                self.availability.provenance(),
            ),
        }
    }

    fn fallback_entry(&self, item: &CatalogItem, kind: LookupKind) -> CacheEntry {
        let payload = match kind {
            LookupKind::Availability => {
                Payload::Availability(unknown_availability(&item.display_name))
            }
            LookupKind::ReviewScore => Payload::Review(None),
        };
        self.entry(item, payload, Provenance::FallbackUnknown)
    }

    fn entry(&self, item: &CatalogItem, payload: Payload, source: Provenance) -> CacheEntry {
        CacheEntry {
            item_id: item.item_id.clone(),
            display_name: item.display_name.clone(),
            payload,
            source,
            resolved_at: now_millis(),
            ttl_days: self.config.ttl_days,
        }
    }
}
