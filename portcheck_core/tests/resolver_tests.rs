//! End-to-end resolver tests against scripted wire clients.
//!
//! The mocks count wire calls so the tests can assert cache behavior by
//! observing the network, not the store internals.

use async_trait::async_trait;
use portcheck_core::cache::MemoryCacheStore;
use portcheck_core::model::{
    AvailabilityStatus, CatalogItem, LookupKind, Payload, Platform, Provenance,
};
use portcheck_core::ratelimit::{RateLimitConfig, RateLimiter};
use portcheck_core::source::{
    CriticClient, CriticDetail, ExternalRef, GameDetail, GamedbAvailabilitySource, GamedbClient,
    OpencriticReviewSource, StoreLink,
};
use portcheck_core::{ManualOverrides, Resolver, ResolverConfig, SearchCandidate, SourceError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct CallCounts {
    search: AtomicU32,
    external_ids: AtomicU32,
    details: AtomicU32,
    detail: AtomicU32,
}

impl CallCounts {
    fn total(&self) -> u32 {
        self.search.load(Ordering::SeqCst)
            + self.external_ids.load(Ordering::SeqCst)
            + self.details.load(Ordering::SeqCst)
            + self.detail.load(Ordering::SeqCst)
    }
}

/// Scripted GameDB: a fixed cross-reference table and detail catalog.
struct ScriptedGamedb {
    counts: Arc<CallCounts>,
    cross_refs: HashMap<String, u64>,
    catalog: HashMap<u64, GameDetail>,
    /// When set, every call fails with this error.
    failure: Option<SourceError>,
}

impl ScriptedGamedb {
    fn new(counts: Arc<CallCounts>) -> Self {
        let mut catalog = HashMap::new();
        catalog.insert(
            1942,
            GameDetail {
                id: 1942,
                name: "Hollow Knight".to_string(),
                platform_ids: vec![130, 167],
                store_links: vec![StoreLink {
                    platform: Platform::Switch,
                    url: "https://www.nintendo.com/store/products/hollow-knight-switch/"
                        .to_string(),
                }],
            },
        );
        let mut cross_refs = HashMap::new();
        cross_refs.insert("367520".to_string(), 1942);
        Self {
            counts,
            cross_refs,
            catalog,
            failure: None,
        }
    }

    fn failing(counts: Arc<CallCounts>, failure: SourceError) -> Self {
        let mut scripted = Self::new(counts);
        scripted.failure = Some(failure);
        scripted
    }
}

#[async_trait]
impl GamedbClient for ScriptedGamedb {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, SourceError> {
        self.counts.search.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(self
            .catalog
            .values()
            .filter(|d| d.name.to_lowercase().contains(&query.to_lowercase()))
            .map(|d| SearchCandidate {
                id: d.id,
                name: d.name.clone(),
            })
            .collect())
    }

    async fn external_ids(&self, store_ids: &[String]) -> Result<Vec<ExternalRef>, SourceError> {
        self.counts.external_ids.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(store_ids
            .iter()
            .filter_map(|store_id| {
                self.cross_refs.get(store_id).map(|game_id| ExternalRef {
                    store_id: store_id.clone(),
                    game_id: *game_id,
                })
            })
            .collect())
    }

    async fn details(&self, game_ids: &[u64]) -> Result<Vec<GameDetail>, SourceError> {
        self.counts.details.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(game_ids
            .iter()
            .filter_map(|id| self.catalog.get(id).cloned())
            .collect())
    }
}

/// Scripted OpenCritic: one known game, optionally failing the first N
/// calls with a rate-limit response.
struct ScriptedCritic {
    counts: Arc<CallCounts>,
    rate_limit_first: u32,
    known: bool,
    score: f64,
    failure: Option<SourceError>,
}

impl ScriptedCritic {
    fn new(counts: Arc<CallCounts>) -> Self {
        Self {
            counts,
            rate_limit_first: 0,
            known: true,
            score: 90.5,
            failure: None,
        }
    }
}

#[async_trait]
impl CriticClient for ScriptedCritic {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, SourceError> {
        let n = self.counts.search.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        if n < self.rate_limit_first {
            return Err(SourceError::RateLimited);
        }
        if !self.known || !query.to_lowercase().contains("hollow") {
            return Ok(Vec::new());
        }
        Ok(vec![
            SearchCandidate {
                id: 7686,
                name: "Hollow Knight".to_string(),
            },
            SearchCandidate {
                id: 8100,
                name: "Hollow Knight: Silksong".to_string(),
            },
        ])
    }

    async fn detail(&self, game_id: u64) -> Result<Option<CriticDetail>, SourceError> {
        self.counts.detail.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        if game_id != 7686 {
            return Ok(None);
        }
        Ok(Some(CriticDetail {
            id: 7686,
            name: "Hollow Knight".to_string(),
            top_critic_score: self.score,
            tier: Some("Mighty".to_string()),
            num_reviews: Some(161),
        }))
    }
}

fn limiter() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(RateLimitConfig {
        min_interval: Duration::from_millis(10),
        initial_backoff: Duration::from_millis(20),
        max_retries: 3,
    }))
}

fn resolver_with(gamedb: ScriptedGamedb, critic: ScriptedCritic) -> Resolver {
    resolver_with_overrides(gamedb, critic, ManualOverrides::default())
}

fn resolver_with_overrides(
    gamedb: ScriptedGamedb,
    critic: ScriptedCritic,
    overrides: ManualOverrides,
) -> Resolver {
    Resolver::new(
        Arc::new(MemoryCacheStore::new()),
        Arc::new(GamedbAvailabilitySource::new(
            Arc::new(gamedb),
            limiter(),
            0.5,
        )),
        Arc::new(OpencriticReviewSource::new(Arc::new(critic), limiter(), 0.5)),
        overrides,
        ResolverConfig::default(),
    )
}

fn hollow_knight() -> CatalogItem {
    CatalogItem {
        item_id: "367520".to_string(),
        display_name: "Hollow Knight".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn review_resolution_end_to_end() {
    let counts = Arc::new(CallCounts::default());
    let resolver = resolver_with(
        ScriptedGamedb::new(Arc::clone(&counts)),
        ScriptedCritic::new(Arc::clone(&counts)),
    );

    let resolution = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();

    assert!(!resolution.from_cache);
    assert_eq!(resolution.entry.source, Provenance::Opencritic);
    let Payload::Review(Some(score)) = &resolution.entry.payload else {
        panic!("expected a review score");
    };
    assert_eq!(score.score, Some(91));
    assert_eq!(score.tier.as_deref(), Some("Mighty"));
    assert_eq!(score.critic_count, Some(161));
    assert_eq!(score.url, "https://opencritic.com/game/7686/hollow-knight");
}

#[tokio::test(start_paused = true)]
async fn availability_prefers_the_cross_reference_path() {
    let counts = Arc::new(CallCounts::default());
    let resolver = resolver_with(
        ScriptedGamedb::new(Arc::clone(&counts)),
        ScriptedCritic::new(Arc::clone(&counts)),
    );

    let resolution = resolver
        .resolve(&hollow_knight(), LookupKind::Availability)
        .await
        .unwrap();

    assert_eq!(resolution.entry.source, Provenance::Gamedb);
    let Payload::Availability(map) = &resolution.entry.payload else {
        panic!("expected availability");
    };
    assert_eq!(
        map.get(&Platform::Switch).unwrap().status,
        AvailabilityStatus::Available
    );
    assert_eq!(
        map.get(&Platform::Ps5).unwrap().status,
        AvailabilityStatus::Available
    );
    assert_eq!(
        map.get(&Platform::XboxSeries).unwrap().status,
        AvailabilityStatus::Unavailable
    );
    // The cross-reference hit means the fuzzy search path was never taken.
    assert_eq!(counts.search.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn second_lookup_is_served_from_cache() {
    let counts = Arc::new(CallCounts::default());
    let resolver = resolver_with(
        ScriptedGamedb::new(Arc::clone(&counts)),
        ScriptedCritic::new(Arc::clone(&counts)),
    );

    let first = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();
    let network_calls = counts.total();

    let second = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.entry.payload, first.entry.payload);
    assert_eq!(counts.total(), network_calls);
}

#[tokio::test(start_paused = true)]
async fn conclusive_not_found_is_cached_negatively() {
    let counts = Arc::new(CallCounts::default());
    let mut critic = ScriptedCritic::new(Arc::clone(&counts));
    critic.known = false;
    let resolver = resolver_with(ScriptedGamedb::new(Arc::clone(&counts)), critic);

    let first = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();
    assert_eq!(first.entry.payload, Payload::Review(None));
    assert_eq!(first.entry.source, Provenance::Opencritic);

    let calls_after_first = counts.total();
    let second = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();

    // The negative answer is served from cache: zero further wire calls.
    assert!(second.from_cache);
    assert_eq!(counts.total(), calls_after_first);
}

#[tokio::test(start_paused = true)]
async fn unpublished_score_is_cached_as_a_null_review() {
    let counts = Arc::new(CallCounts::default());
    let mut critic = ScriptedCritic::new(Arc::clone(&counts));
    critic.score = -1.0;
    let resolver = resolver_with(ScriptedGamedb::new(Arc::clone(&counts)), critic);

    let first = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();

    // The matched record exists but carries the no-score-yet sentinel:
    // a null payload, never a zero or absent score inside a review.
    assert_eq!(first.entry.payload, Payload::Review(None));
    assert_eq!(first.entry.source, Provenance::Opencritic);

    let calls_after_first = counts.total();
    let second = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.entry.payload, Payload::Review(None));
    assert_eq!(counts.total(), calls_after_first);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_falls_back_and_is_not_cached() {
    let counts = Arc::new(CallCounts::default());
    let mut critic = ScriptedCritic::new(Arc::clone(&counts));
    critic.failure = Some(SourceError::Network("connection reset".to_string()));
    let resolver = resolver_with(ScriptedGamedb::new(Arc::clone(&counts)), critic);

    let first = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();
    assert_eq!(first.entry.source, Provenance::FallbackUnknown);
    assert_eq!(first.entry.payload, Payload::Review(None));

    // The fallback was not persisted, so the next lookup hits the wire
    // again instead of serving the degraded answer.
    let calls_after_first = counts.total();
    let second = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();
    assert!(!second.from_cache);
    assert!(counts.total() > calls_after_first);
}

#[tokio::test(start_paused = true)]
async fn availability_transient_failure_yields_unknown_map() {
    let counts = Arc::new(CallCounts::default());
    let resolver = resolver_with(
        ScriptedGamedb::failing(Arc::clone(&counts), SourceError::Timeout),
        ScriptedCritic::new(Arc::clone(&counts)),
    );

    let resolution = resolver
        .resolve(&hollow_knight(), LookupKind::Availability)
        .await
        .unwrap();

    assert_eq!(resolution.entry.source, Provenance::FallbackUnknown);
    let Payload::Availability(map) = &resolution.entry.payload else {
        panic!("expected availability");
    };
    for platform in Platform::ALL {
        let slot = map.get(&platform).unwrap();
        assert_eq!(slot.status, AvailabilityStatus::Unknown);
        assert!(!slot.store_url.is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limit_is_absorbed_by_in_flight_retry() {
    let counts = Arc::new(CallCounts::default());
    let mut critic = ScriptedCritic::new(Arc::clone(&counts));
    critic.rate_limit_first = 2;
    let resolver = resolver_with(ScriptedGamedb::new(Arc::clone(&counts)), critic);

    let resolution = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();

    // Two rate-limit responses, then success; the caller never saw them.
    assert_eq!(resolution.entry.source, Provenance::Opencritic);
    assert_eq!(counts.search.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn overrides_beat_the_network() {
    let counts = Arc::new(CallCounts::default());
    let overrides = ManualOverrides::from_toml_str(
        r#"
        [overrides."367520"]
        switch = "unavailable"
        "#,
    )
    .unwrap();
    let resolver = resolver_with_overrides(
        ScriptedGamedb::new(Arc::clone(&counts)),
        ScriptedCritic::new(Arc::clone(&counts)),
        overrides,
    );

    let resolution = resolver
        .resolve(&hollow_knight(), LookupKind::Availability)
        .await
        .unwrap();

    assert_eq!(resolution.entry.source, Provenance::ManualOverride);
    let Payload::Availability(map) = &resolution.entry.payload else {
        panic!("expected availability");
    };
    // The override wins over the catalog, which says Available.
    assert_eq!(
        map.get(&Platform::Switch).unwrap().status,
        AvailabilityStatus::Unavailable
    );
    assert_eq!(counts.total(), 0);

    // The manual entry was persisted: the next lookup is a cache hit.
    let second = resolver
        .resolve(&hollow_knight(), LookupKind::Availability)
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.entry.source, Provenance::ManualOverride);
}

#[tokio::test(start_paused = true)]
async fn overrides_do_not_apply_to_review_lookups() {
    let counts = Arc::new(CallCounts::default());
    let overrides = ManualOverrides::from_toml_str(
        r#"
        [overrides."367520"]
        switch = "available"
        "#,
    )
    .unwrap();
    let resolver = resolver_with_overrides(
        ScriptedGamedb::new(Arc::clone(&counts)),
        ScriptedCritic::new(Arc::clone(&counts)),
        overrides,
    );

    let resolution = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();
    assert_eq!(resolution.entry.source, Provenance::Opencritic);
}

#[tokio::test(start_paused = true)]
async fn cache_hit_refreshes_the_display_name() {
    let counts = Arc::new(CallCounts::default());
    let resolver = resolver_with(
        ScriptedGamedb::new(Arc::clone(&counts)),
        ScriptedCritic::new(Arc::clone(&counts)),
    );

    resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();

    let renamed = CatalogItem {
        item_id: "367520".to_string(),
        display_name: "Hollow Knight (GOTY)".to_string(),
    };
    let resolution = resolver
        .resolve(&renamed, LookupKind::ReviewScore)
        .await
        .unwrap();

    // Still a cache hit; only the presentation name moved.
    assert!(resolution.from_cache);
    assert_eq!(resolution.entry.display_name, "Hollow Knight (GOTY)");
}

#[tokio::test(start_paused = true)]
async fn force_refresh_bypasses_a_valid_entry() {
    let counts = Arc::new(CallCounts::default());
    let resolver = resolver_with(
        ScriptedGamedb::new(Arc::clone(&counts)),
        ScriptedCritic::new(Arc::clone(&counts)),
    );

    resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();
    let calls_after_first = counts.total();

    let refreshed = resolver
        .force_refresh(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();

    assert!(!refreshed.from_cache);
    assert!(counts.total() > calls_after_first);
}

#[tokio::test(start_paused = true)]
async fn empty_batch_makes_zero_source_calls() {
    let counts = Arc::new(CallCounts::default());
    let resolver = resolver_with(
        ScriptedGamedb::new(Arc::clone(&counts)),
        ScriptedCritic::new(Arc::clone(&counts)),
    );

    let results = resolver
        .resolve_batch(&[], LookupKind::Availability)
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(counts.total(), 0);
}

#[tokio::test(start_paused = true)]
async fn batch_partitions_cached_and_pending_items() {
    let counts = Arc::new(CallCounts::default());
    let resolver = resolver_with(
        ScriptedGamedb::new(Arc::clone(&counts)),
        ScriptedCritic::new(Arc::clone(&counts)),
    );

    // Warm the cache for one of the two items.
    resolver
        .resolve(&hollow_knight(), LookupKind::Availability)
        .await
        .unwrap();

    let items = vec![
        hollow_knight(),
        CatalogItem {
            item_id: "999999".to_string(),
            display_name: "Completely Unheard Of".to_string(),
        },
    ];
    let results = resolver
        .resolve_batch(&items, LookupKind::Availability)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.get("367520").unwrap().from_cache);

    let fresh = results.get("999999").unwrap();
    assert!(!fresh.from_cache);
    // No cross-reference and no search hit: conclusive negative, cached
    // under the source's provenance.
    assert_eq!(fresh.entry.source, Provenance::Gamedb);
    let Payload::Availability(map) = &fresh.entry.payload else {
        panic!("expected availability");
    };
    assert!(map
        .values()
        .all(|slot| slot.status == AvailabilityStatus::Unknown));
}

#[tokio::test(start_paused = true)]
async fn fully_cached_batch_stays_off_the_network() {
    let counts = Arc::new(CallCounts::default());
    let resolver = resolver_with(
        ScriptedGamedb::new(Arc::clone(&counts)),
        ScriptedCritic::new(Arc::clone(&counts)),
    );

    resolver
        .resolve(&hollow_knight(), LookupKind::Availability)
        .await
        .unwrap();
    let calls_after_warm = counts.total();

    let results = resolver
        .resolve_batch(&[hollow_knight()], LookupKind::Availability)
        .await
        .unwrap();

    assert!(results.get("367520").unwrap().from_cache);
    assert_eq!(counts.total(), calls_after_warm);
}

#[tokio::test(start_paused = true)]
async fn batch_transient_failure_yields_uncached_fallbacks() {
    let counts = Arc::new(CallCounts::default());
    let resolver = resolver_with(
        ScriptedGamedb::failing(Arc::clone(&counts), SourceError::Timeout),
        ScriptedCritic::new(Arc::clone(&counts)),
    );

    let results = resolver
        .resolve_batch(&[hollow_knight()], LookupKind::Availability)
        .await
        .unwrap();

    let resolution = results.get("367520").unwrap();
    assert_eq!(resolution.entry.source, Provenance::FallbackUnknown);

    // Not persisted: a later single resolve goes back to the wire.
    let calls = counts.total();
    let again = resolver
        .resolve(&hollow_knight(), LookupKind::Availability)
        .await
        .unwrap();
    assert!(!again.from_cache);
    assert!(counts.total() > calls);
}

#[tokio::test(start_paused = true)]
async fn clear_cache_forces_requery() {
    let counts = Arc::new(CallCounts::default());
    let resolver = resolver_with(
        ScriptedGamedb::new(Arc::clone(&counts)),
        ScriptedCritic::new(Arc::clone(&counts)),
    );

    resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();
    assert_eq!(
        resolver.cache_stats(LookupKind::ReviewScore).await.unwrap().count,
        1
    );

    let removed = resolver.clear_cache(LookupKind::ReviewScore).await.unwrap();
    assert_eq!(removed, 1);

    let resolution = resolver
        .resolve(&hollow_knight(), LookupKind::ReviewScore)
        .await
        .unwrap();
    assert!(!resolution.from_cache);
}
