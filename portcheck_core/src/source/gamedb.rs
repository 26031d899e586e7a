//! GameDB availability adapter
//!
//! GameDB is the catalog source for platform availability. The preferred
//! path is the cross-reference lookup (store ID to GameDB ID), which
//! skips fuzzy matching entirely; titles without a cross-reference row
//! fall back to name search plus the matcher. Platform membership comes
//! from an allowlist check over the detail record's platform IDs.

use crate::error::SourceError;
use crate::matcher;
use crate::model::{
    AvailabilityMap, AvailabilityStatus, CatalogItem, Platform, PlatformAvailability, Provenance,
    SearchCandidate,
};
use crate::ratelimit::RateLimiter;
use crate::source::{
    AvailabilitySource, ExternalRef, GameDetail, GamedbClient, SourceOutcome, StoreLink,
};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// GameDB platform IDs counted as the handheld console.
const SWITCH_PLATFORM_IDS: &[u64] = &[130];
/// GameDB platform IDs counted as the first first-party console.
const PS5_PLATFORM_IDS: &[u64] = &[167];
/// GameDB platform IDs counted as the second first-party console.
const XBOX_SERIES_PLATFORM_IDS: &[u64] = &[169];

fn allowlist(platform: Platform) -> &'static [u64] {
    match platform {
        Platform::Switch => SWITCH_PLATFORM_IDS,
        Platform::Ps5 => PS5_PLATFORM_IDS,
        Platform::XboxSeries => XBOX_SERIES_PLATFORM_IDS,
    }
}

/// Availability adapter over a [`GamedbClient`].
pub struct GamedbAvailabilitySource {
    client: Arc<dyn GamedbClient>,
    limiter: Arc<RateLimiter>,
    min_confidence: f64,
}

impl GamedbAvailabilitySource {
    pub fn new(
        client: Arc<dyn GamedbClient>,
        limiter: Arc<RateLimiter>,
        min_confidence: f64,
    ) -> Self {
        Self {
            client,
            limiter,
            min_confidence,
        }
    }

    /// Cross-reference lookup for one store ID.
    async fn lookup_by_store_id(&self, item_id: &str) -> Result<Option<u64>, SourceError> {
        let ids = [item_id.to_string()];
        let refs = self
            .limiter
            .schedule(|| self.client.external_ids(&ids))
            .await?;
        Ok(refs
            .iter()
            .find(|r| r.store_id == item_id)
            .map(|r| r.game_id))
    }

    /// Name-search fallback when no cross-reference row exists.
    async fn lookup_by_name(&self, display_name: &str) -> Result<Option<u64>, SourceError> {
        let candidates = self
            .limiter
            .schedule(|| self.client.search(display_name))
            .await?;
        Ok(
            matcher::select_best_candidate(display_name, &candidates, self.min_confidence)
                .map(|c| c.id),
        )
    }

    async fn fetch_detail(&self, game_id: u64) -> Result<Option<GameDetail>, SourceError> {
        let ids = [game_id];
        let details = self.limiter.schedule(|| self.client.details(&ids)).await?;
        Ok(details.into_iter().find(|d| d.id == game_id))
    }

    /// Normalizes a detail record into the full availability map.
    fn detail_to_map(&self, detail: &GameDetail, display_name: &str) -> AvailabilityMap {
        Platform::ALL
            .iter()
            .map(|platform| {
                let available = detail
                    .platform_ids
                    .iter()
                    .any(|id| allowlist(*platform).contains(id));
                let status = if available {
                    AvailabilityStatus::Available
                } else {
                    AvailabilityStatus::Unavailable
                };
                let store_url = detail
                    .store_links
                    .iter()
                    .find(|link| link.platform == *platform)
                    .map(|link| link.url.clone())
                    .unwrap_or_else(|| platform.fallback_search_url(display_name));
                (*platform, PlatformAvailability { status, store_url })
            })
            .collect()
    }
}

#[async_trait]
impl AvailabilitySource for GamedbAvailabilitySource {
    fn provenance(&self) -> Provenance {
        Provenance::Gamedb
    }

    async fn resolve(
        &self,
        item_id: &str,
        display_name: &str,
    ) -> Result<SourceOutcome<AvailabilityMap>, SourceError> {
        let game_id = match self.lookup_by_store_id(item_id).await? {
            Some(id) => {
                debug!("gamedb cross-reference hit for {item_id}: game {id}");
                Some(id)
            }
            None => self.lookup_by_name(display_name).await?,
        };

        let Some(game_id) = game_id else {
            debug!("gamedb has no match for {item_id} ({display_name})");
            return Ok(SourceOutcome::NotFound);
        };

        match self.fetch_detail(game_id).await? {
            Some(detail) => Ok(SourceOutcome::Found(
                self.detail_to_map(&detail, display_name),
            )),
            None => Ok(SourceOutcome::NotFound),
        }
    }

    /// One batched cross-reference call and one batched detail call cover
    /// every item with a cross-reference row; the rest fall back to
    /// per-item name search.
    async fn resolve_batch(
        &self,
        items: &[CatalogItem],
    ) -> HashMap<String, SourceOutcome<AvailabilityMap>> {
        let mut results = HashMap::new();
        if items.is_empty() {
            return results;
        }

        let store_ids: Vec<String> = items.iter().map(|i| i.item_id.clone()).collect();
        let refs = match self
            .limiter
            .schedule(|| self.client.external_ids(&store_ids))
            .await
        {
            Ok(refs) => refs,
            Err(e) => {
                warn!("gamedb batched cross-reference failed: {e}");
                return results;
            }
        };
        let by_store: HashMap<&str, u64> = refs
            .iter()
            .map(|r| (r.store_id.as_str(), r.game_id))
            .collect();

        let game_ids: Vec<u64> = by_store.values().copied().collect();
        let details: HashMap<u64, GameDetail> = if game_ids.is_empty() {
            HashMap::new()
        } else {
            match self.limiter.schedule(|| self.client.details(&game_ids)).await {
                Ok(details) => details.into_iter().map(|d| (d.id, d)).collect(),
                Err(e) => {
                    warn!("gamedb batched detail fetch failed: {e}");
                    return results;
                }
            }
        };

        for item in items {
            match by_store.get(item.item_id.as_str()) {
                Some(game_id) => {
                    let outcome = match details.get(game_id) {
                        Some(detail) => {
                            SourceOutcome::Found(self.detail_to_map(detail, &item.display_name))
                        }
                        None => SourceOutcome::NotFound,
                    };
                    results.insert(item.item_id.clone(), outcome);
                }
                None => {
                    // No cross-reference row; fall back to the fuzzy path.
                    match self.resolve(&item.item_id, &item.display_name).await {
                        Ok(outcome) => {
                            results.insert(item.item_id.clone(), outcome);
                        }
                        Err(e) => {
                            warn!("availability lookup failed for {}: {e}", item.item_id);
                        }
                    }
                }
            }
        }

        results
    }
}

/// reqwest-backed [`GamedbClient`].
pub struct HttpGamedbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireExternalRef {
    uid: String,
    game: u64,
}

#[derive(Debug, Deserialize)]
struct WireStoreLink {
    platform: u64,
    url: String,
}

#[derive(Debug, Deserialize)]
struct WireDetail {
    id: u64,
    name: String,
    #[serde(default)]
    platforms: Vec<u64>,
    #[serde(default)]
    storefronts: Vec<WireStoreLink>,
}

impl HttpGamedbClient {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("x-api-key", &self.api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }

    /// Maps a storefront platform ID onto our platform enum, dropping
    /// storefronts we do not track.
    fn link_platform(platform_id: u64) -> Option<Platform> {
        if SWITCH_PLATFORM_IDS.contains(&platform_id) {
            Some(Platform::Switch)
        } else if PS5_PLATFORM_IDS.contains(&platform_id) {
            Some(Platform::Ps5)
        } else if XBOX_SERIES_PLATFORM_IDS.contains(&platform_id) {
            Some(Platform::XboxSeries)
        } else {
            None
        }
    }
}

#[async_trait]
impl GamedbClient for HttpGamedbClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, SourceError> {
        let candidates: Vec<WireCandidate> = self
            .get_json("/games", &[("search", query.to_string())])
            .await?;
        Ok(candidates
            .into_iter()
            .map(|c| SearchCandidate {
                id: c.id,
                name: c.name,
            })
            .collect())
    }

    async fn external_ids(&self, store_ids: &[String]) -> Result<Vec<ExternalRef>, SourceError> {
        let refs: Vec<WireExternalRef> = self
            .get_json("/external_games", &[("uids", store_ids.join(","))])
            .await?;
        Ok(refs
            .into_iter()
            .map(|r| ExternalRef {
                store_id: r.uid,
                game_id: r.game,
            })
            .collect())
    }

    async fn details(&self, game_ids: &[u64]) -> Result<Vec<GameDetail>, SourceError> {
        let ids = game_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let details: Vec<WireDetail> = self.get_json("/games", &[("ids", ids)]).await?;
        Ok(details
            .into_iter()
            .map(|d| GameDetail {
                id: d.id,
                name: d.name,
                platform_ids: d.platforms,
                store_links: d
                    .storefronts
                    .into_iter()
                    .filter_map(|link| {
                        Self::link_platform(link.platform).map(|platform| StoreLink {
                            platform,
                            url: link.url,
                        })
                    })
                    .collect(),
            })
            .collect())
    }
}
