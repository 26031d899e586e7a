//! External data source adapters
//!
//! Each adapter wraps one provider's search-then-detail query pattern
//! behind the rate limiter and name matcher, producing a normalized
//! payload or a first-class "not found". The wire clients are trait seams
//! so tests can substitute scripted responses for HTTP.

use crate::error::SourceError;
use crate::model::{AvailabilityMap, CatalogItem, Platform, Provenance, SearchCandidate};
use async_trait::async_trait;
use log::warn;
use std::collections::HashMap;

pub mod critic;
pub mod gamedb;

pub use critic::{HttpCriticClient, OpencriticReviewSource};
pub use gamedb::{GamedbAvailabilitySource, HttpGamedbClient};

/// Outcome of one source resolution. "Not found" is a value, never an
/// error: it leads to an explicit negative cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome<T> {
    Found(T),
    NotFound,
}

/// Cross-reference row: store ID to the source's internal game ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    pub store_id: String,
    pub game_id: u64,
}

/// Official storefront link attached to a catalog detail record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLink {
    pub platform: Platform,
    pub url: String,
}

/// Detail record from the availability catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDetail {
    pub id: u64,
    pub name: String,
    pub platform_ids: Vec<u64>,
    pub store_links: Vec<StoreLink>,
}

/// Detail record from the review aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticDetail {
    pub id: u64,
    pub name: String,
    /// Negative sentinel means "no score published yet".
    pub top_critic_score: f64,
    pub tier: Option<String>,
    pub num_reviews: Option<u32>,
}

/// Wire contract of the availability catalog (GameDB).
#[async_trait]
pub trait GamedbClient: Send + Sync {
    /// Fuzzy search by title.
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, SourceError>;

    /// Batched cross-reference lookup: store IDs to internal game IDs.
    /// IDs with no cross-reference row are simply absent from the result.
    async fn external_ids(&self, store_ids: &[String]) -> Result<Vec<ExternalRef>, SourceError>;

    /// Batched detail fetch by internal game ID.
    async fn details(&self, game_ids: &[u64]) -> Result<Vec<GameDetail>, SourceError>;
}

/// Wire contract of the review aggregator (OpenCritic).
#[async_trait]
pub trait CriticClient: Send + Sync {
    /// Fuzzy search by title.
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, SourceError>;

    /// Detail fetch by game ID.
    async fn detail(&self, game_id: u64) -> Result<Option<CriticDetail>, SourceError>;
}

/// Adapter producing platform availability payloads.
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    fn provenance(&self) -> Provenance;

    async fn resolve(
        &self,
        item_id: &str,
        display_name: &str,
    ) -> Result<SourceOutcome<AvailabilityMap>, SourceError>;

    /// Batch resolution. Items absent from the returned map failed
    /// transiently; the caller must not cache anything for them. The
    /// default implementation queries sequentially; adapters whose source
    /// supports multi-ID batching override it.
    async fn resolve_batch(
        &self,
        items: &[CatalogItem],
    ) -> HashMap<String, SourceOutcome<AvailabilityMap>> {
        let mut results = HashMap::new();
        for item in items {
            match self.resolve(&item.item_id, &item.display_name).await {
                Ok(outcome) => {
                    results.insert(item.item_id.clone(), outcome);
                }
                Err(e) => {
                    warn!("availability lookup failed for {}: {e}", item.item_id);
                }
            }
        }
        results
    }
}

/// Adapter producing review score payloads.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    fn provenance(&self) -> Provenance;

    async fn resolve(
        &self,
        item_id: &str,
        display_name: &str,
    ) -> Result<SourceOutcome<crate::model::ReviewScore>, SourceError>;
}
