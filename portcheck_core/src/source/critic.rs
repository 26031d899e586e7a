//! OpenCritic review score adapter
//!
//! OpenCritic has no cross-reference endpoint, so every resolution goes
//! through name search plus the matcher. A negative `top_critic_score` is
//! the provider's sentinel for "no score published yet"; it resolves to a
//! conclusive not-found, which the resolver caches as a null review
//! payload rather than a zero score.

use crate::error::SourceError;
use crate::matcher;
use crate::model::{Provenance, ReviewScore, SearchCandidate};
use crate::ratelimit::RateLimiter;
use crate::source::{CriticClient, CriticDetail, ReviewSource, SourceOutcome};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::sync::Arc;

/// Review adapter over a [`CriticClient`].
pub struct OpencriticReviewSource {
    client: Arc<dyn CriticClient>,
    limiter: Arc<RateLimiter>,
    min_confidence: f64,
}

impl OpencriticReviewSource {
    pub fn new(
        client: Arc<dyn CriticClient>,
        limiter: Arc<RateLimiter>,
        min_confidence: f64,
    ) -> Self {
        Self {
            client,
            limiter,
            min_confidence,
        }
    }

    /// Builds the review payload from a detail record carrying a published
    /// score.
    fn detail_to_score(detail: &CriticDetail) -> ReviewScore {
        ReviewScore {
            score: Some(detail.top_critic_score.round().clamp(0.0, 100.0) as u8),
            tier: detail.tier.clone(),
            critic_count: detail.num_reviews,
            url: format!(
                "https://opencritic.com/game/{}/{}",
                detail.id,
                matcher::slugify(&detail.name)
            ),
        }
    }
}

#[async_trait]
impl ReviewSource for OpencriticReviewSource {
    fn provenance(&self) -> Provenance {
        Provenance::Opencritic
    }

    async fn resolve(
        &self,
        item_id: &str,
        display_name: &str,
    ) -> Result<SourceOutcome<ReviewScore>, SourceError> {
        let candidates = self
            .limiter
            .schedule(|| self.client.search(display_name))
            .await?;

        let Some(candidate) =
            matcher::select_best_candidate(display_name, &candidates, self.min_confidence)
        else {
            debug!("opencritic has no match for {item_id} ({display_name})");
            return Ok(SourceOutcome::NotFound);
        };

        let detail = self
            .limiter
            .schedule(|| self.client.detail(candidate.id))
            .await?;

        match detail {
            // No score published yet: the provider's negative sentinel is
            // a conclusive not-found, never a zero score.
            Some(detail) if detail.top_critic_score < 0.0 => {
                debug!("opencritic has no score yet for {item_id} ({display_name})");
                Ok(SourceOutcome::NotFound)
            }
            Some(detail) => Ok(SourceOutcome::Found(Self::detail_to_score(&detail))),
            // The search hit points at a record the detail endpoint does
            // not serve; conclusive, not transient.
            None => Ok(SourceOutcome::NotFound),
        }
    }
}

/// reqwest-backed [`CriticClient`].
pub struct HttpCriticClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WireSearchHit {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireGame {
    id: u64,
    name: String,
    #[serde(rename = "topCriticScore", default = "no_score")]
    top_critic_score: f64,
    #[serde(default)]
    tier: Option<String>,
    #[serde(rename = "numReviews", default)]
    num_reviews: Option<u32>,
}

fn no_score() -> f64 {
    -1.0
}

impl HttpCriticClient {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SourceError::RateLimited);
        }
        if status.as_u16() == 404 {
            return Err(SourceError::Http { status: 404 });
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
}

#[async_trait]
impl CriticClient for HttpCriticClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, SourceError> {
        let hits: Vec<WireSearchHit> = self
            .get_json("/game/search", &[("criteria", query.to_string())])
            .await?;
        Ok(hits
            .into_iter()
            .map(|hit| SearchCandidate {
                id: hit.id,
                name: hit.name,
            })
            .collect())
    }

    async fn detail(&self, game_id: u64) -> Result<Option<CriticDetail>, SourceError> {
        let result: Result<WireGame, SourceError> =
            self.get_json(&format!("/game/{game_id}"), &[]).await;
        match result {
            Ok(game) => Ok(Some(CriticDetail {
                id: game.id,
                name: game.name,
                top_critic_score: game.top_critic_score,
                tier: game.tier,
                num_reviews: game.num_reviews,
            })),
            Err(SourceError::Http { status: 404 }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
