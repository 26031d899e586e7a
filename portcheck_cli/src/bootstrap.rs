//! Wires the resolver together from loaded configuration: durable cache,
//! HTTP clients, per-source rate limiters and the overrides table.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use portcheck_core::cache::SqliteCacheStore;
use portcheck_core::source::{
    GamedbAvailabilitySource, HttpCriticClient, HttpGamedbClient, OpencriticReviewSource,
};
use portcheck_core::{
    Dispatcher, ManualOverrides, RateLimitConfig, RateLimiter, Resolver, ResolverConfig,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Builds a dispatcher from the app configuration.
pub async fn build_dispatcher(config: &AppConfig, overrides_path: &Path) -> Result<Dispatcher> {
    let cache = SqliteCacheStore::open(&config.cache_db_path())
        .await
        .context("Failed to open cache database")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.sources.request_timeout_seconds))
        .build()
        .context("Failed to build HTTP client")?;

    let gamedb_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
        min_interval: Duration::from_millis(config.sources.gamedb_min_interval_ms),
        ..RateLimitConfig::default()
    }));
    let critic_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
        min_interval: Duration::from_millis(config.sources.opencritic_min_interval_ms),
        ..RateLimitConfig::default()
    }));

    let availability = GamedbAvailabilitySource::new(
        Arc::new(HttpGamedbClient::new(
            http.clone(),
            config.sources.gamedb_base_url.clone(),
            config.sources.gamedb_api_key.clone(),
        )),
        gamedb_limiter,
        config.sources.min_confidence,
    );
    let review = OpencriticReviewSource::new(
        Arc::new(HttpCriticClient::new(
            http,
            config.sources.opencritic_base_url.clone(),
        )),
        critic_limiter,
        config.sources.min_confidence,
    );

    let overrides = load_overrides(overrides_path)?;

    let resolver = Resolver::new(
        Arc::new(cache),
        Arc::new(availability),
        Arc::new(review),
        overrides,
        ResolverConfig {
            ttl_days: config.resolver.ttl_days,
        },
    );

    Ok(Dispatcher::new(Arc::new(resolver)))
}

/// Loads the manual overrides table; a missing file is an empty table, a
/// malformed one is an error.
fn load_overrides(path: &Path) -> Result<ManualOverrides> {
    if !path.exists() {
        return Ok(ManualOverrides::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read overrides file {}", path.display()))?;
    ManualOverrides::from_toml_str(&raw)
        .with_context(|| format!("Invalid overrides file {}", path.display()))
}
