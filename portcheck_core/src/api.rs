//! Request dispatch surface
//!
//! Tagged JSON requests map one-to-one onto resolver operations. The
//! dispatcher is the single entry point embedders talk to; a malformed or
//! unknown request is a configuration error and surfaces immediately
//! instead of degrading to a fallback answer.

use crate::cache::CacheStats;
use crate::error::{Error, Result};
use crate::model::{CatalogItem, LookupKind, Resolution};
use crate::resolver::Resolver;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// One request to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Resolve {
        item: CatalogItem,
        kind: LookupKind,
    },
    BatchResolve {
        items: Vec<CatalogItem>,
        kind: LookupKind,
    },
    ForceRefresh {
        item: CatalogItem,
        kind: LookupKind,
    },
    CacheStats {
        kind: LookupKind,
    },
    ClearCache {
        kind: LookupKind,
    },
}

/// The answer to one [`Request`], shaped per request type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Resolved(Resolution),
    Batch(HashMap<String, Resolution>),
    Stats(CacheStats),
    Cleared { removed: u64 },
}

/// Routes requests to a shared [`Resolver`]. Cheap to clone; all clones
/// share the same resolver and cache.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<Resolver>,
}

impl Dispatcher {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    /// Parses a JSON request. Unknown tags and missing fields are
    /// configuration errors.
    pub fn parse(raw: &str) -> Result<Request> {
        serde_json::from_str(raw).map_err(|e| Error::Config(format!("invalid request: {e}")))
    }

    /// Executes one request to completion.
    pub async fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::Resolve { item, kind } => {
                let resolution = self.resolver.resolve(&item, kind).await?;
                Ok(Response::Resolved(resolution))
            }
            Request::BatchResolve { items, kind } => {
                let resolutions = self.resolver.resolve_batch(&items, kind).await?;
                Ok(Response::Batch(resolutions))
            }
            Request::ForceRefresh { item, kind } => {
                let resolution = self.resolver.force_refresh(&item, kind).await?;
                Ok(Response::Resolved(resolution))
            }
            Request::CacheStats { kind } => {
                let stats = self.resolver.cache_stats(kind).await?;
                Ok(Response::Stats(stats))
            }
            Request::ClearCache { kind } => {
                let removed = self.resolver.clear_cache(kind).await?;
                Ok(Response::Cleared { removed })
            }
        }
    }

    /// Executes one request with an answer deadline.
    ///
    /// The request keeps running after the deadline fires: cache writes
    /// from a slow resolution still land, they just miss this response.
    pub async fn dispatch_with_deadline(
        &self,
        request: Request,
        deadline: Duration,
    ) -> Result<Response> {
        let dispatcher = self.clone();
        let task = tokio::spawn(async move { dispatcher.dispatch(request).await });

        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::Config(format!("dispatch task failed: {join_err}"))),
            Err(_) => Err(Error::DeadlineExceeded(deadline)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_round_trip_through_their_tags() {
        let raw = r#"{
            "type": "resolve",
            "item": {"item_id": "367520", "display_name": "Hollow Knight"},
            "kind": "availability"
        }"#;
        let request = Dispatcher::parse(raw).unwrap();
        assert!(matches!(request, Request::Resolve { .. }));

        let raw = r#"{"type": "cache_stats", "kind": "review_score"}"#;
        assert!(matches!(
            Dispatcher::parse(raw).unwrap(),
            Request::CacheStats {
                kind: LookupKind::ReviewScore
            }
        ));
    }

    #[test]
    fn unknown_tag_is_a_config_error() {
        let err = Dispatcher::parse(r#"{"type": "explode"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Dispatcher::parse("not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_fields_are_a_config_error() {
        let err = Dispatcher::parse(r#"{"type": "resolve", "kind": "availability"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
