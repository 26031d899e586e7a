//! Cross-platform availability and review score resolution engine.
//!
//! Given catalog items (a store ID plus a display name), this crate
//! answers two questions per item: which consoles is it available on, and
//! what is its aggregate critic score. Answers come from unreliable
//! third-party sources, so resolution runs behind a TTL cache, per-source
//! rate limiting with in-flight retry, and fuzzy title matching; transient
//! failures degrade to explicit "unknown" answers rather than errors.
//!
//! The main entry points are [`api::Dispatcher`] for tagged-request
//! embedders and [`resolver::Resolver`] for direct library use.

pub mod api;
pub mod cache;
pub mod error;
pub mod matcher;
pub mod model;
pub mod overrides;
pub mod ratelimit;
pub mod resolver;
pub mod source;

pub use api::{Dispatcher, Request, Response};
pub use cache::{CacheStats, CacheStore, MemoryCacheStore, SqliteCacheStore};
pub use error::{Error, Result, SourceError};
pub use model::{
    AvailabilityMap, AvailabilityStatus, CacheEntry, CatalogItem, LookupKey, LookupKind, Payload,
    Platform, PlatformAvailability, Provenance, Resolution, ReviewScore, SearchCandidate,
};
pub use overrides::ManualOverrides;
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use resolver::{Resolver, ResolverConfig};
