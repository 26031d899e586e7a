//! Shared data model for lookups, cache entries and resolved payloads
//!
//! Everything that crosses a component boundary lives here: lookup keys,
//! platform/availability types, review scores, cache entries and the
//! provenance tags that record where a payload came from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds in one day, used by the TTL validity check.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Current time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// The category of a lookup. Each kind owns its own cache namespace and
/// payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    Availability,
    ReviewScore,
}

impl LookupKind {
    /// Stable string used as the database column value and key prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupKind::Availability => "availability",
            LookupKind::ReviewScore => "review",
        }
    }

    /// Namespace prefix for persisted cache keys.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            LookupKind::Availability => "availability:",
            LookupKind::ReviewScore => "review:",
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniquely identifies one cache slot. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey {
    pub item_id: String,
    pub kind: LookupKind,
}

impl LookupKey {
    pub fn new(item_id: impl Into<String>, kind: LookupKind) -> Self {
        Self {
            item_id: item_id.into(),
            kind,
        }
    }

    /// Namespaced key used to address the persisted row. Callers must not
    /// assume any relationship between keys of different kinds.
    pub fn storage_key(&self) -> String {
        format!("{}{}", self.kind.key_prefix(), self.item_id)
    }
}

/// The fixed set of platforms we report availability for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Switch,
    Ps5,
    XboxSeries,
}

impl Platform {
    /// All platforms, in display order.
    pub const ALL: [Platform; 3] = [Platform::Switch, Platform::Ps5, Platform::XboxSeries];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Switch => "switch",
            Platform::Ps5 => "ps5",
            Platform::XboxSeries => "xbox-series",
        }
    }

    /// Deterministic storefront search URL used when no official store
    /// link is known for a title.
    pub fn fallback_search_url(&self, display_name: &str) -> String {
        let query = urlencoding::encode(display_name);
        match self {
            Platform::Switch => {
                format!("https://www.nintendo.com/us/search/#q={query}")
            }
            Platform::Ps5 => format!("https://store.playstation.com/en-us/search/{query}"),
            Platform::XboxSeries => format!("https://www.xbox.com/en-us/search?q={query}"),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability of a title on one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    Unavailable,
    Unknown,
}

/// Per-platform availability with a store link (official when known,
/// otherwise a constructed search URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAvailability {
    pub status: AvailabilityStatus,
    pub store_url: String,
}

/// Map from platform to availability. Invariant: every [`Platform`] key is
/// always present; partial maps are never constructed.
pub type AvailabilityMap = BTreeMap<Platform, PlatformAvailability>;

/// Builds the all-Unknown availability map with search-URL fallbacks.
pub fn unknown_availability(display_name: &str) -> AvailabilityMap {
    Platform::ALL
        .iter()
        .map(|platform| {
            (
                *platform,
                PlatformAvailability {
                    status: AvailabilityStatus::Unknown,
                    store_url: platform.fallback_search_url(display_name),
                },
            )
        })
        .collect()
}

/// A resolved review score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewScore {
    /// Aggregate critic score, 0..=100. Absent when the source exposes a
    /// record without a published numeric score.
    pub score: Option<u8>,
    pub tier: Option<String>,
    pub critic_count: Option<u32>,
    /// Display URL for the matched title.
    pub url: String,
}

/// Kind-specific payload of a cache entry.
///
/// `Review(None)` is a valid, cacheable outcome distinct from "never
/// resolved": the source was queried and no score exists yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Availability(AvailabilityMap),
    Review(Option<ReviewScore>),
}

/// Where a cache entry's payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Gamedb,
    Opencritic,
    ManualOverride,
    FallbackUnknown,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Gamedb => "gamedb",
            Provenance::Opencritic => "opencritic",
            Provenance::ManualOverride => "manual-override",
            Provenance::FallbackUnknown => "fallback-unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gamedb" => Some(Provenance::Gamedb),
            "opencritic" => Some(Provenance::Opencritic),
            "manual-override" => Some(Provenance::ManualOverride),
            "fallback-unknown" => Some(Provenance::FallbackUnknown),
            _ => None,
        }
    }
}

/// Persisted record per [`LookupKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub item_id: String,
    pub display_name: String,
    pub payload: Payload,
    pub source: Provenance,
    /// When this entry was computed, ms since epoch.
    pub resolved_at: i64,
    /// Validity window in days.
    pub ttl_days: u32,
}

impl CacheEntry {
    /// TTL validity check. An entry failing this must be treated as a
    /// cache miss, never served.
    pub fn is_valid(&self, now_ms: i64) -> bool {
        self.resolved_at + i64::from(self.ttl_days) * MILLIS_PER_DAY > now_ms
    }
}

/// One candidate returned by a source's search endpoint. Transient, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub id: u64,
    pub name: String,
}

/// One catalog item submitted for resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item_id: String,
    pub display_name: String,
}

/// Resolver output: the normalized entry plus a provenance flag telling
/// whether it was served from cache or freshly resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub entry: CacheEntry,
    pub from_cache: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_keys_are_namespaced_per_kind() {
        let availability = LookupKey::new("367520", LookupKind::Availability);
        let review = LookupKey::new("367520", LookupKind::ReviewScore);

        assert_eq!(availability.storage_key(), "availability:367520");
        assert_eq!(review.storage_key(), "review:367520");
        assert_ne!(availability.storage_key(), review.storage_key());
    }

    #[test]
    fn ttl_validity_boundary() {
        let mut entry = CacheEntry {
            item_id: "1".to_string(),
            display_name: "Test".to_string(),
            payload: Payload::Review(None),
            source: Provenance::Opencritic,
            resolved_at: 0,
            ttl_days: 7,
        };

        let now = now_millis();

        entry.resolved_at = now;
        assert!(entry.is_valid(now));

        entry.resolved_at = now - 8 * MILLIS_PER_DAY;
        assert!(!entry.is_valid(now));

        // Exactly at expiry is a miss.
        entry.resolved_at = now - 7 * MILLIS_PER_DAY;
        assert!(!entry.is_valid(now));
    }

    #[test]
    fn unknown_availability_covers_every_platform() {
        let map = unknown_availability("Hollow Knight");

        assert_eq!(map.len(), Platform::ALL.len());
        for platform in Platform::ALL {
            let slot = map.get(&platform).expect("platform present");
            assert_eq!(slot.status, AvailabilityStatus::Unknown);
            assert!(slot.store_url.contains("Hollow%20Knight"));
        }
    }

    #[test]
    fn payload_round_trips_through_json() {
        let payload = Payload::Review(Some(ReviewScore {
            score: Some(91),
            tier: Some("Mighty".to_string()),
            critic_count: Some(161),
            url: "https://opencritic.com/game/7686/hollow-knight".to_string(),
        }));

        let json = serde_json::to_string(&payload).unwrap();
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);

        // The negative review payload survives too, distinct from absent.
        let negative = Payload::Review(None);
        let json = serde_json::to_string(&negative).unwrap();
        assert_eq!(serde_json::from_str::<Payload>(&json).unwrap(), negative);
    }

    #[test]
    fn provenance_round_trips_through_strings() {
        for provenance in [
            Provenance::Gamedb,
            Provenance::Opencritic,
            Provenance::ManualOverride,
            Provenance::FallbackUnknown,
        ] {
            assert_eq!(Provenance::parse(provenance.as_str()), Some(provenance));
        }
        assert_eq!(Provenance::parse("cache"), None);
    }
}
