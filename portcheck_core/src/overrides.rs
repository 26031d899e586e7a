//! Manual availability overrides
//!
//! A statically configured, read-only table of per-item corrections.
//! Overrides take priority over network resolution but below the cache;
//! the resolver persists a manual entry the first time one is consulted.

use crate::model::{
    unknown_availability, AvailabilityStatus, CacheEntry, Payload, Platform, Provenance,
};
use serde::Deserialize;
use std::collections::HashMap;

/// Read-only map of item ID to per-platform status corrections.
///
/// TOML shape:
///
/// ```toml
/// [overrides."367520"]
/// switch = "available"
/// ps5 = "unavailable"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManualOverrides {
    #[serde(default)]
    overrides: HashMap<String, HashMap<Platform, AvailabilityStatus>>,
}

impl ManualOverrides {
    /// Parses an overrides table from TOML. Unknown platforms or statuses
    /// are a configuration error, not silently dropped.
    pub fn from_toml_str(raw: &str) -> Result<Self, crate::error::Error> {
        toml::from_str(raw)
            .map_err(|e| crate::error::Error::Config(format!("invalid overrides table: {e}")))
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Statuses configured for an item, if any.
    pub fn get(&self, item_id: &str) -> Option<&HashMap<Platform, AvailabilityStatus>> {
        self.overrides.get(item_id)
    }

    /// Builds the cache entry a configured override resolves to. Platforms
    /// the override does not mention stay Unknown; store links fall back
    /// to constructed search URLs.
    pub fn availability_entry(
        &self,
        item_id: &str,
        display_name: &str,
        resolved_at: i64,
        ttl_days: u32,
    ) -> Option<CacheEntry> {
        let statuses = self.get(item_id)?;
        let mut map = unknown_availability(display_name);
        for (platform, status) in statuses {
            if let Some(slot) = map.get_mut(platform) {
                slot.status = *status;
            }
        }
        Some(CacheEntry {
            item_id: item_id.to_string(),
            display_name: display_name.to_string(),
            payload: Payload::Availability(map),
            source: Provenance::ManualOverride,
            resolved_at,
            ttl_days,
        })
    }
}
