//! Terminal rendering of resolutions and cache summaries.

use colored::Colorize;
use portcheck_core::{
    AvailabilityStatus, CacheStats, Payload, Platform, Provenance, Resolution,
};
use std::collections::HashMap;

/// Renders one resolution for human consumption.
pub fn render_resolution(resolution: &Resolution) -> String {
    let entry = &resolution.entry;
    let mut lines = Vec::new();

    let origin = if resolution.from_cache {
        "cached".dimmed().to_string()
    } else {
        "fresh".cyan().to_string()
    };
    lines.push(format!(
        "{} {} [{origin}, via {}]",
        entry.display_name.bold(),
        format!("({})", entry.item_id).dimmed(),
        provenance_label(entry.source),
    ));

    match &entry.payload {
        Payload::Availability(map) => {
            for platform in Platform::ALL {
                if let Some(slot) = map.get(&platform) {
                    lines.push(format!(
                        "  {:<12} {}  {}",
                        platform.to_string(),
                        status_label(slot.status),
                        slot.store_url.dimmed(),
                    ));
                }
            }
        }
        Payload::Review(Some(score)) => {
            let value = score
                .score
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unscored".to_string());
            let tier = score.tier.as_deref().unwrap_or("-");
            let critics = score
                .critic_count
                .map(|n| format!("{n} critics"))
                .unwrap_or_else(|| "critic count unknown".to_string());
            lines.push(format!(
                "  score {}  tier {}  ({critics})",
                value.bold(),
                tier.bold()
            ));
            lines.push(format!("  {}", score.url.dimmed()));
        }
        Payload::Review(None) => {
            lines.push(format!("  {}", "no review score on record".yellow()));
        }
    }

    lines.join("\n")
}

/// Renders a batch result sorted by item ID for stable output.
pub fn render_batch(results: &HashMap<String, Resolution>) -> String {
    let mut ids: Vec<&String> = results.keys().collect();
    ids.sort();
    ids.iter()
        .map(|id| render_resolution(&results[*id]))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_stats(stats: &CacheStats) -> String {
    let oldest = stats
        .oldest_resolved_at
        .map(format_timestamp)
        .unwrap_or_else(|| "-".to_string());
    format!("{} entries, oldest resolved at {oldest}", stats.count)
}

fn provenance_label(source: Provenance) -> String {
    match source {
        Provenance::Gamedb => "gamedb".green().to_string(),
        Provenance::Opencritic => "opencritic".green().to_string(),
        Provenance::ManualOverride => "manual override".blue().to_string(),
        Provenance::FallbackUnknown => "fallback".yellow().to_string(),
    }
}

fn status_label(status: AvailabilityStatus) -> String {
    match status {
        AvailabilityStatus::Available => "available".green().to_string(),
        AvailabilityStatus::Unavailable => "unavailable".red().to_string(),
        AvailabilityStatus::Unknown => "unknown".yellow().to_string(),
    }
}

fn format_timestamp(ms: i64) -> String {
    // Seconds precision is plenty for a cache age display.
    let secs = ms / 1000;
    format!("{secs} (unix)")
}
