//! Fuzzy title matching
//!
//! Free-text game titles rarely match a source's catalog exactly. This
//! module normalizes titles, scores similarity between a query and a
//! candidate, and picks the best candidate above a confidence floor.

use crate::model::SearchCandidate;
use std::collections::HashSet;

/// Default minimum similarity required to accept a fuzzy match.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// Lowercases, strips punctuation and collapses whitespace.
pub fn normalize(title: &str) -> String {
    let mut stripped = String::with_capacity(title.len());
    for ch in title.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            stripped.push(ch);
        } else if ch.is_whitespace() {
            stripped.push(' ');
        }
    }
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity between two titles, in `[0, 1]`.
///
/// Identical normalized strings score 1.0 (two empty strings are vacuously
/// identical). Containment scores a flat 0.8: base title vs.
/// title-plus-subtitle is high confidence regardless of the length delta.
/// Everything else falls back to Jaccard word-set overlap.
pub fn similarity(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);

    if na == nb {
        return 1.0;
    }
    if !na.is_empty() && !nb.is_empty() && (na.contains(&nb) || nb.contains(&na)) {
        return 0.8;
    }

    let words_a: HashSet<&str> = na.split_whitespace().collect();
    let words_b: HashSet<&str> = nb.split_whitespace().collect();
    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    intersection as f64 / union as f64
}

/// Picks the candidate most similar to `query_name`, or `None` when the
/// best score is below `min_confidence`. Ties keep the first-encountered
/// candidate (strict-greater comparison, order preserving).
pub fn select_best_candidate<'a>(
    query_name: &str,
    candidates: &'a [SearchCandidate],
    min_confidence: f64,
) -> Option<&'a SearchCandidate> {
    let mut best: Option<(&SearchCandidate, f64)> = None;
    for candidate in candidates {
        let score = similarity(query_name, &candidate.name);
        if best.map_or(true, |(_, current)| score > current) {
            best = Some((candidate, score));
        }
    }
    best.filter(|(_, score)| *score >= min_confidence)
        .map(|(candidate, _)| candidate)
}

/// Derives a URL slug from a title: lowercase, alphanumerics and hyphens
/// only, whitespace and hyphen runs collapsed to single hyphens, trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_hyphen = true;
        }
    }
    slug
}
