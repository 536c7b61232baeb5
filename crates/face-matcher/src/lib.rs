//! Face Identity Matching
//!
//! Matches a live face embedding against the enrolled gallery:
//! - Euclidean distance to every enrolled descriptor
//! - Nearest record wins, earliest enrolled on exact ties
//! - Accepted only when strictly closer than the threshold

use face_store::{Embedding, Gallery};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Distance below which two descriptors are taken to be the same person
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Outcome of matching a live embedding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MatchResult {
    /// Closest enrolled face, within the threshold
    Best { name: String, distance: f32 },
    /// Nothing enrolled is close enough
    NoMatch,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Best { .. })
    }
}

/// Euclidean distance between two descriptors of equal length
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Match `live` against `gallery` using Euclidean distance
pub fn find_match(live: &Embedding, gallery: &Gallery, threshold: f32) -> MatchResult {
    find_match_with(live, gallery, threshold, euclidean_distance)
}

/// Match `live` against `gallery` using an arbitrary metric
pub fn find_match_with<F>(
    live: &Embedding,
    gallery: &Gallery,
    threshold: f32,
    mut metric: F,
) -> MatchResult
where
    F: FnMut(&[f32], &[f32]) -> f32,
{
    let Some(dimension) = gallery.dimension() else {
        return MatchResult::NoMatch;
    };

    if live.len() != dimension {
        warn!(
            "Live embedding has {} dimensions, gallery has {}",
            live.len(),
            dimension
        );
        return MatchResult::NoMatch;
    }

    let mut best: Option<(&str, f32)> = None;
    for record in gallery {
        let distance = metric(live.as_slice(), record.embedding().as_slice());
        // Strict comparison keeps the first record on ties and skips NaN
        if best.map_or(!distance.is_nan(), |(_, min)| distance < min) {
            best = Some((record.name(), distance));
        }
    }

    match best {
        Some((name, distance)) if distance < threshold => {
            debug!("Best match '{}' at distance {:.4}", name, distance);
            MatchResult::Best {
                name: name.to_string(),
                distance,
            }
        }
        Some((name, distance)) => {
            debug!(
                "Closest face '{}' at {:.4} is outside threshold {}",
                name, distance, threshold
            );
            MatchResult::NoMatch
        }
        None => MatchResult::NoMatch,
    }
}

/// Matcher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum accepted Euclidean distance (exclusive)
    pub threshold: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Matcher with a fixed threshold
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    threshold: f32,
}

impl Matcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn find(&self, live: &Embedding, gallery: &Gallery) -> MatchResult {
        find_match(live, gallery, self.threshold)
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl From<&MatcherConfig> for Matcher {
    fn from(config: &MatcherConfig) -> Self {
        Self::new(config.threshold)
    }
}
