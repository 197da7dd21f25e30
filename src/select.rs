// src/select.rs
//! Selector/ranker: per-category scoring, ordering and size limits.
//!
//! score = recency_weight * recency + engagement_weight * engagement, where
//! - recency is a linear decay over the look-back window (newest 1.0, oldest 0.0),
//! - engagement is `ln(1 + e) / ln(1 + max_e)` against the category's own pool, so a single
//!   viral item does not flatten everything else to zero.
//!
//! Ordering: score desc, then newer first, then title asc, then fingerprint asc.

use crate::categorize::{ordered_enabled, Category};
use crate::error::ConfigError;
use crate::item::CanonicalItem;
use crate::suppression::SentCache;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

fn default_half() -> f64 {
    0.5
}

/// Ranking weights. Equal weighting when unspecified.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    #[serde(default = "default_half")]
    pub recency_weight: f64,
    #[serde(default = "default_half")]
    pub engagement_weight: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            recency_weight: default_half(),
            engagement_weight: default_half(),
        }
    }
}

impl RankingWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("recency_weight", self.recency_weight),
            ("engagement_weight", self.engagement_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        Ok(())
    }
}

/// Linear decay across the window, clamped to [0, 1]. A zero window scores everything 1.0.
pub fn recency_score(published_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> f64 {
    let window_ms = window.num_milliseconds();
    if window_ms <= 0 {
        return 1.0;
    }
    let age_ms = now.signed_duration_since(published_at).num_milliseconds().max(0);
    (1.0 - age_ms as f64 / window_ms as f64).clamp(0.0, 1.0)
}

/// Log-scaled engagement against the pool maximum. Negative values count as zero.
pub fn engagement_score(engagement: i64, max_engagement: i64) -> f64 {
    let max = max_engagement.max(0);
    if max == 0 {
        return 0.0;
    }
    let e = engagement.clamp(0, max) as f64;
    ((1.0 + e).ln() / (1.0 + max as f64).ln()).clamp(0.0, 1.0)
}

/// Total order used for the final per-category ordering.
pub fn rank_order(a: &CanonicalItem, b: &CanonicalItem) -> Ordering {
    let sa = a.score.unwrap_or(0.0);
    let sb = b.score.unwrap_or(0.0);
    sb.total_cmp(&sa)
        .then_with(|| b.published_at.cmp(&a.published_at))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_ranked(items: &mut [CanonicalItem]) {
    items.sort_by(rank_order);
}

/// Fill `score` on every item of one category pool and sort it.
pub fn rank(items: &mut [CanonicalItem], weights: &RankingWeights, window: Duration, now: DateTime<Utc>) {
    let max_engagement = items.iter().map(|i| i.engagement).max().unwrap_or(0);
    for it in items.iter_mut() {
        let recency = recency_score(it.published_at, now, window);
        let engagement = engagement_score(it.engagement, max_engagement);
        it.score = Some(weights.recency_weight * recency + weights.engagement_weight * engagement);
    }
    sort_ranked(items);
}

/// Final, bounded list for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySection {
    pub name: String,
    pub priority: i32,
    pub min_items: usize,
    pub max_items: usize,
    pub items: Vec<CanonicalItem>,
    /// Fewer than `min_items` survived. Reported, never fatal.
    pub under_filled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
    /// Enabled categories in priority order; empty categories are present too.
    pub sections: Vec<CategorySection>,
    /// Candidates removed because they were sent in an earlier run.
    pub suppressed: usize,
}

impl Selection {
    pub fn get(&self, name: &str) -> Option<&CategorySection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn under_filled(&self) -> Vec<String> {
        self.sections
            .iter()
            .filter(|s| s.under_filled)
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    pub fn fingerprints(&self) -> Vec<String> {
        self.sections
            .iter()
            .flat_map(|s| s.items.iter().map(|i| i.id.clone()))
            .collect()
    }
}

/// Score, order and bound each enabled category's candidates.
///
/// `cache` is only read here: candidates it reports as already sent are removed before
/// scoring, so they do not inflate the engagement scale either.
pub fn select(
    mut items_by_category: HashMap<String, Vec<CanonicalItem>>,
    categories: &[Category],
    weights: &RankingWeights,
    window: Duration,
    now: DateTime<Utc>,
    cache: Option<&dyn SentCache>,
) -> Selection {
    let mut selection = Selection::default();

    for cat in ordered_enabled(categories) {
        let mut pool = items_by_category.remove(&cat.name).unwrap_or_default();

        if let Some(cache) = cache {
            let before = pool.len();
            pool.retain(|it| !cache.was_sent(&it.id, now));
            selection.suppressed += before - pool.len();
        }

        rank(&mut pool, weights, window, now);
        pool.truncate(cat.max_items);

        let under_filled = pool.len() < cat.min_items;
        if under_filled {
            tracing::info!(
                target: "digest",
                category = %cat.name,
                have = pool.len(),
                min = cat.min_items,
                "category under-filled"
            );
        }

        selection.sections.push(CategorySection {
            name: cat.name.clone(),
            priority: cat.priority,
            min_items: cat.min_items,
            max_items: cat.max_items,
            items: pool,
            under_filled,
        });
    }

    selection
}
