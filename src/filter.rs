// src/filter.rs
//! Filter engine: recency window, exclusion keywords, engagement thresholds.
//!
//! Checks run in that order and stop at the first failure, so every dropped item carries
//! exactly one reason.

use crate::item::{CanonicalItem, SourceType};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Why an item was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    TooOld,
    ExcludedKeyword,
    LowEngagement,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::TooOld => "too_old",
            DropReason::ExcludedKeyword => "excluded_keyword",
            DropReason::LowEngagement => "low_engagement",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_DAYS_TO_LOOK_BACK: u32 = 7;
/// Upper bound accepted by config validation (100 years).
pub const MAX_DAYS_TO_LOOK_BACK: u32 = 36_500;

/// Filtering rules as consumed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRules {
    /// Any case-insensitive occurrence in title + summary drops the item.
    pub exclude_keywords: Vec<String>,
    /// When non-empty, an occurrence of any of these waives the exclusion.
    pub exclude_unless: Vec<String>,
    /// Source names or URL domains exempt from engagement thresholds.
    pub trusted_domains: Vec<String>,
    pub days_to_look_back: u32,
    /// Minimum engagement per source type; a missing type means 0.
    pub min_engagement: HashMap<SourceType, i64>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            exclude_keywords: Vec::new(),
            exclude_unless: Vec::new(),
            trusted_domains: Vec::new(),
            days_to_look_back: DEFAULT_DAYS_TO_LOOK_BACK,
            min_engagement: HashMap::new(),
        }
    }
}

impl FilterRules {
    pub fn window(&self) -> Duration {
        Duration::days(i64::from(self.days_to_look_back))
    }

    /// Oldest publication time still kept at `now`.
    /// Saturates at the earliest representable time for windows reaching past it.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn min_engagement_for(&self, source_type: SourceType) -> i64 {
        self.min_engagement.get(&source_type).copied().unwrap_or(0)
    }

    /// Source name match (case-insensitive) or URL host equal to / under a listed domain.
    pub fn is_trusted(&self, item: &CanonicalItem) -> bool {
        if self.trusted_domains.is_empty() {
            return false;
        }
        let source = item.source_name.trim();
        if self
            .trusted_domains
            .iter()
            .any(|d| d.trim().eq_ignore_ascii_case(source))
        {
            return true;
        }
        let host = match Url::parse(&item.url).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase)) {
            Some(h) => h,
            None => return false,
        };
        self.trusted_domains.iter().any(|d| {
            let d = d.trim().trim_start_matches("www.").to_ascii_lowercase();
            !d.is_empty() && (host == d || host.ends_with(&format!(".{d}")))
        })
    }

    fn is_excluded(&self, item: &CanonicalItem) -> bool {
        if self.exclude_keywords.is_empty() {
            return false;
        }
        let text = item.match_text().to_lowercase();
        let hit = self
            .exclude_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && text.contains(&k));
        if !hit {
            return false;
        }
        let waived = self
            .exclude_unless
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && text.contains(&k));
        !waived
    }
}

/// Keep (`Ok`) or drop with a reason.
pub fn filter_item(item: &CanonicalItem, rules: &FilterRules, now: DateTime<Utc>) -> Result<(), DropReason> {
    // 1) Recency (inclusive boundary)
    if item.published_at < rules.cutoff(now) {
        return Err(DropReason::TooOld);
    }

    // 2) Exclusion keywords
    if rules.is_excluded(item) {
        return Err(DropReason::ExcludedKeyword);
    }

    // 3) Engagement
    if item.engagement < rules.min_engagement_for(item.source_type) && !rules.is_trusted(item) {
        return Err(DropReason::LowEngagement);
    }

    Ok(())
}
