// src/pipeline.rs
//! One digest pass: normalize → filter → categorize → dedupe → select.
//!
//! `Pipeline` owns an immutable compiled copy of the configuration. A run never fails;
//! malformed and dropped items are counted in `Diagnostics`.

use crate::categorize::{Categorizer, Category};
use crate::config::DigestConfig;
use crate::dedupe::dedupe;
use crate::error::ConfigError;
use crate::filter::{filter_item, DropReason, FilterRules};
use crate::item::{CanonicalItem, SourceBatch};
use crate::normalize::normalize;
use crate::select::{select, CategorySection, RankingWeights};
use crate::suppression::SentCache;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_raw_items_total", "Raw items received from sources.");
        describe_counter!("digest_malformed_total", "Raw items without usable identity.");
        describe_counter!("digest_dropped_total", "Items dropped, labelled by reason.");
        describe_counter!("digest_deduped_total", "Items collapsed into a duplicate survivor.");
        describe_counter!("digest_suppressed_total", "Candidates already sent in an earlier digest.");
        describe_counter!("digest_selected_total", "Items placed into digest sections.");
        describe_counter!("digest_under_filled_total", "Sections that ended below min_items.");
        describe_gauge!("digest_last_run_ts", "Unix ts of the last digest run.");
    });
}

/// Per-run accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub raw_total: usize,
    pub per_source: BTreeMap<String, usize>,
    pub malformed: usize,
    pub dropped_too_old: usize,
    pub dropped_excluded_keyword: usize,
    pub dropped_low_engagement: usize,
    pub dropped_uncategorized: usize,
    pub deduped: usize,
    pub suppressed: usize,
    pub selected: usize,
    pub under_filled: Vec<String>,
}

impl Diagnostics {
    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::TooOld => self.dropped_too_old += 1,
            DropReason::ExcludedKeyword => self.dropped_excluded_keyword += 1,
            DropReason::LowEngagement => self.dropped_low_engagement += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestPayload {
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<CategorySection>,
    pub diagnostics: Diagnostics,
}

impl DigestPayload {
    pub fn section(&self, name: &str) -> Option<&CategorySection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.items.is_empty())
    }
}

#[derive(Debug)]
pub struct Pipeline {
    rules: FilterRules,
    categorizer: Categorizer,
    categories: Vec<Category>,
    weights: RankingWeights,
}

impl Pipeline {
    pub fn new(cfg: &DigestConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let categorizer = Categorizer::new(&cfg.categories, cfg.content.match_mode, cfg.fallback_map()?)?;
        Ok(Self {
            rules: cfg.filter_rules()?,
            categorizer,
            categories: cfg.categories.clone(),
            weights: cfg.ranking,
        })
    }

    pub fn run(
        &self,
        batches: &[SourceBatch],
        now: DateTime<Utc>,
        mut cache: Option<&mut dyn SentCache>,
    ) -> DigestPayload {
        ensure_metrics_described();
        let mut diag = Diagnostics::default();

        // Normalize + filter + categorize
        let mut candidates: Vec<CanonicalItem> = Vec::new();
        for batch in batches {
            *diag.per_source.entry(batch.source_name.clone()).or_default() += batch.items.len();
            diag.raw_total += batch.items.len();

            for raw in &batch.items {
                let mut item = match normalize(raw, now) {
                    Ok(it) => it,
                    Err(e) => {
                        tracing::debug!(target: "digest", source = %batch.source_name, error = %e, "malformed item skipped");
                        diag.malformed += 1;
                        continue;
                    }
                };

                if let Err(reason) = filter_item(&item, &self.rules, now) {
                    tracing::debug!(target: "digest", id = %item.id, reason = reason.as_str(), "item dropped");
                    counter!("digest_dropped_total", "reason" => reason.as_str()).increment(1);
                    diag.record_drop(reason);
                    continue;
                }

                match self.categorizer.categorize(&item) {
                    Some(cat) => {
                        let also = self.categorizer.all_matches(&item);
                        if also.len() > 1 {
                            tracing::debug!(target: "digest", id = %item.id, chosen = %cat, matched = ?also, "multiple categories matched");
                        }
                        item.category = Some(cat);
                        candidates.push(item);
                    }
                    None => {
                        tracing::debug!(target: "digest", id = %item.id, "item uncategorized");
                        counter!("digest_dropped_total", "reason" => "uncategorized").increment(1);
                        diag.dropped_uncategorized += 1;
                    }
                }
            }
        }

        // Dedupe across all categories
        let outcome = dedupe(candidates);
        diag.deduped = outcome.collapsed;

        let mut by_category: HashMap<String, Vec<CanonicalItem>> = HashMap::new();
        for it in outcome.items {
            if let Some(cat) = it.category.clone() {
                by_category.entry(cat).or_default().push(it);
            }
        }

        let selection = select(
            by_category,
            &self.categories,
            &self.weights,
            self.rules.window(),
            now,
            cache.as_deref(),
        );

        diag.suppressed = selection.suppressed;
        diag.selected = selection.selected_count();
        diag.under_filled = selection.under_filled();

        if let Some(cache) = cache.as_mut() {
            let ids = selection.fingerprints();
            if !ids.is_empty() {
                if let Err(e) = cache.mark_sent(&ids, now) {
                    tracing::warn!(target: "digest", error = ?e, "failed to record sent items");
                }
            }
        }

        // Telemetry
        counter!("digest_raw_items_total").increment(diag.raw_total as u64);
        counter!("digest_malformed_total").increment(diag.malformed as u64);
        counter!("digest_deduped_total").increment(diag.deduped as u64);
        counter!("digest_suppressed_total").increment(diag.suppressed as u64);
        counter!("digest_selected_total").increment(diag.selected as u64);
        counter!("digest_under_filled_total").increment(diag.under_filled.len() as u64);
        gauge!("digest_last_run_ts").set(now.timestamp() as f64);

        tracing::info!(
            target: "digest",
            raw = diag.raw_total,
            malformed = diag.malformed,
            too_old = diag.dropped_too_old,
            excluded = diag.dropped_excluded_keyword,
            low_engagement = diag.dropped_low_engagement,
            uncategorized = diag.dropped_uncategorized,
            deduped = diag.deduped,
            suppressed = diag.suppressed,
            selected = diag.selected,
            under_filled = ?diag.under_filled,
            "digest run complete"
        );

        DigestPayload {
            generated_at: now,
            sections: selection.sections,
            diagnostics: diag,
        }
    }
}

/// Compile `cfg` and run once.
pub fn run_pipeline(
    batches: &[SourceBatch],
    cfg: &DigestConfig,
    now: DateTime<Utc>,
    cache: Option<&mut dyn SentCache>,
) -> Result<DigestPayload, ConfigError> {
    Ok(Pipeline::new(cfg)?.run(batches, now, cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{RawItem, SourceType};
    use crate::suppression::MemorySentCache;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
    }

    fn cfg() -> DigestConfig {
        DigestConfig {
            categories: vec![
                Category::new("models", 1, &["GPT", "model"]).with_limits(1, 3),
                Category::new("tools", 2, &["assistant"]).with_limits(0, 3),
            ],
            ..DigestConfig::default()
        }
    }

    fn raw(source: &str, title: &str, url: &str) -> RawItem {
        RawItem::new(source, SourceType::Blog, title, url).published(now() - Duration::hours(2))
    }

    #[test]
    fn counts_every_raw_item_once() {
        let batches = vec![
            SourceBatch::new(
                "lab",
                SourceType::Blog,
                vec![
                    raw("lab", "New GPT model", "https://lab.example/a"),
                    raw("lab", "", ""),
                    raw("lab", "Gardening", "https://lab.example/g"),
                    raw("lab", "Old GPT", "https://lab.example/old").published(now() - Duration::days(30)),
                ],
            ),
            SourceBatch::new("hn", SourceType::Social, vec![raw("hn", "New GPT model", "https://lab.example/a/")]),
            SourceBatch::empty("down", SourceType::Blog),
        ];
        let p = Pipeline::new(&cfg()).unwrap();
        let out = p.run(&batches, now(), None);
        let d = &out.diagnostics;

        assert_eq!(d.raw_total, 5);
        assert_eq!(d.per_source.get("down"), Some(&0));
        assert_eq!(d.malformed, 1);
        assert_eq!(d.dropped_too_old, 1);
        assert_eq!(d.dropped_uncategorized, 1);
        assert_eq!(d.deduped, 1);
        assert_eq!(d.selected, 1);
        assert_eq!(
            d.raw_total,
            d.malformed
                + d.dropped_too_old
                + d.dropped_excluded_keyword
                + d.dropped_low_engagement
                + d.dropped_uncategorized
                + d.deduped
                + d.suppressed
                + d.selected
        );
        assert_eq!(d.under_filled, Vec::<String>::new());

        // Equal copies: the lexically smaller source name survives.
        let models = out.section("models").unwrap();
        assert_eq!(models.items[0].source_name, "hn");
        assert_eq!(models.items[0].also_seen_in, vec!["lab".to_string()]);
        assert_eq!(models.items[0].category.as_deref(), Some("models"));
    }

    #[test]
    fn selected_items_are_marked_and_suppressed_next_run() {
        let batches = vec![SourceBatch::new(
            "lab",
            SourceType::Blog,
            vec![raw("lab", "GPT assistant", "https://lab.example/a")],
        )];
        let p = Pipeline::new(&cfg()).unwrap();
        let mut cache = MemorySentCache::new(30);

        let first = p.run(&batches, now(), Some(&mut cache));
        assert_eq!(first.diagnostics.selected, 1);
        assert_eq!(cache.len(), 1);

        let second = p.run(&batches, now() + Duration::hours(1), Some(&mut cache));
        assert_eq!(second.diagnostics.selected, 0);
        assert_eq!(second.diagnostics.suppressed, 1);
        assert!(second.is_empty());
        assert_eq!(second.diagnostics.under_filled, vec!["models".to_string()]);
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let mut c = cfg();
        c.categories.push(Category::new("models", 3, &[]));
        assert!(matches!(
            run_pipeline(&[], &c, now(), None),
            Err(ConfigError::DuplicateCategory(_))
        ));
    }

    #[test]
    fn oversized_lookback_never_reaches_a_run() {
        let mut c = cfg();
        c.content.days_to_look_back = u32::MAX;
        assert!(matches!(
            Pipeline::new(&c),
            Err(ConfigError::LookbackTooLarge { .. })
        ));
    }

    #[test]
    fn payload_serializes_to_json() {
        let p = Pipeline::new(&cfg()).unwrap();
        let out = p.run(&[], now(), None);
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["sections"].as_array().unwrap().len(), 2);
        assert_eq!(v["diagnostics"]["raw_total"], 0);
    }
}
