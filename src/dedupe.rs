// src/dedupe.rs
//! Exact-fingerprint deduplication.
//!
//! Items are grouped by `id` through a map (single pass, no pairwise comparison). Output
//! keeps the first-appearance order of each fingerprint. Survivor preference, in order:
//! non-empty summary, higher engagement, earlier `published_at`, lexically smaller
//! `source_name`, earlier position in the input.

use crate::item::CanonicalItem;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupeOutcome {
    pub items: Vec<CanonicalItem>,
    /// Number of items discarded as duplicates.
    pub collapsed: usize,
}

/// `Less` means `a` is the better survivor.
fn survivor_order(a: &CanonicalItem, b: &CanonicalItem) -> Ordering {
    b.has_summary()
        .cmp(&a.has_summary())
        .then_with(|| b.engagement.cmp(&a.engagement))
        .then_with(|| a.published_at.cmp(&b.published_at))
        .then_with(|| a.source_name.cmp(&b.source_name))
}

pub fn dedupe(items: Vec<CanonicalItem>) -> DedupeOutcome {
    let total = items.len();
    let mut index: HashMap<String, usize> = HashMap::with_capacity(total);
    let mut groups: Vec<Vec<CanonicalItem>> = Vec::new();

    for it in items {
        match index.get(&it.id) {
            Some(&g) => groups[g].push(it),
            None => {
                index.insert(it.id.clone(), groups.len());
                groups.push(vec![it]);
            }
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for mut group in groups {
        // min_by keeps the first of equal elements, so input order is the last tie-break.
        let best = group
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| survivor_order(a, b))
            .map(|(i, _)| i)
            .unwrap_or(0);

        let others: BTreeSet<String> = group
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != best)
            .map(|(_, it)| it.source_name.clone())
            .collect();

        let mut survivor = group.swap_remove(best);
        survivor.also_seen_in = others
            .into_iter()
            .filter(|s| *s != survivor.source_name)
            .collect();
        out.push(survivor);
    }

    let collapsed = total - out.len();
    DedupeOutcome {
        items: out,
        collapsed,
    }
}
