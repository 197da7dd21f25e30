// src/categorize.rs
//! Keyword categorizer.
//!
//! Category keywords are compiled once into case-insensitive regexes. Enabled categories
//! are tried in ascending `priority` (declaration order breaks equal priorities) and the
//! first one with any matching keyword wins: an item never lands in two categories.

use crate::error::ConfigError;
use crate::item::{CanonicalItem, SourceType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a keyword is matched against title + summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Substring,
    WholeWord,
}

fn default_max_items() -> usize {
    5
}

fn default_priority() -> i32 {
    5
}

fn default_enabled() -> bool {
    true
}

/// Named bucket with keyword membership and size constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub min_items: usize,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Lower is shown (and matched) first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Category {
    pub fn new(name: impl Into<String>, priority: i32, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            min_items: 0,
            max_items: default_max_items(),
            priority,
            enabled: true,
        }
    }

    pub fn with_limits(mut self, min_items: usize, max_items: usize) -> Self {
        self.min_items = min_items;
        self.max_items = max_items;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Enabled categories sorted for matching and display: ascending priority, stable.
pub fn ordered_enabled(categories: &[Category]) -> Vec<&Category> {
    let mut out: Vec<&Category> = categories.iter().filter(|c| c.enabled).collect();
    out.sort_by_key(|c| c.priority);
    out
}

/// Build the matcher for one keyword. Word boundaries are only asserted on a side where
/// the keyword starts/ends with a word character, so `c++` or `.net` still match.
pub fn keyword_pattern(keyword: &str, mode: MatchMode) -> String {
    let escaped = regex::escape(keyword);
    match mode {
        MatchMode::Substring => format!("(?i){escaped}"),
        MatchMode::WholeWord => {
            let is_word = |c: char| c.is_alphanumeric() || c == '_';
            let lead = if keyword.chars().next().is_some_and(is_word) { r"\b" } else { "" };
            let trail = if keyword.chars().last().is_some_and(is_word) { r"\b" } else { "" };
            format!("(?i){lead}{escaped}{trail}")
        }
    }
}

#[derive(Debug)]
struct CompiledCategory {
    name: String,
    matchers: Vec<Regex>,
}

impl CompiledCategory {
    fn matches(&self, text: &str) -> bool {
        self.matchers.iter().any(|re| re.is_match(text))
    }
}

/// Compiled, immutable categorizer.
#[derive(Debug)]
pub struct Categorizer {
    ordered: Vec<CompiledCategory>,
    fallback: HashMap<SourceType, String>,
}

impl Categorizer {
    pub fn new(
        categories: &[Category],
        mode: MatchMode,
        fallback: HashMap<SourceType, String>,
    ) -> Result<Self, ConfigError> {
        let ordered = ordered_enabled(categories)
            .into_iter()
            .map(|c| {
                let matchers = c
                    .keywords
                    .iter()
                    .map(|k| k.trim())
                    .filter(|k| !k.is_empty())
                    .map(|k| {
                        Regex::new(&keyword_pattern(k, mode)).map_err(|e| ConfigError::InvalidKeyword {
                            category: c.name.clone(),
                            keyword: k.to_string(),
                            reason: e.to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledCategory {
                    name: c.name.clone(),
                    matchers,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        for (source_type, target) in &fallback {
            if !ordered.iter().any(|c| &c.name == target) {
                return Err(ConfigError::UnknownFallback {
                    source_type: source_type.to_string(),
                    category: target.clone(),
                });
            }
        }

        Ok(Self { ordered, fallback })
    }

    /// Names of enabled categories in matching order.
    pub fn category_names(&self) -> Vec<&str> {
        self.ordered.iter().map(|c| c.name.as_str()).collect()
    }

    /// Winning category for an item, or `None` when nothing matches.
    pub fn categorize(&self, item: &CanonicalItem) -> Option<String> {
        let text = item.match_text();
        self.ordered
            .iter()
            .find(|c| c.matches(&text))
            .map(|c| c.name.clone())
            .or_else(|| self.fallback.get(&item.source_type).cloned())
    }

    /// Every category whose keywords match, in matching order. Diagnostics only.
    pub fn all_matches(&self, item: &CanonicalItem) -> Vec<&str> {
        let text = item.match_text();
        self.ordered
            .iter()
            .filter(|c| c.matches(&text))
            .map(|c| c.name.as_str())
            .collect()
    }
}
