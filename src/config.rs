// src/config.rs
//! Digest configuration: TOML schema, defaults, env overrides and validation.
//!
//! Path resolution: `$DIGEST_CONFIG_PATH`, else `config/digest.toml`.
//! `$DIGEST_LOOKBACK_DAYS` overrides `[content].days_to_look_back` when it parses.

use crate::categorize::{Category, MatchMode};
use crate::error::ConfigError;
use crate::filter::{FilterRules, DEFAULT_DAYS_TO_LOOK_BACK, MAX_DAYS_TO_LOOK_BACK};
use crate::item::SourceType;
use crate::select::RankingWeights;
use crate::suppression::DEFAULT_RETENTION_DAYS;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DIGEST_CONFIG_PATH: &str = "config/digest.toml";
pub const DEFAULT_SENT_CACHE_PATH: &str = "state/sent_items.json";

pub const ENV_DIGEST_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const ENV_DIGEST_LOOKBACK_DAYS: &str = "DIGEST_LOOKBACK_DAYS";

fn default_days() -> u32 {
    DEFAULT_DAYS_TO_LOOK_BACK
}

fn default_retention() -> u32 {
    DEFAULT_RETENTION_DAYS
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_SENT_CACHE_PATH)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSection {
    #[serde(default = "default_days")]
    pub days_to_look_back: u32,
    #[serde(default)]
    pub match_mode: MatchMode,
}

impl Default for ContentSection {
    fn default() -> Self {
        Self {
            days_to_look_back: default_days(),
            match_mode: MatchMode::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilteringSection {
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_unless: Vec<String>,
    #[serde(default)]
    pub trusted_domains: Vec<String>,
    /// Keyed by source type name (`blog`, `social`, ...).
    #[serde(default)]
    pub min_engagement: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    #[serde(default = "default_retention")]
    pub retention_days: u32,
}

impl Default for SuppressionSection {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_cache_path(),
            retention_days: default_retention(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub content: ContentSection,
    #[serde(default)]
    pub filtering: FilteringSection,
    #[serde(default)]
    pub ranking: RankingWeights,
    #[serde(default)]
    pub suppression: SuppressionSection,
    /// Source type name → category used when no keyword matched.
    #[serde(default)]
    pub fallback: BTreeMap<String, String>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

fn parse_lookback_env(raw: Option<String>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
}

fn parse_source_type(key: &str) -> Result<SourceType, ConfigError> {
    key.parse::<SourceType>()
        .map_err(|_| ConfigError::UnknownSourceType(key.to_string()))
}

impl DigestConfig {
    /// Load using `DIGEST_CONFIG_PATH` or the default path, then apply env overrides.
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_DIGEST_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DIGEST_CONFIG_PATH));
        let mut cfg = Self::from_path(&path)?;

        if let Some(days) = parse_lookback_env(std::env::var(ENV_DIGEST_LOOKBACK_DAYS).ok()) {
            cfg.content.days_to_look_back = days;
            cfg.validate()?;
        }

        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading digest config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing digest config {}", path.display()))
    }

    /// Parse and validate.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: DigestConfig = toml::from_str(toml_str)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content.days_to_look_back > MAX_DAYS_TO_LOOK_BACK {
            return Err(ConfigError::LookbackTooLarge {
                value: self.content.days_to_look_back,
                max: MAX_DAYS_TO_LOOK_BACK,
            });
        }

        let mut seen = HashSet::new();
        for c in &self.categories {
            let name = c.name.trim();
            if name.is_empty() {
                return Err(ConfigError::EmptyCategoryName);
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::DuplicateCategory(name.to_string()));
            }
            if c.min_items > c.max_items {
                return Err(ConfigError::MinAboveMax {
                    name: c.name.clone(),
                    min: c.min_items,
                    max: c.max_items,
                });
            }
        }

        self.ranking.validate()?;
        self.min_engagement()?;

        for (source_type, category) in self.fallback_map()? {
            let target_enabled = self
                .categories
                .iter()
                .any(|c| c.enabled && c.name == category);
            if !target_enabled {
                return Err(ConfigError::UnknownFallback {
                    source_type: source_type.to_string(),
                    category,
                });
            }
        }
        Ok(())
    }

    fn min_engagement(&self) -> Result<HashMap<SourceType, i64>, ConfigError> {
        self.filtering
            .min_engagement
            .iter()
            .map(|(k, v)| Ok((parse_source_type(k)?, *v)))
            .collect()
    }

    /// Fallback map with typed keys.
    pub fn fallback_map(&self) -> Result<HashMap<SourceType, String>, ConfigError> {
        self.fallback
            .iter()
            .map(|(k, v)| Ok((parse_source_type(k)?, v.clone())))
            .collect()
    }

    /// Filter rules with typed engagement thresholds.
    pub fn filter_rules(&self) -> Result<FilterRules, ConfigError> {
        Ok(FilterRules {
            exclude_keywords: self.filtering.exclude_keywords.clone(),
            exclude_unless: self.filtering.exclude_unless.clone(),
            trusted_domains: self.filtering.trusted_domains.clone(),
            days_to_look_back: self.content.days_to_look_back,
            min_engagement: self.min_engagement()?,
        })
    }
}
