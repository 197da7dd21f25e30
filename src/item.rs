// src/item.rs
//! Item model: the neutral raw record produced at the source boundary and the canonical
//! item that flows through the curation stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of source an item came from. Only used to pick engagement thresholds
/// (and the optional categorization fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Blog,
    Paper,
    Social,
    Launch,
    Repo,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Blog => "blog",
            SourceType::Paper => "paper",
            SourceType::Social => "social",
            SourceType::Launch => "launch",
            SourceType::Repo => "repo",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blog" => Ok(SourceType::Blog),
            "paper" => Ok(SourceType::Paper),
            "social" => Ok(SourceType::Social),
            "launch" => Ok(SourceType::Launch),
            "repo" => Ok(SourceType::Repo),
            other => Err(format!("unknown source type `{other}`")),
        }
    }
}

/// Record emitted by a source adapter. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub engagement: Option<i64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Source declares its URLs unusable as identity (redirectors, per-user links).
    #[serde(default)]
    pub unstable_url: bool,
}

impl RawItem {
    pub fn new(
        source_name: impl Into<String>,
        source_type: SourceType,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            published_at: None,
            source_name: source_name.into(),
            source_type,
            engagement: None,
            summary: None,
            image_url: None,
            unstable_url: false,
        }
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_engagement(mut self, engagement: i64) -> Self {
        self.engagement = Some(engagement);
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn with_unstable_url(mut self) -> Self {
        self.unstable_url = true;
        self
    }
}

/// All raw items pulled from one configured source during a run.
/// A source that failed to fetch contributes an empty batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBatch {
    pub source_name: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

impl SourceBatch {
    pub fn new(source_name: impl Into<String>, source_type: SourceType, items: Vec<RawItem>) -> Self {
        Self {
            source_name: source_name.into(),
            source_type,
            items,
        }
    }

    pub fn empty(source_name: impl Into<String>, source_type: SourceType) -> Self {
        Self::new(source_name, source_type, Vec::new())
    }
}

/// Canonical item. After normalization only `category`, `score` and `also_seen_in`
/// are ever written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalItem {
    /// Dedup fingerprint.
    pub id: String,
    pub title: String,
    /// Display URL as given by the source (trimmed). Empty only when the source had none.
    pub url: String,
    pub summary: String,
    pub source_name: String,
    pub source_type: SourceType,
    pub published_at: DateTime<Utc>,
    pub engagement: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub score: Option<f64>,
    /// Other sources whose copies were collapsed into this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_seen_in: Vec<String>,
}

impl CanonicalItem {
    /// Text all keyword rules look at.
    pub fn match_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }

    pub fn has_summary(&self) -> bool {
        !self.summary.trim().is_empty()
    }
}
