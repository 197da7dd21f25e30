// src/ingest/adapters.rs
//! Per-source record shapes and their conversion into `RawItem`.
//!
//! Each upstream fetcher emits a differently shaped record; `SourceRecord` is tagged by
//! `"type"` and every variant knows how to become the neutral `RawItem`.

use crate::item::{RawItem, SourceType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const HN_ITEM_URL: &str = "https://news.ycombinator.com/item?id=";
const REDDIT_BASE: &str = "https://www.reddit.com";

/// Parse human-formatted counts: `"1,234"`, `"1.2k"`, `"3K"`, `"2m"`, `" 42 "`.
/// Anything unparseable is 0.
pub fn parse_engagement(s: &str) -> i64 {
    let t: String = s.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    let (num, mult) = match t.chars().last() {
        Some('k' | 'K') => (&t[..t.len() - 1], 1_000.0),
        Some('m' | 'M') => (&t[..t.len() - 1], 1_000_000.0),
        _ => (t.as_str(), 1.0),
    };
    match num.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => (v * mult).round() as i64,
        _ => 0,
    }
}

/// Lenient timestamp parsing: RFC 3339, RFC 2822, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`.
/// Naive values are taken as UTC.
pub fn parse_published(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(n.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// Integer or formatted string count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Count {
    Int(i64),
    Text(String),
}

impl Count {
    pub fn value(&self) -> i64 {
        match self {
            Count::Int(n) => *n,
            Count::Text(s) => parse_engagement(s),
        }
    }
}

fn count(c: &Option<Count>) -> Option<i64> {
    c.as_ref().map(Count::value)
}

fn opt_text(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceRecord {
    BlogPost {
        #[serde(default)]
        title: String,
        #[serde(default)]
        url: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        source: String,
        #[serde(default)]
        published_date: Option<String>,
        #[serde(default)]
        image_url: Option<String>,
        #[serde(default)]
        unstable_url: bool,
    },
    #[serde(alias = "research_paper")]
    Paper {
        #[serde(default)]
        title: String,
        #[serde(default)]
        url: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        source: String,
        #[serde(default)]
        published_date: Option<String>,
        #[serde(default)]
        upvotes: Option<Count>,
    },
    HnStory {
        #[serde(default)]
        title: String,
        /// Link posts carry the target; text posts only have `hn_id`.
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        source: String,
        #[serde(default)]
        published_date: Option<String>,
        #[serde(default)]
        score: Option<Count>,
        #[serde(default)]
        hn_id: Option<u64>,
    },
    RedditPost {
        #[serde(default)]
        title: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        permalink: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        source: String,
        #[serde(default)]
        published_date: Option<String>,
        #[serde(default)]
        upvotes: Option<Count>,
        #[serde(default)]
        image_url: Option<String>,
    },
    ProductLaunch {
        #[serde(default)]
        title: String,
        #[serde(default)]
        url: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        source: String,
        #[serde(default)]
        published_date: Option<String>,
        #[serde(default)]
        upvotes: Option<Count>,
        #[serde(default)]
        image_url: Option<String>,
        /// Launch pages often hand out per-visit redirect links.
        #[serde(default)]
        unstable_url: bool,
    },
    GithubRepo {
        #[serde(default)]
        title: String,
        #[serde(default)]
        url: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        source: String,
        #[serde(default)]
        stars: Option<Count>,
    },
}

impl SourceRecord {
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceRecord::BlogPost { .. } => SourceType::Blog,
            SourceRecord::Paper { .. } => SourceType::Paper,
            SourceRecord::HnStory { .. } | SourceRecord::RedditPost { .. } => SourceType::Social,
            SourceRecord::ProductLaunch { .. } => SourceType::Launch,
            SourceRecord::GithubRepo { .. } => SourceType::Repo,
        }
    }

    /// Convert to a raw item. An empty `source` is replaced by `default_source`.
    pub fn into_raw(self, default_source: &str) -> RawItem {
        let source_type = self.source_type();
        let pick = |s: String| if s.trim().is_empty() { default_source.to_string() } else { s };

        match self {
            SourceRecord::BlogPost {
                title,
                url,
                description,
                source,
                published_date,
                image_url,
                unstable_url,
            } => RawItem {
                title,
                url,
                published_at: published_date.as_deref().and_then(parse_published),
                source_name: pick(source),
                source_type,
                engagement: None,
                summary: opt_text(description),
                image_url: opt_text(image_url),
                unstable_url,
            },
            SourceRecord::Paper {
                title,
                url,
                description,
                source,
                published_date,
                upvotes,
            } => RawItem {
                title,
                url,
                published_at: published_date.as_deref().and_then(parse_published),
                source_name: pick(source),
                source_type,
                engagement: count(&upvotes),
                summary: opt_text(description),
                image_url: None,
                unstable_url: false,
            },
            SourceRecord::HnStory {
                title,
                url,
                description,
                source,
                published_date,
                score,
                hn_id,
            } => {
                let url = opt_text(url)
                    .or_else(|| hn_id.map(|id| format!("{HN_ITEM_URL}{id}")))
                    .unwrap_or_default();
                RawItem {
                    title,
                    url,
                    published_at: published_date.as_deref().and_then(parse_published),
                    source_name: pick(source),
                    source_type,
                    engagement: count(&score),
                    summary: opt_text(description),
                    image_url: None,
                    unstable_url: false,
                }
            }
            SourceRecord::RedditPost {
                title,
                url,
                permalink,
                description,
                source,
                published_date,
                upvotes,
                image_url,
            } => {
                let url = opt_text(url)
                    .or_else(|| opt_text(permalink).map(|p| format!("{REDDIT_BASE}{p}")))
                    .unwrap_or_default();
                RawItem {
                    title,
                    url,
                    published_at: published_date.as_deref().and_then(parse_published),
                    source_name: pick(source),
                    source_type,
                    engagement: count(&upvotes),
                    summary: opt_text(description),
                    image_url: opt_text(image_url),
                    unstable_url: false,
                }
            }
            SourceRecord::ProductLaunch {
                title,
                url,
                description,
                source,
                published_date,
                upvotes,
                image_url,
                unstable_url,
            } => RawItem {
                title,
                url,
                published_at: published_date.as_deref().and_then(parse_published),
                source_name: pick(source),
                source_type,
                engagement: count(&upvotes),
                summary: opt_text(description),
                image_url: opt_text(image_url),
                unstable_url,
            },
            // Trending pages carry no date; the normalizer stamps run time.
            SourceRecord::GithubRepo {
                title,
                url,
                description,
                source,
                stars,
            } => RawItem {
                title,
                url,
                published_at: None,
                source_name: pick(source),
                source_type,
                engagement: count(&stars),
                summary: opt_text(description),
                image_url: None,
                unstable_url: false,
            },
        }
    }
}
