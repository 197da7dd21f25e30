// src/ingest/fixture.rs
//! File- and memory-backed providers, used by the preview binary and tests.
//!
//! Fixture document:
//! ```json
//! { "sources": [
//!     { "name": "OpenAI Blog", "source_type": "blog", "records": [ { "type": "blog_post", ... } ] },
//!     { "name": "arXiv", "source_type": "paper", "path": "arxiv.json" }
//! ] }
//! ```
//! `path` entries are read at fetch time (relative to the fixture file) and hold a JSON array
//! of records. A record that does not match any known shape is skipped and counted.

use crate::ingest::adapters::SourceRecord;
use crate::ingest::types::SourceProvider;
use crate::item::{RawItem, SourceType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Records held in memory.
pub struct StaticProvider {
    name: String,
    source_type: SourceType,
    records: Vec<SourceRecord>,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, source_type: SourceType, records: Vec<SourceRecord>) -> Self {
        Self {
            name: name.into(),
            source_type,
            records,
        }
    }
}

#[async_trait]
impl SourceProvider for StaticProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        Ok(self
            .records
            .iter()
            .cloned()
            .map(|r| r.into_raw(&self.name))
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        self.source_type
    }
}

/// JSON array of records read on every fetch.
pub struct JsonFileProvider {
    name: String,
    source_type: SourceType,
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(name: impl Into<String>, source_type: SourceType, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_type,
            path: path.into(),
        }
    }
}

#[async_trait]
impl SourceProvider for JsonFileProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading records from {}", self.path.display()))?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&body)
            .with_context(|| format!("parsing records in {}", self.path.display()))?;
        super::ensure_metrics_described();

        let mut items = Vec::with_capacity(values.len());
        for (idx, v) in values.into_iter().enumerate() {
            match serde_json::from_value::<SourceRecord>(v) {
                Ok(r) => items.push(r.into_raw(&self.name)),
                Err(e) => {
                    tracing::warn!(target: "ingest", provider = %self.name, index = idx, error = %e, "skipping malformed record");
                    counter!("ingest_malformed_records_total").increment(1);
                }
            }
        }
        Ok(items)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        self.source_type
    }
}

#[derive(Debug, Deserialize)]
struct FixtureDoc {
    #[serde(default)]
    sources: Vec<FixtureSource>,
}

#[derive(Debug, Deserialize)]
struct FixtureSource {
    name: String,
    source_type: SourceType,
    #[serde(default)]
    records: Vec<SourceRecord>,
    #[serde(default)]
    path: Option<PathBuf>,
}

/// Build providers from a fixture string. Relative `path`s resolve against `base`.
pub fn providers_from_str(s: &str, base: &Path) -> Result<Vec<Box<dyn SourceProvider>>> {
    let doc: FixtureDoc = serde_json::from_str(s).context("parsing fixture document")?;
    Ok(doc
        .sources
        .into_iter()
        .map(|src| -> Box<dyn SourceProvider> {
            match src.path {
                Some(p) => {
                    let p = if p.is_relative() { base.join(p) } else { p };
                    Box::new(JsonFileProvider::new(src.name, src.source_type, p))
                }
                None => Box::new(StaticProvider::new(src.name, src.source_type, src.records)),
            }
        })
        .collect())
}

pub fn load_providers(path: &Path) -> Result<Vec<Box<dyn SourceProvider>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture from {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    providers_from_str(&content, base)
}
