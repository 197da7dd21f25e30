// src/ingest/mod.rs
//! Source boundary: adapters for per-source record shapes, async providers, and
//! collection into one `SourceBatch` per provider.

pub mod adapters;
pub mod fixture;
pub mod types;

use crate::ingest::types::SourceProvider;
use crate::item::SourceBatch;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_items_total",
            "Raw items returned by providers."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_counter!(
            "ingest_malformed_records_total",
            "Records skipped because they did not match any known shape."
        );
    });
}

/// Poll every provider in order. A failing provider is logged, counted and contributes an
/// empty batch so one broken source never sinks the run.
pub async fn collect_batches(providers: &[Box<dyn SourceProvider>]) -> Vec<SourceBatch> {
    ensure_metrics_described();

    let mut out = Vec::with_capacity(providers.len());
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut items) => {
                for it in items.iter_mut() {
                    if it.source_name.trim().is_empty() {
                        it.source_name = p.name().to_string();
                    }
                }
                tracing::debug!(target: "ingest", provider = p.name(), items = items.len(), "provider fetched");
                counter!("ingest_items_total").increment(items.len() as u64);
                out.push(SourceBatch::new(p.name(), p.source_type(), items));
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("ingest_provider_errors_total").increment(1);
                out.push(SourceBatch::empty(p.name(), p.source_type()));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::adapters::SourceRecord;
    use crate::ingest::fixture::StaticProvider;
    use crate::item::{RawItem, SourceType};
    use anyhow::{anyhow, Result};

    struct Broken;

    #[async_trait::async_trait]
    impl SourceProvider for Broken {
        async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
            Err(anyhow!("503"))
        }
        fn name(&self) -> &str {
            "broken"
        }
        fn source_type(&self) -> SourceType {
            SourceType::Blog
        }
    }

    #[tokio::test]
    async fn failing_provider_yields_empty_batch() {
        let ok = StaticProvider::new(
            "lab",
            SourceType::Blog,
            vec![SourceRecord::BlogPost {
                title: "Hello".into(),
                url: "https://lab.example/hello".into(),
                description: None,
                source: String::new(),
                published_date: None,
                image_url: None,
                unstable_url: false,
            }],
        );
        let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(Broken), Box::new(ok)];
        let batches = collect_batches(&providers).await;

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].source_name, "broken");
        assert!(batches[0].items.is_empty());
        assert_eq!(batches[1].items.len(), 1);
        assert_eq!(batches[1].items[0].source_name, "lab");
    }
}
