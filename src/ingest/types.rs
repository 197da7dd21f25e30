// src/ingest/types.rs
use crate::item::{RawItem, SourceType};
use anyhow::Result;

/// One configured source. Fetching is opaque to the curation core.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>>;
    fn name(&self) -> &str;
    fn source_type(&self) -> SourceType;
}
