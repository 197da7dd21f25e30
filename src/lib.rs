// src/lib.rs
// Public library surface for the preview binary and integration tests.

pub mod categorize;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod item;
pub mod normalize;
pub mod pipeline;
pub mod select;
pub mod suppression;

// ---- Re-exports for stable public API ----
pub use crate::config::DigestConfig;
pub use crate::error::{ConfigError, MalformedItemError};
pub use crate::item::{CanonicalItem, RawItem, SourceBatch, SourceType};
pub use crate::pipeline::{run_pipeline, DigestPayload, Diagnostics, Pipeline};
pub use crate::select::CategorySection;
pub use crate::suppression::{JsonFileSentCache, MemorySentCache, SentCache};
