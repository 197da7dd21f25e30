//! Digest preview: load config + a fixture of sources, run one pass, print the payload.
//!
//! Usage: `digest-preview [FIXTURE]` (or `DIGEST_FIXTURE_PATH`). Default fixture:
//! `demos/sources.json`.

use anyhow::Context;
use chrono::Utc;
use newsletter_curator::ingest::{collect_batches, fixture};
use newsletter_curator::{DigestConfig, JsonFileSentCache, Pipeline, SentCache};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FIXTURE_PATH: &str = "demos/sources.json";
const ENV_FIXTURE_PATH: &str = "DIGEST_FIXTURE_PATH";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("digest=info,ingest=info,warn"));

    // Logs go to stderr; stdout carries the JSON payload.
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; DIGEST_* variables may live there.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = DigestConfig::from_toml().context("loading digest config")?;
    let pipeline = Pipeline::new(&cfg)?;

    let fixture_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(ENV_FIXTURE_PATH).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FIXTURE_PATH));
    let providers = fixture::load_providers(&fixture_path)?;
    let batches = collect_batches(&providers).await;

    let now = Utc::now();
    let mut cache = if cfg.suppression.enabled {
        Some(JsonFileSentCache::load(
            &cfg.suppression.path,
            cfg.suppression.retention_days,
            now,
        )?)
    } else {
        None
    };

    let payload = pipeline.run(
        &batches,
        now,
        cache.as_mut().map(|c| c as &mut dyn SentCache),
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("serializing digest payload")?
    );
    Ok(())
}
