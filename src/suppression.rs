// src/suppression.rs
//! "Already sent" cache: fingerprints selected in earlier runs, kept for a retention window.
//!
//! The selector consults it before scoring and records the final selection after a run.
//! `JsonFileSentCache` persists to a small JSON state file. A missing file or one that does
//! not parse starts an empty cache; any other read error is returned.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_RETENTION_DAYS: u32 = 30;

pub trait SentCache {
    /// True if `fingerprint` was sent within the retention window ending at `now`.
    fn was_sent(&self, fingerprint: &str, now: DateTime<Utc>) -> bool;

    /// Record fingerprints as sent at `now`.
    fn mark_sent(&mut self, fingerprints: &[String], now: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SentLog {
    #[serde(default)]
    sent: BTreeMap<String, DateTime<Utc>>,
}

/// In-memory cache. Also the working set of the file-backed cache.
#[derive(Debug, Clone)]
pub struct MemorySentCache {
    retention: Duration,
    log: SentLog,
}

impl MemorySentCache {
    pub fn new(retention_days: u32) -> Self {
        Self {
            retention: Duration::days(i64::from(retention_days)),
            log: SentLog::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.log.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.sent.is_empty()
    }

    fn is_live(&self, sent_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(sent_at) < self.retention
    }

    /// Drop entries older than the retention window. Returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.log.sent.len();
        let retention = self.retention;
        self.log
            .sent
            .retain(|_, at| now.signed_duration_since(*at) < retention);
        before - self.log.sent.len()
    }
}

impl SentCache for MemorySentCache {
    fn was_sent(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        self.log
            .sent
            .get(fingerprint)
            .is_some_and(|at| self.is_live(*at, now))
    }

    fn mark_sent(&mut self, fingerprints: &[String], now: DateTime<Utc>) -> Result<()> {
        for fp in fingerprints {
            self.log.sent.insert(fp.clone(), now);
        }
        Ok(())
    }
}

/// File-backed cache. Every `mark_sent` prunes and rewrites the file.
#[derive(Debug, Clone)]
pub struct JsonFileSentCache {
    path: PathBuf,
    inner: MemorySentCache,
}

impl JsonFileSentCache {
    /// Load from `path`. Missing file → empty cache; unparseable file → empty cache + warning.
    pub fn load(path: impl AsRef<Path>, retention_days: u32, now: DateTime<Utc>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut inner = MemorySentCache::new(retention_days);

        match fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str::<SentLog>(&s) {
                Ok(log) => inner.log = log,
                Err(e) => {
                    tracing::warn!(target: "digest", path = %path.display(), error = %e, "sent cache unreadable, starting empty");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("reading sent cache {}", path.display()));
            }
        }

        let pruned = inner.prune(now);
        tracing::debug!(target: "digest", path = %path.display(), entries = inner.len(), pruned, "sent cache loaded");
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Write through a temp file + rename so a crash never leaves half a file.
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(&self.inner.log).context("serializing sent cache")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }
}

impl SentCache for JsonFileSentCache {
    fn was_sent(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        self.inner.was_sent(fingerprint, now)
    }

    fn mark_sent(&mut self, fingerprints: &[String], now: DateTime<Utc>) -> Result<()> {
        self.inner.mark_sent(fingerprints, now)?;
        self.inner.prune(now);
        self.save()
    }
}
