use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::types::EmbeddedRule;

/// On-disk embedding snapshot.
///
/// Usable only when version and model both match the live corpus, the rule
/// count agrees, and the entry is at most `ttl` old. An entry aged exactly
/// TTL still counts as fresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: String,
    pub model: String,
    pub timestamp_ms: i64,
    pub rules: Vec<EmbeddedRule>,
}

/// Durable cache: one JSON blob at a fixed path, surviving restarts.
///
/// Entries for superseded corpus versions are not deleted; they simply stop
/// validating and get overwritten by the next write-through.
pub struct DurableCache {
    path: PathBuf,
    ttl: Duration,
}

impl DurableCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    /// Read the snapshot if it is usable for the given corpus shape.
    ///
    /// Every miss reason degrades to `None`; a corrupt or stale file never
    /// stops retrieval, it just forces regeneration.
    pub fn load(
        &self,
        expected_version: &str,
        expected_model: &str,
        expected_count: usize,
    ) -> Option<Vec<EmbeddedRule>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::debug!(
                    "No durable embedding cache at {}: {}",
                    self.path.display(),
                    err
                );
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(
                    "Discarding corrupt embedding cache {}: {}",
                    self.path.display(),
                    err
                );
                return None;
            }
        };

        let now_ms = Utc::now().timestamp_millis();
        if !self.entry_is_valid(&entry, expected_version, expected_model, expected_count, now_ms) {
            return None;
        }

        Some(entry.rules)
    }

    fn entry_is_valid(
        &self,
        entry: &CacheEntry,
        version: &str,
        model: &str,
        count: usize,
        now_ms: i64,
    ) -> bool {
        if entry.version != version {
            tracing::info!(
                "Embedding cache is for corpus {}, want {}",
                entry.version,
                version
            );
            return false;
        }
        if entry.model != model {
            tracing::info!(
                "Embedding cache was built with model {}, want {}",
                entry.model,
                model
            );
            return false;
        }
        if entry.rules.len() != count {
            tracing::info!(
                "Embedding cache holds {} rules, corpus has {}",
                entry.rules.len(),
                count
            );
            return false;
        }
        let age_ms = now_ms.saturating_sub(entry.timestamp_ms);
        if age_ms > self.ttl.as_millis() as i64 {
            tracing::info!("Embedding cache expired ({}h old)", age_ms / 3_600_000);
            return false;
        }
        true
    }

    /// Best-effort write-through. Failures are logged and swallowed; caching
    /// is an optimization, not a correctness requirement.
    pub fn store(&self, version: &str, model: &str, rules: &[EmbeddedRule]) {
        let entry = CacheEntry {
            version: version.to_string(),
            model: model.to_string(),
            timestamp_ms: Utc::now().timestamp_millis(),
            rules: rules.to_vec(),
        };

        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        // Embedding blobs are large; skip pretty-printing.
        let data = match serde_json::to_string(&entry) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!("Failed to encode embedding cache: {}", err);
                return;
            }
        };

        if let Err(err) = std::fs::write(&self.path, data) {
            tracing::warn!(
                "Failed to persist embedding cache {}: {}",
                self.path.display(),
                err
            );
        }
    }
}

struct ProcessSlot {
    rules: Arc<Vec<EmbeddedRule>>,
    stored_at: Instant,
}

/// Single-slot in-memory cache, lost on restart.
///
/// Expiry is checked lazily on access; the first request after expiry
/// regenerates synchronously and pays that cost. A slot aged exactly TTL is
/// already stale, unlike the durable cache.
pub struct ProcessCache {
    ttl: Duration,
    slot: Option<ProcessSlot>,
}

impl ProcessCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: None }
    }

    pub fn get(&self) -> Option<Arc<Vec<EmbeddedRule>>> {
        self.get_at(Instant::now())
    }

    fn get_at(&self, now: Instant) -> Option<Arc<Vec<EmbeddedRule>>> {
        let slot = self.slot.as_ref()?;
        if now.duration_since(slot.stored_at) < self.ttl {
            Some(Arc::clone(&slot.rules))
        } else {
            None
        }
    }

    pub fn put(&mut self, rules: Vec<EmbeddedRule>) -> Arc<Vec<EmbeddedRule>> {
        self.put_at(rules, Instant::now())
    }

    fn put_at(&mut self, rules: Vec<EmbeddedRule>, now: Instant) -> Arc<Vec<EmbeddedRule>> {
        let rules = Arc::new(rules);
        self.slot = Some(ProcessSlot {
            rules: Arc::clone(&rules),
            stored_at: now,
        });
        rules
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}
