//! TTL-cached detection pattern snapshots.
//!
//! The cache is the only object shared across concurrent requests. Refresh
//! is a full atomic replace behind an async `RwLock`: readers always see a
//! complete snapshot, and if two refreshes race the last writer wins (both
//! are derived from the same source of truth).

use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::sync::RwLock;

use super::defaults::{
    DEFAULT_DANGEROUS_PHRASES, DEFAULT_MALICIOUS_EXTENSIONS, DEFAULT_QUICK_PHRASES,
    DEFAULT_SENSITIVE_FILE_PATTERNS,
};
use super::store::{
    PatternRow, PatternStore, DANGEROUS_TEXT, MALICIOUS_EXTENSION, QUICK_TEXT,
    SENSITIVE_FILE_REGEX,
};

/// An immutable snapshot of every pattern class the matchers consume.
///
/// No field is ever empty: classes missing from the store are filled from
/// the built-in defaults.
#[derive(Debug)]
pub struct DetectionPatternSet {
    /// Blocking phrases, matched case-insensitively as substrings.
    pub dangerous_phrases: Vec<String>,
    /// Record-only phrases.
    pub quick_phrases: Vec<String>,
    /// Compiled sensitive-filename regexes.
    pub sensitive_file_regexes: Vec<Regex>,
    /// Malicious extension suffixes (lower-case, leading dot).
    pub malicious_extensions: Vec<String>,
    /// When this snapshot was built.
    pub loaded_at: Instant,
}

impl DetectionPatternSet {
    /// Build a snapshot from the built-in defaults only.
    pub fn builtin(now: Instant) -> Self {
        Self::from_rows(&[], now)
    }

    /// Build a snapshot from store rows, filling empty classes from the
    /// built-in defaults. Malformed rows are skipped, never fatal.
    pub fn from_rows(rows: &[PatternRow], now: Instant) -> Self {
        let mut dangerous = Vec::new();
        let mut quick = Vec::new();
        let mut file_regexes = Vec::new();
        let mut extensions = Vec::new();

        for row in rows.iter().filter(|r| r.is_active) {
            let Some(pattern) = decode_payload(&row.pattern_data) else {
                tracing::warn!(
                    pattern_type = %row.pattern_type,
                    "skipping pattern row with non-string payload"
                );
                continue;
            };

            match row.pattern_type.as_str() {
                DANGEROUS_TEXT => push_unique(&mut dangerous, pattern.to_lowercase()),
                QUICK_TEXT => push_unique(&mut quick, pattern.to_lowercase()),
                SENSITIVE_FILE_REGEX => match Regex::new(&pattern) {
                    Ok(re) => file_regexes.push(re),
                    Err(e) => {
                        tracing::warn!(pattern = %pattern, "skipping malformed filename regex: {e}");
                    }
                },
                MALICIOUS_EXTENSION => {
                    let ext = pattern.to_lowercase();
                    let ext = if ext.starts_with('.') { ext } else { format!(".{ext}") };
                    push_unique(&mut extensions, ext);
                }
                other => {
                    tracing::debug!(pattern_type = %other, "ignoring unknown pattern row type");
                }
            }
        }

        if dangerous.is_empty() {
            dangerous = DEFAULT_DANGEROUS_PHRASES.iter().map(|p| (*p).to_string()).collect();
        }
        if quick.is_empty() {
            quick = DEFAULT_QUICK_PHRASES.iter().map(|p| (*p).to_string()).collect();
        }
        if file_regexes.is_empty() {
            file_regexes = DEFAULT_SENSITIVE_FILE_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect();
        }
        if extensions.is_empty() {
            extensions = DEFAULT_MALICIOUS_EXTENSIONS.iter().map(|e| (*e).to_string()).collect();
        }

        Self {
            dangerous_phrases: dangerous,
            quick_phrases: quick,
            sensitive_file_regexes: file_regexes,
            malicious_extensions: extensions,
            loaded_at: now,
        }
    }
}

/// Text payloads arrive JSON-encoded (`"phrase"`); tolerate bare strings
/// from older rows.
fn decode_payload(data: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(serde_json::Value::String(s)) => Some(s),
        Ok(_) => None,
        Err(_) => {
            let trimmed = data.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    let value = value.trim().to_string();
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

struct CacheSlot {
    set: Arc<DetectionPatternSet>,
    /// `None` until the store has been consulted at least once.
    refreshed: Option<Instant>,
}

/// Owned, injectable pattern cache with TTL-driven refresh.
///
/// Constructed once per process and passed through the engine; there is no
/// process-global state. Store failures leave the previous snapshot (or the
/// built-in defaults) authoritative and are never surfaced to callers.
pub struct DetectionPatternCache {
    store: Box<dyn PatternStore>,
    ttl: Duration,
    slot: RwLock<CacheSlot>,
}

impl DetectionPatternCache {
    /// Create a cache over the given store.
    pub fn new(store: Box<dyn PatternStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            slot: RwLock::new(CacheSlot {
                set: Arc::new(DetectionPatternSet::builtin(Instant::now())),
                refreshed: None,
            }),
        }
    }

    /// Snapshot TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Refresh the snapshot if it is stale.
    pub async fn ensure_loaded(&self) {
        self.refresh(Instant::now()).await;
    }

    /// Refresh the snapshot if stale relative to `now`.
    ///
    /// Takes the time as a parameter so TTL expiry is testable without
    /// sleeping.
    pub async fn refresh(&self, now: Instant) {
        let stale = {
            let slot = self.slot.read().await;
            slot.refreshed
                .map_or(true, |at| now.saturating_duration_since(at) > self.ttl)
        };
        if !stale {
            return;
        }

        match self.store.load_active().await {
            Ok(rows) => {
                let set = Arc::new(DetectionPatternSet::from_rows(&rows, now));
                let mut slot = self.slot.write().await;
                slot.set = set;
                slot.refreshed = Some(now);
            }
            Err(e) => {
                // Previous snapshot stays authoritative; retry after the
                // next TTL window rather than hammering a down store.
                tracing::warn!("pattern store refresh failed, keeping current snapshot: {e}");
                let mut slot = self.slot.write().await;
                slot.refreshed = Some(now);
            }
        }
    }

    /// Current snapshot. Never performs store I/O.
    pub async fn snapshot(&self) -> Arc<DetectionPatternSet> {
        self.slot.read().await.set.clone()
    }
}
