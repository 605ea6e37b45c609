//! Append-only generation history powering reroll.
//!
//! The ledger lives in process memory behind a single async mutex: appends
//! are serialized, so ids stay monotonic and unique even when parallel
//! repeats finish at the same time. Lookups hand out clones — a stored
//! record is never shared with a caller's override map.

use tokio::sync::Mutex;

use anima_core::params::GenerationParams;
use anima_core::types::{HistoryId, Timestamp};

/// Default number of records returned by a history listing.
pub const DEFAULT_LIST_LIMIT: usize = 5;

/// Upper bound on a history listing.
pub const MAX_LIST_LIMIT: usize = 50;

/// One past submission: id, creation time, and the original pre-injection
/// parameter record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub created_at: Timestamp,
    pub params: GenerationParams,
}

impl HistoryRecord {
    /// One-line human summary for listings: id, time, artist, count, a
    /// truncated tag excerpt, seed, and the resolution hint.
    pub fn summary(&self) -> String {
        let p = &self.params;
        let mut parts = vec![
            format!("#{}", self.id),
            self.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ];
        if let Some(artist) = p.artist.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(artist.trim().to_string());
        }
        if let Some(count) = p.count.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(count.trim().to_string());
        }
        if let Some(tags) = p.tags.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(truncate(tags.trim(), 40));
        }
        match p.seed {
            Some(seed) => parts.push(format!("seed={seed}")),
            None => parts.push("seed=random".to_string()),
        }
        if let (Some(w), Some(h)) = (p.width, p.height) {
            parts.push(format!("{w}x{h}"));
        } else if let Some(ratio) = p.aspect_ratio.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(ratio.trim().to_string());
        }
        parts.join(" | ")
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{cut}…")
}

#[derive(Default)]
struct Inner {
    next_id: HistoryId,
    records: Vec<HistoryRecord>,
}

/// Append-only record store keyed by a monotonic id, with a "last" alias
/// for the most recent record.
#[derive(Default)]
pub struct HistoryLedger {
    inner: Mutex<Inner>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, assigning the next id. The only mutator.
    pub async fn append(&self, params: GenerationParams) -> HistoryId {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.records.push(HistoryRecord {
            id,
            created_at: chrono::Utc::now(),
            params,
        });
        id
    }

    /// Resolve a history reference.
    ///
    /// `"last"` resolves to the most recent record; otherwise the reference
    /// is an id, optionally prefixed with `#`. Anything unresolvable is
    /// `None` — absence is an expected outcome, not an error.
    pub async fn get(&self, reference: &str) -> Option<HistoryRecord> {
        let inner = self.inner.lock().await;
        if reference.trim().eq_ignore_ascii_case("last") {
            return inner.records.last().cloned();
        }
        let id = parse_reference(reference)?;
        inner.records.iter().find(|r| r.id == id).cloned()
    }

    /// The most recent records, newest first. `limit` is clamped to
    /// `1..=MAX_LIST_LIMIT`.
    pub async fn list_recent(&self, limit: usize) -> Vec<HistoryRecord> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        let inner = self.inner.lock().await;
        inner.records.iter().rev().take(limit).cloned().collect()
    }

    /// Number of records appended so far.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Parse a numeric history reference, tolerating a leading `#`.
fn parse_reference(reference: &str) -> Option<HistoryId> {
    reference.trim().trim_start_matches('#').parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
