//! # History
//! Persisted per-listing history: last observed snapshot plus a
//! bounded price trend.
//!
//! The store is a plain value. Loading and saving go through a
//! [`HistoryBackend`] so the change detector never touches the filesystem
//! directly and tests can run fully in memory.
//!
//! Operational constraint: one run at a time per history file. Runs follow
//! load-once / mutate-in-memory / save-once; two concurrent runs against the
//! same file lose updates (last writer wins). Callers that need concurrent
//! invocation must hold an external run-level lock.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::record::{null_as_default, ProductRecord, StockStatus, TrackedKey};

/// Maximum number of trend points retained per key.
pub const TREND_CAP: usize = 30;

/// Timestamp layout written by the scrapers.
pub const SCRAPER_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One `(date, price)` observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: f64,
}

/// Last known state of one tracked listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stock_status: StockStatus,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub distributor: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    /// Oldest first, never longer than [`TREND_CAP`].
    #[serde(default, rename = "price_history", deserialize_with = "null_as_default")]
    pub trend: Vec<TrendPoint>,
}

impl HistoryEntry {
    /// Entry for a key seen for the first time: single-point trend.
    pub fn first_sighting(record: &ProductRecord) -> Self {
        let mut entry = Self {
            price: record.price,
            stock_status: record.stock_status.clone(),
            title: Some(record.title.clone()),
            distributor: Some(record.distributor.clone()),
            last_updated: Some(record.last_updated.clone()),
            trend: Vec::with_capacity(1),
        };
        entry.push_point(TrendPoint {
            date: record.last_updated.clone(),
            price: record.price,
        });
        entry
    }

    /// Overwrite the snapshot with `record` and append to the trend.
    pub fn observe(&mut self, record: &ProductRecord) {
        self.price = record.price;
        self.stock_status = record.stock_status.clone();
        self.title = Some(record.title.clone());
        self.distributor = Some(record.distributor.clone());
        self.last_updated = Some(record.last_updated.clone());
        self.push_point(TrendPoint {
            date: record.last_updated.clone(),
            price: record.price,
        });
    }

    /// Append and cap the *whole* sequence to the newest `TREND_CAP` points.
    fn push_point(&mut self, point: TrendPoint) {
        self.trend.push(point);
        if self.trend.len() > TREND_CAP {
            let excess = self.trend.len() - TREND_CAP;
            self.trend.drain(0..excess);
        }
    }
}

/// Serialized form: string key → entry. Sorted so the file diffs cleanly.
pub type HistoryMap = BTreeMap<String, HistoryEntry>;

/// Load/save boundary for the history.
pub trait HistoryBackend {
    /// Read the full mapping. A missing store is an empty map, not an error.
    fn load(&self) -> Result<HistoryMap>;
    /// Replace the stored mapping with `map` in one write.
    fn save(&self, map: &HistoryMap) -> Result<()>;
    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// In-memory history of all tracked listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryStore {
    entries: HistoryMap,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: HistoryMap) -> Self {
        Self { entries }
    }

    /// Load through `backend`. Unreadable or corrupt data starts an empty
    /// history (logged, never fatal).
    pub fn load_from(backend: &dyn HistoryBackend) -> Self {
        match backend.load() {
            Ok(entries) => {
                debug!(keys = entries.len(), store = %backend.describe(), "history loaded");
                Self { entries }
            }
            Err(e) => {
                warn!(error = ?e, store = %backend.describe(), "history unreadable, starting empty");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, backend: &dyn HistoryBackend) -> Result<()> {
        backend
            .save(&self.entries)
            .with_context(|| format!("saving history to {}", backend.describe()))
    }

    pub fn get(&self, key: &TrackedKey) -> Option<&HistoryEntry> {
        self.entries.get(&key.to_string())
    }

    pub(crate) fn get_mut(&mut self, key: &TrackedKey) -> Option<&mut HistoryEntry> {
        self.entries.get_mut(&key.to_string())
    }

    pub fn contains(&self, key: &TrackedKey) -> bool {
        self.entries.contains_key(&key.to_string())
    }

    pub fn insert(&mut self, key: &TrackedKey, entry: HistoryEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HistoryEntry)> {
        self.entries.iter()
    }

    /// Evict keys whose `last_updated` is older than `keep_days` before `now`.
    /// Entries with a missing or unparseable timestamp are kept.
    /// Returns the number of evicted keys.
    pub fn prune_stale(&mut self, now: NaiveDateTime, keep_days: u32) -> usize {
        let cutoff = now - Duration::days(i64::from(keep_days));
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            match entry.last_updated.as_deref().and_then(parse_observed_at) {
                Some(ts) => ts >= cutoff,
                None => true,
            }
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            info!(evicted, keep_days, "pruned stale history keys");
        }
        evicted
    }
}

/// Parse a scraper timestamp (`%Y-%m-%d %H:%M:%S`) or RFC 3339 (as UTC).
pub fn parse_observed_at(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, SCRAPER_TS_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.naive_utc()))
}

/* ----------------------------
Backends
---------------------------- */

/// Pretty-printed JSON file. Writes go to a sibling temp file which is then
/// renamed over the target, so a crash mid-write leaves the old file intact.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "history.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl HistoryBackend for JsonFileBackend {
    fn load(&self) -> Result<HistoryMap> {
        if !self.path.exists() {
            return Ok(HistoryMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading history from {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(HistoryMap::new());
        }
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("parsing history JSON in {}", self.path.display()))?;
        Ok(decode_entries(raw, &self.path))
    }

    fn save(&self, map: &HistoryMap) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating history dir {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(map).context("serializing history")?;
        let tmp = self.tmp_path();
        fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Decode entries one by one; an undecodable entry is dropped on its own so
/// the rest of the file survives.
fn decode_entries(raw: BTreeMap<String, serde_json::Value>, path: &Path) -> HistoryMap {
    raw.into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<HistoryEntry>(value) {
            Ok(entry) => Some((key, entry)),
            Err(e) => {
                warn!(key = %key, path = %path.display(), error = %e, "skipping undecodable history entry");
                None
            }
        })
        .collect()
}

/// Process-local backend for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    stored: Mutex<HistoryMap>,
    fail_saves: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(map: HistoryMap) -> Self {
        Self {
            stored: Mutex::new(map),
            fail_saves: false,
        }
    }

    /// Backend whose `save` always errors (exercises persistence failure paths).
    pub fn failing_saves() -> Self {
        Self {
            stored: Mutex::new(HistoryMap::new()),
            fail_saves: true,
        }
    }

    pub fn snapshot(&self) -> Result<HistoryMap> {
        let guard = self
            .stored
            .lock()
            .map_err(|_| anyhow!("memory history lock poisoned"))?;
        Ok(guard.clone())
    }
}

impl HistoryBackend for MemoryBackend {
    fn load(&self) -> Result<HistoryMap> {
        self.snapshot()
    }

    fn save(&self, map: &HistoryMap) -> Result<()> {
        if self.fail_saves {
            return Err(anyhow!("memory backend configured to reject saves"));
        }
        let mut guard = self
            .stored
            .lock()
            .map_err(|_| anyhow!("memory history lock poisoned"))?;
        *guard = map.clone();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(price: f64, ts: &str) -> ProductRecord {
        ProductRecord::new("ALTE", "A1", "9", price, "In Stock").with_last_updated(ts)
    }

    #[test]
    fn trend_is_capped_to_newest_points() {
        let mut e = HistoryEntry::first_sighting(&rec(1.0, "d0"));
        for i in 1..40 {
            e.observe(&rec(1.0 + i as f64, &format!("d{i}")));
        }
        assert_eq!(e.trend.len(), TREND_CAP);
        assert_eq!(e.trend.first().unwrap().date, "d10");
        assert_eq!(e.trend.last().unwrap().date, "d39");
    }

    #[test]
    fn oversized_loaded_trend_shrinks_on_next_observe() {
        let mut e = HistoryEntry::first_sighting(&rec(1.0, "d0"));
        e.trend = (0..45)
            .map(|i| TrendPoint {
                date: format!("old{i}"),
                price: 1.0,
            })
            .collect();
        e.observe(&rec(2.0, "new"));
        assert_eq!(e.trend.len(), TREND_CAP);
        assert_eq!(e.trend.last().unwrap().date, "new");
    }

    #[test]
    fn parses_both_timestamp_layouts() {
        assert!(parse_observed_at("2025-01-02 03:04:05").is_some());
        assert!(parse_observed_at("2025-01-02T03:04:05Z").is_some());
        assert!(parse_observed_at("yesterday").is_none());
    }

    #[test]
    fn prune_keeps_recent_and_unparseable() {
        let mut store = HistoryStore::new();
        let old = rec(1.0, "2025-01-01 00:00:00");
        let fresh = ProductRecord::new("ALTE", "B2", "10", 1.0, "In Stock")
            .with_last_updated("2025-03-30 00:00:00");
        let odd = ProductRecord::new("ALTE", "C3", "11", 1.0, "In Stock")
            .with_last_updated("n/a");
        for r in [&old, &fresh, &odd] {
            store.insert(&r.key(), HistoryEntry::first_sighting(r));
        }
        let now = parse_observed_at("2025-04-01 00:00:00").unwrap();
        assert_eq!(store.prune_stale(now, 30), 1);
        assert!(!store.contains(&old.key()));
        assert!(store.contains(&fresh.key()));
        assert!(store.contains(&odd.key()));
    }

    #[test]
    fn memory_backend_round_trip_and_failure() {
        let backend = MemoryBackend::new();
        let mut store = HistoryStore::load_from(&backend);
        let r = rec(5.0, "t");
        store.insert(&r.key(), HistoryEntry::first_sighting(&r));
        store.save_to(&backend).unwrap();
        assert_eq!(HistoryStore::load_from(&backend), store);

        let failing = MemoryBackend::failing_saves();
        assert!(store.save_to(&failing).is_err());
    }
}
