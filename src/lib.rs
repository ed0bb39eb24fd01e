// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod alerts;
pub mod authority;
pub mod change_detector;
pub mod config;
pub mod enrich;
pub mod history;
pub mod pipeline;
pub mod record;
pub mod stats;
pub mod trends;

// ---- Re-exports for stable public API ----
pub use crate::alerts::AlertPlan;
pub use crate::authority::{EligibilityMatcher, MatchTier, RawTable, TableAMatch, TableBMatch};
pub use crate::change_detector::{
    classify_price, track_and_persist, track_batch, ChangeSet, PriceDrop, PriceIncrease,
    PriceMove, Retention, StockChange, TrackRun,
};
pub use crate::config::{AlertConfig, EngineConfig};
pub use crate::enrich::{enrich, EnrichedRecord, Enrichment, EnrichmentSummary};
pub use crate::history::{
    HistoryBackend, HistoryEntry, HistoryStore, JsonFileBackend, MemoryBackend, TREND_CAP,
};
pub use crate::pipeline::{process_batch, BatchOutcome, BatchReport};
pub use crate::record::{ProductRecord, Specs, StockStatus, TrackedKey};
pub use crate::stats::{distributor_stats, DistributorStats};
pub use crate::trends::{price_trends, TrendDirection, TrendSummary};
