//! One end-to-end run over a scraped batch: enrichment and change tracking
//! side by side, plus the read-only summaries built on top of them.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::alerts::AlertPlan;
use crate::authority::EligibilityMatcher;
use crate::change_detector::{track_and_persist, ChangeCounts, TrackRun};
use crate::config::{AlertConfig, EngineConfig};
use crate::enrich::{enrich, Enrichment, EnrichmentSummary};
use crate::history::HistoryBackend;
use crate::record::ProductRecord;
use crate::stats::{distributor_stats, DistributorStats};
use crate::trends::{price_trends, TrendSummary};

/// Everything a single batch produced. Owned, so callers can keep it after
/// the backend is gone.
#[derive(Debug)]
pub struct BatchOutcome {
    pub enrichment: Enrichment,
    pub run: TrackRun,
    pub trends: Vec<TrendSummary>,
    pub stats: BTreeMap<String, DistributorStats>,
}

impl BatchOutcome {
    pub fn alert_plan<'a>(&'a self, cfg: &AlertConfig) -> AlertPlan<'a> {
        AlertPlan::from_changes(&self.run.changes, cfg)
    }

    /// Serializable digest; `top_trends` keeps at most `trend_limit` entries.
    pub fn report<'a>(&'a self, cfg: &AlertConfig, trend_limit: usize) -> BatchReport<'a> {
        BatchReport {
            enrichment: self.enrichment.summary,
            changes: self.run.changes.counts(),
            history_keys: self.run.history.len(),
            persisted: self.run.persisted(),
            persist_error: self.run.persist_error.as_ref().map(|e| format!("{e:#}")),
            alerts: self.alert_plan(cfg),
            top_trends: self.trends.iter().take(trend_limit).collect(),
            stats: &self.stats,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchReport<'a> {
    pub enrichment: EnrichmentSummary,
    pub changes: ChangeCounts,
    pub history_keys: usize,
    pub persisted: bool,
    pub persist_error: Option<String>,
    pub alerts: AlertPlan<'a>,
    pub top_trends: Vec<&'a TrendSummary>,
    pub stats: &'a BTreeMap<String, DistributorStats>,
}

/// Enrich and track one batch. Retention follows `cfg.history`.
pub fn process_batch(
    records: &[ProductRecord],
    matcher: &EligibilityMatcher,
    backend: &dyn HistoryBackend,
    cfg: &EngineConfig,
    now: NaiveDateTime,
) -> BatchOutcome {
    let enrichment = enrich(matcher, records);
    let run = track_and_persist(records, backend, cfg.retention(now));
    let trends = price_trends(&run.history);
    let stats = distributor_stats(records);
    BatchOutcome {
        enrichment,
        run,
        trends,
        stats,
    }
}
