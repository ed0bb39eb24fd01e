//! # Enrichment
//! Attaches authority-list eligibility to every record of a batch and
//! derives the composite domestic-content flag.
//!
//! Pure over its inputs: the matcher is built once (tables already loaded)
//! and every record is evaluated independently. Absent tables yield
//! conservative, non-qualifying flags; enrichment itself never fails.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::info;

use crate::authority::{EligibilityMatcher, MatchTier, TableAMatch, TableBMatch};
use crate::record::ProductRecord;

/// Case-insensitive title marker that qualifies a record on its own.
pub const DOMESTIC_TITLE_MARKER: &str = "domestic content";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("enrich_records_total", "Records passed through enrichment.");
        describe_counter!(
            "enrich_domestic_qualified_total",
            "Records flagged as domestic-content qualified."
        );
    });
}

/// Which independent signals flagged a record as domestic content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DomesticSignals {
    pub title: bool,
    pub table_a: bool,
    pub table_b: bool,
    pub specs: bool,
}

impl DomesticSignals {
    pub fn gather(record: &ProductRecord, a: &TableAMatch, b: &TableBMatch) -> Self {
        Self {
            title: title_mentions_domestic(&record.title),
            // Only an exact model hit can vouch for domestic content.
            table_a: a.tier == MatchTier::Exact && a.domestic,
            table_b: b.approved && b.domestic,
            specs: record.specs.declares_domestic_content(),
        }
    }

    pub fn any(&self) -> bool {
        self.title || self.table_a || self.table_b || self.specs
    }
}

pub fn title_mentions_domestic(title: &str) -> bool {
    title.to_lowercase().contains(DOMESTIC_TITLE_MARKER)
}

/// Per-record eligibility columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub table_a_approved: bool,
    pub table_a_domestic: bool,
    pub table_a_match_tier: MatchTier,
    pub table_b_approved: bool,
    pub table_b_program: Option<String>,
    pub table_b_domestic: bool,
    pub on_any_authority: bool,
    pub on_all_authorities: bool,
    pub domestic_content_qualified: bool,
    pub domestic_signals: DomesticSignals,
}

/// Evaluate one record. The manufacturer is the record's brand; the model
/// is its SKU.
pub fn evaluate(matcher: &EligibilityMatcher, record: &ProductRecord) -> Eligibility {
    let a = matcher.match_table_a(&record.brand, record.model());
    let b = matcher.match_table_b(&record.brand);
    let signals = DomesticSignals::gather(record, &a, &b);

    Eligibility {
        table_a_approved: a.approved,
        table_a_domestic: signals.table_a,
        table_a_match_tier: a.tier,
        table_b_approved: b.approved,
        table_b_program: b.program,
        table_b_domestic: b.domestic,
        on_any_authority: a.approved || b.approved,
        on_all_authorities: a.approved && b.approved,
        domestic_content_qualified: signals.any(),
        domestic_signals: signals,
    }
}

/// A record with its eligibility columns appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: ProductRecord,
    #[serde(flatten)]
    pub eligibility: Eligibility,
}

/// Aggregate counts over an enriched batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentSummary {
    pub total: usize,
    pub table_a_approved: usize,
    pub table_a_exact: usize,
    pub table_a_manufacturer_only: usize,
    pub table_a_domestic: usize,
    pub table_b_approved: usize,
    pub table_b_domestic: usize,
    pub on_any_authority: usize,
    pub on_all_authorities: usize,
    pub domestic_content_qualified: usize,
}

impl EnrichmentSummary {
    fn add(&mut self, e: &Eligibility) {
        self.total += 1;
        self.table_a_approved += e.table_a_approved as usize;
        self.table_a_exact += (e.table_a_match_tier == MatchTier::Exact) as usize;
        self.table_a_manufacturer_only +=
            (e.table_a_match_tier == MatchTier::ManufacturerOnly) as usize;
        self.table_a_domestic += e.table_a_domestic as usize;
        self.table_b_approved += e.table_b_approved as usize;
        self.table_b_domestic += e.table_b_domestic as usize;
        self.on_any_authority += e.on_any_authority as usize;
        self.on_all_authorities += e.on_all_authorities as usize;
        self.domestic_content_qualified += e.domestic_content_qualified as usize;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Enrichment {
    pub records: Vec<EnrichedRecord>,
    pub summary: EnrichmentSummary,
}

/// Enrich a whole batch, preserving input order.
pub fn enrich(matcher: &EligibilityMatcher, records: &[ProductRecord]) -> Enrichment {
    ensure_metrics_described();
    let mut summary = EnrichmentSummary::default();
    let enriched: Vec<EnrichedRecord> = records
        .iter()
        .map(|r| {
            let eligibility = evaluate(matcher, r);
            summary.add(&eligibility);
            EnrichedRecord {
                record: r.clone(),
                eligibility,
            }
        })
        .collect();

    counter!("enrich_records_total").increment(summary.total as u64);
    counter!("enrich_domestic_qualified_total")
        .increment(summary.domestic_content_qualified as u64);
    info!(
        total = summary.total,
        table_a = summary.table_a_approved,
        table_b = summary.table_b_approved,
        domestic = summary.domestic_content_qualified,
        "batch enriched"
    );

    Enrichment {
        records: enriched,
        summary,
    }
}
