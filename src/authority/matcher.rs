// src/authority/matcher.rs
//! Tiered lookup of a product's manufacturer/model against the two
//! authority lists.
//!
//! - Table A is model-aware: an exact (manufacturer, model) row outranks a
//!   manufacturer-only hit.
//! - Table B knows manufacturers only; the first row per manufacturer wins.
//! - Matching is exact on normalized strings (trimmed, uppercased). There is
//!   no fuzzy fallback.
//! - A missing table never fails a lookup; it answers `no_table` / not
//!   approved.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::table::RawTable;
use crate::record::is_affirmative;

pub const COL_MANUFACTURER: &str = "Manufacturer";
pub const COL_MODEL: &str = "Model";
pub const COL_DOMESTIC: &str = "Domestic Content";
pub const COL_PROGRAM: &str = "Program Type";

/// Normalize a manufacturer/model string for comparison.
pub fn normalize(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Precision of a Table A hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    ManufacturerOnly,
    NotFound,
    NoTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableAMatch {
    pub approved: bool,
    pub domestic: bool,
    pub tier: MatchTier,
}

impl TableAMatch {
    fn unapproved(tier: MatchTier) -> Self {
        Self {
            approved: false,
            domestic: false,
            tier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableBMatch {
    pub approved: bool,
    pub program: Option<String>,
    pub domestic: bool,
}

impl TableBMatch {
    fn unapproved() -> Self {
        Self {
            approved: false,
            program: None,
            domestic: false,
        }
    }
}

/// One Table A row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAEntry {
    pub manufacturer: String,
    pub model: Option<String>,
    pub domestic: bool,
}

/// One Table B row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBEntry {
    pub manufacturer: String,
    pub program: Option<String>,
    pub domestic: bool,
}

/// Model-aware authority list, indexed by normalized manufacturer.
#[derive(Debug, Clone, Default)]
pub struct TableA {
    /// manufacturer → rows in input order as (normalized model, domestic).
    by_manufacturer: HashMap<String, Vec<(Option<String>, bool)>>,
    rows: usize,
}

impl TableA {
    pub fn from_entries<I: IntoIterator<Item = TableAEntry>>(entries: I) -> Self {
        let mut t = TableA::default();
        for e in entries {
            let m = normalize(&e.manufacturer);
            if m.is_empty() {
                continue;
            }
            let model = e.model.map(|s| normalize(&s)).filter(|s| !s.is_empty());
            t.by_manufacturer
                .entry(m)
                .or_default()
                .push((model, e.domestic));
            t.rows += 1;
        }
        t
    }

    /// `None` when the `Manufacturer` column is absent or nothing usable remains.
    /// `Model` and `Domestic Content` are optional.
    pub fn from_raw(raw: &RawTable) -> Option<Self> {
        let Some(m_col) = raw.column(COL_MANUFACTURER) else {
            warn!(column = COL_MANUFACTURER, "table A missing required column");
            return None;
        };
        let model_col = raw.column(COL_MODEL);
        let dom_col = raw.column(COL_DOMESTIC);

        let entries = (0..raw.rows.len()).map(|i| TableAEntry {
            manufacturer: raw.cell(i, m_col).to_string(),
            model: model_col.map(|c| raw.cell(i, c).to_string()),
            domestic: dom_col.map(|c| is_affirmative(raw.cell(i, c))).unwrap_or(false),
        });
        let table = Self::from_entries(entries);
        if table.is_empty() {
            warn!("table A has no usable rows");
            return None;
        }
        Some(table)
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Tiered lookup.
    ///
    /// Manufacturer-only hits are approved but never domestic, even if a
    /// sibling model under the same manufacturer is.
    pub fn lookup(&self, manufacturer: &str, model: Option<&str>) -> TableAMatch {
        let Some(rows) = self.by_manufacturer.get(&normalize(manufacturer)) else {
            return TableAMatch::unapproved(MatchTier::NotFound);
        };

        let model = model.map(normalize).filter(|m| !m.is_empty());
        if let Some(model) = model {
            if let Some((_, domestic)) = rows
                .iter()
                .find(|(row_model, _)| row_model.as_deref() == Some(model.as_str()))
            {
                return TableAMatch {
                    approved: true,
                    domestic: *domestic,
                    tier: MatchTier::Exact,
                };
            }
        }

        TableAMatch {
            approved: true,
            domestic: false,
            tier: MatchTier::ManufacturerOnly,
        }
    }
}

/// Manufacturer-only authority list.
#[derive(Debug, Clone, Default)]
pub struct TableB {
    by_manufacturer: HashMap<String, (Option<String>, bool)>,
}

impl TableB {
    /// Duplicate manufacturers keep their first row.
    pub fn from_entries<I: IntoIterator<Item = TableBEntry>>(entries: I) -> Self {
        let mut t = TableB::default();
        for e in entries {
            let m = normalize(&e.manufacturer);
            if m.is_empty() {
                continue;
            }
            let program = e
                .program
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty());
            t.by_manufacturer.entry(m).or_insert((program, e.domestic));
        }
        t
    }

    /// `None` when any of `Manufacturer`, `Program Type`, `Domestic Content`
    /// is absent or nothing usable remains.
    pub fn from_raw(raw: &RawTable) -> Option<Self> {
        let cols = (
            raw.column(COL_MANUFACTURER),
            raw.column(COL_PROGRAM),
            raw.column(COL_DOMESTIC),
        );
        let (Some(m_col), Some(p_col), Some(d_col)) = cols else {
            warn!(headers = ?raw.headers, "table B missing required columns");
            return None;
        };

        let entries = (0..raw.rows.len()).map(|i| TableBEntry {
            manufacturer: raw.cell(i, m_col).to_string(),
            program: Some(raw.cell(i, p_col).to_string()),
            domestic: is_affirmative(raw.cell(i, d_col)),
        });
        let table = Self::from_entries(entries);
        if table.is_empty() {
            warn!("table B has no usable rows");
            return None;
        }
        Some(table)
    }

    pub fn len(&self) -> usize {
        self.by_manufacturer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_manufacturer.is_empty()
    }

    pub fn lookup(&self, manufacturer: &str) -> TableBMatch {
        match self.by_manufacturer.get(&normalize(manufacturer)) {
            Some((program, domestic)) => TableBMatch {
                approved: true,
                program: program.clone(),
                domestic: *domestic,
            },
            None => TableBMatch::unapproved(),
        }
    }
}

/// Both authority lists, either of which may be absent.
#[derive(Debug, Clone, Default)]
pub struct EligibilityMatcher {
    table_a: Option<TableA>,
    table_b: Option<TableB>,
}

impl EligibilityMatcher {
    pub fn new(table_a: Option<TableA>, table_b: Option<TableB>) -> Self {
        debug!(
            table_a_rows = table_a.as_ref().map(TableA::len),
            table_b_rows = table_b.as_ref().map(TableB::len),
            "eligibility matcher ready"
        );
        Self { table_a, table_b }
    }

    /// Build from raw tabular inputs; unusable inputs degrade to "no table".
    pub fn from_raw(table_a: Option<&RawTable>, table_b: Option<&RawTable>) -> Self {
        Self::new(
            table_a.and_then(TableA::from_raw),
            table_b.and_then(TableB::from_raw),
        )
    }

    pub fn has_table_a(&self) -> bool {
        self.table_a.is_some()
    }

    pub fn has_table_b(&self) -> bool {
        self.table_b.is_some()
    }

    pub fn match_table_a(&self, manufacturer: &str, model: Option<&str>) -> TableAMatch {
        match &self.table_a {
            Some(t) => t.lookup(manufacturer, model),
            None => TableAMatch::unapproved(MatchTier::NoTable),
        }
    }

    pub fn match_table_b(&self, manufacturer: &str) -> TableBMatch {
        match &self.table_b {
            Some(t) => t.lookup(manufacturer),
            None => TableBMatch::unapproved(),
        }
    }
}
