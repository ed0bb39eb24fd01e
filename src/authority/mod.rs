// src/authority/mod.rs
//! Authority lists (Table A: manufacturer + model, Table B: manufacturer only)
//! and the matcher that answers "is this product on the list?".

pub mod matcher;
pub mod table;

pub use matcher::{
    normalize, EligibilityMatcher, MatchTier, TableA, TableAEntry, TableAMatch, TableB,
    TableBEntry, TableBMatch,
};
pub use table::{load_table_from, load_table_or_none, RawTable};

use std::path::Path;

impl EligibilityMatcher {
    /// Load both tables from disk. Missing or malformed files degrade to
    /// "no table" with a warning; this never fails.
    pub fn from_paths(table_a: Option<&Path>, table_b: Option<&Path>) -> Self {
        let a = load_table_or_none(table_a, "table_a");
        let b = load_table_or_none(table_b, "table_b");
        Self::from_raw(a.as_ref(), b.as_ref())
    }
}
