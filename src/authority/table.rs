// src/authority/table.rs
//! Untyped tabular input for authority lists plus file loaders (JSON / TOML).
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::record::cell_to_string;

/// Header row + string cells. Rows shorter than the header read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Builder-style row append.
    pub fn with_row<S: AsRef<str>>(mut self, cells: &[S]) -> Self {
        self.rows
            .push(cells.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column index by header name (trimmed, case-insensitive).
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn from_records(records: Vec<BTreeMap<String, String>>) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for rec in &records {
            for k in rec.keys() {
                if !headers.contains(k) {
                    headers.push(k.clone());
                }
            }
        }
        let rows = records
            .into_iter()
            .map(|mut rec| {
                headers
                    .iter()
                    .map(|h| rec.remove(h).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }
}

/// Load a table from an explicit path. Supports JSON or TOML.
///
/// JSON: an array of row objects, or `{"rows": [...]}`.
/// TOML: `[[rows]]` tables.
pub fn load_table_from(path: &Path) -> Result<RawTable> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading authority table from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let table = parse_table(&content, ext.as_str())
        .with_context(|| format!("parsing authority table {}", path.display()))?;
    info!(path = %path.display(), rows = table.rows.len(), "authority table loaded");
    Ok(table)
}

/// Like [`load_table_from`] but never fails: a missing path, unreadable file
/// or bad format yields `None` and a warning.
pub fn load_table_or_none(path: Option<&Path>, label: &str) -> Option<RawTable> {
    let path = match path {
        Some(p) => p,
        None => {
            warn!(table = label, "no authority table configured");
            return None;
        }
    };
    if !path.exists() {
        warn!(table = label, path = %path.display(), "authority table not found");
        return None;
    }
    match load_table_from(path) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!(table = label, error = ?e, "authority table unusable");
            None
        }
    }
}

fn parse_table(s: &str, hint_ext: &str) -> Result<RawTable> {
    let try_toml = hint_ext == "toml";
    if try_toml {
        if let Ok(t) = parse_toml(s) {
            return Ok(t);
        }
    }
    if let Ok(t) = parse_json(s) {
        return Ok(t);
    }
    if !try_toml {
        if let Ok(t) = parse_toml(s) {
            return Ok(t);
        }
    }
    Err(anyhow!("unsupported authority table format"))
}

fn parse_json(s: &str) -> Result<RawTable> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum JsonTable {
        Rows(Vec<BTreeMap<String, serde_json::Value>>),
        Wrapped {
            rows: Vec<BTreeMap<String, serde_json::Value>>,
        },
    }
    let rows = match serde_json::from_str::<JsonTable>(s)? {
        JsonTable::Rows(r) | JsonTable::Wrapped { rows: r } => r,
    };
    let records = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .filter_map(|(k, v)| cell_to_string(&v).map(|c| (k, c)))
                .collect()
        })
        .collect();
    Ok(RawTable::from_records(records))
}

fn parse_toml(s: &str) -> Result<RawTable> {
    #[derive(Deserialize)]
    struct TomlTable {
        rows: Vec<BTreeMap<String, toml::Value>>,
    }
    let t: TomlTable = toml::from_str(s)?;
    let records = t
        .rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .filter_map(|(k, v)| toml_cell(&v).map(|c| (k, c)))
                .collect()
        })
        .collect();
    Ok(RawTable::from_records(records))
}

fn toml_cell(v: &toml::Value) -> Option<String> {
    match v {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        _ => None,
    }
}
