//! # Product Records
//! Canonical shape of one observed catalog entry, as handed over by the
//! scraper layer. Records are immutable once captured; everything downstream
//! (change detection, eligibility enrichment, statistics) only reads them.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Values accepted as "yes" in free-text boolean cells (after trim + uppercase).
pub const AFFIRMATIVE_VALUES: [&str; 4] = ["YES", "Y", "TRUE", "1"];

/// Case-insensitive check against [`AFFIRMATIVE_VALUES`].
pub fn is_affirmative(raw: &str) -> bool {
    let v = raw.trim().to_ascii_uppercase();
    AFFIRMATIVE_VALUES.contains(&v.as_str())
}

/// Render a loosely-typed cell (string, bool, number) as text. `null` and
/// nested values yield `None`.
pub(crate) fn cell_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Optional text field that also accepts booleans and numbers.
pub(crate) fn lenient_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(cell_to_string))
}

/// Explicit `null` reads as the type's default, like a missing field.
pub(crate) fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Availability as reported by the source. Known labels are enumerated,
/// anything else is kept verbatim so no information is lost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    Dropship,
    Available,
    #[default]
    Unknown,
    Other(String),
}

impl StockStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::OutOfStock => "Out of Stock",
            StockStatus::Dropship => "Dropship",
            StockStatus::Available => "Available",
            StockStatus::Unknown => "Unknown",
            StockStatus::Other(s) => s.as_str(),
        }
    }

    pub fn is_in_stock(&self) -> bool {
        matches!(self, StockStatus::InStock)
    }
}

impl From<String> for StockStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "In Stock" => StockStatus::InStock,
            "Out of Stock" => StockStatus::OutOfStock,
            "Dropship" => StockStatus::Dropship,
            "Available" => StockStatus::Available,
            "Unknown" | "" => StockStatus::Unknown,
            _ => StockStatus::Other(s),
        }
    }
}

impl From<&str> for StockStatus {
    fn from(s: &str) -> Self {
        StockStatus::from(s.to_string())
    }
}

impl From<StockStatus> for String {
    fn from(s: StockStatus) -> Self {
        match s {
            StockStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-specific attributes. Recognized keys are typed fields; the rest
/// lands in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Specs {
    /// Explicit domestic-content marker published by the source ("Yes"/"No"/...).
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub domestic_content: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Specs {
    /// True when the source flags the item as domestic content.
    pub fn declares_domestic_content(&self) -> bool {
        self.domestic_content
            .as_deref()
            .map(is_affirmative)
            .unwrap_or(false)
    }
}

fn default_na() -> String {
    "N/A".to_string()
}

/// One observed catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub distributor: String,
    #[serde(default = "default_na")]
    pub sku: String,
    #[serde(default = "default_na")]
    pub product_id: String,
    #[serde(default = "default_na")]
    pub title: String,
    /// Manufacturer as printed by the source.
    #[serde(default = "default_na")]
    pub brand: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock_status: StockStatus,
    /// Capture time as produced by the scraper (`%Y-%m-%d %H:%M:%S`).
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub specs: Specs,

    // Pass-through fields for reporting collaborators.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub wattage: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub efficiency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_price: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub inventory_qty: Option<String>,
}

impl ProductRecord {
    /// Minimal record; optional fields empty.
    pub fn new(
        distributor: impl Into<String>,
        sku: impl Into<String>,
        product_id: impl Into<String>,
        price: f64,
        stock_status: impl Into<StockStatus>,
    ) -> Self {
        Self {
            distributor: distributor.into(),
            sku: sku.into(),
            product_id: product_id.into(),
            title: default_na(),
            brand: default_na(),
            price,
            stock_status: stock_status.into(),
            last_updated: String::new(),
            specs: Specs::default(),
            product_url: None,
            image_url: None,
            wattage: None,
            efficiency: None,
            compare_price: None,
            inventory_qty: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = brand.into();
        self
    }

    pub fn with_last_updated(mut self, ts: impl Into<String>) -> Self {
        self.last_updated = ts.into();
        self
    }

    pub fn with_specs(mut self, specs: Specs) -> Self {
        self.specs = specs;
        self
    }

    pub fn key(&self) -> TrackedKey {
        TrackedKey::of(self)
    }

    /// Model identifier used for authority lookups. Sources publish the
    /// manufacturer part number as SKU, so that is what we match on.
    pub fn model(&self) -> Option<&str> {
        let sku = self.sku.trim();
        if sku.is_empty() || sku.eq_ignore_ascii_case("N/A") {
            None
        } else {
            Some(sku)
        }
    }
}

/// Identity of a listing across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackedKey {
    pub distributor: String,
    pub sku: String,
    pub product_id: String,
}

impl TrackedKey {
    pub fn of(record: &ProductRecord) -> Self {
        Self {
            distributor: record.distributor.clone(),
            sku: record.sku.clone(),
            product_id: record.product_id.clone(),
        }
    }
}

impl fmt::Display for TrackedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.distributor, self.sku, self.product_id)
    }
}
