//! # Change Detector
//! Compares a batch of freshly scraped records against persisted history and
//! classifies what moved: price drops, price increases, new listings and
//! stock transitions. The classification itself is pure; persistence is a
//! single load before and a single save after the batch.

use chrono::NaiveDateTime;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::history::{HistoryBackend, HistoryEntry, HistoryStore};
use crate::record::{ProductRecord, StockStatus};

/// A drop strictly greater than this percentage is reported.
pub const PRICE_DROP_THRESHOLD_PCT: f64 = 10.0;
/// An increase strictly greater than this percentage is reported.
pub const PRICE_INCREASE_THRESHOLD_PCT: f64 = 10.0;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("tracker_price_drops_total", "Price drops above threshold.");
        describe_counter!(
            "tracker_price_increases_total",
            "Price increases above threshold."
        );
        describe_counter!("tracker_new_products_total", "Keys seen for the first time.");
        describe_counter!("tracker_stock_changes_total", "Stock status transitions.");
        describe_counter!(
            "tracker_persist_errors_total",
            "History writes that failed after a batch."
        );
        describe_gauge!("tracker_history_keys", "Keys held in history after the last batch.");
    });
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceDrop {
    pub product: ProductRecord,
    pub old_price: f64,
    pub new_price: f64,
    pub savings: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceIncrease {
    pub product: ProductRecord,
    pub old_price: f64,
    pub new_price: f64,
    pub increase: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockChange {
    pub product: ProductRecord,
    pub old_stock: StockStatus,
    pub new_stock: StockStatus,
}

impl StockChange {
    /// Transition from anything else into "In Stock".
    pub fn is_back_in_stock(&self) -> bool {
        self.new_stock.is_in_stock() && !self.old_stock.is_in_stock()
    }
}

/// Everything one batch changed. A record lands in `new_products` *or* in
/// the price/stock lists, never both.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    pub price_drops: Vec<PriceDrop>,
    pub price_increases: Vec<PriceIncrease>,
    pub new_products: Vec<ProductRecord>,
    pub stock_changes: Vec<StockChange>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeCounts {
    pub price_drops: usize,
    pub price_increases: usize,
    pub new_products: usize,
    pub stock_changes: usize,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.price_drops.is_empty()
            && self.price_increases.is_empty()
            && self.new_products.is_empty()
            && self.stock_changes.is_empty()
    }

    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts {
            price_drops: self.price_drops.len(),
            price_increases: self.price_increases.len(),
            new_products: self.new_products.len(),
            stock_changes: self.stock_changes.len(),
        }
    }
}

/// Outcome of comparing two prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceMove {
    /// `percentage` is positive.
    Drop { savings: f64, percentage: f64 },
    /// `increase` and `percentage` are absolute values.
    Increase { increase: f64, percentage: f64 },
    /// Within thresholds.
    Steady,
    /// A price is zero, negative or not finite; no ratio is meaningful.
    NotComparable,
}

/// Classify a price move. Percent change is relative to `old`.
pub fn classify_price(old: f64, new: f64) -> PriceMove {
    if !(old.is_finite() && new.is_finite()) || old <= 0.0 || new <= 0.0 {
        return PriceMove::NotComparable;
    }
    let diff = old - new;
    let pct = diff / old * 100.0;
    if pct > PRICE_DROP_THRESHOLD_PCT {
        PriceMove::Drop {
            savings: diff,
            percentage: pct,
        }
    } else if pct < -PRICE_INCREASE_THRESHOLD_PCT {
        PriceMove::Increase {
            increase: diff.abs(),
            percentage: pct.abs(),
        }
    } else {
        PriceMove::Steady
    }
}

/// Classify `records` against `history` and fold them into it.
///
/// Records are processed in order; a key repeated within the batch is
/// compared against the state left by its previous occurrence.
pub fn track_batch(records: &[ProductRecord], history: &mut HistoryStore) -> ChangeSet {
    ensure_metrics_described();
    let mut changes = ChangeSet::default();

    for product in records {
        let key = product.key();

        let Some(entry) = history.get_mut(&key) else {
            debug!(key = %key, "new product");
            history.insert(&key, HistoryEntry::first_sighting(product));
            changes.new_products.push(product.clone());
            continue;
        };

        let old_price = entry.price;
        match classify_price(old_price, product.price) {
            PriceMove::Drop {
                savings,
                percentage,
            } => {
                debug!(key = %key, old_price, new_price = product.price, percentage, "price drop");
                changes.price_drops.push(PriceDrop {
                    product: product.clone(),
                    old_price,
                    new_price: product.price,
                    savings,
                    percentage,
                });
            }
            PriceMove::Increase {
                increase,
                percentage,
            } => {
                debug!(key = %key, old_price, new_price = product.price, percentage, "price increase");
                changes.price_increases.push(PriceIncrease {
                    product: product.clone(),
                    old_price,
                    new_price: product.price,
                    increase,
                    percentage,
                });
            }
            PriceMove::NotComparable => {
                debug!(key = %key, old_price, new_price = product.price, "price not comparable, skipped");
            }
            PriceMove::Steady => {}
        }

        if entry.stock_status != product.stock_status {
            debug!(key = %key, old = %entry.stock_status, new = %product.stock_status, "stock change");
            changes.stock_changes.push(StockChange {
                product: product.clone(),
                old_stock: entry.stock_status.clone(),
                new_stock: product.stock_status.clone(),
            });
        }

        entry.observe(product);
    }

    let counts = changes.counts();
    counter!("tracker_price_drops_total").increment(counts.price_drops as u64);
    counter!("tracker_price_increases_total").increment(counts.price_increases as u64);
    counter!("tracker_new_products_total").increment(counts.new_products as u64);
    counter!("tracker_stock_changes_total").increment(counts.stock_changes as u64);
    gauge!("tracker_history_keys").set(history.len() as f64);

    info!(
        records = records.len(),
        drops = counts.price_drops,
        increases = counts.price_increases,
        new = counts.new_products,
        stock = counts.stock_changes,
        "batch tracked"
    );

    changes
}

/// Opt-in eviction applied after a batch.
#[derive(Debug, Clone, Copy)]
pub struct Retention {
    pub now: NaiveDateTime,
    pub keep_days: u32,
}

/// Result of a full load → track → save cycle.
#[derive(Debug)]
pub struct TrackRun {
    pub changes: ChangeSet,
    pub history: HistoryStore,
    /// Set when the final save failed; `changes` and `history` stay valid.
    pub persist_error: Option<anyhow::Error>,
}

impl TrackRun {
    pub fn persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

/// Load history once, track the batch, optionally prune, save once.
pub fn track_and_persist(
    records: &[ProductRecord],
    backend: &dyn HistoryBackend,
    retention: Option<Retention>,
) -> TrackRun {
    ensure_metrics_described();
    let mut history = HistoryStore::load_from(backend);
    let changes = track_batch(records, &mut history);

    if let Some(r) = retention {
        history.prune_stale(r.now, r.keep_days);
    }

    let persist_error = match history.save_to(backend) {
        Ok(()) => None,
        Err(e) => {
            warn!(error = ?e, "history save failed; results of this run kept in memory");
            counter!("tracker_persist_errors_total").increment(1);
            Some(e)
        }
    };

    TrackRun {
        changes,
        history,
        persist_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries() {
        assert_eq!(classify_price(100.0, 90.0001), PriceMove::Steady);
        assert!(matches!(classify_price(100.0, 89.99), PriceMove::Drop { .. }));
        assert_eq!(classify_price(100.0, 110.0), PriceMove::Steady);
        assert!(matches!(
            classify_price(100.0, 110.5),
            PriceMove::Increase { .. }
        ));
        assert_eq!(classify_price(100.0, 90.0), PriceMove::Steady);
    }

    #[test]
    fn classify_guards_non_positive_and_nan() {
        assert_eq!(classify_price(0.0, 50.0), PriceMove::NotComparable);
        assert_eq!(classify_price(50.0, 0.0), PriceMove::NotComparable);
        assert_eq!(classify_price(-1.0, 50.0), PriceMove::NotComparable);
        assert_eq!(classify_price(f64::NAN, 50.0), PriceMove::NotComparable);
    }

    #[test]
    fn increase_reports_absolute_values() {
        match classify_price(100.0, 125.0) {
            PriceMove::Increase {
                increase,
                percentage,
            } => {
                assert!((increase - 25.0).abs() < 1e-9);
                assert!((percentage - 25.0).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn repeated_key_in_batch_compares_against_previous_occurrence() {
        let mut history = HistoryStore::new();
        let batch = vec![
            ProductRecord::new("ALTE", "X", "1", 100.0, "In Stock"),
            ProductRecord::new("ALTE", "X", "1", 50.0, "In Stock"),
        ];
        let changes = track_batch(&batch, &mut history);
        assert_eq!(changes.new_products.len(), 1);
        assert_eq!(changes.price_drops.len(), 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn back_in_stock_detection() {
        let p = ProductRecord::new("ALTE", "X", "1", 1.0, "In Stock");
        let c = StockChange {
            product: p.clone(),
            old_stock: StockStatus::OutOfStock,
            new_stock: StockStatus::InStock,
        };
        assert!(c.is_back_in_stock());
        let d = StockChange {
            product: p,
            old_stock: StockStatus::InStock,
            new_stock: StockStatus::Dropship,
        };
        assert!(!d.is_back_in_stock());
    }
}
