//! Per-distributor batch statistics.
//!
//! Price aggregates only consider strictly positive prices; a distributor
//! without any priced record reports `None` for avg/min/max.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::record::ProductRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistributorStats {
    pub total: usize,
    pub in_stock: usize,
    /// Everything not "In Stock" (dropship, unknown, ... included).
    pub out_of_stock: usize,
    pub priced: usize,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

#[derive(Default)]
struct Acc {
    total: usize,
    in_stock: usize,
    sum: f64,
    priced: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl Acc {
    fn push(&mut self, r: &ProductRecord) {
        self.total += 1;
        if r.stock_status.is_in_stock() {
            self.in_stock += 1;
        }
        let p = r.price;
        if p.is_finite() && p > 0.0 {
            self.priced += 1;
            self.sum += p;
            self.min = Some(self.min.map_or(p, |m| m.min(p)));
            self.max = Some(self.max.map_or(p, |m| m.max(p)));
        }
    }

    fn finish(self) -> DistributorStats {
        DistributorStats {
            total: self.total,
            in_stock: self.in_stock,
            out_of_stock: self.total - self.in_stock,
            priced: self.priced,
            avg_price: (self.priced > 0).then(|| self.sum / self.priced as f64),
            min_price: self.min,
            max_price: self.max,
        }
    }
}

/// Stats keyed by distributor name, in name order.
pub fn distributor_stats(records: &[ProductRecord]) -> BTreeMap<String, DistributorStats> {
    let mut acc: BTreeMap<String, Acc> = BTreeMap::new();
    for r in records {
        acc.entry(r.distributor.clone()).or_default().push(r);
    }
    acc.into_iter().map(|(k, a)| (k, a.finish())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_ignore_unpriced() {
        let recs = vec![
            ProductRecord::new("ALTE", "A", "1", 100.0, "In Stock"),
            ProductRecord::new("ALTE", "B", "2", 0.0, "Out of Stock"),
            ProductRecord::new("ALTE", "C", "3", 50.0, "Dropship"),
            ProductRecord::new("Soligent", "D", "4", 0.0, "In Stock"),
        ];
        let s = distributor_stats(&recs);
        let alte = &s["ALTE"];
        assert_eq!(alte.total, 3);
        assert_eq!(alte.in_stock, 1);
        assert_eq!(alte.out_of_stock, 2);
        assert_eq!(alte.priced, 2);
        assert_eq!(alte.avg_price, Some(75.0));
        assert_eq!(alte.min_price, Some(50.0));
        assert_eq!(alte.max_price, Some(100.0));

        let sol = &s["Soligent"];
        assert_eq!(sol.avg_price, None);
        assert_eq!(sol.in_stock, 1);
    }

    #[test]
    fn empty_batch() {
        assert!(distributor_stats(&[]).is_empty());
    }
}
