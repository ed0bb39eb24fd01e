//! # Price Trends
//! Read-only summary over the bounded trend lists held in history.
//!
//! Output is ordered by percentage change ascending, so the strongest
//! price decline comes first. Consumers rely on that order.

use serde::Serialize;
use std::cmp::Ordering;

use crate::history::HistoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Down,
    Up,
    Stable,
}

impl TrendDirection {
    fn of(change_pct: f64) -> Self {
        if change_pct < 0.0 {
            TrendDirection::Down
        } else if change_pct > 0.0 {
            TrendDirection::Up
        } else {
            TrendDirection::Stable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub key: String,
    pub title: Option<String>,
    pub distributor: Option<String>,
    pub first_price: f64,
    pub current_price: f64,
    /// Signed change since the oldest retained point, in percent.
    pub change_pct: f64,
    pub direction: TrendDirection,
    pub data_points: usize,
}

/// One summary per key with at least two trend points and a positive
/// first price, sorted ascending by `change_pct`.
pub fn price_trends(history: &HistoryStore) -> Vec<TrendSummary> {
    let mut out: Vec<TrendSummary> = history
        .iter()
        .filter_map(|(key, entry)| {
            let (first, last) = match entry.trend.as_slice() {
                [first, .., last] => (first, last),
                _ => return None,
            };
            if first.price <= 0.0 {
                return None;
            }
            let change_pct = (last.price - first.price) / first.price * 100.0;
            Some(TrendSummary {
                key: key.clone(),
                title: entry.title.clone(),
                distributor: entry.distributor.clone(),
                first_price: first.price,
                current_price: last.price,
                change_pct,
                direction: TrendDirection::of(change_pct),
                data_points: entry.trend.len(),
            })
        })
        .collect();

    // Stable sort: equal changes keep key order.
    out.sort_by(|a, b| {
        a.change_pct
            .partial_cmp(&b.change_pct)
            .unwrap_or(Ordering::Equal)
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryEntry, TrendPoint};
    use crate::record::ProductRecord;

    fn entry_with(prices: &[f64]) -> HistoryEntry {
        let r = ProductRecord::new("ALTE", "S", "1", prices[0], "In Stock");
        let mut e = HistoryEntry::first_sighting(&r);
        e.trend = prices
            .iter()
            .enumerate()
            .map(|(i, p)| TrendPoint {
                date: format!("d{i}"),
                price: *p,
            })
            .collect();
        e
    }

    fn store(entries: &[(&str, Vec<f64>)]) -> HistoryStore {
        let mut map = crate::history::HistoryMap::new();
        for (k, prices) in entries {
            map.insert(k.to_string(), entry_with(prices));
        }
        HistoryStore::from_entries(map)
    }

    #[test]
    fn single_point_and_zero_first_price_are_skipped() {
        let h = store(&[
            ("a", vec![10.0]),
            ("b", vec![0.0, 5.0]),
            ("c", vec![10.0, 12.0]),
        ]);
        let t = price_trends(&h);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].key, "c");
        assert_eq!(t[0].direction, TrendDirection::Up);
        assert!((t[0].change_pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn biggest_drop_first() {
        let h = store(&[
            ("flat", vec![10.0, 11.0, 10.0]),
            ("up", vec![10.0, 15.0]),
            ("down_small", vec![10.0, 9.0]),
            ("down_big", vec![10.0, 5.0]),
        ]);
        let keys: Vec<_> = price_trends(&h).into_iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["down_big", "down_small", "flat", "up"]);
    }

    #[test]
    fn stable_when_first_equals_last() {
        let h = store(&[("flat", vec![10.0, 11.0, 10.0])]);
        let t = price_trends(&h);
        assert_eq!(t[0].direction, TrendDirection::Stable);
        assert_eq!(t[0].data_points, 3);
    }
}
