//! Alert selection over a [`ChangeSet`].
//!
//! Decides *what* an alerting collaborator should send; rendering and
//! delivery live elsewhere. Each list is capped independently.
use serde::Serialize;
use std::cmp::Ordering;

use crate::change_detector::{ChangeSet, PriceDrop, StockChange};
use crate::config::AlertConfig;
use crate::record::ProductRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertPlan<'a> {
    /// Largest percentage first.
    pub price_drops: Vec<&'a PriceDrop>,
    pub new_products: Vec<&'a ProductRecord>,
    /// Only transitions into "In Stock".
    pub back_in_stock: Vec<&'a StockChange>,
}

impl<'a> AlertPlan<'a> {
    pub fn from_changes(changes: &'a ChangeSet, cfg: &AlertConfig) -> Self {
        let cap = cfg.max_items_per_alert;

        let price_drops = if cfg.send_price_drop_alerts {
            let mut drops: Vec<&PriceDrop> = changes.price_drops.iter().collect();
            drops.sort_by(|a, b| {
                b.percentage
                    .partial_cmp(&a.percentage)
                    .unwrap_or(Ordering::Equal)
            });
            drops.truncate(cap);
            drops
        } else {
            Vec::new()
        };

        let new_products = if cfg.send_new_product_alerts {
            changes.new_products.iter().take(cap).collect()
        } else {
            Vec::new()
        };

        let back_in_stock = if cfg.send_stock_alerts {
            changes
                .stock_changes
                .iter()
                .filter(|c| c.is_back_in_stock())
                .take(cap)
                .collect()
        } else {
            Vec::new()
        };

        Self {
            price_drops,
            new_products,
            back_in_stock,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.price_drops.is_empty() && self.new_products.is_empty() && self.back_in_stock.is_empty()
    }
}
