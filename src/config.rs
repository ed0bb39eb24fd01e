// src/config.rs
//! Engine configuration: TOML file with every field defaulted, then
//! environment overrides.
//!
//! Resolution order:
//! 1) `$CATALOG_SIGNALS_CONFIG` (must exist)
//! 2) `config/catalog_signals.toml`
//! 3) built-in defaults
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::change_detector::Retention;

const ENV_PATH: &str = "CATALOG_SIGNALS_CONFIG";
const DEFAULT_PATH: &str = "config/catalog_signals.toml";

const ENV_HISTORY_FILE: &str = "PRICE_HISTORY_FILE";
const ENV_KEEP_DAYS: &str = "KEEP_HISTORY_DAYS";
const ENV_TABLE_A: &str = "AUTHORITY_TABLE_A_PATH";
const ENV_TABLE_B: &str = "AUTHORITY_TABLE_B_PATH";
const ENV_NEW_PRODUCT_ALERTS: &str = "SEND_NEW_PRODUCT_ALERTS";
const ENV_STOCK_ALERTS: &str = "SEND_STOCK_ALERTS";

fn default_history_path() -> PathBuf {
    PathBuf::from("price_history.json")
}
fn default_keep_days() -> u32 {
    90
}
fn default_true() -> bool {
    true
}
fn default_max_items() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
    #[serde(default = "default_keep_days")]
    pub keep_history_days: u32,
    /// Evict keys not observed within `keep_history_days` after each run.
    #[serde(default)]
    pub prune_stale: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            keep_history_days: default_keep_days(),
            prune_stale: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    #[serde(default)]
    pub table_a_path: Option<PathBuf>,
    #[serde(default)]
    pub table_b_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_true")]
    pub send_price_drop_alerts: bool,
    #[serde(default = "default_true")]
    pub send_new_product_alerts: bool,
    #[serde(default = "default_true")]
    pub send_stock_alerts: bool,
    #[serde(default = "default_max_items")]
    pub max_items_per_alert: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            send_price_drop_alerts: true,
            send_new_product_alerts: true,
            send_stock_alerts: true,
            max_items_per_alert: default_max_items(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

impl EngineConfig {
    /// Parse a TOML file. Env overrides are not applied here.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: EngineConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Resolve the config file (see module docs), then apply env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                debug!("no config file found, using defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Apply the recognized environment variables on top of this config.
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_nonempty(ENV_HISTORY_FILE) {
            self.history.path = PathBuf::from(v);
        }
        if let Some(v) = env_nonempty(ENV_KEEP_DAYS) {
            match v.parse::<u32>() {
                Ok(days) => self.history.keep_history_days = days,
                Err(_) => warn!(var = ENV_KEEP_DAYS, value = %v, "ignoring invalid number"),
            }
        }
        if let Some(v) = env_nonempty(ENV_TABLE_A) {
            self.authority.table_a_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env_nonempty(ENV_TABLE_B) {
            self.authority.table_b_path = Some(PathBuf::from(v));
        }
        if let Some(b) = env_bool(ENV_NEW_PRODUCT_ALERTS) {
            self.alerts.send_new_product_alerts = b;
        }
        if let Some(b) = env_bool(ENV_STOCK_ALERTS) {
            self.alerts.send_stock_alerts = b;
        }
        self.sanitize();
    }

    /// Retention to apply after a run, if pruning is enabled.
    pub fn retention(&self, now: NaiveDateTime) -> Option<Retention> {
        self.history.prune_stale.then_some(Retention {
            now,
            keep_days: self.history.keep_history_days,
        })
    }

    fn sanitize(&mut self) {
        if self.alerts.max_items_per_alert == 0 {
            self.alerts.max_items_per_alert = default_max_items();
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
    let v = env_nonempty(name)?;
    match v.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => {
            warn!(var = name, value = %v, "ignoring invalid boolean");
            None
        }
    }
}
