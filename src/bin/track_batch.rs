//! Runs one scraped batch through enrichment and change tracking and prints
//! a JSON report.
//!
//! Usage: `track_batch <records.json>` where the file holds an array of
//! product records.

use anyhow::{bail, Context, Result};
use catalog_signals::{
    process_batch, EligibilityMatcher, EngineConfig, JsonFileBackend, ProductRecord,
};
use std::{fs, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const TOP_TRENDS: usize = 10;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("catalog_signals=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let Some(input) = std::env::args().nth(1).map(PathBuf::from) else {
        bail!("usage: track_batch <records.json>");
    };

    let cfg = EngineConfig::load_default().context("loading engine config")?;
    let raw = fs::read_to_string(&input)
        .with_context(|| format!("reading batch from {}", input.display()))?;
    let records: Vec<ProductRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing batch {}", input.display()))?;
    info!(records = records.len(), input = %input.display(), "batch loaded");

    let matcher = EligibilityMatcher::from_paths(
        cfg.authority.table_a_path.as_deref(),
        cfg.authority.table_b_path.as_deref(),
    );
    let backend = JsonFileBackend::new(cfg.history.path.clone());
    let now = chrono::Local::now().naive_local();

    let outcome = process_batch(&records, &matcher, &backend, &cfg, now);
    let report = outcome.report(&cfg.alerts, TOP_TRENDS);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(e) = &outcome.run.persist_error {
        warn!(error = ?e, "history not persisted");
        bail!("history not persisted to {}", cfg.history.path.display());
    }
    Ok(())
}
