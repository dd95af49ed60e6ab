//! Bar loading for the benchmark
//!
//! Bars are read from a CSV cache when it exists. Otherwise a seeded
//! geometric random walk is generated for every weekday of the configured
//! period and written to the cache.

use crate::config::DataConfig;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tickline_algo::{BarFrame, OhlcvBar};
use tracing::info;

/// Daily drift of the synthetic walk
const DRIFT: f64 = 0.0003;
/// Daily volatility of the synthetic walk
const VOLATILITY: f64 = 0.02;

pub fn load_data(config: &DataConfig) -> Result<BarFrame> {
    if config.cache.exists() {
        info!(path = %config.cache.display(), "Loading cached bars");
        return BarFrame::read_csv(&config.cache)
            .with_context(|| format!("Failed to read bar cache {}", config.cache.display()));
    }

    info!(
        symbols = ?config.symbols,
        start = %config.start,
        end = %config.end,
        seed = config.seed,
        "Generating synthetic bars"
    );
    let frame = synthetic_bars(config)?;

    if let Some(parent) = config.cache.parent() {
        std::fs::create_dir_all(parent)?;
    }
    frame
        .write_csv(&config.cache)
        .with_context(|| format!("Failed to write bar cache {}", config.cache.display()))?;
    info!(path = %config.cache.display(), rows = frame.len(), "Wrote bar cache");

    Ok(frame)
}

/// Weekday session closes (21:00 UTC) between start and end
fn trading_days(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let close = NaiveTime::from_hms_opt(21, 0, 0).unwrap_or_default();
    let mut days = Vec::new();
    let mut date = start.date_naive();

    while date <= end.date_naive() {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            let dt = Utc.from_utc_datetime(&date.and_time(close));
            if dt >= start && dt <= end {
                days.push(dt);
            }
        }
        date += Duration::days(1);
    }
    days
}

fn synthetic_bars(config: &DataConfig) -> Result<BarFrame> {
    let index = trading_days(config.start, config.end);
    if index.is_empty() {
        return Err(anyhow!("No trading days between {} and {}", config.start, config.end));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let returns = Normal::new(DRIFT, VOLATILITY)
        .map_err(|e| anyhow!("Invalid return distribution: {}", e))?;

    let mut frame = BarFrame::new(index.clone())?;
    for symbol in &config.symbols {
        let mut close: f64 = rng.gen_range(20.0..100.0);
        let mut cells = Vec::with_capacity(index.len());

        for _ in &index {
            let open = close;
            close = open * returns.sample(&mut rng).exp();
            let wiggle = 1.0 + rng.gen_range(0.0..0.01);

            cells.push(Some(OhlcvBar {
                open,
                high: open.max(close) * wiggle,
                low: open.min(close) / wiggle,
                close,
                volume: rng.gen_range(100_000.0..2_000_000.0_f64).round(),
            }));
        }
        frame.insert_column(symbol.as_str(), cells)?;
    }

    Ok(frame)
}
