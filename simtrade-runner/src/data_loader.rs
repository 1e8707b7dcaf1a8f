//! Tick loading for the runner.
//!
//! Two sources:
//! 1. CSV files with a `timestamp,symbol,price[,volume]` header and RFC 3339
//!    timestamps
//! 2. Synthetic random walks, seeded so the same options always produce the
//!    same stream
//!
//! Synthetic data is a developer-only debug mode. Results produced on it are
//! tagged via [`LoadedTicks::has_synthetic`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use simtrade_core::domain::{Tick, TickError};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the tick loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open tick file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("bad tick on line {line}: {source}")]
    InvalidTick { line: u64, source: TickError },

    #[error("tick file {0} contains no ticks")]
    Empty(PathBuf),

    #[error("synthetic stream needs at least one tick")]
    ZeroLength,
}

/// Ticks plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedTicks {
    pub ticks: Vec<Tick>,
    /// BLAKE3 over every tick, for fingerprinting.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

impl LoadedTicks {
    fn new(ticks: Vec<Tick>, has_synthetic: bool) -> Self {
        let dataset_hash = dataset_hash(&ticks);
        Self {
            ticks,
            dataset_hash,
            has_synthetic,
        }
    }

    /// Distinct symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.ticks.iter().map(|t| t.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

#[derive(Debug, Deserialize)]
struct TickRecord {
    timestamp: DateTime<Utc>,
    symbol: String,
    price: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Load ticks from a CSV file.
///
/// Rows are returned in file order. Sequencing is the session's job; a
/// file with out-of-order rows loads fine and aborts the replay instead.
pub fn load_ticks_csv(path: &Path) -> Result<LoadedTicks, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ticks = read_ticks(file)?;
    if ticks.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }
    debug!(path = %path.display(), ticks = ticks.len(), "loaded tick file");
    Ok(LoadedTicks::new(ticks, false))
}

/// Parse ticks from any CSV reader. Each row is validated as it is read.
pub fn read_ticks<R: std::io::Read>(reader: R) -> Result<Vec<Tick>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut ticks = Vec::new();

    for (i, row) in rdr.deserialize::<TickRecord>().enumerate() {
        let record = row?;
        let tick = Tick {
            symbol: record.symbol,
            price: record.price,
            timestamp: record.timestamp,
            volume: record.volume,
        };
        // Header is line 1.
        let line = i as u64 + 2;
        tick.validate()
            .map_err(|source| LoadError::InvalidTick { line, source })?;
        ticks.push(tick);
    }
    Ok(ticks)
}

/// Merge per-symbol streams into one time-ordered stream.
///
/// The sort is stable, so ticks sharing a timestamp keep the order of the
/// input streams.
pub fn merge_streams(streams: Vec<Vec<Tick>>) -> Vec<Tick> {
    let mut merged: Vec<Tick> = streams.into_iter().flatten().collect();
    merged.sort_by_key(|t| t.timestamp);
    merged
}

/// Parameters for a synthetic random walk.
#[derive(Debug, Clone)]
pub struct SyntheticOptions {
    pub symbol: String,
    pub count: usize,
    pub start_price: f64,
    pub start: DateTime<Utc>,
    pub interval: Duration,
    /// Per-tick return is drawn uniformly from `[-volatility, volatility)`.
    pub volatility: f64,
    pub seed: u64,
}

impl SyntheticOptions {
    pub fn new(symbol: impl Into<String>, count: usize) -> Self {
        Self {
            symbol: symbol.into(),
            count,
            start_price: 100.0,
            // 2024-01-02 14:30 UTC, a market open.
            start: Utc.timestamp_opt(1_704_205_800, 0).single().unwrap_or_default(),
            interval: Duration::hours(1),
            volatility: 0.01,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Generate a deterministic random-walk stream.
///
/// Prices never go below one cent so every tick passes validation.
pub fn synthetic_ticks(opts: &SyntheticOptions) -> Result<LoadedTicks, LoadError> {
    if opts.count == 0 {
        return Err(LoadError::ZeroLength);
    }
    warn!(
        symbol = %opts.symbol,
        count = opts.count,
        seed = opts.seed,
        "generating synthetic ticks; results will be tagged as synthetic"
    );

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut ticks = Vec::with_capacity(opts.count);
    let mut price = opts.start_price;
    let mut timestamp = opts.start;

    for _ in 0..opts.count {
        let volume = rng.gen_range(1_000.0..10_000.0_f64).round();
        ticks.push(Tick::new(opts.symbol.clone(), price, timestamp).with_volume(volume));

        let step: f64 = if opts.volatility > 0.0 {
            rng.gen_range(-opts.volatility..opts.volatility)
        } else {
            0.0
        };
        price = (price * (1.0 + step)).max(0.01);
        timestamp += opts.interval;
    }

    Ok(LoadedTicks::new(ticks, true))
}

/// Deterministic BLAKE3 hash over symbol, timestamp, price and volume.
pub fn dataset_hash(ticks: &[Tick]) -> String {
    let mut hasher = blake3::Hasher::new();
    for tick in ticks {
        hasher.update(tick.symbol.as_bytes());
        hasher.update(&tick.timestamp.timestamp_micros().to_le_bytes());
        hasher.update(&tick.price.to_le_bytes());
        hasher.update(&tick.volume.unwrap_or(f64::NAN).to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
