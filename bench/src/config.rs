use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tickline_algo::library::RebalanceConfig;
use tickline_algo::{CommissionModel, SlippageConfig, TransformSpec};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
    pub portfolio: RebalanceConfig,
}

#[derive(Debug, Deserialize)]
pub struct DataConfig {
    /// CSV bar cache; generated on first run
    pub cache: PathBuf,
    pub symbols: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Seed of the synthetic provider
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Deserialize)]
pub struct BacktestConfig {
    #[serde(default = "default_capital_base")]
    pub capital_base: f64,
    /// Annual rate for Sharpe, Sortino and alpha
    #[serde(default)]
    pub risk_free_rate: f64,
    #[serde(default)]
    pub slippage: SlippageConfig,
    #[serde(default)]
    pub commission: CommissionModel,
    /// Trading controls YAML
    pub risk_policy: Option<PathBuf>,
    pub benchmark: Option<String>,
    #[serde(default)]
    pub transforms: IndexMap<String, TransformSpec>,
}

fn default_capital_base() -> f64 {
    100_000.0
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            capital_base: default_capital_base(),
            risk_free_rate: 0.0,
            slippage: SlippageConfig::default(),
            commission: CommissionModel::default(),
            risk_policy: None,
            benchmark: None,
            transforms: IndexMap::new(),
        }
    }
}

impl Config {
    /// Load a config; relative paths are resolved against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.data.cache = resolve(base, &config.data.cache);
        config.backtest.risk_policy = config
            .backtest
            .risk_policy
            .as_deref()
            .map(|p| resolve(base, p));

        if config.data.start > config.data.end {
            anyhow::bail!("data.start must not be after data.end");
        }
        Ok(config)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
