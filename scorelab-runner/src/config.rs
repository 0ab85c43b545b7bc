//! Serializable backtest configuration.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [backtest]
//! lookback_days = 30          # or: reference_date = "2024-05-01"
//! min_score = 60.0            # overrides both per-scale thresholds
//! respect_regime_gate = true
//! regime_policy = "fallback"  # or "fail_fast"
//!
//! [exit_rules]
//! profit_target_pct = 20.0
//!
//! [regime]
//! index_ticker = "SPY"
//! volatility_ticker = "^VIX"
//! cache_path = "data/regime_cache.json"
//!
//! [data]
//! cache_dir = "data/cache"
//! max_concurrency = 4
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use crate::orchestrator::ReferenceDate;
use chrono::NaiveDate;
use scorelab_core::exit::ExitRules;
use scorelab_core::regime::RegimeSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub exit_rules: ExitRules,
    pub regime: RegimeSection,
    pub data: DataSection,
    pub logging: LoggingSection,
}

/// What to do when the regime inputs cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimePolicy {
    /// Continue with the UNKNOWN regime and default weights.
    #[default]
    Fallback,
    /// Abort the run.
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    /// Reference date as days before today. Ignored when `reference_date` is set.
    pub lookback_days: u32,
    pub reference_date: Option<NaiveDate>,
    pub min_score: Option<f64>,
    pub respect_regime_gate: bool,
    pub regime_policy: RegimePolicy,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            reference_date: None,
            min_score: None,
            respect_regime_gate: true,
            regime_policy: RegimePolicy::Fallback,
        }
    }
}

impl BacktestSection {
    pub fn reference(&self) -> ReferenceDate {
        match self.reference_date {
            Some(date) => ReferenceDate::On(date),
            None => ReferenceDate::DaysAgo(self.lookback_days),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeSection {
    #[serde(flatten)]
    pub settings: RegimeSettings,
    /// JSON file the regime cache is loaded from and saved to between runs.
    pub cache_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub cache_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    /// Retries per upstream request after the first attempt.
    pub max_retries: u32,
    pub max_concurrency: usize,
    /// Serve only from the snapshot cache.
    pub offline: bool,
    /// Use deterministic synthetic series instead of Yahoo Finance.
    pub synthetic: bool,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data/cache"),
            fetch_timeout_secs: 30,
            max_retries: 3,
            max_concurrency: 4,
            offline: false,
            synthetic: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl BacktestConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(min) = self.backtest.min_score {
            if !min.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "backtest.min_score must be a finite number, got {min}"
                )));
            }
        }
        self.exit_rules.validate().map_err(ConfigError::Invalid)?;
        self.regime.settings.validate().map_err(ConfigError::Invalid)?;
        if self.data.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "data.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.data.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "data.fetch_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
