//! Trader configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file yields the reference setup
//! (PEPE/USDT on 2h candles). Tables mirror the component they configure:
//!
//! ```toml
//! symbol = "PEPE/USDT"
//! timeframe = "2h"
//!
//! [indicators]
//! sma_slow_length = 80
//!
//! [strategy]
//! trail_offset_pct = 0.40
//! ```

use crate::domain::TradingPair;
use crate::exchange::BinanceConfig;
use crate::indicators::{IndicatorEngine, IndicatorParams};
use crate::scheduler::Timing;
use crate::signal::StrategyParams;
use crate::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
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

/// Simulated account used by `--paper`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    /// Starting quote-currency balance.
    pub starting_quote: f64,
    /// Proportional fee per fill (0.001 = 0.1%).
    pub fee_rate: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_quote: 1_000.0,
            fee_rate: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderConfig {
    pub symbol: TradingPair,
    pub timeframe: Timeframe,
    /// Candles requested per cycle.
    pub fetch_limit: usize,
    /// Wait after a failed or empty fetch, in seconds.
    pub retry_backoff_secs: u64,
    /// Granularity of interruptible sleeps, in milliseconds.
    pub poll_interval_ms: u64,
    /// Optional CSV trade journal.
    pub journal_path: Option<PathBuf>,
    pub indicators: IndicatorParams,
    pub strategy: StrategyParams,
    pub exchange: BinanceConfig,
    pub paper: PaperConfig,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            symbol: TradingPair::new("PEPE", "USDT"),
            timeframe: Timeframe::hours(2),
            fetch_limit: 150,
            retry_backoff_secs: 300,
            poll_interval_ms: 1_000,
            journal_path: None,
            indicators: IndicatorParams::default(),
            strategy: StrategyParams::default(),
            exchange: BinanceConfig::default(),
            paper: PaperConfig::default(),
        }
    }
}

impl TraderConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: TraderConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Reject settings the engine or evaluator cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.indicators;
        let s = &self.strategy;
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        for (name, value) in [
            ("lookback", p.lookback),
            ("sma_fast_length", p.sma_fast_length),
            ("sma_slow_length", p.sma_slow_length),
            ("atr_period", p.atr_period),
            ("volatility_sma_period", p.volatility_sma_period),
            ("volume_sma_period", p.volume_sma_period),
        ] {
            if value == 0 {
                return invalid(format!("indicators.{name} must be at least 1"));
            }
        }
        if p.sma_fast_length >= p.sma_slow_length {
            return invalid(format!(
                "indicators.sma_fast_length ({}) must be below sma_slow_length ({})",
                p.sma_fast_length, p.sma_slow_length
            ));
        }
        if !(s.atr_multiplier.is_finite() && s.atr_multiplier > 0.0) {
            return invalid(format!("strategy.atr_multiplier must be positive, got {}", s.atr_multiplier));
        }
        if !(s.trail_offset_pct.is_finite() && s.trail_offset_pct > 0.0 && s.trail_offset_pct < 100.0) {
            return invalid(format!(
                "strategy.trail_offset_pct must be in (0, 100), got {}",
                s.trail_offset_pct
            ));
        }
        let min_bars = IndicatorEngine::new(*p).min_bars();
        if self.fetch_limit < min_bars {
            return invalid(format!(
                "fetch_limit ({}) is below the {} bars the indicators need",
                self.fetch_limit, min_bars
            ));
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be at least 1".into());
        }
        if !(self.paper.fee_rate.is_finite() && (0.0..1.0).contains(&self.paper.fee_rate)) {
            return invalid(format!("paper.fee_rate must be in [0, 1), got {}", self.paper.fee_rate));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    /// Scheduler waits: one timeframe between cycles.
    pub fn timing(&self) -> Timing {
        Timing {
            interval: self.timeframe.duration(),
            retry_backoff: self.retry_backoff(),
            poll_interval: self.poll_interval(),
        }
    }

    /// BLAKE3 hex digest of the canonical JSON form.
    ///
    /// Two configs with identical settings share a fingerprint regardless of
    /// key order or comments in the source file.
    pub fn fingerprint(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => blake3::hash(json.as_bytes()).to_hex().to_string(),
            // Unreachable for plain data; hash the debug form instead of failing.
            Err(_) => blake3::hash(format!("{self:?}").as_bytes()).to_hex().to_string(),
        }
    }
}
