//! Enrichment engine: raw bars in, fully-derived rows out.
//!
//! The Heikin-Ashi pass is sequential. Every other column is an independent
//! rolling computation, fanned out with `rayon::join`. Rows are emitted only
//! once every window is full, so each output row is complete.

use super::{heikin_ashi, momentum_confirmation, rolling_mean, Atr, Indicator, Sma};
use crate::domain::Bar;
use serde::{Deserialize, Serialize};

/// Doji threshold: body smaller than this fraction of the range.
const DOJI_BODY_RATIO: f64 = 0.1;

/// Window lengths for every derived column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub lookback: usize,
    pub sma_fast_length: usize,
    pub sma_slow_length: usize,
    pub atr_period: usize,
    pub volatility_sma_period: usize,
    pub volume_sma_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            lookback: 2,
            sma_fast_length: 3,
            sma_slow_length: 80,
            atr_period: 22,
            volatility_sma_period: 14,
            volume_sma_period: 14,
        }
    }
}

/// One bar with every derived field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBar {
    /// Position of this bar in the input series.
    pub index: usize,
    pub bar: Bar,
    pub ha_open: f64,
    pub ha_high: f64,
    pub ha_low: f64,
    pub ha_close: f64,
    pub trend_ma: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub atr: f64,
    pub atr_sma: f64,
    pub volatility_filter: bool,
    pub volume_sma: f64,
    pub volume_filter: bool,
    pub is_doji: bool,
    pub avoid_doji: bool,
    pub momentum_confirmation: bool,
}

impl EnrichedBar {
    fn is_complete(&self) -> bool {
        [
            self.ha_open,
            self.ha_high,
            self.ha_low,
            self.ha_close,
            self.trend_ma,
            self.sma_fast,
            self.sma_slow,
            self.atr,
            self.atr_sma,
            self.volume_sma,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Pure, deterministic indicator pipeline.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Minimum input length accepted by [`compute`](Self::compute).
    pub fn min_bars(&self) -> usize {
        let p = &self.params;
        p.sma_slow_length
            .max(p.atr_period + p.volatility_sma_period)
            .max(p.volume_sma_period)
            .max(p.lookback)
            + 1
    }

    /// Index of the first row where every window is full.
    pub fn warmup(&self) -> usize {
        let p = &self.params;
        let atr = Atr::new(p.atr_period.max(1));
        let slow = Sma::new(p.sma_slow_length.max(1));
        [
            slow.lookback(),
            atr.lookback() + p.volatility_sma_period.saturating_sub(1),
            p.volume_sma_period.saturating_sub(1),
            p.sma_fast_length.saturating_sub(1),
            // trend_ma needs lookback-1 predecessors, momentum needs lookback
            p.lookback,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Enrich `bars`, dropping leading rows without full window support.
    ///
    /// Returns an empty vector when fewer than [`min_bars`](Self::min_bars)
    /// bars are supplied: that means "not enough data yet", not an error.
    pub fn compute(&self, bars: &[Bar]) -> Vec<EnrichedBar> {
        if bars.len() < self.min_bars() {
            return Vec::new();
        }
        let p = self.params;

        let ha = heikin_ashi(bars);
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

        let ((trend_ma, (sma_fast, sma_slow)), ((atr, atr_sma), (volume_sma, momentum))) =
            rayon::join(
                || {
                    rayon::join(
                        || rolling_mean(&ha.close, p.lookback),
                        || {
                            rayon::join(
                                || Sma::new(p.sma_fast_length).compute(bars),
                                || Sma::new(p.sma_slow_length).compute(bars),
                            )
                        },
                    )
                },
                || {
                    rayon::join(
                        || {
                            let atr = Atr::new(p.atr_period).compute(bars);
                            let atr_sma = rolling_mean(&atr, p.volatility_sma_period);
                            (atr, atr_sma)
                        },
                        || {
                            rayon::join(
                                || rolling_mean(&volumes, p.volume_sma_period),
                                || momentum_confirmation(&ha.close, p.lookback),
                            )
                        },
                    )
                },
            );

        let warmup = self.warmup();
        bars.iter()
            .enumerate()
            .skip(warmup)
            .map(|(i, bar)| {
                let is_doji = bar.body() < DOJI_BODY_RATIO * bar.range();
                EnrichedBar {
                    index: i,
                    bar: bar.clone(),
                    ha_open: ha.open[i],
                    ha_high: ha.high[i],
                    ha_low: ha.low[i],
                    ha_close: ha.close[i],
                    trend_ma: trend_ma[i],
                    sma_fast: sma_fast[i],
                    sma_slow: sma_slow[i],
                    atr: atr[i],
                    atr_sma: atr_sma[i],
                    volatility_filter: atr[i] > atr_sma[i],
                    volume_sma: volume_sma[i],
                    volume_filter: bar.volume > volume_sma[i],
                    is_doji,
                    avoid_doji: !is_doji,
                    momentum_confirmation: momentum[i],
                }
            })
            .filter(EnrichedBar::is_complete)
            .collect()
    }
}
