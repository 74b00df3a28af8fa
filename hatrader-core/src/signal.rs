//! Signal evaluation: pure decision logic on the latest enriched bar.
//!
//! `evaluate` never mutates its input. It returns the decision together with
//! the position state after trailing-stop maintenance; the entry/exit
//! transition itself is applied by [`Evaluation::commit`] once the order has
//! gone through.

use crate::indicators::EnrichedBar;
use crate::position::{LastSignal, PositionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entry/exit tuning, independent of indicator windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    /// Initial stop distance in ATRs below the entry close.
    pub atr_multiplier: f64,
    /// Trailing distance below the close, in percent.
    pub trail_offset_pct: f64,
    /// Minimum bars between consecutive entries/exits.
    pub min_bar_gap: u32,
    /// Whether `min_bar_gap` gates new entries.
    pub enforce_min_bar_gap: bool,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            atr_multiplier: 1.5,
            trail_offset_pct: 0.40,
            min_bar_gap: 24,
            enforce_min_bar_gap: false,
        }
    }
}

/// Decision for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    Hold,
    EnterLong { entry_price: f64, initial_stop: f64 },
    ExitLong { close: f64, stop: f64 },
}

/// Per-condition breakdown of the entry rule, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConditions {
    pub flat: bool,
    pub not_repeated: bool,
    pub bar_gap_ok: bool,
    pub ha_above_trend: bool,
    pub fast_above_slow: bool,
    pub close_above_slow: bool,
    pub momentum: bool,
    pub volatility: bool,
    pub volume: bool,
    pub not_doji: bool,
}

impl EntryConditions {
    pub fn check(
        row: &EnrichedBar,
        bar: i64,
        state: &PositionState,
        params: &StrategyParams,
    ) -> Self {
        let gap = i64::from(params.min_bar_gap);
        Self {
            flat: !state.in_trade(),
            not_repeated: state.last_signal() != LastSignal::Buy,
            bar_gap_ok: !params.enforce_min_bar_gap || state.bars_since_entry(bar) >= gap,
            ha_above_trend: row.ha_close > row.trend_ma,
            fast_above_slow: row.sma_fast > row.sma_slow,
            close_above_slow: row.bar.close > row.sma_slow,
            momentum: row.momentum_confirmation,
            volatility: row.volatility_filter,
            volume: row.volume_filter,
            not_doji: row.avoid_doji,
        }
    }

    pub fn all(&self) -> bool {
        self.flat
            && self.not_repeated
            && self.bar_gap_ok
            && self.ha_above_trend
            && self.fast_above_slow
            && self.close_above_slow
            && self.momentum
            && self.volatility
            && self.volume
            && self.not_doji
    }

    /// Names of the conditions that failed.
    pub fn failed(&self) -> Vec<&'static str> {
        [
            (self.flat, "flat"),
            (self.not_repeated, "not_repeated"),
            (self.bar_gap_ok, "bar_gap"),
            (self.ha_above_trend, "ha_above_trend"),
            (self.fast_above_slow, "fast_above_slow"),
            (self.close_above_slow, "close_above_slow"),
            (self.momentum, "momentum"),
            (self.volatility, "volatility"),
            (self.volume, "volume"),
            (self.not_doji, "not_doji"),
        ]
        .into_iter()
        .filter_map(|(ok, name)| (!ok).then_some(name))
        .collect()
    }
}

/// Result of evaluating one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub signal: Signal,
    /// State after stop maintenance, before any entry/exit transition.
    pub state: PositionState,
    /// Whether the trailing stop moved up this cycle.
    pub stop_raised: bool,
    /// Absolute bar number of the evaluated bar.
    pub bar: i64,
    pub timestamp: DateTime<Utc>,
}

impl Evaluation {
    /// State after the signal's transition, for use once the order succeeded.
    pub fn commit(&self) -> PositionState {
        let mut next = self.state.clone();
        match self.signal {
            Signal::Hold => {}
            Signal::EnterLong {
                entry_price,
                initial_stop,
            } => next.open_long(entry_price, initial_stop, self.bar, self.timestamp),
            Signal::ExitLong { .. } => next.close_long(self.bar, self.timestamp),
        }
        next
    }
}

/// Evaluate the entry rule, stop maintenance and the exit rule for `row`.
///
/// `bar` is the absolute bar number of `row` (see
/// [`Timeframe::bar_number`](crate::timeframe::Timeframe::bar_number)).
/// An entry short-circuits the cycle: stop maintenance and the exit check
/// only run when no entry fired.
pub fn evaluate(
    row: &EnrichedBar,
    bar: i64,
    state: &PositionState,
    params: &StrategyParams,
) -> Evaluation {
    let close = row.bar.close;
    let timestamp = row.bar.timestamp;

    if EntryConditions::check(row, bar, state, params).all() {
        return Evaluation {
            signal: Signal::EnterLong {
                entry_price: close,
                initial_stop: close - params.atr_multiplier * row.atr,
            },
            state: state.clone(),
            stop_raised: false,
            bar,
            timestamp,
        };
    }

    let mut next = state.clone();
    let stop_raised = next.raise_stop(close * (1.0 - params.trail_offset_pct / 100.0));

    let signal = match next.trailing_stop() {
        Some(stop) if next.last_signal() != LastSignal::Sell && next.stop_hit(close) => {
            Signal::ExitLong { close, stop }
        }
        _ => Signal::Hold,
    };

    Evaluation {
        signal,
        state: next,
        stop_raised,
        bar,
        timestamp,
    }
}
