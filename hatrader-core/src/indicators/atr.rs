//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! Smoothing is Wilder's (EMA with alpha = 1/period), seeded with the plain
//! mean of the first `period` true ranges that have a previous close.
//! First valid value sits at index `period`.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// True Range series. TR[0] is `high - low` since bar 0 has no previous close.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let hl = bar.high - bar.low;
            match i.checked_sub(1).map(|p| bars[p].close) {
                None => hl,
                Some(pc) => hl.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
            }
        })
        .collect()
}

/// Wilder smoothing with alpha = 1/period.
///
/// The seed is the mean of the first run of `period` consecutive finite values.
/// A NaN after the seed poisons the remainder of the series.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut run = 0usize;
    let seed_end = values.iter().position(|v| {
        run = if v.is_nan() { 0 } else { run + 1 };
        run == period
    });
    let Some(seed_end) = seed_end else {
        return result;
    };

    let seed_start = seed_end + 1 - period;
    let mut prev = values[seed_start..=seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end] = prev;

    let alpha = 1.0 / period as f64;
    for i in (seed_end + 1)..n {
        if values[i].is_nan() {
            break;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }

    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut tr = true_range(bars);
        // TR[0] lacks a previous close; excluding it keeps lookback == period.
        if let Some(first) = tr.first_mut() {
            *first = f64::NAN;
        }
        wilder_smooth(&tr, self.period)
    }
}
