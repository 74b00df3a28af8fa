//! Heikin-Ashi candle transform.
//!
//! HA-close is a per-bar mean, but HA-open is a recurrence on the previous HA
//! candle, so the whole transform is one sequential pass from index 0.

use crate::domain::Bar;

/// Column-oriented Heikin-Ashi candles, index-aligned with the input bars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeikinAshi {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
}

impl HeikinAshi {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

/// Compute Heikin-Ashi candles.
///
/// - `close[i] = (open + high + low + close) / 4`
/// - `open[0]  = (open[0] + close[0]) / 2` (raw prices)
/// - `open[i]  = (ha_open[i-1] + ha_close[i-1]) / 2`
/// - `high/low` = max/min of raw high/low, HA-open and HA-close
pub fn heikin_ashi(bars: &[Bar]) -> HeikinAshi {
    let n = bars.len();
    let mut ha = HeikinAshi {
        open: Vec::with_capacity(n),
        high: Vec::with_capacity(n),
        low: Vec::with_capacity(n),
        close: Vec::with_capacity(n),
    };

    for (i, bar) in bars.iter().enumerate() {
        let ha_close = (bar.open + bar.high + bar.low + bar.close) / 4.0;
        let ha_open = if i == 0 {
            (bar.open + bar.close) / 2.0
        } else {
            (ha.open[i - 1] + ha.close[i - 1]) / 2.0
        };

        ha.open.push(ha_open);
        ha.close.push(ha_close);
        ha.high.push(bar.high.max(ha_open).max(ha_close));
        ha.low.push(bar.low.min(ha_open).min(ha_close));
    }

    ha
}
