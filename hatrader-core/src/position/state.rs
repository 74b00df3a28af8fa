//! Position state machine: Flat <-> Long.

use super::ratchet::RatchetStop;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of the last executed signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LastSignal {
    Sell,
    #[default]
    None,
    Buy,
}

impl LastSignal {
    /// Numeric form: -1 sell, 0 none, 1 buy.
    pub fn as_i8(&self) -> i8 {
        match self {
            LastSignal::Sell => -1,
            LastSignal::None => 0,
            LastSignal::Buy => 1,
        }
    }
}

/// Mutable record of the single strategy position.
///
/// Fields are private so the only way to change them is through the
/// transitions below, which keep `in_trade`, `entry_price` and the stop
/// consistent with each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    in_trade: bool,
    entry_price: Option<f64>,
    trailing_stop: Option<RatchetStop>,
    last_signal: LastSignal,
    last_entry_bar: i64,
    last_processed: Option<DateTime<Utc>>,
}

impl PositionState {
    /// Flat state. `last_entry_bar` starts at `-min_bar_gap` so a spacing gate
    /// never blocks the first entry.
    pub fn new(min_bar_gap: u32) -> Self {
        Self {
            in_trade: false,
            entry_price: None,
            trailing_stop: None,
            last_signal: LastSignal::None,
            last_entry_bar: -i64::from(min_bar_gap),
            last_processed: None,
        }
    }

    pub fn in_trade(&self) -> bool {
        self.in_trade
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.entry_price
    }

    pub fn trailing_stop(&self) -> Option<f64> {
        self.trailing_stop.map(|s| s.level())
    }

    pub fn last_signal(&self) -> LastSignal {
        self.last_signal
    }

    pub fn last_entry_bar(&self) -> i64 {
        self.last_entry_bar
    }

    pub fn last_processed(&self) -> Option<DateTime<Utc>> {
        self.last_processed
    }

    /// Bars elapsed since the last recorded entry/exit.
    pub fn bars_since_entry(&self, bar: i64) -> i64 {
        bar - self.last_entry_bar
    }

    /// Flat -> Long.
    pub fn open_long(
        &mut self,
        entry_price: f64,
        initial_stop: f64,
        bar: i64,
        timestamp: DateTime<Utc>,
    ) {
        self.in_trade = true;
        self.entry_price = Some(entry_price);
        self.trailing_stop = Some(RatchetStop::new(initial_stop));
        self.last_signal = LastSignal::Buy;
        self.last_entry_bar = bar;
        self.last_processed = Some(timestamp);
    }

    /// Long -> Flat.
    pub fn close_long(&mut self, bar: i64, timestamp: DateTime<Utc>) {
        self.in_trade = false;
        self.entry_price = None;
        self.trailing_stop = None;
        self.last_signal = LastSignal::Sell;
        self.last_entry_bar = bar;
        self.last_processed = Some(timestamp);
    }

    /// Ratchet the stop toward `candidate`. No-op when flat.
    /// Returns true when the stop moved.
    pub fn raise_stop(&mut self, candidate: f64) -> bool {
        match self.trailing_stop.as_mut() {
            Some(stop) if self.in_trade => stop.tighten(candidate),
            _ => false,
        }
    }

    /// Whether `close` has reached the trailing stop of an open position.
    pub fn stop_hit(&self, close: f64) -> bool {
        self.in_trade && self.trailing_stop.is_some_and(|s| s.is_hit(close))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn new_state_is_flat() {
        let state = PositionState::new(24);
        assert!(!state.in_trade());
        assert_eq!(state.entry_price(), None);
        assert_eq!(state.trailing_stop(), None);
        assert_eq!(state.last_signal(), LastSignal::None);
        assert_eq!(state.last_entry_bar(), -24);
        assert_eq!(state.last_processed(), None);
    }

    #[test]
    fn open_then_close_resets_fields() {
        let mut state = PositionState::new(24);
        state.open_long(100.0, 97.0, 10, ts(2));
        assert!(state.in_trade());
        assert_eq!(state.entry_price(), Some(100.0));
        assert_eq!(state.trailing_stop(), Some(97.0));
        assert_eq!(state.last_signal(), LastSignal::Buy);

        state.close_long(15, ts(12));
        assert!(!state.in_trade());
        assert_eq!(state.entry_price(), None);
        assert_eq!(state.trailing_stop(), None);
        assert_eq!(state.last_signal(), LastSignal::Sell);
        assert_eq!(state.last_signal().as_i8(), -1);
        assert_eq!(state.last_entry_bar(), 15);
        assert_eq!(state.last_processed(), Some(ts(12)));
    }

    #[test]
    fn raise_stop_only_when_in_trade() {
        let mut state = PositionState::new(0);
        assert!(!state.raise_stop(50.0));
        assert_eq!(state.trailing_stop(), None);

        state.open_long(100.0, 97.0, 1, ts(0));
        assert!(state.raise_stop(99.0));
        assert!(!state.raise_stop(98.0));
        assert_eq!(state.trailing_stop(), Some(99.0));
    }

    #[test]
    fn stop_hit_requires_open_position() {
        let mut state = PositionState::new(0);
        assert!(!state.stop_hit(0.0));
        state.open_long(100.0, 97.0, 1, ts(0));
        assert!(state.stop_hit(97.0));
        assert!(!state.stop_hit(97.5));
    }
}
