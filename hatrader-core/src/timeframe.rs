//! Candle timeframe (`"15m"`, `"2h"`, `"1d"`, `"1w"`).
//!
//! The amount prefix is optional and defaults to 1 (`"h"` == `"1h"`).
//! The timeframe drives both the kline interval requested from the venue and
//! the scheduler's sleep between cycles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeframeUnit {
    Minute,
    Hour,
    Day,
    Week,
}

impl TimeframeUnit {
    pub const fn seconds(&self) -> u64 {
        match self {
            TimeframeUnit::Minute => 60,
            TimeframeUnit::Hour => 3_600,
            TimeframeUnit::Day => 86_400,
            TimeframeUnit::Week => 604_800,
        }
    }

    const fn suffix(&self) -> char {
        match self {
            TimeframeUnit::Minute => 'm',
            TimeframeUnit::Hour => 'h',
            TimeframeUnit::Day => 'd',
            TimeframeUnit::Week => 'w',
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TimeframeError {
    #[error("empty timeframe")]
    Empty,
    #[error("unknown timeframe unit in '{0}' (expected m, h, d or w)")]
    UnknownUnit(String),
    #[error("invalid timeframe amount in '{0}'")]
    InvalidAmount(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    pub amount: NonZeroU32,
    pub unit: TimeframeUnit,
}

impl Timeframe {
    pub const fn new(amount: NonZeroU32, unit: TimeframeUnit) -> Self {
        Self { amount, unit }
    }

    /// `n` hours; zero is treated as one.
    pub fn hours(n: u32) -> Self {
        Self::new(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN), TimeframeUnit::Hour)
    }

    pub fn seconds(&self) -> u64 {
        u64::from(self.amount.get()) * self.unit.seconds()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.seconds())
    }

    /// Absolute bar number of a timestamp: milliseconds since epoch divided by
    /// the interval. Monotonic across fetch windows, unlike positional indices.
    pub fn bar_number(&self, timestamp_ms: i64) -> i64 {
        timestamp_ms.div_euclid(self.seconds() as i64 * 1_000)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount.get(), self.unit.suffix())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TimeframeError::Empty);
        }
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TimeframeError::UnknownUnit(s.to_string()))?;
        let (digits, unit) = s.split_at(split);

        let unit = match unit {
            "m" => TimeframeUnit::Minute,
            "h" => TimeframeUnit::Hour,
            "d" => TimeframeUnit::Day,
            "w" => TimeframeUnit::Week,
            _ => return Err(TimeframeError::UnknownUnit(s.to_string())),
        };

        let amount = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|_| TimeframeError::InvalidAmount(s.to_string()))?
        };
        let amount =
            NonZeroU32::new(amount).ok_or_else(|| TimeframeError::InvalidAmount(s.to_string()))?;

        Ok(Self::new(amount, unit))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}
