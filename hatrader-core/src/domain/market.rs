use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A spot trading pair written as `BASE/QUOTE` (e.g. `PEPE/USDT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum PairError {
    #[error("trading pair '{0}' must look like BASE/QUOTE")]
    Malformed(String),
}

impl TradingPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// Exchange-native symbol without separator (`PEPEUSDT`).
    pub fn concatenated(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = PairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| PairError::Malformed(s.to_string()))?;
        let (base, quote) = (base.trim(), quote.trim());
        if base.is_empty() || quote.is_empty() || quote.contains('/') {
            return Err(PairError::Malformed(s.to_string()));
        }
        Ok(Self::new(base, quote))
    }
}

impl TryFrom<String> for TradingPair {
    type Error = PairError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TradingPair> for String {
    fn from(pair: TradingPair) -> Self {
        pair.to_string()
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Venue metadata for one pair: order limits and lot granularity.
///
/// Absent limits mean the venue did not publish one and the check is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub pair: TradingPair,
    /// Minimum order value in quote currency.
    pub min_cost: Option<f64>,
    /// Minimum order size in base currency.
    pub min_amount: Option<f64>,
    /// Lot step size in base currency.
    pub amount_step: Option<f64>,
}

impl MarketInfo {
    pub fn unrestricted(pair: TradingPair) -> Self {
        Self {
            pair,
            min_cost: None,
            min_amount: None,
            amount_step: None,
        }
    }

    /// Round a base amount down to the lot step (more conservative for both sides).
    pub fn round_amount_down(&self, amount: f64) -> f64 {
        match self.amount_step {
            Some(step) if step > 0.0 => {
                // Small epsilon keeps exact multiples from flooring one lot low.
                let lots = (amount / step + 1e-9).floor();
                lots * step
            }
            _ => amount,
        }
    }

    pub fn meets_min_cost(&self, notional: f64) -> bool {
        self.min_cost.map_or(true, |min| notional >= min)
    }

    pub fn meets_min_amount(&self, amount: f64) -> bool {
        self.min_amount.map_or(true, |min| amount >= min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pair() {
        let pair: TradingPair = "pepe/usdt".parse().unwrap();
        assert_eq!(pair.base, "PEPE");
        assert_eq!(pair.quote, "USDT");
        assert_eq!(pair.concatenated(), "PEPEUSDT");
        assert_eq!(pair.to_string(), "PEPE/USDT");
    }

    #[test]
    fn rejects_malformed_pair() {
        assert!("PEPEUSDT".parse::<TradingPair>().is_err());
        assert!("/USDT".parse::<TradingPair>().is_err());
        assert!("A/B/C".parse::<TradingPair>().is_err());
    }

    #[test]
    fn rounds_down_to_step() {
        let info = MarketInfo {
            amount_step: Some(0.01),
            ..MarketInfo::unrestricted(TradingPair::new("BTC", "USDT"))
        };
        assert!((info.round_amount_down(1.239) - 1.23).abs() < 1e-12);
        assert!((info.round_amount_down(1.23) - 1.23).abs() < 1e-12);
    }

    #[test]
    fn missing_limits_always_pass() {
        let info = MarketInfo::unrestricted(TradingPair::new("BTC", "USDT"));
        assert!(info.meets_min_cost(0.0));
        assert!(info.meets_min_amount(0.0));
        assert_eq!(info.round_amount_down(3.3), 3.3);
    }

    #[test]
    fn limits_are_inclusive() {
        let info = MarketInfo {
            min_cost: Some(1.0),
            min_amount: Some(10.0),
            ..MarketInfo::unrestricted(TradingPair::new("PEPE", "USDT"))
        };
        assert!(info.meets_min_cost(1.0));
        assert!(!info.meets_min_cost(0.5));
        assert!(info.meets_min_amount(10.0));
        assert!(!info.meets_min_amount(9.99));
    }
}
