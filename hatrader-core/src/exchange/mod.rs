//! Exchange trait and structured error types.
//!
//! The `Exchange` trait abstracts over the venue (Binance spot, paper trading,
//! test stubs) so the executor never depends on a concrete connector.
//! All calls are blocking from the caller's point of view.

pub mod binance;
pub mod circuit_breaker;
pub mod paper;

pub use binance::{BinanceClient, BinanceConfig, Credentials};
pub use circuit_breaker::CircuitBreaker;
pub use paper::PaperExchange;

use crate::domain::{Bar, MarketInfo, OrderReceipt, TradingPair};
use crate::timeframe::Timeframe;
use std::collections::HashMap;
use thiserror::Error;

/// Structured error types for venue operations.
///
/// Network-kind errors mean the request may never have reached the venue;
/// exchange-kind errors mean the venue answered with a refusal. The executor
/// treats both as "this attempt did not happen".
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("rate limited by exchange (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("hard stop: exchange has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("markets not loaded; call load_markets first")]
    MarketsNotLoaded,

    #[error("exchange rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("insufficient {asset} balance: have {available}, need {required}")]
    InsufficientBalance {
        asset: String,
        available: f64,
        required: f64,
    },

    #[error("response format changed: {0}")]
    ResponseFormat(String),
}

impl ExchangeError {
    /// Transport-level failure, as opposed to a venue refusal.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ExchangeError::Network(_)
                | ExchangeError::RateLimited { .. }
                | ExchangeError::CircuitBreakerTripped
        )
    }
}

/// Total (free + locked) balance per asset symbol.
pub type Balances = HashMap<String, f64>;

/// Venue capability the trading core depends on.
pub trait Exchange: Send {
    /// Human-readable name of this venue.
    fn name(&self) -> &str;

    /// Load symbol metadata. Must succeed before [`market`](Self::market).
    fn load_markets(&mut self) -> Result<(), ExchangeError>;

    /// Metadata for a loaded pair.
    fn market(&self, pair: &TradingPair) -> Result<MarketInfo, ExchangeError>;

    /// Every loaded pair, in venue order.
    fn symbols(&self) -> Vec<TradingPair>;

    /// Most recent `limit` candles, oldest first.
    fn fetch_ohlcv(
        &self,
        pair: &TradingPair,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, ExchangeError>;

    /// Last traded price.
    fn fetch_ticker(&self, pair: &TradingPair) -> Result<f64, ExchangeError>;

    fn fetch_balance(&self) -> Result<Balances, ExchangeError>;

    /// Market buy of `amount` base units.
    fn market_buy(&mut self, pair: &TradingPair, amount: f64)
        -> Result<OrderReceipt, ExchangeError>;

    /// Market sell of `amount` base units.
    fn market_sell(
        &mut self,
        pair: &TradingPair,
        amount: f64,
    ) -> Result<OrderReceipt, ExchangeError>;
}

/// Fail unless `pair` is listed, naming up to `max_listed` alternatives.
pub fn verify_symbol(
    exchange: &dyn Exchange,
    pair: &TradingPair,
    max_listed: usize,
) -> Result<MarketInfo, ExchangeError> {
    match exchange.market(pair) {
        Ok(info) => {
            tracing::info!(symbol = %pair, exchange = exchange.name(), "symbol is available");
            Ok(info)
        }
        Err(ExchangeError::SymbolNotFound { symbol }) => {
            let available: Vec<String> = exchange
                .symbols()
                .iter()
                .take(max_listed)
                .map(|p| p.to_string())
                .collect();
            tracing::error!(
                symbol = %symbol,
                "symbol is NOT available; available symbols include: {}",
                available.join(", ")
            );
            Err(ExchangeError::SymbolNotFound { symbol })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_classification() {
        assert!(ExchangeError::Network("timeout".into()).is_network());
        assert!(ExchangeError::CircuitBreakerTripped.is_network());
        assert!(!ExchangeError::Rejected {
            code: -2010,
            message: "insufficient balance".into()
        }
        .is_network());
    }

    #[test]
    fn errors_render() {
        let e = ExchangeError::SymbolNotFound {
            symbol: "FOO/BAR".into(),
        };
        assert_eq!(e.to_string(), "symbol not found: FOO/BAR");
    }
}
