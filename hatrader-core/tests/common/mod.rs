//! Shared fixtures: a scripted exchange that records every order call.

#![allow(dead_code)]

use chrono::TimeZone;
use std::sync::{Arc, Mutex};
use hatrader_core::config::TraderConfig;
use hatrader_core::domain::{Bar, MarketInfo, OrderReceipt, OrderSide, TradingPair};
use hatrader_core::exchange::{Balances, Exchange, ExchangeError};
use hatrader_core::indicators::IndicatorParams;
use hatrader_core::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Buy { amount: f64 },
    Sell { amount: f64 },
}

/// In-memory venue. Successful orders move balances at `price`.
pub struct StubExchange {
    pub bars: Vec<Bar>,
    pub fail_fetch: bool,
    pub price: f64,
    pub balances: Balances,
    pub market: MarketInfo,
    pub fail_orders: bool,
    pub loaded: bool,
    pub calls: Arc<Mutex<Vec<Call>>>,
    next_id: u64,
}

impl StubExchange {
    pub fn new(bars: Vec<Bar>, price: f64, quote_balance: f64) -> Self {
        let pair = pair();
        let mut balances = Balances::new();
        balances.insert(pair.quote.clone(), quote_balance);
        Self {
            bars,
            fail_fetch: false,
            price,
            balances,
            market: MarketInfo::unrestricted(pair),
            fail_orders: false,
            loaded: false,
            calls: Arc::new(Mutex::new(Vec::new())),
            next_id: 1,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_balance(&mut self, asset: &str, amount: f64) {
        self.balances.insert(asset.to_string(), amount);
    }

    fn fill(&mut self, pair: &TradingPair, side: OrderSide, amount: f64) -> OrderReceipt {
        let (base, quote) = (pair.base.clone(), pair.quote.clone());
        match side {
            OrderSide::Buy => {
                *self.balances.entry(quote).or_default() -= amount * self.price;
                *self.balances.entry(base).or_default() += amount;
            }
            OrderSide::Sell => {
                *self.balances.entry(base).or_default() -= amount;
                *self.balances.entry(quote).or_default() += amount * self.price;
            }
        }
        let id = self.next_id;
        self.next_id += 1;
        OrderReceipt {
            order_id: format!("stub-{id}"),
            pair: pair.clone(),
            side,
            amount,
            average_price: Some(self.price),
            status: "FILLED".into(),
        }
    }
}

impl Exchange for StubExchange {
    fn name(&self) -> &str {
        "stub"
    }

    fn load_markets(&mut self) -> Result<(), ExchangeError> {
        self.loaded = true;
        Ok(())
    }

    fn market(&self, pair: &TradingPair) -> Result<MarketInfo, ExchangeError> {
        if *pair == self.market.pair {
            Ok(self.market.clone())
        } else {
            Err(ExchangeError::SymbolNotFound {
                symbol: pair.to_string(),
            })
        }
    }

    fn symbols(&self) -> Vec<TradingPair> {
        vec![self.market.pair.clone()]
    }

    fn fetch_ohlcv(
        &self,
        _pair: &TradingPair,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, ExchangeError> {
        if self.fail_fetch {
            return Err(ExchangeError::Network("connection reset".into()));
        }
        let start = self.bars.len().saturating_sub(limit);
        Ok(self.bars[start..].to_vec())
    }

    fn fetch_ticker(&self, _pair: &TradingPair) -> Result<f64, ExchangeError> {
        Ok(self.price)
    }

    fn fetch_balance(&self) -> Result<Balances, ExchangeError> {
        Ok(self.balances.clone())
    }

    fn market_buy(
        &mut self,
        pair: &TradingPair,
        amount: f64,
    ) -> Result<OrderReceipt, ExchangeError> {
        self.calls.lock().unwrap().push(Call::Buy { amount });
        if self.fail_orders {
            return Err(ExchangeError::Rejected {
                code: -2010,
                message: "Account has insufficient balance for requested action.".into(),
            });
        }
        Ok(self.fill(pair, OrderSide::Buy, amount))
    }

    fn market_sell(
        &mut self,
        pair: &TradingPair,
        amount: f64,
    ) -> Result<OrderReceipt, ExchangeError> {
        self.calls.lock().unwrap().push(Call::Sell { amount });
        if self.fail_orders {
            return Err(ExchangeError::Network("timeout".into()));
        }
        Ok(self.fill(pair, OrderSide::Sell, amount))
    }
}

pub fn pair() -> TradingPair {
    TradingPair::new("PEPE", "USDT")
}

fn bar(i: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    Bar {
        timestamp: base + chrono::Duration::hours(2 * i),
        open,
        high,
        low,
        close,
        volume,
    }
}

/// Small windows so a handful of bars is enough data.
pub fn small_config() -> TraderConfig {
    TraderConfig {
        fetch_limit: 50,
        indicators: IndicatorParams {
            lookback: 2,
            sma_fast_length: 2,
            sma_slow_length: 4,
            atr_period: 2,
            volatility_sma_period: 2,
            volume_sma_period: 3,
        },
        ..TraderConfig::default()
    }
}

/// Seven steady rising bars then a wide, high-volume bullish bar.
///
/// Under [`small_config`] the last bar satisfies every entry condition:
/// close 110, ATR 3, so the initial stop is 110 - 1.5 * 3 = 105.5.
pub fn bullish_window() -> Vec<Bar> {
    let mut bars: Vec<Bar> = (0..7)
        .map(|i| {
            let open = 100.0 + i as f64;
            let close = open + 1.0;
            bar(i, open, close + 0.5, open - 0.5, close, 1_000.0)
        })
        .collect();
    bars.push(bar(7, 107.0, 110.5, 106.5, 110.0, 5_000.0));
    bars
}

/// [`bullish_window`] followed by a collapse to 100, below the initial stop.
pub fn crash_window() -> Vec<Bar> {
    let mut bars = bullish_window();
    bars.push(bar(8, 110.0, 110.5, 99.5, 100.0, 3_000.0));
    bars
}

/// Flat doji bars: no entry can ever fire.
pub fn flat_window(n: usize) -> Vec<Bar> {
    (0..n as i64)
        .map(|i| bar(i, 100.0, 101.0, 99.0, 100.0, 1_000.0))
        .collect()
}
