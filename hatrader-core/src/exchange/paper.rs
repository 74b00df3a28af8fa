//! Paper trading: live market data, simulated fills.
//!
//! Market data and metadata come from the wrapped venue. Orders fill
//! immediately at the wrapped venue's ticker price against an in-memory
//! balance sheet. An optional proportional fee is taken from the asset
//! received, as spot venues do.

use super::{Balances, Exchange, ExchangeError};
use crate::domain::{Bar, MarketInfo, OrderReceipt, OrderSide, TradingPair};
use crate::timeframe::Timeframe;

pub struct PaperExchange<E: Exchange> {
    inner: E,
    balances: Balances,
    fee_rate: f64,
    next_order_id: u64,
}

impl<E: Exchange> PaperExchange<E> {
    /// Wrap `inner`, starting from `balances`. `fee_rate` is a fraction (0.001 = 0.1%).
    pub fn new(inner: E, balances: Balances, fee_rate: f64) -> Self {
        Self {
            inner,
            balances,
            fee_rate: fee_rate.max(0.0),
            next_order_id: 1,
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn available(&self, asset: &str) -> f64 {
        self.balances.get(asset).copied().unwrap_or(0.0)
    }

    fn credit(&mut self, asset: &str, delta: f64) {
        *self.balances.entry(asset.to_string()).or_insert(0.0) += delta;
    }

    fn receipt(&mut self, pair: &TradingPair, side: OrderSide, amount: f64, price: f64) -> OrderReceipt {
        let order_id = format!("paper-{}", self.next_order_id);
        self.next_order_id += 1;
        tracing::info!(%order_id, %pair, %side, amount, price, "paper order filled");
        OrderReceipt {
            order_id,
            pair: pair.clone(),
            side,
            amount,
            average_price: Some(price),
            status: "FILLED".into(),
        }
    }

    fn validate_amount(amount: f64) -> Result<(), ExchangeError> {
        if amount.is_finite() && amount > 0.0 {
            Ok(())
        } else {
            Err(ExchangeError::Rejected {
                code: -1013,
                message: format!("invalid quantity {amount}"),
            })
        }
    }
}

impl<E: Exchange> Exchange for PaperExchange<E> {
    fn name(&self) -> &str {
        "paper"
    }

    fn load_markets(&mut self) -> Result<(), ExchangeError> {
        self.inner.load_markets()
    }

    fn market(&self, pair: &TradingPair) -> Result<MarketInfo, ExchangeError> {
        self.inner.market(pair)
    }

    fn symbols(&self) -> Vec<TradingPair> {
        self.inner.symbols()
    }

    fn fetch_ohlcv(
        &self,
        pair: &TradingPair,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, ExchangeError> {
        self.inner.fetch_ohlcv(pair, timeframe, limit)
    }

    fn fetch_ticker(&self, pair: &TradingPair) -> Result<f64, ExchangeError> {
        self.inner.fetch_ticker(pair)
    }

    fn fetch_balance(&self) -> Result<Balances, ExchangeError> {
        Ok(self.balances.clone())
    }

    fn market_buy(
        &mut self,
        pair: &TradingPair,
        amount: f64,
    ) -> Result<OrderReceipt, ExchangeError> {
        Self::validate_amount(amount)?;
        let price = self.inner.fetch_ticker(pair)?;
        let cost = amount * price;
        let available = self.available(&pair.quote);
        // Small tolerance: callers size buys as balance / price.
        if cost > available * (1.0 + 1e-9) {
            return Err(ExchangeError::InsufficientBalance {
                asset: pair.quote.clone(),
                available,
                required: cost,
            });
        }
        self.credit(&pair.quote, -cost.min(available));
        self.credit(&pair.base, amount * (1.0 - self.fee_rate));
        Ok(self.receipt(pair, OrderSide::Buy, amount, price))
    }

    fn market_sell(
        &mut self,
        pair: &TradingPair,
        amount: f64,
    ) -> Result<OrderReceipt, ExchangeError> {
        Self::validate_amount(amount)?;
        let available = self.available(&pair.base);
        if amount > available {
            return Err(ExchangeError::InsufficientBalance {
                asset: pair.base.clone(),
                available,
                required: amount,
            });
        }
        let price = self.inner.fetch_ticker(pair)?;
        self.credit(&pair.base, -amount);
        self.credit(&pair.quote, amount * price * (1.0 - self.fee_rate));
        Ok(self.receipt(pair, OrderSide::Sell, amount, price))
    }
}
