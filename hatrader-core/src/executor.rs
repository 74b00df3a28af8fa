//! Trade executor: one fetch → enrich → evaluate → order cycle.
//!
//! The executor owns the venue connection and the `PositionState`. Stop
//! maintenance is committed every evaluated cycle; entry/exit transitions are
//! committed only after the venue accepted the order. A failed order, or a
//! skipped buy, leaves the position exactly as it was. An exit with nothing
//! sellable (no balance, or dust below the venue minimum) closes the position
//! without an order.

use crate::config::TraderConfig;
use crate::domain::{is_ordered, MarketInfo, OrderReceipt, OrderSide, TradingPair};
use crate::exchange::{verify_symbol, Exchange, ExchangeError};
use crate::indicators::{EnrichedBar, IndicatorEngine};
use crate::journal::{JournalEntry, TradeJournal};
use crate::position::PositionState;
use crate::scheduler::Cycle;
use crate::signal::{evaluate, EntryConditions, Evaluation, Signal, StrategyParams};
use crate::timeframe::Timeframe;
use std::fmt;
use thiserror::Error;

/// Symbols listed when the configured pair is missing.
const MAX_LISTED_SYMBOLS: usize = 100;

/// Unexpected failure inside a cycle. The scheduler logs it and carries on.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("exchange state error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("cycle panicked: {0}")]
    Panicked(String),
}

/// Why an order was deliberately not sent.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoQuoteBalance { asset: String },
    NoBaseBalance { asset: String },
    BelowMinCost { notional: f64, min_cost: f64 },
    BelowMinAmount { amount: f64, min_amount: f64 },
    ZeroAmount,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoQuoteBalance { asset } => write!(f, "insufficient {asset} balance to buy"),
            SkipReason::NoBaseBalance { asset } => write!(f, "no {asset} balance to sell"),
            SkipReason::BelowMinCost { notional, min_cost } => write!(
                f,
                "order value {notional} is below the minimum cost {min_cost}"
            ),
            SkipReason::BelowMinAmount { amount, min_amount } => write!(
                f,
                "order amount {amount} is below the minimum amount {min_amount}"
            ),
            SkipReason::ZeroAmount => f.write_str("order amount rounds down to zero"),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No usable candles; retry after the backoff.
    FetchFailed { reason: String },
    /// Fewer candles than the indicator windows need.
    InsufficientData { bars: usize, required: usize },
    Held {
        close: f64,
        trailing_stop: Option<f64>,
    },
    Entered {
        receipt: OrderReceipt,
        entry_price: f64,
        initial_stop: f64,
    },
    Exited {
        receipt: OrderReceipt,
        close: f64,
        stop: f64,
    },
    Skipped { side: OrderSide, reason: SkipReason },
    OrderFailed { side: OrderSide, error: String },
}

impl CycleOutcome {
    /// Whether the next cycle should come after the retry backoff instead of
    /// the regular timeframe wait.
    pub fn wants_retry(&self) -> bool {
        matches!(self, CycleOutcome::FetchFailed { .. })
    }
}

/// Read-only view of the latest bar, for one-shot inspection.
#[derive(Debug, Clone)]
pub enum Snapshot {
    NoData,
    Insufficient { bars: usize, required: usize },
    Ready {
        row: Box<EnrichedBar>,
        conditions: EntryConditions,
        evaluation: Evaluation,
    },
}

pub struct TradeExecutor<E: Exchange> {
    exchange: E,
    pair: TradingPair,
    timeframe: Timeframe,
    fetch_limit: usize,
    engine: IndicatorEngine,
    params: StrategyParams,
    state: PositionState,
    journal: Option<TradeJournal>,
}

impl<E: Exchange> TradeExecutor<E> {
    pub fn new(exchange: E, config: &TraderConfig) -> Self {
        Self {
            exchange,
            pair: config.symbol.clone(),
            timeframe: config.timeframe,
            fetch_limit: config.fetch_limit,
            engine: IndicatorEngine::new(config.indicators),
            params: config.strategy,
            state: PositionState::new(config.strategy.min_bar_gap),
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: TradeJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn exchange_mut(&mut self) -> &mut E {
        &mut self.exchange
    }

    /// Load venue metadata and confirm the configured pair is tradable.
    pub fn connect(&mut self) -> Result<MarketInfo, ExchangeError> {
        self.exchange.load_markets()?;
        verify_symbol(&self.exchange, &self.pair, MAX_LISTED_SYMBOLS)
    }

    /// Fetch and evaluate the latest bar without touching the position.
    pub fn snapshot(&self) -> Result<Snapshot, ExchangeError> {
        let bars = self
            .exchange
            .fetch_ohlcv(&self.pair, self.timeframe, self.fetch_limit)?;
        if bars.is_empty() {
            return Ok(Snapshot::NoData);
        }
        if let Some(bad) = bars.iter().find(|b| !b.is_sane()) {
            return Err(ExchangeError::ResponseFormat(format!(
                "malformed candle at {}",
                bad.timestamp
            )));
        }
        if !is_ordered(&bars) {
            return Err(ExchangeError::ResponseFormat(
                "candle timestamps are not strictly increasing".into(),
            ));
        }
        let rows = self.engine.compute(&bars);
        // Only the newest candle may drive a decision.
        let Some(row) = rows.last().filter(|r| r.index + 1 == bars.len()) else {
            return Ok(Snapshot::Insufficient {
                bars: bars.len(),
                required: self.engine.min_bars(),
            });
        };
        let bar = self.timeframe.bar_number(row.bar.timestamp.timestamp_millis());
        Ok(Snapshot::Ready {
            conditions: EntryConditions::check(row, bar, &self.state, &self.params),
            evaluation: evaluate(row, bar, &self.state, &self.params),
            row: Box::new(row.clone()),
        })
    }

    /// Run one full cycle.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        let (row, conditions, evaluation) = match self.snapshot() {
            Ok(Snapshot::Ready {
                row,
                conditions,
                evaluation,
            }) => (row, conditions, evaluation),
            Ok(Snapshot::NoData) => {
                tracing::warn!(symbol = %self.pair, "no candles returned");
                return Ok(CycleOutcome::FetchFailed {
                    reason: "no candles returned".into(),
                });
            }
            Ok(Snapshot::Insufficient { bars, required }) => {
                tracing::info!(symbol = %self.pair, bars, required, "insufficient data, skipping cycle");
                return Ok(CycleOutcome::InsufficientData { bars, required });
            }
            Err(e) => {
                tracing::warn!(symbol = %self.pair, error = %e, "failed to fetch candles");
                return Ok(CycleOutcome::FetchFailed {
                    reason: e.to_string(),
                });
            }
        };

        if evaluation.stop_raised {
            tracing::info!(
                symbol = %self.pair,
                stop = evaluation.state.trailing_stop(),
                close = row.bar.close,
                "trailing stop raised"
            );
        }
        self.state = evaluation.state.clone();

        match evaluation.signal {
            Signal::Hold => {
                if !self.state.in_trade() {
                    tracing::debug!(failed = ?conditions.failed(), "entry conditions not met");
                }
                tracing::info!(
                    symbol = %self.pair,
                    close = row.bar.close,
                    in_trade = self.state.in_trade(),
                    stop = self.state.trailing_stop(),
                    "holding"
                );
                Ok(CycleOutcome::Held {
                    close: row.bar.close,
                    trailing_stop: self.state.trailing_stop(),
                })
            }
            Signal::EnterLong {
                entry_price,
                initial_stop,
            } => {
                tracing::info!(
                    symbol = %self.pair,
                    entry_price,
                    initial_stop,
                    atr = row.atr,
                    "buy signal"
                );
                self.buy(&evaluation, entry_price, initial_stop)
            }
            Signal::ExitLong { close, stop } => {
                tracing::info!(symbol = %self.pair, close, stop, "trailing stop hit, sell signal");
                self.sell(&evaluation, close, stop)
            }
        }
    }

    fn buy(
        &mut self,
        evaluation: &Evaluation,
        entry_price: f64,
        initial_stop: f64,
    ) -> Result<CycleOutcome, CycleError> {
        let side = OrderSide::Buy;
        let quote = self.pair.quote.clone();
        let balance = match self.exchange.fetch_balance() {
            Ok(b) => b.get(&quote).copied().unwrap_or(0.0),
            Err(e) => return Ok(self.order_failed(side, e)),
        };
        if balance <= 0.0 {
            return Ok(self.skipped(side, SkipReason::NoQuoteBalance { asset: quote }));
        }
        let price = match self.exchange.fetch_ticker(&self.pair) {
            Ok(p) if p > 0.0 => p,
            Ok(p) => {
                return Ok(self.order_failed(
                    side,
                    ExchangeError::ResponseFormat(format!("non-positive ticker price {p}")),
                ))
            }
            Err(e) => return Ok(self.order_failed(side, e)),
        };
        let market = self.exchange.market(&self.pair)?;

        let amount = market.round_amount_down(balance / price);
        if amount <= 0.0 {
            return Ok(self.skipped(side, SkipReason::ZeroAmount));
        }
        let notional = amount * price;
        if !market.meets_min_cost(notional) {
            let min_cost = market.min_cost.unwrap_or_default();
            return Ok(self.skipped(side, SkipReason::BelowMinCost { notional, min_cost }));
        }

        match self.exchange.market_buy(&self.pair, amount) {
            Ok(receipt) => {
                self.state = evaluation.commit();
                tracing::info!(
                    symbol = %self.pair,
                    order_id = %receipt.order_id,
                    amount = receipt.amount,
                    entry_price,
                    stop = initial_stop,
                    "buy order executed"
                );
                self.record(&receipt, Some(initial_stop));
                Ok(CycleOutcome::Entered {
                    receipt,
                    entry_price,
                    initial_stop,
                })
            }
            Err(e) => Ok(self.order_failed(side, e)),
        }
    }

    fn sell(
        &mut self,
        evaluation: &Evaluation,
        close: f64,
        stop: f64,
    ) -> Result<CycleOutcome, CycleError> {
        let side = OrderSide::Sell;
        let base = self.pair.base.clone();
        let balance = match self.exchange.fetch_balance() {
            Ok(b) => b.get(&base).copied().unwrap_or(0.0),
            Err(e) => return Ok(self.order_failed(side, e)),
        };
        if balance <= 0.0 {
            return Ok(self.unsellable_exit(evaluation, SkipReason::NoBaseBalance { asset: base }));
        }
        let market = self.exchange.market(&self.pair)?;

        let amount = market.round_amount_down(balance);
        if amount <= 0.0 {
            return Ok(self.unsellable_exit(evaluation, SkipReason::ZeroAmount));
        }
        if !market.meets_min_amount(amount) {
            let min_amount = market.min_amount.unwrap_or_default();
            return Ok(self.unsellable_exit(
                evaluation,
                SkipReason::BelowMinAmount { amount, min_amount },
            ));
        }

        match self.exchange.market_sell(&self.pair, amount) {
            Ok(receipt) => {
                self.state = evaluation.commit();
                tracing::info!(
                    symbol = %self.pair,
                    order_id = %receipt.order_id,
                    amount = receipt.amount,
                    close,
                    stop,
                    "sell order executed"
                );
                self.record(&receipt, None);
                Ok(CycleOutcome::Exited {
                    receipt,
                    close,
                    stop,
                })
            }
            Err(e) => Ok(self.order_failed(side, e)),
        }
    }

    fn skipped(&self, side: OrderSide, reason: SkipReason) -> CycleOutcome {
        tracing::warn!(symbol = %self.pair, %side, %reason, "order skipped");
        CycleOutcome::Skipped { side, reason }
    }

    /// Exit with nothing the venue would accept: leave the dust and go flat.
    fn unsellable_exit(&mut self, evaluation: &Evaluation, reason: SkipReason) -> CycleOutcome {
        self.state = evaluation.commit();
        tracing::warn!(symbol = %self.pair, %reason, "exit order skipped; position closed, dust left in account");
        CycleOutcome::Skipped {
            side: OrderSide::Sell,
            reason,
        }
    }

    fn order_failed(&self, side: OrderSide, error: ExchangeError) -> CycleOutcome {
        tracing::error!(symbol = %self.pair, %side, error = %error, "order failed; position unchanged");
        CycleOutcome::OrderFailed {
            side,
            error: error.to_string(),
        }
    }

    fn record(&self, receipt: &OrderReceipt, trailing_stop: Option<f64>) {
        let Some(journal) = &self.journal else {
            return;
        };
        let entry = JournalEntry::from_receipt(receipt, chrono::Utc::now(), trailing_stop);
        if let Err(e) = journal.append(&entry) {
            tracing::error!(path = %journal.path().display(), error = %e, "failed to write trade journal");
        }
    }
}

impl<E: Exchange + 'static> Cycle for TradeExecutor<E> {
    fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        TradeExecutor::run_cycle(self)
    }
}
