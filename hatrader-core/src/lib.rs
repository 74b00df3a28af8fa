//! HA-Trend Trader core: indicators, signal evaluation, position state,
//! exchange access and cycle scheduling for a single-asset long-only bot.
//!
//! - Domain types (bars, trading pairs, market limits, order receipts)
//! - Heikin-Ashi indicator engine with parallel rolling windows
//! - Pure signal evaluator over the latest enriched bar
//! - Position state machine with a ratcheting trailing stop
//! - Exchange trait with Binance spot and paper-trading implementations
//! - Trade executor and cancellable cycle scheduler

pub mod config;
pub mod domain;
pub mod exchange;
pub mod executor;
pub mod indicators;
pub mod journal;
pub mod position;
pub mod scheduler;
pub mod signal;
pub mod timeframe;

pub use config::{ConfigError, TraderConfig};
pub use executor::{CycleError, CycleOutcome, TradeExecutor};
pub use scheduler::{Scheduler, SchedulerState};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything crossing the worker thread boundary is Send,
    /// and shared read-only values are Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::MarketInfo>();
        require_sync::<domain::MarketInfo>();
        require_send::<domain::OrderReceipt>();
        require_sync::<domain::OrderReceipt>();

        require_send::<indicators::EnrichedBar>();
        require_sync::<indicators::EnrichedBar>();
        require_send::<indicators::IndicatorEngine>();
        require_sync::<indicators::IndicatorEngine>();

        require_send::<position::PositionState>();
        require_sync::<position::PositionState>();
        require_send::<signal::Evaluation>();
        require_sync::<signal::Evaluation>();

        require_send::<TraderConfig>();
        require_sync::<TraderConfig>();
        require_send::<CycleOutcome>();
        require_send::<scheduler::WorkerEvent>();
        require_sync::<exchange::CircuitBreaker>();

        require_send::<TradeExecutor<exchange::BinanceClient>>();
        require_send::<TradeExecutor<exchange::PaperExchange<exchange::BinanceClient>>>();
    }

    /// The evaluator takes the position by shared reference and never sees
    /// the exchange: deciding and acting stay separate.
    #[test]
    fn evaluator_has_no_exchange_parameter() {
        fn _check(
            row: &indicators::EnrichedBar,
            state: &position::PositionState,
            params: &signal::StrategyParams,
        ) -> signal::Evaluation {
            signal::evaluate(row, 0, state, params)
        }
    }
}
