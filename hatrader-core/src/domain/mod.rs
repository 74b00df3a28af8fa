//! Domain types for the trader

pub mod bar;
pub mod market;
pub mod order;

pub use bar::{is_ordered, Bar};
pub use market::{MarketInfo, PairError, TradingPair};
pub use order::{OrderReceipt, OrderSide};
