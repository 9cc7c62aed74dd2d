//! Common types, traits, and utilities shared across the engine

pub mod channels;
pub mod decimal;
pub mod errors;
pub mod reporting;
pub mod traits;
pub mod types;

pub use errors::{EngineError, Result};
pub use traits::{Exchange, Reporter, TrailingStopOrder};
pub use types::{CurrencyPair, LimitOrder, PriceLevel, Side};
