//! Rebalancer Library
//!
//! Per-pair allocation strategies that keep a portfolio at a fixed
//! balance, a percentage band, or along a tiered accumulation schedule,
//! trading through trailing-stop orders on an exchange facade.

pub mod common;
pub mod config;
pub mod paper;
pub mod strategy;

// Re-export commonly used types
pub use common::errors::{EngineError, Result};
pub use common::reporting::{ChannelReporter, MemoryReporter, TracingReporter};
pub use common::traits::{Exchange, Reporter, TrailingStopOrder};
pub use common::types::{CurrencyPair, LimitOrder, PriceLevel, Side};
pub use config::types::AppConfig;
pub use paper::PaperExchange;

// Strategy types
pub use strategy::{
    AllocationPolicy, AllocationStrategy, BoxedStrategy, CycleOutcome, FillSummary, Scheduler,
    SharedStrategy, Strategy,
};
