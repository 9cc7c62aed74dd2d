//! Capability traits for the collaborators the engine depends on
//!
//! The engine never talks to an exchange or a notification channel
//! directly; it only sees these narrow interfaces.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use super::errors::Result;
use super::types::{CurrencyPair, LimitOrder, PriceLevel};

/// Market and account facade for one exchange account
///
/// Read operations are assumed idempotent and externally synchronized.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Display name used to prefix report lines
    fn name(&self) -> String;

    /// Available balance of a single asset
    async fn balance(&self, asset: &str) -> Result<Decimal>;

    /// Average cost basis of current holdings
    ///
    /// Fails with `EngineError::NoCostBasis` when nothing has been recorded.
    async fn average_cost(&self, pair: &CurrencyPair) -> Result<Decimal>;

    /// Asks ordered best (lowest) first
    async fn lowest_asks(&self, pair: &CurrencyPair) -> Result<Vec<PriceLevel>>;

    /// Bids ordered best (highest) first
    async fn highest_bids(&self, pair: &CurrencyPair) -> Result<Vec<PriceLevel>>;

    /// Convert a counter-asset quantity into base-asset units
    async fn amount_in(&self, counter_quantity: Decimal, pair: &CurrencyPair) -> Result<Decimal>;

    /// Value a base-asset quantity in counter-asset units
    async fn price_in(&self, base_quantity: Decimal, pair: &CurrencyPair) -> Result<Decimal>;

    /// Current reference price of the pair
    async fn average_price(&self, pair: &CurrencyPair) -> Result<Decimal>;

    async fn last_buy_date(&self, pair: &CurrencyPair) -> Result<Option<DateTime<Utc>>>;

    async fn last_sell_date(&self, pair: &CurrencyPair) -> Result<Option<DateTime<Utc>>>;

    /// Wrap a limit order in a trailing-stop controller trailing by `trail_distance`
    ///
    /// The order is not submitted until `TrailingStopOrder::open` is called.
    async fn create_trailing_stop(
        &self,
        order: LimitOrder,
        trail_distance: Decimal,
    ) -> Result<Arc<dyn TrailingStopOrder>>;
}

/// A live trailing-stop order on the exchange
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrailingStopOrder: Send + Sync {
    /// The order as currently known; after a fill this carries the
    /// executed quantity and price.
    fn order(&self) -> LimitOrder;

    /// Submit the order. Fails with `EngineError::ExchangeRejected`.
    async fn open(&self) -> Result<()>;

    /// Wait until the order is either fully filled (`true`) or cancelled (`false`)
    async fn fill_or_cancel(&self) -> Result<bool>;

    /// Request cancellation. Fails with `EngineError::OrderIo`.
    async fn cancel(&self) -> Result<()>;
}

/// Fire-and-forget sink for human-readable event lines
///
/// Implementations must not block indefinitely and must not fail the caller.
pub trait Reporter: Send + Sync {
    fn report(&self, message: &str);
}
