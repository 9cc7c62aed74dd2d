use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::decimal::{div8, round8};
use crate::common::errors::Result;
use crate::common::traits::Exchange;
use crate::common::types::Side;
use crate::strategy::policy::within_delay;
use crate::strategy::types::{MarketSnapshot, OrderPlan};

/// Buy only once the balance is more than 1% short of the target
const BUY_BAND: Decimal = dec!(1.01);
/// Sell only once the balance is more than 1% over the target
const SELL_BAND: Decimal = dec!(0.99);

/// Hold an absolute balance of the base asset
///
/// Orders are priced to be immediately marketable (buy at twice the
/// reference price, sell at zero); the trailing stop does the real pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedTarget {
    /// Target base-asset balance
    pub target: Decimal,
    /// Largest single trade, in base units
    pub establishing_position: Decimal,
    /// Minimum seconds between two buys (or two sells)
    #[serde(default)]
    pub delay_secs: u64,
}

impl FixedTarget {
    pub fn buy_triggered(
        &self,
        balance: Decimal,
        last_buy: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        !within_delay(last_buy, self.delay_secs, now) && balance * BUY_BAND < self.target
    }

    pub fn sell_triggered(
        &self,
        balance: Decimal,
        last_sell: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        !within_delay(last_sell, self.delay_secs, now) && balance * SELL_BAND > self.target
    }

    pub async fn is_time_to_buy(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<bool> {
        let last_buy = exchange.last_buy_date(&snapshot.pair).await?;
        Ok(self.buy_triggered(snapshot.balance, last_buy, snapshot.now))
    }

    pub async fn is_time_to_sell(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<bool> {
        let last_sell = exchange.last_sell_date(&snapshot.pair).await?;
        Ok(self.sell_triggered(snapshot.balance, last_sell, snapshot.now))
    }

    /// Smaller of the establishing position and the remaining gap
    pub fn buy_quantity(&self, balance: Decimal) -> Decimal {
        round8(self.establishing_position.min(self.target - balance))
    }

    pub fn sell_quantity(&self, balance: Decimal) -> Decimal {
        round8(self.establishing_position.min(balance - self.target))
    }

    /// Whether a post-fill balance has landed inside the 1% band
    pub fn target_reached(&self, side: Side, balance: Decimal) -> bool {
        match side {
            Side::Buy => balance * BUY_BAND >= self.target,
            Side::Sell => balance * SELL_BAND <= self.target,
        }
    }

    pub async fn buy_plan(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<Option<OrderPlan>> {
        if !self.is_time_to_buy(snapshot, exchange).await? {
            return Ok(None);
        }
        let limit_price = round8(exchange.average_price(&snapshot.pair).await? * Decimal::TWO);
        Ok(Some(OrderPlan {
            side: Side::Buy,
            quantity: self.buy_quantity(snapshot.balance),
            limit_price,
            trail_distance: div8(limit_price, Decimal::ONE_HUNDRED).unwrap_or_default(),
            advances_schedule: false,
        }))
    }

    pub async fn sell_plan(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<Option<OrderPlan>> {
        if !self.is_time_to_sell(snapshot, exchange).await? {
            return Ok(None);
        }
        // Zero limit: the trail distance has to come from the market instead
        let reference = exchange.average_price(&snapshot.pair).await?;
        Ok(Some(OrderPlan {
            side: Side::Sell,
            quantity: self.sell_quantity(snapshot.balance),
            limit_price: Decimal::ZERO,
            trail_distance: div8(reference, Decimal::ONE_HUNDRED).unwrap_or_default(),
            advances_schedule: false,
        }))
    }
}
