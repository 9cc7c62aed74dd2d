use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::decimal::{div8, percent_of, round2, round8};
use crate::common::errors::Result;
use crate::common::traits::Exchange;
use crate::common::types::Side;
use crate::strategy::types::{MarketSnapshot, OrderPlan};

const BUY_PRICE_FACTOR: Decimal = dec!(1.1);
const SELL_PRICE_FACTOR: Decimal = dec!(0.9);

/// One point of a price-dependent allocation curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPoint {
    pub price: Decimal,
    pub percent: Decimal,
}

/// Target allocation percentage, possibly a function of price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetPercent {
    Constant(Decimal),
    /// Points sorted by strictly increasing price; linear in between,
    /// flat beyond either end
    Curve(Vec<TargetPoint>),
}

impl TargetPercent {
    /// Target percentage at `price`, `None` for an empty curve
    pub fn at(&self, price: Decimal) -> Option<Decimal> {
        let points = match self {
            TargetPercent::Constant(percent) => return Some(*percent),
            TargetPercent::Curve(points) => points,
        };
        let first = points.first()?;
        if price <= first.price {
            return Some(first.percent);
        }
        for w in points.windows(2) {
            let (lo, hi) = (&w[0], &w[1]);
            if price <= hi.price {
                let slope = (hi.percent - lo.percent).checked_div(hi.price - lo.price);
                return Some(match slope {
                    Some(slope) => round2(lo.percent + slope * (price - lo.price)),
                    None => hi.percent,
                });
            }
        }
        points.last().map(|p| p.percent)
    }
}

/// Where the portfolio sits relative to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandReading {
    pub target_percent: Decimal,
    pub balance_percent: Decimal,
}

/// Hold a percentage of portfolio value in the base asset ("straddle")
///
/// Trades a fixed counter-asset amount whenever the allocation drifts
/// outside the margins. The pivot margin is a dead zone around the target
/// so the strategy does not flip between buying and selling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentBand {
    pub target: TargetPercent,
    /// Buy only while the allocation is below this percentage
    pub lower_margin: Decimal,
    /// Sell only while the allocation is above this percentage
    pub upper_margin: Decimal,
    pub pivot_margin: Decimal,
    /// Cap on the counter balance considered part of the portfolio; zero disables it
    #[serde(default)]
    pub max_allocation: Decimal,
    /// Fixed per-trade size, in counter units
    pub amount_to_trade: Decimal,
}

impl PercentBand {
    pub fn buy_triggered(&self, reading: BandReading) -> bool {
        reading.balance_percent < self.lower_margin
            && reading.balance_percent + self.pivot_margin < reading.target_percent
    }

    pub fn sell_triggered(&self, reading: BandReading) -> bool {
        reading.balance_percent > self.upper_margin
            && reading.balance_percent - self.pivot_margin > reading.target_percent
    }

    /// Counter balance ceiling implied by `max_allocation`
    pub fn counter_cap(&self, target_percent: Decimal) -> Option<Decimal> {
        if self.max_allocation <= Decimal::ZERO {
            return None;
        }
        let counter_share = div8(Decimal::ONE_HUNDRED - target_percent, Decimal::ONE_HUNDRED)?;
        Some(round8(counter_share * self.max_allocation))
    }

    /// Current allocation against the target, `None` if it cannot be computed
    pub async fn read_band(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<Option<BandReading>> {
        let Some(target_percent) = self.target.at(round8(snapshot.midpoint())) else {
            return Ok(None);
        };
        let mut counter_balance = round8(exchange.balance(&snapshot.pair.counter).await?);
        if let Some(cap) = self.counter_cap(target_percent) {
            counter_balance = counter_balance.min(cap);
        }
        let base_value = exchange.price_in(snapshot.balance, &snapshot.pair).await?;
        Ok(percent_of(base_value, base_value + counter_balance).map(|balance_percent| {
            BandReading {
                target_percent,
                balance_percent,
            }
        }))
    }

    pub async fn is_time_to_buy(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<bool> {
        Ok(self
            .read_band(snapshot, exchange)
            .await?
            .is_some_and(|r| self.buy_triggered(r)))
    }

    pub async fn is_time_to_sell(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<bool> {
        Ok(self
            .read_band(snapshot, exchange)
            .await?
            .is_some_and(|r| self.sell_triggered(r)))
    }

    pub async fn buy_plan(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<Option<OrderPlan>> {
        if !self.is_time_to_buy(snapshot, exchange).await? {
            return Ok(None);
        }
        self.plan(Side::Buy, snapshot, exchange).await.map(Some)
    }

    /// Sells the same fixed amount as buys, independent of how far over
    /// target the allocation is.
    pub async fn sell_plan(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<Option<OrderPlan>> {
        if !self.is_time_to_sell(snapshot, exchange).await? {
            return Ok(None);
        }
        self.plan(Side::Sell, snapshot, exchange).await.map(Some)
    }

    async fn plan(
        &self,
        side: Side,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<OrderPlan> {
        let factor = match side {
            Side::Buy => BUY_PRICE_FACTOR,
            Side::Sell => SELL_PRICE_FACTOR,
        };
        let limit_price = round8(round8(snapshot.midpoint()) * factor);
        let quantity = round8(exchange.amount_in(self.amount_to_trade, &snapshot.pair).await?);
        Ok(OrderPlan {
            side,
            quantity,
            limit_price,
            trail_distance: div8(limit_price, Decimal::ONE_HUNDRED).unwrap_or_default(),
            advances_schedule: false,
        })
    }
}
