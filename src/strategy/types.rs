use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::decimal::percent_of;
use crate::common::types::{CurrencyPair, LimitOrder, Side};

/// Market and account state captured at the start of a decision cycle
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub pair: CurrencyPair,
    /// Base-asset balance
    pub balance: Decimal,
    /// Average cost basis; zero when none is recorded
    pub average_cost: Decimal,
    /// Lowest ask price
    pub best_ask: Decimal,
    /// Highest bid price, if anyone is bidding
    pub best_bid: Option<Decimal>,
    pub now: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Midpoint of the touch, or the ask alone on a one-sided book
    pub fn midpoint(&self) -> Decimal {
        match self.best_bid {
            Some(bid) => (self.best_ask + bid) / Decimal::TWO,
            None => self.best_ask,
        }
    }
}

/// Whether a tier schedule is read as absolute amounts or as multipliers
/// of the current balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderMode {
    #[default]
    Amount,
    Multiplier,
}

/// A sized trade a policy wants executed
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub side: Side,
    /// Base-asset quantity, already at 8 fractional digits
    pub quantity: Decimal,
    /// Nominal limit price used to seed the trailing stop
    pub limit_price: Decimal,
    /// Distance the stop trails the market by
    pub trail_distance: Decimal,
    /// Set when a fill of this plan should advance the policy's tier cursor
    pub advances_schedule: bool,
}

impl OrderPlan {
    pub fn to_limit_order(&self, pair: &CurrencyPair) -> LimitOrder {
        match self.side {
            Side::Buy => LimitOrder::bid(pair.clone(), self.quantity, self.limit_price),
            Side::Sell => LimitOrder::ask(pair.clone(), self.quantity, self.limit_price),
        }
    }
}

/// Share of portfolio value held in the base and counter assets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationSplit {
    pub base_percent: Decimal,
    pub counter_percent: Decimal,
}

impl AllocationSplit {
    /// Split from values expressed in counter units
    ///
    /// Returns `None` when the portfolio is empty. The two sides always
    /// sum to exactly 100.
    pub fn from_values(base_value: Decimal, counter_value: Decimal) -> Option<Self> {
        let base_percent = percent_of(base_value, base_value + counter_value)?;
        Some(Self {
            base_percent,
            counter_percent: Decimal::ONE_HUNDRED - base_percent,
        })
    }
}

impl std::fmt::Display for AllocationSplit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}%/{:.2}%", self.base_percent, self.counter_percent)
    }
}

/// What a filled cycle did
#[derive(Debug, Clone, PartialEq)]
pub struct FillSummary {
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub base_balance: Decimal,
    pub counter_balance: Decimal,
    pub allocation: Option<AllocationSplit>,
}

/// Result of one `find_opportunities` invocation
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Another invocation is still in flight on this instance
    Busy,
    /// The post-trade throttle window has not elapsed
    CoolingDown,
    /// `cancel()` has been called
    Stopped,
    /// No asks quoted; no decision possible
    NoQuotes,
    /// Neither side is eligible
    Idle,
    /// The exchange refused the order
    OpenFailed,
    /// The order was cancelled before it filled
    Cancelled,
    Filled(FillSummary),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(best_bid: Option<Decimal>) -> MarketSnapshot {
        MarketSnapshot {
            pair: CurrencyPair::new("BTC", "USD"),
            balance: dec!(1),
            average_cost: dec!(100),
            best_ask: dec!(102),
            best_bid,
            now: Utc::now(),
        }
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(snapshot(Some(dec!(98))).midpoint(), dec!(100));
        assert_eq!(snapshot(None).midpoint(), dec!(102));
    }

    #[test]
    fn test_allocation_split_sums_to_hundred() {
        let split = AllocationSplit::from_values(dec!(1), dec!(2)).unwrap();
        assert_eq!(split.base_percent, dec!(33.33));
        assert_eq!(split.counter_percent, dec!(66.67));
        assert_eq!(split.base_percent + split.counter_percent, dec!(100));
        assert_eq!(split.to_string(), "33.33%/66.67%");
    }

    #[test]
    fn test_allocation_split_empty_portfolio() {
        assert!(AllocationSplit::from_values(Decimal::ZERO, Decimal::ZERO).is_none());
    }

    #[test]
    fn test_plan_to_limit_order() {
        let plan = OrderPlan {
            side: Side::Sell,
            quantity: dec!(0.5),
            limit_price: dec!(90),
            trail_distance: dec!(0.9),
            advances_schedule: false,
        };
        let order = plan.to_limit_order(&CurrencyPair::new("BTC", "USD"));
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.quantity, dec!(0.5));
    }
}
