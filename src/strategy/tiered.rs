use std::sync::atomic::{AtomicUsize, Ordering};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::decimal::{div8, round8};
use crate::common::errors::Result;
use crate::common::traits::Exchange;
use crate::common::types::Side;
use crate::strategy::policy::within_delay;
use crate::strategy::types::{MarketSnapshot, OrderMode, OrderPlan};

/// Holdings below this share of the establishing position are re-established
/// without waiting for a discount
const REESTABLISH_THRESHOLD: Decimal = dec!(0.9);
/// Headroom bought on top of an establishing shortfall
const SHORTFALL_HEADROOM: Decimal = dec!(1.025);
const BUY_PRICE_FACTOR: Decimal = dec!(1.1);
const SELL_PRICE_FACTOR: Decimal = dec!(0.9);

/// Configuration of a tiered ("pivot") schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieredParams {
    /// Minimum position, in counter units
    pub establishing_position: Decimal,
    #[serde(default)]
    pub buy_mode: OrderMode,
    #[serde(default)]
    pub sell_mode: OrderMode,
    /// Buy sizes in counter units, read in `Amount` mode
    #[serde(default)]
    pub allocation_amounts: Vec<Decimal>,
    /// Buy sizes as a multiple of the balance, read in `Multiplier` mode
    #[serde(default)]
    pub allocation_multipliers: Vec<Decimal>,
    /// Percent below average cost the ask must be before buying
    pub allocation_margins: Vec<Decimal>,
    #[serde(default)]
    pub distribution_amounts: Vec<Decimal>,
    #[serde(default)]
    pub distribution_multipliers: Vec<Decimal>,
    /// Percent above average cost the bid must be before selling
    pub distribution_margins: Vec<Decimal>,
    #[serde(default)]
    pub time_between_buys_secs: u64,
    #[serde(default)]
    pub time_between_sells_secs: u64,
}

/// Tiered accumulation and distribution around the average cost
///
/// Each side keeps a cursor into its schedules. The cursor only moves
/// through [`perform_buy_action`](Self::perform_buy_action) and
/// [`perform_sell_action`](Self::perform_sell_action); once past the end
/// the last tier keeps applying.
#[derive(Debug)]
pub struct TieredSchedule {
    pub params: TieredParams,
    buy_cursor: AtomicUsize,
    sell_cursor: AtomicUsize,
}

fn tier(schedule: &[Decimal], cursor: usize) -> Option<Decimal> {
    schedule.get(cursor.min(schedule.len().checked_sub(1)?)).copied()
}

impl TieredSchedule {
    pub fn new(params: TieredParams) -> Self {
        Self {
            params,
            buy_cursor: AtomicUsize::new(0),
            sell_cursor: AtomicUsize::new(0),
        }
    }

    pub fn buy_tier(&self) -> usize {
        self.buy_cursor.load(Ordering::SeqCst)
    }

    pub fn sell_tier(&self) -> usize {
        self.sell_cursor.load(Ordering::SeqCst)
    }

    pub fn perform_buy_action(&self) {
        let tier = self.buy_cursor.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(tier, "Advanced buy schedule");
    }

    pub fn perform_sell_action(&self) {
        let tier = self.sell_cursor.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(tier, "Advanced sell schedule");
    }

    pub fn buy_margin(&self) -> Option<Decimal> {
        tier(&self.params.allocation_margins, self.buy_tier())
    }

    pub fn sell_margin(&self) -> Option<Decimal> {
        tier(&self.params.distribution_margins, self.sell_tier())
    }

    /// Counter-unit holding value so small the position must be rebuilt
    pub fn needs_reestablishing(&self, holding_value: Decimal) -> bool {
        holding_value < self.params.establishing_position * REESTABLISH_THRESHOLD
    }

    /// Ask is at least the current margin tier below average cost
    pub fn discount_triggered(&self, best_ask: Decimal, average_cost: Decimal) -> bool {
        let Some(margin) = self.buy_margin().and_then(|m| div8(m, Decimal::ONE_HUNDRED)) else {
            return false;
        };
        best_ask < average_cost * (Decimal::ONE - margin)
    }

    /// Bid is at least the current margin tier above average cost
    pub fn premium_triggered(&self, best_bid: Decimal, average_cost: Decimal) -> bool {
        let Some(margin) = self.sell_margin().and_then(|m| div8(m, Decimal::ONE_HUNDRED)) else {
            return false;
        };
        best_bid > average_cost * (Decimal::ONE + margin)
    }

    pub async fn is_time_to_buy(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<bool> {
        let last_buy = exchange.last_buy_date(&snapshot.pair).await?;
        if within_delay(last_buy, self.params.time_between_buys_secs, snapshot.now) {
            return Ok(false);
        }
        let holding_value = exchange.price_in(snapshot.balance, &snapshot.pair).await?;
        if self.needs_reestablishing(holding_value) {
            return Ok(true);
        }
        Ok(self.discount_triggered(snapshot.best_ask, snapshot.average_cost))
    }

    pub async fn is_time_to_sell(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<bool> {
        let last_sell = exchange.last_sell_date(&snapshot.pair).await?;
        if within_delay(last_sell, self.params.time_between_sells_secs, snapshot.now) {
            return Ok(false);
        }
        Ok(snapshot
            .best_bid
            .is_some_and(|bid| self.premium_triggered(bid, snapshot.average_cost)))
    }

    /// Buy size and whether it came from the tier schedule
    ///
    /// Cases are tried in order: rebuild a base balance below the
    /// establishing position (with headroom), top up holdings worth less
    /// than the establishing position, otherwise buy the current tier.
    pub async fn buy_size(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<(Decimal, bool)> {
        let pair = &snapshot.pair;
        let establishing = exchange
            .amount_in(self.params.establishing_position, pair)
            .await?;
        if snapshot.balance < establishing {
            let shortfall = establishing - snapshot.balance;
            return Ok((round8(shortfall * SHORTFALL_HEADROOM), false));
        }
        let holding_value = exchange.price_in(snapshot.balance, pair).await?;
        if holding_value < self.params.establishing_position {
            return Ok((round8(establishing), false));
        }
        let quantity = match self.params.buy_mode {
            OrderMode::Amount => {
                let amount = tier(&self.params.allocation_amounts, self.buy_tier())
                    .unwrap_or_default();
                exchange.amount_in(amount, pair).await?
            }
            OrderMode::Multiplier => {
                let multiplier = tier(&self.params.allocation_multipliers, self.buy_tier())
                    .unwrap_or_default();
                snapshot.balance * multiplier
            }
        };
        Ok((round8(quantity), true))
    }

    /// Current distribution tier, never more than the balance
    pub async fn sell_size(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<Decimal> {
        let quantity = match self.params.sell_mode {
            OrderMode::Amount => {
                let amount = tier(&self.params.distribution_amounts, self.sell_tier())
                    .unwrap_or_default();
                exchange.amount_in(amount, &snapshot.pair).await?
            }
            OrderMode::Multiplier => {
                let multiplier = tier(&self.params.distribution_multipliers, self.sell_tier())
                    .unwrap_or_default();
                snapshot.balance * multiplier
            }
        };
        Ok(round8(quantity.min(snapshot.balance)))
    }

    pub async fn buy_plan(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<Option<OrderPlan>> {
        if !self.is_time_to_buy(snapshot, exchange).await? {
            return Ok(None);
        }
        let (quantity, from_schedule) = self.buy_size(snapshot, exchange).await?;
        let limit_price = round8(snapshot.best_ask * BUY_PRICE_FACTOR);
        Ok(Some(OrderPlan {
            side: Side::Buy,
            quantity,
            limit_price,
            trail_distance: div8(limit_price, Decimal::ONE_HUNDRED).unwrap_or_default(),
            advances_schedule: from_schedule,
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
        let quantity = self.sell_size(snapshot, exchange).await?;
        let limit_price = round8(snapshot.average_cost * SELL_PRICE_FACTOR);
        Ok(Some(OrderPlan {
            side: Side::Sell,
            quantity,
            limit_price,
            trail_distance: div8(limit_price, Decimal::ONE_HUNDRED).unwrap_or_default(),
            advances_schedule: true,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::MockExchange;
    use crate::common::types::CurrencyPair;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    fn params() -> TieredParams {
        TieredParams {
            establishing_position: dec!(10),
            buy_mode: OrderMode::Amount,
            sell_mode: OrderMode::Amount,
            allocation_amounts: vec![dec!(5), dec!(8)],
            allocation_multipliers: vec![dec!(0.5)],
            allocation_margins: vec![dec!(2), dec!(4)],
            distribution_amounts: vec![dec!(6)],
            distribution_multipliers: vec![dec!(0.25)],
            distribution_margins: vec![dec!(3)],
            time_between_buys_secs: 600,
            time_between_sells_secs: 600,
        }
    }

    fn snapshot(balance: Decimal, average_cost: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            pair: CurrencyPair::new("LTC", "USD"),
            balance,
            average_cost,
            best_ask: dec!(1.01),
            best_bid: Some(dec!(0.99)),
            now: Utc::now(),
        }
    }

    /// One base unit is worth one counter unit
    fn par_exchange() -> MockExchange {
        let mut exchange = MockExchange::new();
        exchange.expect_last_buy_date().returning(|_| Ok(None));
        exchange.expect_last_sell_date().returning(|_| Ok(None));
        exchange.expect_price_in().returning(|qty, _| Ok(qty));
        exchange.expect_amount_in().returning(|amount, _| Ok(amount));
        exchange
    }

    #[test]
    fn test_tier_repeats_last_entry() {
        assert_eq!(tier(&[dec!(1), dec!(2)], 0), Some(dec!(1)));
        assert_eq!(tier(&[dec!(1), dec!(2)], 7), Some(dec!(2)));
        assert_eq!(tier(&[], 0), None);
    }

    #[test]
    fn test_cursor_moves_only_on_perform() {
        let schedule = TieredSchedule::new(params());
        assert_eq!(schedule.buy_margin(), Some(dec!(2)));
        schedule.perform_buy_action();
        assert_eq!(schedule.buy_tier(), 1);
        assert_eq!(schedule.buy_margin(), Some(dec!(4)));
        assert_eq!(schedule.sell_tier(), 0);
        schedule.perform_sell_action();
        schedule.perform_sell_action();
        assert_eq!(schedule.sell_margin(), Some(dec!(3)));
    }

    #[test]
    fn test_discount_and_premium() {
        let schedule = TieredSchedule::new(params());
        // 2% under 100 is 98
        assert!(schedule.discount_triggered(dec!(97.99), dec!(100)));
        assert!(!schedule.discount_triggered(dec!(98), dec!(100)));
        // 3% over 100 is 103
        assert!(schedule.premium_triggered(dec!(103.01), dec!(100)));
        assert!(!schedule.premium_triggered(dec!(103), dec!(100)));
        // no cost basis: nothing is ever cheap enough
        assert!(!schedule.discount_triggered(dec!(0.01), Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_reestablish_bypasses_margin() {
        let schedule = TieredSchedule::new(params());
        let exchange = par_exchange();
        // worth 8.9 < 9, ask far above cost
        let snap = MarketSnapshot {
            best_ask: dec!(500),
            ..snapshot(dec!(8.9), dec!(1))
        };
        assert!(schedule.is_time_to_buy(&snap, &exchange).await.unwrap());
        // worth 9.5, needs the discount
        let snap = MarketSnapshot {
            best_ask: dec!(500),
            ..snapshot(dec!(9.5), dec!(1))
        };
        assert!(!schedule.is_time_to_buy(&snap, &exchange).await.unwrap());
    }

    #[tokio::test]
    async fn test_recent_buy_blocks() {
        let schedule = TieredSchedule::new(params());
        let mut exchange = MockExchange::new();
        exchange
            .expect_last_buy_date()
            .returning(|_| Ok(Some(Utc::now() - Duration::seconds(60))));
        assert!(!schedule
            .is_time_to_buy(&snapshot(Decimal::ZERO, Decimal::ZERO), &exchange)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_empty_balance_buys_shortfall_with_headroom() {
        let schedule = TieredSchedule::new(params());
        let (quantity, from_schedule) = schedule
            .buy_size(&snapshot(Decimal::ZERO, Decimal::ZERO), &par_exchange())
            .await
            .unwrap();
        assert_eq!(quantity, dec!(10.25));
        assert!(!from_schedule);
        // never below the first tier amount
        assert!(quantity >= dec!(5));
    }

    #[tokio::test]
    async fn test_undervalued_holdings_capped_at_establishing_position() {
        let schedule = TieredSchedule::new(params());
        let mut exchange = MockExchange::new();
        // base balance converts fine, but the holdings are valued low
        exchange.expect_amount_in().returning(|amount, _| Ok(amount));
        exchange.expect_price_in().returning(|qty, _| Ok(qty / dec!(2)));
        let (quantity, from_schedule) = schedule
            .buy_size(&snapshot(dec!(12), dec!(1)), &exchange)
            .await
            .unwrap();
        assert_eq!(quantity, dec!(10));
        assert!(!from_schedule);
    }

    #[tokio::test]
    async fn test_established_position_buys_tier() {
        let schedule = TieredSchedule::new(params());
        let exchange = par_exchange();
        let (quantity, from_schedule) = schedule
            .buy_size(&snapshot(dec!(20), dec!(1)), &exchange)
            .await
            .unwrap();
        assert_eq!(quantity, dec!(5));
        assert!(from_schedule);

        schedule.perform_buy_action();
        let (quantity, _) = schedule
            .buy_size(&snapshot(dec!(20), dec!(1)), &exchange)
            .await
            .unwrap();
        assert_eq!(quantity, dec!(8));
    }

    #[tokio::test]
    async fn test_multiplier_mode() {
        let schedule = TieredSchedule::new(TieredParams {
            buy_mode: OrderMode::Multiplier,
            sell_mode: OrderMode::Multiplier,
            ..params()
        });
        let exchange = par_exchange();
        let snap = snapshot(dec!(20), dec!(1));
        assert_eq!(schedule.buy_size(&snap, &exchange).await.unwrap(), (dec!(10), true));
        assert_eq!(schedule.sell_size(&snap, &exchange).await.unwrap(), dec!(5));
    }

    #[tokio::test]
    async fn test_sell_size_floored_at_balance() {
        let schedule = TieredSchedule::new(params());
        let quantity = schedule
            .sell_size(&snapshot(dec!(4), dec!(1)), &par_exchange())
            .await
            .unwrap();
        assert_eq!(quantity, dec!(4));
    }

    #[tokio::test]
    async fn test_sell_plan_always_advances_schedule() {
        let schedule = TieredSchedule::new(params());
        let snap = MarketSnapshot {
            best_bid: Some(dec!(120)),
            ..snapshot(dec!(20), dec!(100))
        };
        let plan = schedule.sell_plan(&snap, &par_exchange()).await.unwrap().unwrap();
        assert_eq!(plan.quantity, dec!(6));
        assert_eq!(plan.limit_price, dec!(90));
        assert_eq!(plan.trail_distance, dec!(0.9));
        assert!(plan.advances_schedule);
    }
}
