//! Allocation policies
//!
//! A policy answers two questions per cycle: is it time to buy, is it time
//! to sell, and if so with what [`OrderPlan`]. Each variant owns its own
//! decide-and-size rule; the engine dispatches through [`AllocationPolicy`].

use chrono::{DateTime, Duration, Utc};

use crate::common::errors::Result;
use crate::common::traits::Exchange;
use crate::common::types::Side;
use crate::config::types::PolicyConfig;
use crate::strategy::fixed_target::FixedTarget;
use crate::strategy::percent_band::PercentBand;
use crate::strategy::tiered::{TieredParams, TieredSchedule};
use crate::strategy::types::{MarketSnapshot, OrderPlan};

/// True while `now` is still inside the re-trigger window opened by `last`
pub fn within_delay(last: Option<DateTime<Utc>>, delay_secs: u64, now: DateTime<Utc>) -> bool {
    let Some(at) = last else {
        return false;
    };
    i64::try_from(delay_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|delay| at.checked_add_signed(delay))
        .map_or(true, |until| until > now)
}

/// The three supported allocation policies
#[derive(Debug)]
pub enum AllocationPolicy {
    /// Hold an absolute balance of the base asset
    FixedTarget(FixedTarget),
    /// Hold a percentage of portfolio value, with hysteresis ("straddle")
    PercentBand(PercentBand),
    /// Accumulate and distribute along tiered schedules ("pivot")
    TieredSchedule(TieredSchedule),
}

impl AllocationPolicy {
    /// Name used in report lines
    pub fn label(&self) -> &'static str {
        match self {
            AllocationPolicy::FixedTarget(_) => "Target",
            AllocationPolicy::PercentBand(_) => "Straddle",
            AllocationPolicy::TieredSchedule(_) => "Pivot",
        }
    }

    pub async fn buy_plan(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<Option<OrderPlan>> {
        match self {
            AllocationPolicy::FixedTarget(p) => p.buy_plan(snapshot, exchange).await,
            AllocationPolicy::PercentBand(p) => p.buy_plan(snapshot, exchange).await,
            AllocationPolicy::TieredSchedule(p) => p.buy_plan(snapshot, exchange).await,
        }
    }

    pub async fn sell_plan(
        &self,
        snapshot: &MarketSnapshot,
        exchange: &dyn Exchange,
    ) -> Result<Option<OrderPlan>> {
        match self {
            AllocationPolicy::FixedTarget(p) => p.sell_plan(snapshot, exchange).await,
            AllocationPolicy::PercentBand(p) => p.sell_plan(snapshot, exchange).await,
            AllocationPolicy::TieredSchedule(p) => p.sell_plan(snapshot, exchange).await,
        }
    }

    /// Advance the buy-side schedule cursor. No-op for untiered policies.
    pub fn perform_buy_action(&self) {
        if let AllocationPolicy::TieredSchedule(p) = self {
            p.perform_buy_action();
        }
    }

    /// Advance the sell-side schedule cursor. No-op for untiered policies.
    pub fn perform_sell_action(&self) {
        if let AllocationPolicy::TieredSchedule(p) = self {
            p.perform_sell_action();
        }
    }

    /// Extra report line after a fill, if the policy has reached a milestone
    pub fn milestone(&self, side: Side, balance: rust_decimal::Decimal) -> Option<String> {
        match self {
            AllocationPolicy::FixedTarget(p) if p.target_reached(side, balance) => Some(format!(
                "has reached its target of {}",
                p.target.normalize()
            )),
            _ => None,
        }
    }
}

impl From<PolicyConfig> for AllocationPolicy {
    fn from(config: PolicyConfig) -> Self {
        match config {
            PolicyConfig::Target(p) => AllocationPolicy::FixedTarget(p),
            PolicyConfig::Straddle(p) => AllocationPolicy::PercentBand(p),
            PolicyConfig::Pivot(p) => AllocationPolicy::TieredSchedule(TieredSchedule::new(p)),
        }
    }
}

impl From<TieredParams> for AllocationPolicy {
    fn from(params: TieredParams) -> Self {
        AllocationPolicy::TieredSchedule(TieredSchedule::new(params))
    }
}
