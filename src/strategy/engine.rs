//! The allocation decision engine
//!
//! One [`AllocationStrategy`] per configured pair. Each call to
//! `find_opportunities` reads the market, asks the policy for at most one
//! [`OrderPlan`] and, if there is one, carries it through the trailing-stop
//! lifecycle before reporting the result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::common::decimal::round8;
use crate::common::errors::{EngineError, Result};
use crate::common::traits::{Exchange, Reporter, TrailingStopOrder};
use crate::common::types::{CurrencyPair, Side};
use crate::config::types::{EngineSettings, StrategyConfig};
use crate::strategy::execution::{OrderExecution, OrderState};
use crate::strategy::policy::AllocationPolicy;
use crate::strategy::traits::Strategy;
use crate::strategy::types::{AllocationSplit, CycleOutcome, FillSummary, MarketSnapshot, OrderPlan};

/// Decision engine for one currency pair
pub struct AllocationStrategy {
    name: String,
    pair: CurrencyPair,
    policy: AllocationPolicy,
    exchange: Arc<dyn Exchange>,
    reporter: Arc<dyn Reporter>,
    settle_delay: Duration,
    throttle: Duration,
    kill_switch_env: Option<String>,
    running: AtomicBool,
    /// Held for the whole of a cycle; a second caller gets `Busy`
    in_flight: tokio::sync::Mutex<()>,
    /// The order currently between open and settlement
    position: Mutex<Option<Arc<dyn TrailingStopOrder>>>,
    cooldown_until: Mutex<Option<Instant>>,
    wake: Notify,
}

impl AllocationStrategy {
    pub fn new(
        name: impl Into<String>,
        pair: CurrencyPair,
        policy: AllocationPolicy,
        exchange: Arc<dyn Exchange>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let defaults = EngineSettings::default();
        Self {
            name: name.into(),
            pair,
            policy,
            exchange,
            reporter,
            settle_delay: defaults.settle_delay(),
            throttle: defaults.throttle(),
            kill_switch_env: defaults.kill_switch_env,
            running: AtomicBool::new(true),
            in_flight: tokio::sync::Mutex::new(()),
            position: Mutex::new(None),
            cooldown_until: Mutex::new(None),
            wake: Notify::new(),
        }
    }

    pub fn from_config(
        config: StrategyConfig,
        exchange: Arc<dyn Exchange>,
        reporter: Arc<dyn Reporter>,
        settings: &EngineSettings,
    ) -> Self {
        Self::new(config.name, config.pair, config.policy.into(), exchange, reporter)
            .with_settings(settings)
    }

    /// Override the settlement delay, throttle and kill switch
    pub fn with_settings(mut self, settings: &EngineSettings) -> Self {
        self.settle_delay = settings.settle_delay();
        self.throttle = settings.throttle();
        self.kill_switch_env = settings.kill_switch_env.clone();
        self
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    /// True while an order is between submission and settlement
    pub fn has_open_position(&self) -> bool {
        self.position
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn set_position(&self, order: Option<Arc<dyn TrailingStopOrder>>) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = order;
    }

    fn take_position(&self) -> Option<Arc<dyn TrailingStopOrder>> {
        self.position
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn cooling_down(&self) -> bool {
        self.cooldown_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|until| Instant::now() < until)
    }

    fn start_cooldown(&self) {
        *self.cooldown_until.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Instant::now() + self.throttle);
    }

    fn kill_switch_engaged(&self) -> bool {
        self.kill_switch_env
            .as_deref()
            .is_some_and(|var| std::env::var_os(var).is_some())
    }

    fn report(&self, message: &str) {
        self.reporter
            .report(&format!("{}: {}", self.exchange.name(), message));
    }

    async fn snapshot(&self) -> Result<Option<MarketSnapshot>> {
        let exchange = self.exchange.as_ref();
        let balance = exchange.balance(&self.pair.base).await?;
        let average_cost = match exchange.average_cost(&self.pair).await {
            Ok(cost) => cost,
            Err(EngineError::NoCostBasis(_)) => {
                warn!("No cost basis recorded; using zero");
                Decimal::ZERO
            }
            Err(e) => return Err(e),
        };
        let asks = exchange.lowest_asks(&self.pair).await?;
        let Some(best_ask) = asks.first().map(|level| level.price) else {
            debug!("No asks quoted");
            return Ok(None);
        };
        let bids = exchange.highest_bids(&self.pair).await?;
        Ok(Some(MarketSnapshot {
            pair: self.pair.clone(),
            balance,
            average_cost,
            best_ask,
            best_bid: bids.first().map(|level| level.price),
            now: Utc::now(),
        }))
    }

    #[instrument(skip(self), fields(strategy = %self.name, pair = %self.pair))]
    async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Previous cycle still in flight");
            return Ok(CycleOutcome::Busy);
        };
        if !self.is_running() {
            return Ok(CycleOutcome::Stopped);
        }
        if self.cooling_down() {
            debug!("Cooling down after the last fill");
            return Ok(CycleOutcome::CoolingDown);
        }
        let Some(snapshot) = self.snapshot().await? else {
            return Ok(CycleOutcome::NoQuotes);
        };
        let exchange = self.exchange.as_ref();

        if self.kill_switch_engaged() {
            debug!("Kill switch present; skipping buy evaluation");
        } else if self.is_running() {
            if let Some(plan) = self.policy.buy_plan(&snapshot, exchange).await? {
                return self.execute(plan).await;
            }
        }
        if self.is_running() {
            if let Some(plan) = self.policy.sell_plan(&snapshot, exchange).await? {
                return self.execute(plan).await;
            }
        }
        Ok(if self.is_running() {
            CycleOutcome::Idle
        } else {
            CycleOutcome::Stopped
        })
    }

    async fn execute(&self, plan: OrderPlan) -> Result<CycleOutcome> {
        if plan.quantity <= Decimal::ZERO {
            info!(side = %plan.side, quantity = %plan.quantity, "Nothing to trade; skipping plan");
            return Ok(CycleOutcome::Idle);
        }
        if !self.is_running() {
            return Ok(CycleOutcome::Stopped);
        }
        let phase = match plan.side {
            Side::Buy => "ALLOCATION",
            Side::Sell => "DISTRIBUTION",
        };
        self.report(&format!(
            "{} strategy for {} is now in {phase}.",
            self.policy.label(),
            self.pair
        ));

        let mut execution = OrderExecution::create(self.exchange.as_ref(), &plan, &self.pair).await?;
        self.set_position(Some(execution.handle()));
        let outcome = self.drive(&mut execution, &plan).await;
        self.set_position(None);
        outcome
    }

    async fn drive(&self, execution: &mut OrderExecution, plan: &OrderPlan) -> Result<CycleOutcome> {
        if !self.is_running() {
            return Ok(CycleOutcome::Stopped);
        }
        if let Err(e) = execution.open().await {
            warn!(error = %e, quantity = %plan.quantity, "Order open failed");
            self.report(&format!(
                "{} strategy for {} couldn't open a {} order for {} {}! Cause: {e}",
                self.policy.label(),
                self.pair,
                plan.side,
                plan.quantity.normalize(),
                self.pair.base,
            ));
            return Ok(CycleOutcome::OpenFailed);
        }
        info!(
            side = %plan.side,
            quantity = %plan.quantity,
            price = %plan.limit_price,
            notional = %execution.order().notional(),
            "Order opened"
        );
        if !self.is_running() {
            // cancel() may have fired before the order reached the exchange
            if let Err(e) = execution.handle().cancel().await {
                warn!(error = %e, "Failed to cancel order opened during shutdown");
            }
        }

        match execution.settle().await {
            Ok(OrderState::Filled) => {}
            Ok(_) => {
                info!("Order cancelled before filling");
                return Ok(CycleOutcome::Cancelled);
            }
            Err(e) if e.is_reportable() => {
                warn!(error = %e, "Lost track of order");
                self.report(&format!(
                    "{} strategy for {} lost track of its {} order: {e}",
                    self.policy.label(),
                    self.pair,
                    plan.side,
                ));
                return Ok(CycleOutcome::Cancelled);
            }
            Err(e) => return Err(e),
        }

        if plan.advances_schedule {
            match plan.side {
                Side::Buy => self.policy.perform_buy_action(),
                Side::Sell => self.policy.perform_sell_action(),
            }
        }
        self.start_cooldown();

        self.wait_for_settlement().await;
        let summary = self.summarize(execution, plan.side).await?;
        self.report(&self.describe(&summary));
        if let Some(milestone) = self.policy.milestone(summary.side, summary.base_balance) {
            self.report(&format!(
                "{} strategy {milestone} {}.",
                self.policy.label(),
                self.pair.base
            ));
        }
        Ok(CycleOutcome::Filled(summary))
    }

    /// Balances lag fill notifications; `cancel()` cuts the wait short
    async fn wait_for_settlement(&self) {
        if self.settle_delay.is_zero() {
            return;
        }
        let wake = self.wake.notified();
        tokio::pin!(wake);
        wake.as_mut().enable();
        if !self.is_running() {
            debug!("Cancelled before settlement wait");
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.settle_delay) => {}
            _ = wake => debug!("Settlement wait interrupted"),
        }
    }

    async fn summarize(&self, execution: &OrderExecution, side: Side) -> Result<FillSummary> {
        let exchange = self.exchange.as_ref();
        let filled = execution.order();
        let base_balance = exchange.balance(&self.pair.base).await?;
        let counter_balance = round8(exchange.balance(&self.pair.counter).await?);
        let base_value = exchange.price_in(base_balance, &self.pair).await?;
        Ok(FillSummary {
            side,
            quantity: filled.quantity,
            price: filled.limit_price,
            base_balance,
            counter_balance,
            allocation: AllocationSplit::from_values(base_value, counter_balance),
        })
    }

    fn describe(&self, summary: &FillSummary) -> String {
        let (base, counter) = (&self.pair.base, &self.pair.counter);
        let trade = match summary.side {
            Side::Buy => format!(
                "spent {} {counter} adding {}@{} of {base}",
                round8(summary.quantity * summary.price).normalize(),
                summary.quantity.normalize(),
                summary.price.normalize(),
            ),
            Side::Sell => format!(
                "sold {}@{} of {base}",
                summary.quantity.normalize(),
                summary.price.normalize(),
            ),
        };
        let allocation = summary
            .allocation
            .map_or_else(|| "n/a".to_string(), |split| split.to_string());
        format!(
            "{} strategy {trade}. We now have {} {base} and {} {counter}. Allocation is now {allocation}.",
            self.policy.label(),
            summary.base_balance.normalize(),
            summary.counter_balance.normalize(),
        )
    }
}

#[async_trait]
impl Strategy for AllocationStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    async fn find_opportunities(&self) -> Result<CycleOutcome> {
        self.run_cycle().await
    }

    async fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_waiters();
        let Some(order) = self.take_position() else {
            return;
        };
        match order.cancel().await {
            Ok(()) => info!(strategy = %self.name, "Cancellation requested for open order"),
            Err(e) => {
                warn!(strategy = %self.name, error = %e, "Failed to cancel open order");
                self.report(&format!(
                    "{} strategy for {} could not cancel its open order: {e}",
                    self.policy.label(),
                    self.pair
                ));
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
