use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::common::errors::Result;
use crate::config::types::AppSettings;
use crate::strategy::traits::SharedStrategy;
use crate::strategy::types::CycleOutcome;

/// Drives every strategy on its own task at a fixed cadence
pub struct Scheduler {
    strategies: Vec<SharedStrategy>,
    tick_interval: Duration,
    /// Zero keeps a failing strategy running forever
    max_consecutive_failures: u32,
}

impl Scheduler {
    pub fn new(strategies: Vec<SharedStrategy>, settings: &AppSettings) -> Self {
        Self {
            strategies,
            tick_interval: Duration::from_secs(settings.tick_interval_secs.max(1)),
            max_consecutive_failures: settings.max_consecutive_failures,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval.max(Duration::from_millis(1));
        self
    }

    pub fn strategies(&self) -> &[SharedStrategy] {
        &self.strategies
    }

    /// One cycle of every strategy, in configuration order
    pub async fn run_once(&self) -> Vec<(String, Result<CycleOutcome>)> {
        let mut results = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let outcome = strategy.find_opportunities().await;
            results.push((strategy.name().to_string(), outcome));
        }
        results
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped), or
    /// until every strategy has been disabled. All strategies are
    /// cancelled on the way out.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut tasks = JoinSet::new();
        for strategy in &self.strategies {
            tasks.spawn(drive(
                strategy.clone(),
                self.tick_interval,
                self.max_consecutive_failures,
                shutdown.clone(),
            ));
        }
        info!(count = self.strategies.len(), interval = ?self.tick_interval, "Strategies started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                joined = tasks.join_next() => match joined {
                    Some(Err(e)) => error!(error = %e, "Strategy task panicked"),
                    Some(Ok(())) => {}
                    None => {
                        info!("No strategies left running");
                        return;
                    }
                },
            }
        }

        info!("Shutting down strategies");
        for strategy in &self.strategies {
            strategy.cancel().await;
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Strategy task panicked");
            }
        }
    }
}

async fn drive(
    strategy: SharedStrategy,
    tick_interval: Duration,
    max_consecutive_failures: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut failures = 0u32;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        if !strategy.is_running() {
            break;
        }
        match strategy.find_opportunities().await {
            Ok(outcome) => {
                failures = 0;
                debug!(strategy = strategy.name(), ?outcome, "Cycle complete");
            }
            Err(e) => {
                failures += 1;
                error!(strategy = strategy.name(), error = %e, failures, "Cycle failed");
                if max_consecutive_failures > 0 && failures >= max_consecutive_failures {
                    warn!(strategy = strategy.name(), "Too many consecutive failures; disabling");
                    strategy.cancel().await;
                    break;
                }
            }
        }
    }
}
