//! Configuration types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::common::errors::{EngineError, Result};
use crate::common::types::CurrencyPair;
use crate::strategy::fixed_target::FixedTarget;
use crate::strategy::percent_band::{PercentBand, TargetPercent};
use crate::strategy::tiered::TieredParams;
use crate::strategy::types::OrderMode;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
    /// Decision engine timings
    #[serde(default)]
    pub engine: EngineSettings,
    /// One entry per strategy instance
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
    /// Simulated exchange
    #[serde(default)]
    pub paper: PaperConfig,
}

impl AppConfig {
    /// Reject configurations the engine cannot run safely
    pub fn validate(&self) -> Result<()> {
        for strategy in &self.strategies {
            strategy.policy.validate().map_err(|e| {
                EngineError::Configuration(format!("strategy '{}': {e}", strategy.name))
            })?;
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds between two decision cycles of the same strategy
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Consecutive failed cycles before a strategy is disabled (0 = never)
    #[serde(default)]
    pub max_consecutive_failures: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            tick_interval_secs: default_tick_interval(),
            max_consecutive_failures: 0,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval() -> u64 {
    60
}

/// Decision engine timings and switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Wait after a fill before trusting balances again
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,
    /// No new decision may act until this long after a fill
    #[serde(default = "default_throttle")]
    pub throttle_secs: u64,
    /// Environment variable whose presence suppresses every buy
    #[serde(default = "default_kill_switch_env")]
    pub kill_switch_env: Option<String>,
}

impl EngineSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_secs)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            settle_delay_secs: default_settle_delay(),
            throttle_secs: default_throttle(),
            kill_switch_env: default_kill_switch_env(),
        }
    }
}

fn default_settle_delay() -> u64 {
    5
}

fn default_throttle() -> u64 {
    30
}

fn default_kill_switch_env() -> Option<String> {
    Some("NOBUY".to_string())
}

/// One strategy instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    /// `BASE/COUNTER`
    pub pair: CurrencyPair,
    pub policy: PolicyConfig,
}

/// Allocation policy, selected by its `type` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PolicyConfig {
    Target(FixedTarget),
    Straddle(PercentBand),
    Pivot(TieredParams),
}

fn non_negative(field: &str, value: Decimal) -> Result<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(EngineError::Configuration(format!("{field} must not be negative")));
    }
    Ok(())
}

fn non_empty(field: &str, values: &[Decimal]) -> Result<()> {
    if values.is_empty() {
        return Err(EngineError::Configuration(format!("{field} needs at least one tier")));
    }
    values.iter().try_for_each(|v| non_negative(field, *v))
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            PolicyConfig::Target(p) => {
                non_negative("target", p.target)?;
                non_negative("establishing_position", p.establishing_position)
            }
            PolicyConfig::Straddle(p) => {
                if let TargetPercent::Curve(points) = &p.target {
                    if points.is_empty() {
                        return Err(EngineError::Configuration(
                            "target curve needs at least one point".into(),
                        ));
                    }
                    if points.windows(2).any(|w| w[0].price >= w[1].price) {
                        return Err(EngineError::Configuration(
                            "target curve prices must be strictly increasing".into(),
                        ));
                    }
                }
                if p.lower_margin > p.upper_margin {
                    return Err(EngineError::Configuration(
                        "lower_margin must not exceed upper_margin".into(),
                    ));
                }
                non_negative("lower_margin", p.lower_margin)?;
                non_negative("upper_margin", p.upper_margin)?;
                non_negative("pivot_margin", p.pivot_margin)?;
                non_negative("max_allocation", p.max_allocation)?;
                non_negative("amount_to_trade", p.amount_to_trade)
            }
            PolicyConfig::Pivot(p) => {
                non_negative("establishing_position", p.establishing_position)?;
                non_empty("allocation_margins", &p.allocation_margins)?;
                non_empty("distribution_margins", &p.distribution_margins)?;
                match p.buy_mode {
                    OrderMode::Amount => non_empty("allocation_amounts", &p.allocation_amounts)?,
                    OrderMode::Multiplier => {
                        non_empty("allocation_multipliers", &p.allocation_multipliers)?
                    }
                }
                match p.sell_mode {
                    OrderMode::Amount => {
                        non_empty("distribution_amounts", &p.distribution_amounts)
                    }
                    OrderMode::Multiplier => {
                        non_empty("distribution_multipliers", &p.distribution_multipliers)
                    }
                }
            }
        }
    }
}

/// Simulated exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Name shown in report lines
    #[serde(default = "default_paper_name")]
    pub name: String,
    /// Starting balance per asset
    #[serde(default)]
    pub balances: HashMap<String, Decimal>,
    #[serde(default)]
    pub markets: Vec<PaperMarket>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            name: default_paper_name(),
            balances: HashMap::new(),
            markets: Vec::new(),
        }
    }
}

fn default_paper_name() -> String {
    "paper".to_string()
}

/// Static top of book for one simulated market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperMarket {
    pub pair: CurrencyPair,
    pub bid: Decimal,
    pub ask: Decimal,
    /// Cost basis of any starting balance
    #[serde(default)]
    pub average_cost: Option<Decimal>,
}
