//! Common test utilities and fixtures
#![allow(dead_code)]

use std::sync::Arc;

use rebalancer::config::types::EngineSettings;
use rebalancer::{AllocationPolicy, AllocationStrategy, CurrencyPair, MemoryReporter, PaperExchange};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn btc() -> CurrencyPair {
    CurrencyPair::new("BTC", "USD")
}

/// Paper account quoting BTC/USD at 99/101
pub async fn paper(usd: Decimal, btc_balance: Decimal) -> Arc<PaperExchange> {
    let exchange = PaperExchange::new("paper");
    exchange.set_balance("USD", usd).await;
    exchange.set_balance("BTC", btc_balance).await;
    exchange.set_quote(&btc(), dec!(99), dec!(101)).await;
    Arc::new(exchange)
}

/// No settlement wait, no throttle, no kill switch
pub fn immediate() -> EngineSettings {
    EngineSettings {
        settle_delay_secs: 0,
        throttle_secs: 0,
        kill_switch_env: None,
    }
}

pub fn strategy(
    policy: AllocationPolicy,
    exchange: &Arc<PaperExchange>,
    reporter: &Arc<MemoryReporter>,
) -> AllocationStrategy {
    AllocationStrategy::new("it", btc(), policy, exchange.clone(), reporter.clone())
        .with_settings(&immediate())
}

/// Sample TOML configuration exercising every policy type
pub const SAMPLE_CONFIG: &str = r#"
[settings]
tick_interval_secs = 1

[engine]
settle_delay_secs = 0
throttle_secs = 0

[[strategies]]
name = "btc-target"
pair = "BTC/USD"
[strategies.policy]
type = "target"
target = 1
establishing_position = 0.5

[paper]
name = "sim"
balances = { USD = 1000 }
[[paper.markets]]
pair = "BTC/USD"
bid = 99
ask = 101
"#;
