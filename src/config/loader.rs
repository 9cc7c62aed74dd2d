//! Configuration loader

use config::{Config, Environment, File, FileFormat};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::Result;

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP__, nested with `__`)
/// 2. Configuration file (TOML format)
/// 3. Default values
///
/// A `.env` file in the working directory is read first if present.
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    dotenvy::dotenv().ok();

    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    Ok(builder.build()?.try_deserialize()?)
}

/// Load configuration from an in-memory TOML document, without the environment
pub fn load_config_str(toml: &str) -> Result<AppConfig> {
    let config = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?;
    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::PolicyConfig;
    use crate::strategy::percent_band::TargetPercent;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
[settings]
tick_interval_secs = 15

[engine]
settle_delay_secs = 0

[[strategies]]
name = "btc-target"
pair = "BTC/USD"
[strategies.policy]
type = "target"
target = 1.5
establishing_position = 0.25

[[strategies]]
name = "eth-straddle"
pair = "eth/usd"
[strategies.policy]
type = "straddle"
target = [{ price = 1000, percent = 70 }, { price = 3000, percent = 30 }]
lower_margin = 40
upper_margin = 60
pivot_margin = 5
amount_to_trade = 100

[[strategies]]
name = "sol-pivot"
pair = "SOL/USD"
[strategies.policy]
type = "pivot"
establishing_position = 500
sell_mode = "multiplier"
allocation_amounts = [100, 200]
allocation_margins = [5, 10]
distribution_multipliers = [0.1]
distribution_margins = [15]

[paper]
name = "sim"
balances = { USD = 10000 }
[[paper.markets]]
pair = "BTC/USD"
bid = 29990
ask = 30010
"#;

    #[test]
    fn test_load_sample() {
        let config = load_config_str(SAMPLE).unwrap();
        assert_eq!(config.settings.tick_interval_secs, 15);
        assert_eq!(config.engine.settle_delay_secs, 0);
        assert_eq!(config.engine.throttle_secs, 30);
        assert_eq!(config.strategies.len(), 3);
        assert!(config.validate().is_ok());

        let straddle = &config.strategies[1];
        assert_eq!(straddle.pair.to_string(), "ETH/USD");
        match &straddle.policy {
            PolicyConfig::Straddle(band) => {
                assert!(matches!(band.target, TargetPercent::Curve(ref points) if points.len() == 2))
            }
            other => panic!("unexpected policy {other:?}"),
        }
        match &config.strategies[0].policy {
            PolicyConfig::Target(t) => assert_eq!(t.target, dec!(1.5)),
            other => panic!("unexpected policy {other:?}"),
        }
        assert_eq!(config.paper.markets[0].ask, dec!(30010));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = load_config_str("").unwrap();
        assert!(config.strategies.is_empty());
        assert_eq!(config.settings.log_level, "info");
        assert_eq!(config.paper.name, "paper");
    }

    #[test]
    fn test_unknown_policy_type_is_rejected() {
        let doc = r#"
[[strategies]]
name = "x"
pair = "BTC/USD"
[strategies.policy]
type = "martingale"
"#;
        assert!(load_config_str(doc).is_err());
    }
}
