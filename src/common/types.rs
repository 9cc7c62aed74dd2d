//! Domain types shared by the engine, the policies and the exchange facade

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::EngineError;

/// Ordered (base, counter) pair, e.g. `BTC/USD`
///
/// `base` is the traded asset, `counter` the asset it is priced in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    pub base: String,
    pub counter: String,
}

impl CurrencyPair {
    pub fn new(base: impl Into<String>, counter: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            counter: counter.into().to_uppercase(),
        }
    }
}

impl std::fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.counter)
    }
}

impl FromStr for CurrencyPair {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((base, counter)) if !base.trim().is_empty() && !counter.trim().is_empty() => {
                Ok(Self::new(base.trim(), counter.trim()))
            }
            _ => Err(EngineError::Configuration(format!(
                "currency pair must look like BASE/COUNTER, got '{s}'"
            ))),
        }
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.to_string()
    }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A single price level in an order book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price at this level, in counter units
    pub price: Decimal,
    /// Quantity at this price level, in base units
    pub quantity: Decimal,
}

impl PriceLevel {
    /// Create a new price level
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// Limit order handed to the exchange facade
///
/// The limit price is nominal: real price discipline comes from the
/// trailing-stop controller wrapping it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub side: Side,
    pub pair: CurrencyPair,
    /// Quantity in base units
    pub quantity: Decimal,
    /// Limit price in counter units per base unit
    pub limit_price: Decimal,
}

impl LimitOrder {
    /// Buy `quantity` of the base asset
    pub fn bid(pair: CurrencyPair, quantity: Decimal, limit_price: Decimal) -> Self {
        Self {
            side: Side::Buy,
            pair,
            quantity,
            limit_price,
        }
    }

    /// Sell `quantity` of the base asset
    pub fn ask(pair: CurrencyPair, quantity: Decimal, limit_price: Decimal) -> Self {
        Self {
            side: Side::Sell,
            pair,
            quantity,
            limit_price,
        }
    }

    /// Counter-asset value of the order at its limit price
    pub fn notional(&self) -> Decimal {
        self.quantity * self.limit_price
    }
}
