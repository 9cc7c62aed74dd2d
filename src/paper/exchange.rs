use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::order::PaperOrder;
use crate::common::decimal::{div8, round8};
use crate::common::errors::{EngineError, Result};
use crate::common::traits::{Exchange, TrailingStopOrder};
use crate::common::types::{CurrencyPair, LimitOrder, PriceLevel, Side};
use crate::config::types::PaperConfig;

/// Static order book for one pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Book {
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
}

impl Book {
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.iter().map(|l| l.price).min()
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.iter().map(|l| l.price).max()
    }

    /// Midpoint of the touch, or whichever side is quoted
    pub fn midpoint(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some((ask + bid) / Decimal::TWO),
            (ask, bid) => ask.or(bid),
        }
    }
}

/// Account state behind a [`PaperExchange`]
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    balances: HashMap<String, Decimal>,
    books: HashMap<CurrencyPair, Book>,
    costs: HashMap<CurrencyPair, Decimal>,
    last_buys: HashMap<CurrencyPair, DateTime<Utc>>,
    last_sells: HashMap<CurrencyPair, DateTime<Utc>>,
}

impl Ledger {
    pub(crate) fn balance(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or_default()
    }

    pub(crate) fn book(&self, pair: &CurrencyPair) -> Result<&Book> {
        self.books
            .get(pair)
            .ok_or_else(|| EngineError::Exchange(format!("no market for {pair}")))
    }

    fn midpoint(&self, pair: &CurrencyPair) -> Result<Decimal> {
        self.book(pair)?
            .midpoint()
            .ok_or_else(|| EngineError::Exchange(format!("{pair} has no quotes")))
    }

    /// Execution price if `order` were marketable right now
    pub(crate) fn touch(&self, order: &LimitOrder) -> Result<Option<Decimal>> {
        let book = self.book(&order.pair)?;
        Ok(match order.side {
            Side::Buy => book.best_ask(),
            Side::Sell => book.best_bid(),
        })
    }

    /// First asset the order would overdraw at `price`, if any
    pub(crate) fn shortfall(&self, order: &LimitOrder, price: Decimal) -> Option<String> {
        let (asset, needed) = match order.side {
            Side::Buy => (&order.pair.counter, round8(order.quantity * price)),
            Side::Sell => (&order.pair.base, order.quantity),
        };
        (self.balance(asset) < needed).then(|| asset.clone())
    }

    /// Book a fill of `order` at `price`
    pub(crate) fn settle(&mut self, order: &LimitOrder, price: Decimal, at: DateTime<Utc>) {
        let pair = &order.pair;
        let notional = round8(order.quantity * price);
        let base = self.balance(&pair.base);
        let counter = self.balance(&pair.counter);
        match order.side {
            Side::Buy => {
                let held = base + order.quantity;
                let prior_cost = self.costs.get(pair).copied().unwrap_or(price);
                if let Some(cost) = div8(base * prior_cost + notional, held) {
                    self.costs.insert(pair.clone(), cost);
                }
                self.balances.insert(pair.base.clone(), held);
                self.balances.insert(pair.counter.clone(), counter - notional);
                self.last_buys.insert(pair.clone(), at);
            }
            Side::Sell => {
                self.balances.insert(pair.base.clone(), base - order.quantity);
                self.balances.insert(pair.counter.clone(), counter + notional);
                self.last_sells.insert(pair.clone(), at);
            }
        }
    }
}

/// In-memory exchange facade
///
/// Quotes are static until changed with [`set_book`](Self::set_book);
/// conversions happen at the book midpoint. Orders fill in full at the
/// touch, or not at all.
#[derive(Clone)]
pub struct PaperExchange {
    name: String,
    ledger: Arc<RwLock<Ledger>>,
}

impl PaperExchange {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ledger: Arc::new(RwLock::new(Ledger::default())),
        }
    }

    /// Seed balances, books and cost bases from configuration
    pub async fn from_config(config: &PaperConfig) -> Self {
        let exchange = Self::new(config.name.clone());
        for (asset, amount) in &config.balances {
            exchange.set_balance(asset, *amount).await;
        }
        for market in &config.markets {
            exchange.set_quote(&market.pair, market.bid, market.ask).await;
            if let Some(cost) = market.average_cost {
                exchange.set_average_cost(&market.pair, cost).await;
            }
        }
        info!(
            name = %exchange.name,
            assets = config.balances.len(),
            markets = config.markets.len(),
            "PaperExchange initialized"
        );
        exchange
    }

    pub async fn set_balance(&self, asset: &str, amount: Decimal) {
        self.ledger
            .write()
            .await
            .balances
            .insert(asset.to_uppercase(), amount);
    }

    pub async fn set_book(&self, pair: &CurrencyPair, asks: Vec<PriceLevel>, bids: Vec<PriceLevel>) {
        self.ledger
            .write()
            .await
            .books
            .insert(pair.clone(), Book { asks, bids });
    }

    /// One level each side, deep enough for any order
    pub async fn set_quote(&self, pair: &CurrencyPair, bid: Decimal, ask: Decimal) {
        let depth = Decimal::MAX;
        self.set_book(
            pair,
            vec![PriceLevel::new(ask, depth)],
            vec![PriceLevel::new(bid, depth)],
        )
        .await;
    }

    pub async fn set_average_cost(&self, pair: &CurrencyPair, cost: Decimal) {
        self.ledger.write().await.costs.insert(pair.clone(), cost);
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn balance(&self, asset: &str) -> Result<Decimal> {
        Ok(self.ledger.read().await.balance(asset))
    }

    async fn average_cost(&self, pair: &CurrencyPair) -> Result<Decimal> {
        self.ledger
            .read()
            .await
            .costs
            .get(pair)
            .copied()
            .ok_or_else(|| EngineError::NoCostBasis(pair.to_string()))
    }

    async fn lowest_asks(&self, pair: &CurrencyPair) -> Result<Vec<PriceLevel>> {
        let mut asks = self.ledger.read().await.book(pair)?.asks.clone();
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Ok(asks)
    }

    async fn highest_bids(&self, pair: &CurrencyPair) -> Result<Vec<PriceLevel>> {
        let mut bids = self.ledger.read().await.book(pair)?.bids.clone();
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        Ok(bids)
    }

    async fn amount_in(&self, counter_quantity: Decimal, pair: &CurrencyPair) -> Result<Decimal> {
        let mid = self.ledger.read().await.midpoint(pair)?;
        div8(counter_quantity, mid)
            .ok_or_else(|| EngineError::Exchange(format!("{pair} midpoint is zero")))
    }

    async fn price_in(&self, base_quantity: Decimal, pair: &CurrencyPair) -> Result<Decimal> {
        let mid = self.ledger.read().await.midpoint(pair)?;
        Ok(round8(base_quantity * mid))
    }

    async fn average_price(&self, pair: &CurrencyPair) -> Result<Decimal> {
        self.ledger.read().await.midpoint(pair)
    }

    async fn last_buy_date(&self, pair: &CurrencyPair) -> Result<Option<DateTime<Utc>>> {
        Ok(self.ledger.read().await.last_buys.get(pair).copied())
    }

    async fn last_sell_date(&self, pair: &CurrencyPair) -> Result<Option<DateTime<Utc>>> {
        Ok(self.ledger.read().await.last_sells.get(pair).copied())
    }

    async fn create_trailing_stop(
        &self,
        order: LimitOrder,
        trail_distance: Decimal,
    ) -> Result<Arc<dyn TrailingStopOrder>> {
        self.ledger.read().await.book(&order.pair)?;
        debug!(
            pair = %order.pair,
            side = %order.side,
            quantity = %order.quantity,
            limit = %order.limit_price,
            trail = %trail_distance,
            "Paper trailing stop created"
        );
        Ok(Arc::new(PaperOrder::new(
            Arc::clone(&self.ledger),
            order,
            trail_distance,
        )))
    }
}
