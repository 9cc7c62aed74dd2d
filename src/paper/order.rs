use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;

use super::exchange::Ledger;
use crate::common::errors::{EngineError, Result};
use crate::common::traits::TrailingStopOrder;
use crate::common::types::{LimitOrder, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    Open,
    Filled,
    Cancelled,
}

struct Inner {
    order: LimitOrder,
    status: Status,
}

/// Simulated trailing stop: fills in full at the touch if the touch is
/// within the limit, otherwise cancels
pub struct PaperOrder {
    ledger: Arc<RwLock<Ledger>>,
    trail_distance: Decimal,
    inner: Mutex<Inner>,
}

impl PaperOrder {
    pub(crate) fn new(ledger: Arc<RwLock<Ledger>>, order: LimitOrder, trail_distance: Decimal) -> Self {
        Self {
            ledger,
            trail_distance,
            inner: Mutex::new(Inner {
                order,
                status: Status::Pending,
            }),
        }
    }

    fn status(&self) -> Status {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).status
    }

    fn set_status(&self, status: Status) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).status = status;
    }
}

fn marketable(order: &LimitOrder, touch: Decimal) -> bool {
    match order.side {
        Side::Buy => touch <= order.limit_price,
        Side::Sell => touch >= order.limit_price,
    }
}

#[async_trait]
impl TrailingStopOrder for PaperOrder {
    fn order(&self) -> LimitOrder {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    async fn open(&self) -> Result<()> {
        if self.status() != Status::Pending {
            return Err(EngineError::ExchangeRejected("order already submitted".into()));
        }
        let order = self.order();
        let ledger = self.ledger.read().await;
        let price = ledger.touch(&order)?.unwrap_or(order.limit_price);
        if let Some(asset) = ledger.shortfall(&order, price) {
            return Err(EngineError::ExchangeRejected(format!(
                "insufficient {asset} balance for {} {} {}",
                order.side, order.quantity, order.pair.base
            )));
        }
        drop(ledger);
        self.set_status(Status::Open);
        Ok(())
    }

    async fn fill_or_cancel(&self) -> Result<bool> {
        match self.status() {
            Status::Open => {}
            Status::Filled => return Ok(true),
            Status::Cancelled => return Ok(false),
            Status::Pending => {
                return Err(EngineError::Internal("order was never opened".into()))
            }
        }
        let order = self.order();
        let mut ledger = self.ledger.write().await;
        let fill = ledger
            .touch(&order)?
            .filter(|touch| marketable(&order, *touch))
            .filter(|touch| ledger.shortfall(&order, *touch).is_none());
        let Some(price) = fill else {
            drop(ledger);
            debug!(pair = %order.pair, side = %order.side, "Paper order not marketable; cancelling");
            self.set_status(Status::Cancelled);
            return Ok(false);
        };
        ledger.settle(&order, price, Utc::now());
        drop(ledger);

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.order.limit_price = price;
        inner.status = Status::Filled;
        debug!(
            pair = %order.pair,
            side = %order.side,
            %price,
            trail = %self.trail_distance,
            "Paper order filled"
        );
        Ok(true)
    }

    async fn cancel(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.status == Status::Filled {
            return Err(EngineError::OrderIo("order already filled".into()));
        }
        inner.status = Status::Cancelled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::Exchange;
    use crate::common::types::CurrencyPair;
    use crate::paper::PaperExchange;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn btc() -> CurrencyPair {
        CurrencyPair::new("BTC", "USD")
    }

    async fn exchange() -> PaperExchange {
        let exchange = PaperExchange::new("paper");
        exchange.set_balance("USD", dec!(1000)).await;
        exchange.set_balance("BTC", dec!(1)).await;
        exchange.set_quote(&btc(), dec!(99), dec!(101)).await;
        exchange
    }

    #[tokio::test]
    async fn test_marketable_buy_fills_at_ask() {
        let exchange = exchange().await;
        let order = exchange
            .create_trailing_stop(LimitOrder::bid(btc(), dec!(2), dec!(200)), dec!(2))
            .await
            .unwrap();
        order.open().await.unwrap();
        assert!(order.fill_or_cancel().await.unwrap());

        assert_eq!(order.order().limit_price, dec!(101));
        assert_eq!(exchange.balance("BTC").await.unwrap(), dec!(3));
        assert_eq!(exchange.balance("USD").await.unwrap(), dec!(798));
        assert!(exchange.last_buy_date(&btc()).await.unwrap().is_some());
        assert!(matches!(order.cancel().await, Err(EngineError::OrderIo(_))));
    }

    #[tokio::test]
    async fn test_limit_below_ask_cancels() {
        let exchange = exchange().await;
        let order = exchange
            .create_trailing_stop(LimitOrder::bid(btc(), dec!(1), dec!(100)), dec!(1))
            .await
            .unwrap();
        order.open().await.unwrap();
        assert!(!order.fill_or_cancel().await.unwrap());
        assert_eq!(exchange.balance("BTC").await.unwrap(), dec!(1));
    }

    #[tokio::test]
    async fn test_insufficient_funds_rejected() {
        let exchange = exchange().await;
        let order = exchange
            .create_trailing_stop(LimitOrder::ask(btc(), dec!(5), Decimal::ZERO), dec!(1))
            .await
            .unwrap();
        let err = order.open().await.unwrap_err();
        assert!(matches!(err, EngineError::ExchangeRejected(ref msg) if msg.contains("BTC")));
    }

    #[tokio::test]
    async fn test_cancel_before_fill() {
        let exchange = exchange().await;
        let order = exchange
            .create_trailing_stop(LimitOrder::ask(btc(), dec!(0.5), Decimal::ZERO), dec!(1))
            .await
            .unwrap();
        order.open().await.unwrap();
        order.cancel().await.unwrap();
        assert!(!order.fill_or_cancel().await.unwrap());
        assert_eq!(exchange.balance("BTC").await.unwrap(), dec!(1));
    }
}
