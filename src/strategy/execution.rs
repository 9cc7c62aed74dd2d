use std::sync::Arc;

use tracing::debug;

use crate::common::errors::{EngineError, Result};
use crate::common::traits::{Exchange, TrailingStopOrder};
use crate::common::types::{CurrencyPair, LimitOrder};
use crate::strategy::types::OrderPlan;

/// Lifecycle of one trailing-stop order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Created,
    Opened,
    Filled,
    Cancelled,
    OpenFailed,
}

/// Drives a single order through Created → Opened → Filled | Cancelled
pub struct OrderExecution {
    handle: Arc<dyn TrailingStopOrder>,
    state: OrderState,
}

impl OrderExecution {
    /// Build the exchange-side controller for `plan`; nothing is submitted yet
    pub async fn create(
        exchange: &dyn Exchange,
        plan: &OrderPlan,
        pair: &CurrencyPair,
    ) -> Result<Self> {
        let handle = exchange
            .create_trailing_stop(plan.to_limit_order(pair), plan.trail_distance)
            .await?;
        Ok(Self::from_handle(handle))
    }

    pub fn from_handle(handle: Arc<dyn TrailingStopOrder>) -> Self {
        Self {
            handle,
            state: OrderState::Created,
        }
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    /// Shared handle, for out-of-band cancellation
    pub fn handle(&self) -> Arc<dyn TrailingStopOrder> {
        Arc::clone(&self.handle)
    }

    pub fn order(&self) -> LimitOrder {
        self.handle.order()
    }

    fn require_state(&self, expected: OrderState, action: &str) -> Result<()> {
        if self.state != expected {
            return Err(EngineError::Internal(format!(
                "cannot {action} an order in state {:?}",
                self.state
            )));
        }
        Ok(())
    }

    /// Submit the order. On failure the execution ends in `OpenFailed`
    /// and the exchange's error is returned.
    pub async fn open(&mut self) -> Result<()> {
        self.require_state(OrderState::Created, "open")?;
        match self.handle.open().await {
            Ok(()) => {
                self.state = OrderState::Opened;
                Ok(())
            }
            Err(e) => {
                self.state = OrderState::OpenFailed;
                Err(e)
            }
        }
    }

    /// Wait for the order to reach a terminal state
    pub async fn settle(&mut self) -> Result<OrderState> {
        self.require_state(OrderState::Opened, "settle")?;
        self.state = if self.handle.fill_or_cancel().await? {
            OrderState::Filled
        } else {
            OrderState::Cancelled
        };
        debug!(state = ?self.state, "Order settled");
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::MockTrailingStopOrder;
    use rust_decimal_macros::dec;

    fn order() -> LimitOrder {
        LimitOrder::bid(CurrencyPair::new("BTC", "USD"), dec!(1), dec!(100))
    }

    #[tokio::test]
    async fn test_open_then_fill() {
        let mut mock = MockTrailingStopOrder::new();
        mock.expect_open().times(1).returning(|| Ok(()));
        mock.expect_fill_or_cancel().times(1).returning(|| Ok(true));
        mock.expect_order().returning(order);

        let mut execution = OrderExecution::from_handle(Arc::new(mock));
        assert_eq!(execution.state(), OrderState::Created);
        execution.open().await.unwrap();
        assert_eq!(execution.state(), OrderState::Opened);
        assert_eq!(execution.settle().await.unwrap(), OrderState::Filled);
        assert_eq!(execution.state(), OrderState::Filled);
        assert_eq!(execution.order().quantity, dec!(1));
    }

    #[tokio::test]
    async fn test_rejected_open_is_terminal() {
        let mut mock = MockTrailingStopOrder::new();
        mock.expect_open()
            .returning(|| Err(EngineError::ExchangeRejected("insufficient funds".into())));

        let mut execution = OrderExecution::from_handle(Arc::new(mock));
        let err = execution.open().await.unwrap_err();
        assert!(err.is_reportable());
        assert_eq!(execution.state(), OrderState::OpenFailed);
        assert!(matches!(execution.settle().await, Err(EngineError::Internal(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_fill() {
        let mut mock = MockTrailingStopOrder::new();
        mock.expect_open().returning(|| Ok(()));
        mock.expect_fill_or_cancel().returning(|| Ok(false));

        let mut execution = OrderExecution::from_handle(Arc::new(mock));
        execution.open().await.unwrap();
        assert_eq!(execution.settle().await.unwrap(), OrderState::Cancelled);
        assert!(execution.open().await.is_err());
    }

    #[tokio::test]
    async fn test_settle_requires_open() {
        let mock = MockTrailingStopOrder::new();
        let mut execution = OrderExecution::from_handle(Arc::new(mock));
        assert!(execution.settle().await.is_err());
        assert_eq!(execution.state(), OrderState::Created);
    }
}
