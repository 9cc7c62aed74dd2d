use std::sync::Arc;

use async_trait::async_trait;

use crate::common::errors::Result;
use crate::common::types::CurrencyPair;
use crate::strategy::types::CycleOutcome;

/// A strategy instance the scheduler can drive
///
/// # Implementation Notes
///
/// - `find_opportunities` runs one decision cycle; overlapping calls on the
///   same instance must not both act
/// - `cancel` may be called from any task, at any time, more than once
/// - Once cancelled, a strategy never opens another order
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Unique identifier for this strategy
    fn name(&self) -> &str;

    /// Market this strategy trades
    fn pair(&self) -> &CurrencyPair;

    /// Run one decision cycle
    ///
    /// Exchange rejections are reported and folded into the outcome;
    /// anything else comes back as `Err` for the scheduler to log.
    async fn find_opportunities(&self) -> Result<CycleOutcome>;

    /// Stop placing orders and cancel the open position, if any
    async fn cancel(&self);

    fn is_running(&self) -> bool;
}

/// Boxed strategy for dynamic dispatch
pub type BoxedStrategy = Box<dyn Strategy>;

/// Strategy shared between the scheduler and a shutdown path
pub type SharedStrategy = Arc<dyn Strategy>;
