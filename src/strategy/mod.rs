//! Strategy module for allocation decision making
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Scheduler (one tokio task per strategy)                    │
//! │       │ tick                                                │
//! │       ▼                                                     │
//! │  AllocationStrategy.find_opportunities()                    │
//! │    - in-flight guard, cooldown, snapshot of the market      │
//! │    - AllocationPolicy → Option<OrderPlan> (buy, else sell)  │
//! │       │                                                     │
//! │       ▼ (if plan)                                           │
//! │  OrderExecution                                             │
//! │    Created → Opened → Filled | Cancelled | OpenFailed       │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  settle wait, re-read balances, report, start cooldown      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`Strategy`]: What the scheduler drives
//! - [`AllocationStrategy`]: The decision engine for one pair
//! - [`AllocationPolicy`]: FixedTarget, PercentBand or TieredSchedule
//! - [`OrderExecution`]: Trailing-stop order lifecycle
//! - [`Scheduler`]: Cadence, failure budget and shutdown

pub mod engine;
pub mod execution;
pub mod fixed_target;
pub mod percent_band;
pub mod policy;
pub mod scheduler;
pub mod tiered;
pub mod traits;
pub mod types;

pub use engine::AllocationStrategy;
pub use execution::{OrderExecution, OrderState};
pub use fixed_target::FixedTarget;
pub use percent_band::{PercentBand, TargetPercent, TargetPoint};
pub use policy::AllocationPolicy;
pub use scheduler::Scheduler;
pub use tiered::{TieredParams, TieredSchedule};
pub use traits::{BoxedStrategy, SharedStrategy, Strategy};
pub use types::{AllocationSplit, CycleOutcome, FillSummary, MarketSnapshot, OrderMode, OrderPlan};
