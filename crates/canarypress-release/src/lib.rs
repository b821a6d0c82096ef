//! Release state reconciliation and weighted routing plans.
//!
//! The [`Reconciler`] polls the backend and rebuilds the canary rollout
//! picture from scratch each tick; the [`planner`] turns a desired traffic
//! percentage into the fixed-point weight plan the backend expects.

mod error;
pub mod planner;
mod reconciler;

pub use error::{ReleaseError, ReleaseResult};
pub use planner::{WeightPlan, WeightedTarget, TOTAL_WEIGHT};
pub use reconciler::{Reconciler, RefreshDelta, ReleaseState, PROD_STAGE};
