//! Planning and execution of resource convergence.
//!
//! This module contains the diff engine (desired vs observed), the apply
//! plan built from a validated graph, and the executor that drives plan
//! nodes through the provider adapter in dependency order.

mod diff;
mod plan;
mod executor;

pub use diff::{DiffDetail, DiffEngine, ResourceAction, ResourceDiff};
pub use plan::{ApplyPlan, ApplyReport, NodeResult, NodeState, PlanNode};
pub use executor::{DEFAULT_CONCURRENCY, ExecutionOptions, PlanExecutor};
