//! Apply plan types and construction.
//!
//! This module defines the executable form of a resource graph: one plan
//! node per resource in topological order, each carrying its execution
//! state, plus the report produced by a finished run.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::graph::{ResourceDescriptor, ResourceGraph, Scalar};

use super::diff::{DiffDetail, ResourceAction};

/// Execution state of a single plan node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Not yet started.
    Pending,
    /// Provider call in flight.
    Applying,
    /// Converged successfully (including no-op).
    Applied,
    /// Provider call failed; terminal.
    Failed,
    /// Never started because a dependency failed or the run was cancelled;
    /// terminal.
    Skipped,
}

/// A single node of an apply plan.
#[derive(Debug, Clone)]
pub struct PlanNode {
    /// The resource descriptor.
    pub descriptor: ResourceDescriptor,
    /// Indices of nodes this node depends on.
    pub deps: Vec<usize>,
    /// Indices of nodes that depend on this node.
    pub dependents: Vec<usize>,
    /// Execution state.
    pub state: NodeState,
    /// Action determined by the diff; `None` until the node is examined.
    pub action: Option<ResourceAction>,
    /// Per-attribute diff details.
    pub details: Vec<DiffDetail>,
    /// Failure reason, when `state` is `Failed`.
    pub error: Option<String>,
}

/// An executable apply plan in topological order.
#[derive(Debug)]
pub struct ApplyPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Declaration hash this plan is based on.
    pub spec_hash: String,
    /// Plan nodes in apply order.
    pub nodes: Vec<PlanNode>,
}

/// Result of a finished run for a single node.
#[derive(Debug, Clone)]
pub struct NodeResult {
    /// Resource address (`type.name`).
    pub address: String,
    /// Action the node took, when it got far enough to be examined.
    pub action: Option<ResourceAction>,
    /// Final state.
    pub state: NodeState,
    /// Failure reason, when the node failed.
    pub error: Option<String>,
}

/// Report produced by a finished apply run.
#[derive(Debug)]
pub struct ApplyReport {
    /// Unique identifier of this apply run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-node results in plan order.
    pub results: Vec<NodeResult>,
    /// Resolved attributes per applied resource, keyed by address.
    pub resolved: BTreeMap<String, BTreeMap<String, Scalar>>,
}

impl ApplyPlan {
    /// Creates a plan from a validated graph.
    #[must_use]
    pub fn from_graph(graph: ResourceGraph, spec_hash: &str) -> Self {
        let nodes = graph
            .nodes
            .into_iter()
            .map(|node| PlanNode {
                descriptor: node.descriptor,
                deps: node.deps,
                dependents: node.dependents,
                state: NodeState::Pending,
                action: None,
                details: Vec::new(),
                error: None,
            })
            .collect();

        Self {
            created_at: Utc::now(),
            spec_hash: spec_hash.to_string(),
            nodes,
        }
    }

    /// Returns the number of nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the plan has no nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Counts nodes whose determined action matches.
    #[must_use]
    pub fn action_count(&self, action: ResourceAction) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.action == Some(action))
            .count()
    }

    /// Returns true if any node requires a provider mutation.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| n.action.is_some_and(|a| a != ResourceAction::NoOp))
    }

    /// Counts nodes in the given state.
    #[must_use]
    pub fn state_count(&self, state: NodeState) -> usize {
        self.nodes.iter().filter(|n| n.state == state).count()
    }
}

impl PlanNode {
    /// Returns this node's resource address (`type.name`).
    #[must_use]
    pub fn address(&self) -> String {
        self.descriptor.address().to_string()
    }

    /// Returns a human-readable description of the node's action.
    #[must_use]
    pub fn description(&self) -> String {
        match self.action {
            Some(action) => format!("{action} {}", self.address()),
            None => format!("examine {}", self.address()),
        }
    }
}

impl ApplyReport {
    /// Counts results in the given state.
    #[must_use]
    pub fn state_count(&self, state: NodeState) -> usize {
        self.results.iter().filter(|r| r.state == state).count()
    }

    /// Number of nodes that converged.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.state_count(NodeState::Applied)
    }

    /// Number of nodes that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.state_count(NodeState::Failed)
    }

    /// Number of nodes skipped because of a failed dependency or
    /// cancellation.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.state_count(NodeState::Skipped)
    }

    /// Returns true if every node converged.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    /// Returns true if some nodes converged while others were skipped or
    /// failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.applied() > 0 && !self.is_converged()
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ApplyPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.has_changes() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Apply plan ({} resources):", self.nodes.len())?;
        for node in &self.nodes {
            writeln!(f, "  {}", node.description())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, ResourceRef};

    fn sample_plan() -> ApplyPlan {
        let bucket =
            ResourceDescriptor::new("vector_bucket", "b1").with_literal("bucket_name", "b1");
        let index = ResourceDescriptor::new("vector_index", "i1").with_reference(
            "bucket_name",
            ResourceRef::new("vector_bucket", "b1"),
            "bucket_name",
        );
        let graph = GraphBuilder::new().build(vec![bucket, index]).unwrap();
        ApplyPlan::from_graph(graph, "deadbeef")
    }

    #[test]
    fn test_plan_preserves_topological_order() {
        let plan = sample_plan();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.nodes[0].address(), "vector_bucket.b1");
        assert_eq!(plan.nodes[1].deps, vec![0]);
        assert!(plan.nodes.iter().all(|n| n.state == NodeState::Pending));
    }

    #[test]
    fn test_has_changes_reflects_actions() {
        let mut plan = sample_plan();
        assert!(!plan.has_changes());

        plan.nodes[0].action = Some(ResourceAction::NoOp);
        plan.nodes[1].action = Some(ResourceAction::Create);
        assert!(plan.has_changes());
        assert_eq!(plan.action_count(ResourceAction::Create), 1);
    }
}
