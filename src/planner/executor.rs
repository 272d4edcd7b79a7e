//! Plan executor: drives plan nodes to convergence through the provider.
//!
//! Nodes apply in topological order with a bounded worker pool. A node only
//! starts once every dependency has applied; its reference attributes are
//! resolved from the dependencies' final attribute sets at that point. A
//! failed node marks its transitive dependents skipped without calling the
//! provider, while independent subtrees continue.

use chrono::Utc;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ApplyError, Result, VectorformError};
use crate::graph::{AttributeValue, ResourceDescriptor, Scalar};
use crate::provider::{ProviderAdapter, ReadOutcome};

use super::diff::{DiffDetail, DiffEngine, ResourceAction};
use super::plan::{ApplyPlan, ApplyReport, NodeResult, NodeState};

/// Default number of concurrent provider operations.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Options controlling plan execution.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Maximum number of nodes applying at once.
    pub concurrency: usize,
    /// Whether a replace (destroy + recreate) may proceed.
    pub allow_replace: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            allow_replace: false,
        }
    }
}

/// Executor for apply plans.
pub struct PlanExecutor {
    /// Provider adapter shared by worker tasks.
    provider: Arc<dyn ProviderAdapter>,
    /// Execution options.
    options: ExecutionOptions,
    /// Cancellation signal; when it flips to true, no new node starts.
    cancel: watch::Receiver<bool>,
}

/// What a worker produced for one node.
struct NodeOutcome {
    /// Action the diff determined.
    action: ResourceAction,
    /// Per-attribute diff details.
    details: Vec<DiffDetail>,
    /// Final attribute set: desired overlaid with provider-returned values.
    attributes: BTreeMap<String, Scalar>,
}

impl PlanExecutor {
    /// Creates a new plan executor.
    #[must_use]
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        options: ExecutionOptions,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            provider,
            options,
            cancel,
        }
    }

    /// Executes an apply plan, mutating node states in place.
    ///
    /// Provider failures are recorded on the affected nodes and reported; the
    /// call itself only fails on an internal invariant violation (an
    /// unresolved reference attribute at apply time).
    ///
    /// # Errors
    ///
    /// Returns an error when a reference attribute cannot be resolved from
    /// an applied dependency.
    pub async fn execute(&self, plan: &mut ApplyPlan) -> Result<ApplyReport> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        info!(
            "Executing plan {run_id}: {} resources, concurrency {}",
            plan.len(),
            self.options.concurrency
        );

        let node_count = plan.len();
        let mut resolved: Vec<Option<BTreeMap<String, Scalar>>> = vec![None; node_count];
        let mut remaining_deps: Vec<usize> = plan.nodes.iter().map(|n| n.deps.len()).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = remaining_deps
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();
        let mut tasks: JoinSet<(usize, Result<NodeOutcome>)> = JoinSet::new();
        let mut fatal: Option<VectorformError> = None;

        loop {
            // Launch ready nodes up to the concurrency limit. Nothing new
            // starts after cancellation or a fatal error; in-flight calls
            // run to completion.
            while fatal.is_none() && !self.cancelled() && tasks.len() < self.options.concurrency {
                let Some(Reverse(idx)) = ready.pop() else {
                    break;
                };

                match resolve_attributes(&plan.nodes, idx, &resolved) {
                    Ok(desired) => {
                        plan.nodes[idx].state = NodeState::Applying;
                        debug!("Applying {}", plan.nodes[idx].address());

                        let provider = Arc::clone(&self.provider);
                        let descriptor = plan.nodes[idx].descriptor.clone();
                        let allow_replace = self.options.allow_replace;
                        tasks.spawn(async move {
                            let outcome =
                                apply_node(provider, &descriptor, desired, allow_replace).await;
                            (idx, outcome)
                        });
                    }
                    Err(e) => {
                        error!("Cannot resolve attributes for {}: {e}", plan.nodes[idx].address());
                        plan.nodes[idx].state = NodeState::Failed;
                        plan.nodes[idx].error = Some(e.to_string());
                        fatal = Some(e);
                    }
                }
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            let (idx, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    fatal = Some(VectorformError::internal(format!("worker task failed: {e}")));
                    continue;
                }
            };

            match outcome {
                Ok(outcome) => {
                    info!(
                        "Applied {} ({})",
                        plan.nodes[idx].address(),
                        outcome.action
                    );
                    plan.nodes[idx].state = NodeState::Applied;
                    plan.nodes[idx].action = Some(outcome.action);
                    plan.nodes[idx].details = outcome.details;
                    resolved[idx] = Some(outcome.attributes);

                    for dependent in plan.nodes[idx].dependents.clone() {
                        remaining_deps[dependent] -= 1;
                        if remaining_deps[dependent] == 0 {
                            ready.push(Reverse(dependent));
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to apply {}: {e}", plan.nodes[idx].address());
                    plan.nodes[idx].state = NodeState::Failed;
                    plan.nodes[idx].error = Some(e.to_string());
                    skip_dependents(plan, idx);
                }
            }
        }

        // Anything still pending was never reached: a cancellation arrived
        // or a fatal error stopped scheduling.
        for node in &mut plan.nodes {
            if node.state == NodeState::Pending {
                warn!("Skipping {} (run stopped before it started)", node.address());
                node.state = NodeState::Skipped;
            }
        }

        let report = build_report(plan, resolved, run_id, started_at);
        info!(
            "Plan finished: {} applied, {} failed, {} skipped",
            report.applied(),
            report.failed(),
            report.skipped()
        );

        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Returns true if cancellation has been signalled.
    fn cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// Resolves a node's attributes to concrete scalars.
///
/// Reference attributes read from the final attribute sets of the node's
/// applied dependencies. A reference that cannot be satisfied here escaped
/// graph validation and is an internal invariant violation.
fn resolve_attributes(
    nodes: &[super::plan::PlanNode],
    idx: usize,
    resolved: &[Option<BTreeMap<String, Scalar>>],
) -> Result<BTreeMap<String, Scalar>> {
    let descriptor = &nodes[idx].descriptor;
    let mut desired = BTreeMap::new();

    for (key, value) in &descriptor.attributes {
        match value {
            AttributeValue::Literal(scalar) => {
                desired.insert(key.clone(), scalar.clone());
            }
            AttributeValue::Reference { target, attribute } => {
                let found = nodes[idx].deps.iter().find_map(|&dep| {
                    if nodes[dep].descriptor.address() == *target {
                        resolved[dep]
                            .as_ref()
                            .and_then(|attrs| attrs.get(attribute).cloned())
                    } else {
                        None
                    }
                });

                let Some(scalar) = found else {
                    return Err(VectorformError::Apply(ApplyError::UnresolvedAttribute {
                        resource: descriptor.address().to_string(),
                        attribute: key.clone(),
                    }));
                };
                desired.insert(key.clone(), scalar);
            }
            AttributeValue::Computed => {
                // Filled by the provider; never sent as desired state.
            }
        }
    }

    Ok(desired)
}

/// Marks every transitive dependent of a failed node as skipped.
fn skip_dependents(plan: &mut ApplyPlan, failed: usize) {
    let mut stack = plan.nodes[failed].dependents.clone();
    while let Some(idx) = stack.pop() {
        if plan.nodes[idx].state == NodeState::Pending {
            warn!(
                "Skipping {} (dependency failed)",
                plan.nodes[idx].address()
            );
            plan.nodes[idx].state = NodeState::Skipped;
            plan.nodes[idx].error = Some(String::from("skipped due to dependency failure"));
            stack.extend(plan.nodes[idx].dependents.iter().copied());
        }
    }
}

/// Applies a single node through the provider.
async fn apply_node(
    provider: Arc<dyn ProviderAdapter>,
    descriptor: &ResourceDescriptor,
    desired: BTreeMap<String, Scalar>,
    allow_replace: bool,
) -> Result<NodeOutcome> {
    let address = descriptor.address().to_string();

    let observed = match provider
        .read(&descriptor.resource_type, &descriptor.name)
        .await?
    {
        ReadOutcome::Found(state) => Some(state),
        ReadOutcome::NotFound => None,
    };

    let diff = DiffEngine::new().diff(
        &descriptor.resource_type,
        &address,
        &desired,
        observed.as_ref(),
    );

    let returned = match diff.action {
        ResourceAction::NoOp => {
            debug!("{address} already converged");
            observed.map(|o| o.attributes).unwrap_or_default()
        }
        ResourceAction::Create => {
            provider
                .create(&descriptor.resource_type, &descriptor.name, &desired)
                .await?
                .attributes
        }
        ResourceAction::Update => {
            provider
                .update(&descriptor.resource_type, &descriptor.name, &desired)
                .await?
                .attributes
        }
        ResourceAction::Replace => {
            if !allow_replace {
                let cause = diff.replacement_cause();
                return Err(VectorformError::Apply(ApplyError::DriftConflict {
                    resource: address,
                    field: cause.map_or_else(String::new, |c| c.field.clone()),
                    observed: cause
                        .and_then(|c| c.observed.clone())
                        .unwrap_or_else(|| String::from("(absent)")),
                    desired: cause
                        .and_then(|c| c.desired.clone())
                        .unwrap_or_else(|| String::from("(absent)")),
                }));
            }

            warn!("Replacing {address}: immutable attribute changed");
            provider
                .delete(&descriptor.resource_type, &descriptor.name)
                .await?;
            provider
                .create(&descriptor.resource_type, &descriptor.name, &desired)
                .await?
                .attributes
        }
    };

    // Provider-returned values win so computed attributes flow downstream.
    let mut attributes = desired;
    attributes.extend(returned);

    Ok(NodeOutcome {
        action: diff.action,
        details: diff.details,
        attributes,
    })
}

/// Builds the final report from node states and resolved attributes.
fn build_report(
    plan: &ApplyPlan,
    resolved: Vec<Option<BTreeMap<String, Scalar>>>,
    run_id: Uuid,
    started_at: chrono::DateTime<Utc>,
) -> ApplyReport {
    let results = plan
        .nodes
        .iter()
        .map(|node| NodeResult {
            address: node.address(),
            action: node.action,
            state: node.state,
            error: node.error.clone(),
        })
        .collect();

    let resolved_map = plan
        .nodes
        .iter()
        .zip(resolved)
        .filter_map(|(node, attrs)| attrs.map(|a| (node.address(), a)))
        .collect();

    ApplyReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        results,
        resolved: resolved_map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, ResourceRef};
    use crate::provider::MemoryProvider;

    fn bucket(name: &str) -> ResourceDescriptor {
        ResourceDescriptor::new("vector_bucket", name)
            .with_literal("bucket_name", name)
            .with_literal("encryption_type", "AES256")
    }

    fn index_on(name: &str, bucket_name: &str) -> ResourceDescriptor {
        ResourceDescriptor::new("vector_index", name)
            .with_literal("dimension", 384)
            .with_literal("distance_metric", "cosine")
            .with_reference(
                "bucket_name",
                ResourceRef::new("vector_bucket", bucket_name),
                "bucket_name",
            )
    }

    fn plan_for(descriptors: Vec<ResourceDescriptor>) -> ApplyPlan {
        let graph = GraphBuilder::new().build(descriptors).unwrap();
        ApplyPlan::from_graph(graph, "test")
    }

    fn executor(provider: Arc<MemoryProvider>, allow_replace: bool) -> PlanExecutor {
        let (_tx, rx) = watch::channel(false);
        PlanExecutor::new(
            provider,
            ExecutionOptions {
                concurrency: 2,
                allow_replace,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn test_apply_resolves_reference_from_dependency() {
        let provider = Arc::new(MemoryProvider::new());
        let mut plan = plan_for(vec![index_on("i1", "b1"), bucket("b1")]);

        let report = executor(Arc::clone(&provider), false)
            .execute(&mut plan)
            .await
            .unwrap();

        assert!(report.is_converged());
        assert_eq!(provider.mutation_count(), 2);

        // The index received the bucket's resolved bucket_name.
        let index_attrs = &report.resolved["vector_index.i1"];
        assert_eq!(index_attrs.get("bucket_name"), Some(&Scalar::from("b1")));
        assert!(index_attrs.contains_key("arn"));
    }

    #[tokio::test]
    async fn test_reapply_is_idempotent() {
        let provider = Arc::new(MemoryProvider::new());

        let mut first = plan_for(vec![bucket("b1"), index_on("i1", "b1")]);
        executor(Arc::clone(&provider), false)
            .execute(&mut first)
            .await
            .unwrap();
        let mutations_after_first = provider.mutation_count();

        let mut second = plan_for(vec![bucket("b1"), index_on("i1", "b1")]);
        let report = executor(Arc::clone(&provider), false)
            .execute(&mut second)
            .await
            .unwrap();

        assert!(report.is_converged());
        assert_eq!(provider.mutation_count(), mutations_after_first);
        assert!(second
            .nodes
            .iter()
            .all(|n| n.action == Some(ResourceAction::NoOp)));
    }

    #[tokio::test]
    async fn test_existing_bucket_noop_while_index_created() {
        let provider = Arc::new(MemoryProvider::new());
        let mut seeded = BTreeMap::new();
        seeded.insert(String::from("bucket_name"), Scalar::from("b1"));
        seeded.insert(String::from("encryption_type"), Scalar::from("AES256"));
        provider.seed("vector_bucket", "b1", seeded);

        // The bucket already matches the declaration; only the index is new.
        let mut plan = plan_for(vec![bucket("b1"), index_on("i1", "b1")]);
        let report = executor(Arc::clone(&provider), false)
            .execute(&mut plan)
            .await
            .unwrap();

        assert!(report.is_converged());
        assert_eq!(plan.nodes[0].action, Some(ResourceAction::NoOp));
        assert_eq!(plan.nodes[1].action, Some(ResourceAction::Create));
        // Only the index create hit the provider.
        assert_eq!(provider.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_dependency_skips_dependent() {
        let provider = Arc::new(MemoryProvider::new());
        provider.fail_mutations_for("vector_bucket.b1");

        let mut plan = plan_for(vec![bucket("b1"), index_on("i1", "b1"), bucket("b2")]);
        let report = executor(Arc::clone(&provider), false)
            .execute(&mut plan)
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        // The independent bucket still converged.
        assert_eq!(report.applied(), 1);
        assert!(report.is_partial());

        // Only the failed create and the independent create hit the
        // provider; the skipped index was never sent.
        assert_eq!(provider.mutation_count(), 2);

        let skipped = plan
            .nodes
            .iter()
            .find(|n| n.address() == "vector_index.i1")
            .unwrap();
        assert_eq!(skipped.state, NodeState::Skipped);
    }

    #[tokio::test]
    async fn test_replace_requires_approval() {
        let provider = Arc::new(MemoryProvider::new());
        let mut seeded = BTreeMap::new();
        seeded.insert(String::from("bucket_name"), Scalar::from("b1"));
        seeded.insert(String::from("encryption_type"), Scalar::from("KMS"));
        provider.seed("vector_bucket", "b1", seeded);

        // Declared AES256 vs observed KMS: immutable change.
        let mut plan = plan_for(vec![bucket("b1")]);
        let report = executor(Arc::clone(&provider), false)
            .execute(&mut plan)
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        let error = plan.nodes[0].error.as_deref().unwrap();
        assert!(error.contains("encryption_type"));
        assert!(error.contains("--allow-replace"));
        // The conflict was detected before any mutation.
        assert_eq!(provider.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_replace_when_allowed_deletes_then_creates() {
        let provider = Arc::new(MemoryProvider::new());
        let mut seeded = BTreeMap::new();
        seeded.insert(String::from("bucket_name"), Scalar::from("b1"));
        seeded.insert(String::from("encryption_type"), Scalar::from("KMS"));
        provider.seed("vector_bucket", "b1", seeded);

        let mut plan = plan_for(vec![bucket("b1")]);
        let report = executor(Arc::clone(&provider), true)
            .execute(&mut plan)
            .await
            .unwrap();

        assert!(report.is_converged());
        assert_eq!(plan.nodes[0].action, Some(ResourceAction::Replace));
        // One delete plus one create.
        assert_eq!(provider.mutation_count(), 2);

        let attrs = &report.resolved["vector_bucket.b1"];
        assert_eq!(attrs.get("encryption_type"), Some(&Scalar::from("AES256")));
    }

    #[tokio::test]
    async fn test_cancellation_skips_pending_nodes() {
        let provider = Arc::new(MemoryProvider::new());
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let executor = PlanExecutor::new(
            Arc::clone(&provider) as Arc<dyn ProviderAdapter>,
            ExecutionOptions::default(),
            rx,
        );

        let mut plan = plan_for(vec![bucket("b1"), index_on("i1", "b1")]);
        let report = executor.execute(&mut plan).await.unwrap();

        assert_eq!(report.skipped(), 2);
        assert_eq!(provider.mutation_count(), 0);
    }
}
