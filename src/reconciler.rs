//! Reconciliation orchestrator.
//!
//! Ties the pipeline together: validate the declaration, build the graph,
//! then preview, apply, report drift, resolve outputs, or destroy. The core
//! never retries failed nodes; transient-failure retries live in the
//! provider adapter.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{Declaration, DeclarationValidator, SpecHasher};
use crate::error::{ApplyError, Result, VectorformError};
use crate::graph::{AttributeValue, GraphBuilder, Scalar};
use crate::outputs::OutputResolver;
use crate::planner::{
    ApplyPlan, ApplyReport, DiffDetail, DiffEngine, ExecutionOptions, PlanExecutor, PlanNode,
    ResourceAction,
};
use crate::provider::{ProviderAdapter, ReadOutcome};

/// Placeholder shown for attributes whose value only exists after apply.
const KNOWN_AFTER_APPLY: &str = "(known after apply)";

/// Orchestrator for declaration reconciliation.
pub struct Reconciler {
    /// Provider adapter.
    provider: Arc<dyn ProviderAdapter>,
    /// Cancellation signal handed to the executor.
    cancel: watch::Receiver<bool>,
}

/// Outcome of an apply run.
#[derive(Debug)]
pub struct ApplyOutcome {
    /// The executed plan with final node states.
    pub plan: ApplyPlan,
    /// The run report.
    pub report: ApplyReport,
    /// Resolved outputs; `None` when the run did not fully converge.
    pub outputs: Option<BTreeMap<String, Scalar>>,
}

/// A resource whose observed state diverges from the declaration.
#[derive(Debug, Clone)]
pub struct DriftEntry {
    /// Resource address (`type.name`).
    pub address: String,
    /// Action that would converge the resource.
    pub action: ResourceAction,
    /// Per-attribute details.
    pub details: Vec<DiffDetail>,
}

/// Read-only drift report.
#[derive(Debug)]
pub struct DriftReport {
    /// Resources that diverge from the declaration.
    pub entries: Vec<DriftEntry>,
    /// Short declaration hash for display.
    pub spec_hash: String,
}

/// Result of a destroy run.
#[derive(Debug, Default)]
pub struct DestroyReport {
    /// Addresses deleted from the provider.
    pub deleted: Vec<String>,
    /// Addresses that did not exist on the provider.
    pub missing: Vec<String>,
}

impl Reconciler {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(provider: Arc<dyn ProviderAdapter>, cancel: watch::Receiver<bool>) -> Self {
        Self { provider, cancel }
    }

    /// Validates the declaration and builds an executable plan.
    ///
    /// # Errors
    ///
    /// Returns an error on validation failure or a bad graph.
    pub fn build_plan(&self, declaration: &Declaration) -> Result<ApplyPlan> {
        let validation = DeclarationValidator::new().validate(declaration)?;
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        let graph = GraphBuilder::new().build(declaration.descriptors.clone())?;
        let hasher = SpecHasher::new();
        let spec_hash = hasher.hash_declaration(declaration);
        debug!(
            "Plan built for declaration {} ({} resources)",
            hasher.short_hash(&spec_hash),
            graph.len()
        );

        Ok(ApplyPlan::from_graph(graph, &spec_hash))
    }

    /// Produces a read-only plan: predicts each node's action without
    /// mutating anything on the provider.
    ///
    /// Reference attributes resolve from dependency state observed during
    /// the same pass; values that only exist after apply are shown as
    /// `(known after apply)`.
    ///
    /// # Errors
    ///
    /// Returns an error on validation failure or a provider read failure.
    pub async fn preview(&self, declaration: &Declaration) -> Result<ApplyPlan> {
        let mut plan = self.build_plan(declaration)?;
        info!("Previewing {} resources", plan.len());

        let engine = DiffEngine::new();
        let mut resolved: Vec<Option<BTreeMap<String, Scalar>>> = vec![None; plan.len()];

        for idx in 0..plan.len() {
            let descriptor = plan.nodes[idx].descriptor.clone();
            let address = descriptor.address().to_string();

            let observed = match self
                .provider
                .read(&descriptor.resource_type, &descriptor.name)
                .await?
            {
                ReadOutcome::Found(state) => Some(state),
                ReadOutcome::NotFound => None,
            };

            let (desired, unresolved) = preview_attributes(&plan.nodes, idx, &resolved);
            let mut diff = engine.diff(
                &descriptor.resource_type,
                &address,
                &desired,
                observed.as_ref(),
            );
            for field in unresolved {
                diff.details.push(DiffDetail {
                    field,
                    observed: None,
                    desired: Some(String::from(KNOWN_AFTER_APPLY)),
                    forces_replacement: false,
                });
            }

            // Predicted state for downstream reference resolution: declared
            // values win, observed fills in computed attributes.
            let mut predicted = desired;
            if let Some(observed) = observed {
                for (key, value) in observed.attributes {
                    predicted.entry(key).or_insert(value);
                }
            }
            resolved[idx] = Some(predicted);

            plan.nodes[idx].action = Some(diff.action);
            plan.nodes[idx].details = diff.details;
        }

        Ok(plan)
    }

    /// Executes the declaration: builds the plan, drives it through the
    /// executor, and resolves outputs once everything converged.
    ///
    /// # Errors
    ///
    /// Returns an error on validation failure, an internal invariant
    /// violation during execution, or an unresolvable output expression
    /// after a converged run. Per-node provider failures are reported in
    /// the outcome, not as an error.
    pub async fn apply(
        &self,
        declaration: &Declaration,
        options: ExecutionOptions,
    ) -> Result<ApplyOutcome> {
        let mut plan = self.build_plan(declaration)?;
        info!(
            "Applying {} resources to provider '{}'",
            plan.len(),
            self.provider.provider_name()
        );

        let executor = PlanExecutor::new(Arc::clone(&self.provider), options, self.cancel.clone());
        let report = executor.execute(&mut plan).await?;

        let outputs = if report.is_converged() {
            Some(OutputResolver::new().resolve(&declaration.outputs, &report.resolved)?)
        } else {
            None
        };

        Ok(ApplyOutcome {
            plan,
            report,
            outputs,
        })
    }

    /// Produces a read-only drift report: the resources whose observed
    /// state diverges from the declaration.
    ///
    /// # Errors
    ///
    /// Returns an error on validation failure or a provider read failure.
    pub async fn check_drift(&self, declaration: &Declaration) -> Result<DriftReport> {
        let plan = self.preview(declaration).await?;
        let spec_hash = SpecHasher::new().short_hash(&plan.spec_hash);

        let entries: Vec<DriftEntry> = plan
            .nodes
            .iter()
            .filter(|node| node.action.is_some_and(|a| a != ResourceAction::NoOp))
            .map(|node| DriftEntry {
                address: node.address(),
                action: node.action.unwrap_or(ResourceAction::NoOp),
                details: node.details.clone(),
            })
            .collect();

        if entries.is_empty() {
            info!("No drift detected");
        } else {
            warn!("{} resources have drifted", entries.len());
        }

        Ok(DriftReport { entries, spec_hash })
    }

    /// Resolves outputs from live provider state, without applying.
    ///
    /// # Errors
    ///
    /// Returns an error when a referenced resource does not exist on the
    /// provider or a referenced attribute is absent.
    pub async fn resolve_outputs(
        &self,
        declaration: &Declaration,
    ) -> Result<BTreeMap<String, Scalar>> {
        let mut resolved: BTreeMap<String, BTreeMap<String, Scalar>> = BTreeMap::new();

        for expression in declaration.outputs.values() {
            let Some((target, _)) = expression.as_reference() else {
                continue;
            };
            let address = target.to_string();
            if resolved.contains_key(&address) {
                continue;
            }

            if let ReadOutcome::Found(state) = self
                .provider
                .read(&target.resource_type, &target.name)
                .await?
            {
                resolved.insert(address, state.attributes);
            }
        }

        OutputResolver::new().resolve(&declaration.outputs, &resolved)
    }

    /// Deletes every declared resource, dependents before dependencies.
    ///
    /// Resources already absent on the provider are reported, not failed.
    ///
    /// # Errors
    ///
    /// Returns an error on validation failure, a provider delete failure,
    /// or when cancellation arrives mid-run.
    pub async fn destroy(&self, declaration: &Declaration) -> Result<DestroyReport> {
        let plan = self.build_plan(declaration)?;
        info!("Destroying {} resources", plan.len());

        let mut report = DestroyReport::default();
        for node in plan.nodes.iter().rev() {
            if *self.cancel.borrow() {
                return Err(VectorformError::Apply(ApplyError::Aborted {
                    reason: String::from("cancelled during destroy"),
                }));
            }

            let descriptor = &node.descriptor;
            let address = node.address();
            match self
                .provider
                .read(&descriptor.resource_type, &descriptor.name)
                .await?
            {
                ReadOutcome::NotFound => {
                    debug!("{address} already absent");
                    report.missing.push(address);
                }
                ReadOutcome::Found(_) => {
                    self.provider
                        .delete(&descriptor.resource_type, &descriptor.name)
                        .await?;
                    info!("Destroyed {address}");
                    report.deleted.push(address);
                }
            }
        }

        Ok(report)
    }
}

impl DriftReport {
    /// Returns true if observed state matches the declaration everywhere.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves a node's attributes for preview, collecting the keys whose
/// values only exist after apply.
fn preview_attributes(
    nodes: &[PlanNode],
    idx: usize,
    resolved: &[Option<BTreeMap<String, Scalar>>],
) -> (BTreeMap<String, Scalar>, Vec<String>) {
    let descriptor = &nodes[idx].descriptor;
    let mut desired = BTreeMap::new();
    let mut unresolved = Vec::new();

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
                match found {
                    Some(scalar) => {
                        desired.insert(key.clone(), scalar);
                    }
                    None => unresolved.push(key.clone()),
                }
            }
            AttributeValue::Computed => {}
        }
    }

    (desired, unresolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProjectConfig, ProviderBackend, ProviderSettings};
    use crate::error::ProviderError;
    use crate::graph::{ResourceDescriptor, ResourceRef};
    use crate::provider::{MemoryProvider, MockProviderAdapter};

    fn declaration() -> Declaration {
        let bucket = ResourceDescriptor::new("vector_bucket", "b1")
            .with_literal("bucket_name", "media-vectors")
            .with_literal("encryption_type", "AES256");
        let index = ResourceDescriptor::new("vector_index", "i1")
            .with_literal("dimension", 384)
            .with_literal("distance_metric", "cosine")
            .with_reference(
                "bucket_name",
                ResourceRef::new("vector_bucket", "b1"),
                "bucket_name",
            );

        let mut outputs = BTreeMap::new();
        outputs.insert(
            String::from("bucket_arn"),
            AttributeValue::Reference {
                target: ResourceRef::new("vector_bucket", "b1"),
                attribute: String::from("arn"),
            },
        );

        Declaration {
            project: ProjectConfig {
                name: String::from("search-infra"),
                environment: String::from("dev"),
            },
            provider: ProviderSettings {
                backend: ProviderBackend::Memory,
                endpoint: None,
                region: String::from("us-east-1"),
            },
            descriptors: vec![bucket, index],
            outputs,
        }
    }

    fn reconciler(provider: &Arc<MemoryProvider>) -> Reconciler {
        let (_tx, rx) = watch::channel(false);
        Reconciler::new(Arc::clone(provider) as Arc<dyn ProviderAdapter>, rx)
    }

    #[tokio::test]
    async fn test_preview_is_read_only() {
        let provider = Arc::new(MemoryProvider::new());
        let plan = reconciler(&provider).preview(&declaration()).await.unwrap();

        assert_eq!(plan.action_count(ResourceAction::Create), 2);
        assert_eq!(provider.mutation_count(), 0);

        // The index's bucket_name only exists after the bucket applies...
        // except the bucket's bucket_name is declared, so preview resolves
        // it from the predicted state.
        let index = plan
            .nodes
            .iter()
            .find(|n| n.address() == "vector_index.i1")
            .unwrap();
        assert!(index
            .details
            .iter()
            .any(|d| d.field == "bucket_name"
                && d.desired.as_deref() == Some("media-vectors")));
    }

    #[tokio::test]
    async fn test_preview_surfaces_provider_read_failure() {
        let mut mock = MockProviderAdapter::new();
        mock.expect_read().returning(|_, _| {
            Err(VectorformError::Provider(ProviderError::api_error(
                503,
                "control plane unavailable",
            )))
        });

        let (_tx, rx) = watch::channel(false);
        let rec = Reconciler::new(Arc::new(mock), rx);

        let err = rec.preview(&declaration()).await.unwrap_err();
        assert!(matches!(
            err,
            VectorformError::Provider(ProviderError::ApiRequestFailed { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_converges_and_resolves_outputs() {
        let provider = Arc::new(MemoryProvider::new());
        let outcome = reconciler(&provider)
            .apply(&declaration(), ExecutionOptions::default())
            .await
            .unwrap();

        assert!(outcome.report.is_converged());
        let outputs = outcome.outputs.unwrap();
        assert_eq!(
            outputs.get("bucket_arn"),
            Some(&Scalar::from("vfrn:memory:vector_bucket/b1"))
        );
    }

    #[tokio::test]
    async fn test_second_apply_is_all_noops() {
        let provider = Arc::new(MemoryProvider::new());
        let rec = reconciler(&provider);

        rec.apply(&declaration(), ExecutionOptions::default())
            .await
            .unwrap();
        let mutations = provider.mutation_count();

        let outcome = rec
            .apply(&declaration(), ExecutionOptions::default())
            .await
            .unwrap();

        assert!(outcome.report.is_converged());
        assert_eq!(provider.mutation_count(), mutations);
        assert!(outcome
            .plan
            .nodes
            .iter()
            .all(|n| n.action == Some(ResourceAction::NoOp)));
    }

    #[tokio::test]
    async fn test_drift_detected_after_out_of_band_change() {
        let provider = Arc::new(MemoryProvider::new());
        let rec = reconciler(&provider);
        rec.apply(&declaration(), ExecutionOptions::default())
            .await
            .unwrap();

        // Someone changed the metric behind our back.
        let mut attrs = BTreeMap::new();
        attrs.insert(String::from("bucket_name"), Scalar::from("media-vectors"));
        attrs.insert(String::from("dimension"), Scalar::Int(384));
        attrs.insert(String::from("distance_metric"), Scalar::from("euclidean"));
        provider.seed("vector_index", "i1", attrs);

        let report = rec.check_drift(&declaration()).await.unwrap();
        assert!(!report.is_converged());
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].address, "vector_index.i1");
        assert_eq!(report.entries[0].action, ResourceAction::Replace);
    }

    #[tokio::test]
    async fn test_failed_run_yields_no_outputs() {
        let provider = Arc::new(MemoryProvider::new());
        provider.fail_mutations_for("vector_bucket.b1");

        let outcome = reconciler(&provider)
            .apply(&declaration(), ExecutionOptions::default())
            .await
            .unwrap();

        assert!(!outcome.report.is_converged());
        assert!(outcome.outputs.is_none());
        assert_eq!(outcome.report.skipped(), 1);
    }

    #[tokio::test]
    async fn test_destroy_removes_everything() {
        let provider = Arc::new(MemoryProvider::new());
        let rec = reconciler(&provider);
        rec.apply(&declaration(), ExecutionOptions::default())
            .await
            .unwrap();

        let report = rec.destroy(&declaration()).await.unwrap();
        assert_eq!(report.deleted.len(), 2);
        // Dependents go first.
        assert_eq!(report.deleted[0], "vector_index.i1");

        let outcome = provider.read("vector_bucket", "b1").await.unwrap();
        assert_eq!(outcome, ReadOutcome::NotFound);

        // A second destroy only finds absences.
        let again = rec.destroy(&declaration()).await.unwrap();
        assert_eq!(again.missing.len(), 2);
    }

    #[tokio::test]
    async fn test_outputs_resolve_from_live_state() {
        let provider = Arc::new(MemoryProvider::new());
        let rec = reconciler(&provider);
        rec.apply(&declaration(), ExecutionOptions::default())
            .await
            .unwrap();

        let outputs = rec.resolve_outputs(&declaration()).await.unwrap();
        assert_eq!(
            outputs.get("bucket_arn"),
            Some(&Scalar::from("vfrn:memory:vector_bucket/b1"))
        );
    }
}
