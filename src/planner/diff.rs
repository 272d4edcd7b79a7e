//! Diff engine for comparing desired vs observed state.
//!
//! This module computes the action required to converge a single resource:
//! create it, update mutable attributes in place, replace it when an
//! immutable attribute changed, or do nothing.

use std::collections::BTreeMap;
use tracing::debug;

use crate::graph::{ObservedState, Scalar};
use crate::provider::types::is_immutable;

/// Engine for computing per-resource diffs.
#[derive(Debug, Default)]
pub struct DiffEngine;

/// The action required to converge a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    /// Resource does not exist and must be created.
    Create,
    /// Mutable attributes differ and can change in place.
    Update,
    /// An immutable attribute differs; destroy and recreate.
    Replace,
    /// Desired and observed state match.
    NoOp,
}

/// Detail about a single differing attribute.
#[derive(Debug, Clone)]
pub struct DiffDetail {
    /// Attribute that differs.
    pub field: String,
    /// Value observed on the provider.
    pub observed: Option<String>,
    /// Value in the declaration.
    pub desired: Option<String>,
    /// Whether changing this attribute forces replacement.
    pub forces_replacement: bool,
}

/// Diff for a single resource.
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    /// Resource address (`type.name`).
    pub address: String,
    /// Action required to converge.
    pub action: ResourceAction,
    /// Per-attribute details.
    pub details: Vec<DiffDetail>,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the diff for one resource.
    ///
    /// `desired` must be fully resolved scalars. Attributes present only in
    /// the observed state (provider-computed values such as `arn`) are never
    /// treated as differences.
    #[must_use]
    pub fn diff(
        &self,
        resource_type: &str,
        address: &str,
        desired: &BTreeMap<String, Scalar>,
        observed: Option<&ObservedState>,
    ) -> ResourceDiff {
        let Some(observed) = observed else {
            debug!("Resource {address} not found on provider, will create");
            return ResourceDiff {
                address: address.to_string(),
                action: ResourceAction::Create,
                details: desired
                    .iter()
                    .map(|(field, value)| DiffDetail {
                        field: field.clone(),
                        observed: None,
                        desired: Some(value.to_string()),
                        forces_replacement: false,
                    })
                    .collect(),
            };
        };

        let mut details = Vec::new();
        for (field, desired_value) in desired {
            let observed_value = observed.get(field);
            if observed_value != Some(desired_value) {
                details.push(DiffDetail {
                    field: field.clone(),
                    observed: observed_value.map(Scalar::to_string),
                    desired: Some(desired_value.to_string()),
                    forces_replacement: is_immutable(resource_type, field),
                });
            }
        }

        let action = if details.is_empty() {
            ResourceAction::NoOp
        } else if details.iter().any(|d| d.forces_replacement) {
            ResourceAction::Replace
        } else {
            ResourceAction::Update
        };

        debug!("Resource {address}: {action} ({} changed fields)", details.len());

        ResourceDiff {
            address: address.to_string(),
            action,
            details,
        }
    }
}

impl ResourceDiff {
    /// Returns the first detail that forces replacement, if any.
    #[must_use]
    pub fn replacement_cause(&self) -> Option<&DiffDetail> {
        self.details.iter().find(|d| d.forces_replacement)
    }

    /// Returns true if this diff requires a provider mutation.
    #[must_use]
    pub const fn requires_mutation(&self) -> bool {
        !matches!(self.action, ResourceAction::NoOp)
    }
}

impl std::fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::NoOp => "no-op",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ResourceDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.address, self.action)?;
        if !self.details.is_empty() {
            write!(f, " (")?;
            for (i, detail) in self.details.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", detail.field)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
