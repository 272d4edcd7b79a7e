//! Provider adapter trait definition.
//!
//! The core treats the provider as an injected capability: it drives
//! create/read/update/delete calls through this trait and never talks to a
//! control plane directly. Retry policy, if any, belongs to the adapter
//! implementation, not to the reconciler.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::graph::{ObservedState, Scalar};

/// Outcome of a read call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The resource exists; its observed attributes are attached.
    Found(ObservedState),
    /// The resource does not exist on the provider.
    NotFound,
}

/// Capability surface for a vector-store control plane.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Creates a resource and returns its observed state, including
    /// provider-computed attributes.
    async fn create(
        &self,
        resource_type: &str,
        name: &str,
        attributes: &BTreeMap<String, Scalar>,
    ) -> Result<ObservedState>;

    /// Reads the current state of a resource.
    async fn read(&self, resource_type: &str, name: &str) -> Result<ReadOutcome>;

    /// Updates a resource's mutable attributes in place and returns the
    /// resulting observed state.
    async fn update(
        &self,
        resource_type: &str,
        name: &str,
        attributes: &BTreeMap<String, Scalar>,
    ) -> Result<ObservedState>;

    /// Deletes a resource. Deleting a resource that does not exist is an
    /// error; callers that want tolerant deletes must check first.
    async fn delete(&self, resource_type: &str, name: &str) -> Result<()>;

    /// Returns the adapter's backend name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

impl ReadOutcome {
    /// Returns the observed state if the resource was found.
    #[must_use]
    pub const fn found(&self) -> Option<&ObservedState> {
        match self {
            Self::Found(state) => Some(state),
            Self::NotFound => None,
        }
    }
}
