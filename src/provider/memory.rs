//! In-memory provider adapter.
//!
//! Backs local runs and tests with a process-local resource table. Mutation
//! calls are counted so idempotency can be asserted, and individual
//! resources can be armed to fail for error-path testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{ProviderError, Result, VectorformError};
use crate::graph::{ObservedState, Scalar};

use super::adapter::{ProviderAdapter, ReadOutcome};

/// In-memory vector-store provider.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    /// Guarded resource table and bookkeeping.
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Stored resources keyed by `(type, name)`.
    resources: BTreeMap<(String, String), BTreeMap<String, Scalar>>,
    /// Number of create/update/delete calls served.
    mutations: usize,
    /// Addresses (`type.name`) armed to fail their next mutation.
    fail_addresses: BTreeSet<String>,
}

impl MemoryProvider {
    /// Creates an empty in-memory provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of mutation calls (create/update/delete) served
    /// so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.inner.lock().expect("provider lock poisoned").mutations
    }

    /// Arms the given `type.name` address to fail its next mutation call.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail_mutations_for(&self, address: impl Into<String>) {
        self.inner
            .lock()
            .expect("provider lock poisoned")
            .fail_addresses
            .insert(address.into());
    }

    /// Seeds a resource as if it had been created in a previous run.
    ///
    /// Computed attributes are filled in the same way `create` fills them.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn seed(&self, resource_type: &str, name: &str, attributes: BTreeMap<String, Scalar>) {
        let stored = Self::with_computed(resource_type, name, attributes);
        self.inner
            .lock()
            .expect("provider lock poisoned")
            .resources
            .insert((resource_type.to_string(), name.to_string()), stored);
    }

    /// Adds provider-computed attributes to a stored attribute set.
    fn with_computed(
        resource_type: &str,
        name: &str,
        mut attributes: BTreeMap<String, Scalar>,
    ) -> BTreeMap<String, Scalar> {
        attributes.insert(
            String::from("arn"),
            Scalar::String(format!("vfrn:memory:{resource_type}/{name}")),
        );
        attributes
    }

    /// Fails the call if the address has been armed for failure.
    fn check_armed_failure(inner: &mut Inner, resource_type: &str, name: &str) -> Result<()> {
        let address = format!("{resource_type}.{name}");
        if inner.fail_addresses.remove(&address) {
            return Err(VectorformError::Provider(ProviderError::ApiRequestFailed {
                status: 500,
                message: format!("injected failure for {address}"),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MemoryProvider {
    async fn create(
        &self,
        resource_type: &str,
        name: &str,
        attributes: &BTreeMap<String, Scalar>,
    ) -> Result<ObservedState> {
        let mut inner = self.inner.lock().expect("provider lock poisoned");
        inner.mutations += 1;
        Self::check_armed_failure(&mut inner, resource_type, name)?;

        let stored = Self::with_computed(resource_type, name, attributes.clone());
        inner.resources.insert(
            (resource_type.to_string(), name.to_string()),
            stored.clone(),
        );

        debug!("memory: created {resource_type}.{name}");
        Ok(ObservedState::new(stored))
    }

    async fn read(&self, resource_type: &str, name: &str) -> Result<ReadOutcome> {
        let inner = self.inner.lock().expect("provider lock poisoned");
        Ok(inner
            .resources
            .get(&(resource_type.to_string(), name.to_string()))
            .map_or(ReadOutcome::NotFound, |attrs| {
                ReadOutcome::Found(ObservedState::new(attrs.clone()))
            }))
    }

    async fn update(
        &self,
        resource_type: &str,
        name: &str,
        attributes: &BTreeMap<String, Scalar>,
    ) -> Result<ObservedState> {
        let mut inner = self.inner.lock().expect("provider lock poisoned");
        inner.mutations += 1;
        Self::check_armed_failure(&mut inner, resource_type, name)?;

        let key = (resource_type.to_string(), name.to_string());
        let Some(existing) = inner.resources.get_mut(&key) else {
            return Err(VectorformError::Provider(ProviderError::ResourceNotFound {
                resource_type: resource_type.to_string(),
                name: name.to_string(),
            }));
        };

        for (k, v) in attributes {
            existing.insert(k.clone(), v.clone());
        }
        let stored = existing.clone();

        debug!("memory: updated {resource_type}.{name}");
        Ok(ObservedState::new(stored))
    }

    async fn delete(&self, resource_type: &str, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("provider lock poisoned");
        inner.mutations += 1;
        Self::check_armed_failure(&mut inner, resource_type, name)?;

        let key = (resource_type.to_string(), name.to_string());
        if inner.resources.remove(&key).is_none() {
            return Err(VectorformError::Provider(ProviderError::ResourceNotFound {
                resource_type: resource_type.to_string(),
                name: name.to_string(),
            }));
        }

        debug!("memory: deleted {resource_type}.{name}");
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::RESOURCE_VECTOR_BUCKET;

    fn bucket_attrs() -> BTreeMap<String, Scalar> {
        let mut attrs = BTreeMap::new();
        attrs.insert(String::from("bucket_name"), Scalar::from("media-vectors"));
        attrs
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let provider = MemoryProvider::new();
        let state = provider
            .create(RESOURCE_VECTOR_BUCKET, "b1", &bucket_attrs())
            .await
            .unwrap();
        assert!(state.get("arn").is_some());

        let outcome = provider.read(RESOURCE_VECTOR_BUCKET, "b1").await.unwrap();
        let observed = outcome.found().unwrap();
        assert_eq!(observed.get("bucket_name"), Some(&Scalar::from("media-vectors")));
    }

    #[tokio::test]
    async fn test_read_missing_returns_not_found() {
        let provider = MemoryProvider::new();
        let outcome = provider.read(RESOURCE_VECTOR_BUCKET, "nope").await.unwrap();
        assert_eq!(outcome, ReadOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_update_merges_attributes() {
        let provider = MemoryProvider::new();
        provider
            .create(RESOURCE_VECTOR_BUCKET, "b1", &bucket_attrs())
            .await
            .unwrap();

        let mut changes = BTreeMap::new();
        changes.insert(String::from("tags.env"), Scalar::from("prod"));
        let state = provider
            .update(RESOURCE_VECTOR_BUCKET, "b1", &changes)
            .await
            .unwrap();

        assert_eq!(state.get("tags.env"), Some(&Scalar::from("prod")));
        assert_eq!(state.get("bucket_name"), Some(&Scalar::from("media-vectors")));
    }

    #[tokio::test]
    async fn test_delete_missing_is_error() {
        let provider = MemoryProvider::new();
        let err = provider
            .delete(RESOURCE_VECTOR_BUCKET, "nope")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VectorformError::Provider(ProviderError::ResourceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_mutation_counting_and_failure_injection() {
        let provider = MemoryProvider::new();
        provider.fail_mutations_for("vector_bucket.b1");

        let err = provider
            .create(RESOURCE_VECTOR_BUCKET, "b1", &bucket_attrs())
            .await
            .unwrap_err();
        assert!(matches!(err, VectorformError::Provider(_)));
        assert_eq!(provider.mutation_count(), 1);

        // The armed failure is consumed; the retry succeeds.
        provider
            .create(RESOURCE_VECTOR_BUCKET, "b1", &bucket_attrs())
            .await
            .unwrap();
        assert_eq!(provider.mutation_count(), 2);
    }
}
