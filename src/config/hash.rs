//! Declaration hashing for change detection.
//!
//! This module provides deterministic hashing of declarations and resource
//! descriptors to detect drift between runs and enable idempotent applies.

use sha2::{Digest, Sha256};

use crate::graph::{AttributeValue, ResourceDescriptor};

use super::spec::Declaration;

/// Hasher for computing declaration hashes.
#[derive(Debug, Default)]
pub struct SpecHasher;

impl SpecHasher {
    /// Creates a new declaration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the entire declaration.
    ///
    /// This hash changes when any part of the declaration changes.
    #[must_use]
    pub fn hash_declaration(&self, declaration: &Declaration) -> String {
        let mut hasher = Sha256::new();

        hasher.update(declaration.project.name.as_bytes());
        hasher.update(declaration.project.environment.as_bytes());
        hasher.update(declaration.provider.region.as_bytes());

        for descriptor in &declaration.descriptors {
            hasher.update(self.hash_descriptor(descriptor).as_bytes());
        }

        // Outputs are a BTreeMap, so iteration order is deterministic.
        for (name, value) in &declaration.outputs {
            hasher.update(name.as_bytes());
            hasher.update(canonical_value(value).as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a hash for a single resource descriptor.
    ///
    /// This hash is used to detect changes to individual resources.
    #[must_use]
    pub fn hash_descriptor(&self, descriptor: &ResourceDescriptor) -> String {
        let mut hasher = Sha256::new();

        hasher.update(descriptor.resource_type.as_bytes());
        hasher.update(descriptor.name.as_bytes());

        // Attributes are a BTreeMap, so iteration order is deterministic.
        for (key, value) in &descriptor.attributes {
            hasher.update(key.as_bytes());
            hasher.update(canonical_value(value).as_bytes());
        }

        for target in &descriptor.depends_on {
            hasher.update(target.to_string().as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes to determine if they are equal.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Canonical string form of an attribute value for hashing.
fn canonical_value(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Literal(scalar) => format!("L:{scalar}"),
        AttributeValue::Reference { target, attribute } => format!("R:{target}.{attribute}"),
        AttributeValue::Computed => String::from("C"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::RESOURCE_VECTOR_INDEX;

    fn create_test_descriptor(name: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(RESOURCE_VECTOR_INDEX, name)
            .with_literal("bucket_name", "media")
            .with_literal("dimension", 384_i64)
            .with_literal("distance_metric", "cosine")
    }

    #[test]
    fn test_descriptor_hash_deterministic() {
        let hasher = SpecHasher::new();
        let descriptor = create_test_descriptor("embeddings");

        let hash1 = hasher.hash_descriptor(&descriptor);
        let hash2 = hasher.hash_descriptor(&descriptor);

        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_different_descriptors_different_hash() {
        let hasher = SpecHasher::new();
        let d1 = create_test_descriptor("embeddings-a");
        let d2 = create_test_descriptor("embeddings-b");

        assert_ne!(hasher.hash_descriptor(&d1), hasher.hash_descriptor(&d2));
    }

    #[test]
    fn test_attribute_change_changes_hash() {
        let hasher = SpecHasher::new();
        let d1 = create_test_descriptor("embeddings");
        let d2 = create_test_descriptor("embeddings").with_literal("dimension", 768_i64);

        assert_ne!(hasher.hash_descriptor(&d1), hasher.hash_descriptor(&d2));
    }

    #[test]
    fn test_short_hash() {
        let hasher = SpecHasher::new();
        let full_hash = "abcdef1234567890abcdef1234567890";
        let short = hasher.short_hash(full_hash);

        assert_eq!(short, "abcdef12");
        assert_eq!(short.len(), 8);
    }

    #[test]
    fn test_hashes_match() {
        assert!(SpecHasher::hashes_match("abc123", "abc123"));
        assert!(!SpecHasher::hashes_match("abc123", "abc124"));
        assert!(!SpecHasher::hashes_match("abc123", "abc12"));
    }
}
