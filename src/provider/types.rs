//! Resource catalog for the vector-store provider.
//!
//! Defines the resource types the engine knows how to provision, their
//! immutable attribute sets, and the value constraints the validator
//! enforces before any provider call.

/// Resource type identifier for a vector-capable storage bucket.
pub const RESOURCE_VECTOR_BUCKET: &str = "vector_bucket";

/// Resource type identifier for a vector search index.
pub const RESOURCE_VECTOR_INDEX: &str = "vector_index";

/// All resource types this engine can provision.
pub const KNOWN_RESOURCE_TYPES: &[&str] = &[RESOURCE_VECTOR_BUCKET, RESOURCE_VECTOR_INDEX];

/// Bucket attributes that cannot change in place.
const BUCKET_IMMUTABLE: &[&str] = &["bucket_name", "encryption_type"];

/// Index attributes that cannot change in place.
const INDEX_IMMUTABLE: &[&str] = &["bucket_name", "dimension", "distance_metric", "data_type"];

/// Distance metrics accepted for a vector index.
pub const VALID_DISTANCE_METRICS: &[&str] = &["cosine", "euclidean"];

/// Vector element data types accepted for a vector index.
pub const VALID_DATA_TYPES: &[&str] = &["float32"];

/// Encryption types accepted for a vector bucket.
pub const VALID_ENCRYPTION_TYPES: &[&str] = &["AES256", "KMS"];

/// Minimum accepted index dimension.
pub const MIN_DIMENSION: i64 = 1;

/// Maximum accepted index dimension.
pub const MAX_DIMENSION: i64 = 4096;

/// Returns true if the given resource type is provisionable.
#[must_use]
pub fn is_known_resource_type(resource_type: &str) -> bool {
    KNOWN_RESOURCE_TYPES.contains(&resource_type)
}

/// Returns the immutable attribute names for a resource type.
///
/// Changing one of these after creation requires destroy-and-recreate.
#[must_use]
pub fn immutable_attributes(resource_type: &str) -> &'static [&'static str] {
    match resource_type {
        RESOURCE_VECTOR_BUCKET => BUCKET_IMMUTABLE,
        RESOURCE_VECTOR_INDEX => INDEX_IMMUTABLE,
        _ => &[],
    }
}

/// Returns true if changing the given attribute forces replacement.
///
/// Tag attributes (`tags.*`) are always mutable.
#[must_use]
pub fn is_immutable(resource_type: &str, attribute: &str) -> bool {
    if attribute.starts_with("tags.") {
        return false;
    }
    immutable_attributes(resource_type).contains(&attribute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_dimension_is_immutable() {
        assert!(is_immutable(RESOURCE_VECTOR_INDEX, "dimension"));
        assert!(is_immutable(RESOURCE_VECTOR_INDEX, "distance_metric"));
    }

    #[test]
    fn test_tags_are_mutable() {
        assert!(!is_immutable(RESOURCE_VECTOR_BUCKET, "tags.env"));
        assert!(!is_immutable(RESOURCE_VECTOR_INDEX, "tags.owner"));
    }

    #[test]
    fn test_unknown_type_has_no_immutable_set() {
        assert!(immutable_attributes("mystery").is_empty());
        assert!(!is_known_resource_type("mystery"));
    }
}
