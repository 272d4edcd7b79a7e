//! Declaration validation for the provisioning engine.
//!
//! This module validates a lowered declaration before any graph construction
//! or provider call, ensuring resource attributes are complete and within the
//! provider's accepted value ranges.

use crate::error::{ConfigError, Result, VectorformError};
use crate::graph::{AttributeValue, ResourceDescriptor, Scalar};
use crate::provider::types::{
    MAX_DIMENSION, MIN_DIMENSION, RESOURCE_VECTOR_BUCKET, RESOURCE_VECTOR_INDEX,
    VALID_DATA_TYPES, VALID_DISTANCE_METRICS, VALID_ENCRYPTION_TYPES, is_known_resource_type,
};
use tracing::debug;

use super::spec::{Declaration, ProviderBackend};

/// Attributes the engine understands for a vector bucket.
const BUCKET_ATTRIBUTES: &[&str] = &["bucket_name", "encryption_type", "kms_key_arn"];

/// Attributes the engine understands for a vector index.
const INDEX_ATTRIBUTES: &[&str] = &["bucket_name", "dimension", "distance_metric", "data_type"];

/// Validator for lowered declarations.
#[derive(Debug, Default)]
pub struct DeclarationValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl DeclarationValidator {
    /// Creates a new declaration validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a lowered declaration.
    ///
    /// # Errors
    ///
    /// Returns an error carrying the first validation failure.
    pub fn validate(&self, declaration: &Declaration) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_project(declaration, &mut result);
        Self::validate_provider(declaration, &mut result);
        Self::validate_resources(&declaration.descriptors, &mut result);

        if result.error_count() > 0 {
            let first_error = &result.errors[0];
            return Err(VectorformError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }));
        }

        debug!("Declaration validation passed");
        Ok(result)
    }

    /// Validates project configuration.
    fn validate_project(declaration: &Declaration, result: &mut ValidationResult) {
        if declaration.project.name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("project.name"),
                message: String::from("Project name cannot be empty"),
            });
        } else if !is_valid_name(&declaration.project.name) {
            result.errors.push(ValidationError {
                field: String::from("project.name"),
                message: format!(
                    "Project name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    declaration.project.name
                ),
            });
        }

        if declaration.project.environment.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("project.environment"),
                message: String::from("Environment cannot be empty"),
            });
        }
    }

    /// Validates provider settings.
    fn validate_provider(declaration: &Declaration, result: &mut ValidationResult) {
        match declaration.provider.backend {
            ProviderBackend::Http => {
                if declaration
                    .provider
                    .endpoint
                    .as_ref()
                    .is_none_or(String::is_empty)
                {
                    result.errors.push(ValidationError {
                        field: String::from("provider.endpoint"),
                        message: String::from(
                            "Provider endpoint is required when using the http backend",
                        ),
                    });
                }
            }
            ProviderBackend::Memory => {
                // Memory backend needs no connection settings.
            }
        }
    }

    /// Validates all resource descriptors.
    fn validate_resources(descriptors: &[ResourceDescriptor], result: &mut ValidationResult) {
        if descriptors.is_empty() {
            result
                .warnings
                .push(String::from("No resources defined in declaration"));
            return;
        }

        for (i, descriptor) in descriptors.iter().enumerate() {
            let prefix = format!("resources[{i}]");

            if !is_valid_name(&descriptor.name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!(
                        "Resource name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                        descriptor.name
                    ),
                });
            }

            if !is_known_resource_type(&descriptor.resource_type) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.type"),
                    message: format!("Unknown resource type: {}", descriptor.resource_type),
                });
                continue;
            }

            match descriptor.resource_type.as_str() {
                RESOURCE_VECTOR_BUCKET => Self::validate_bucket(descriptor, &prefix, result),
                RESOURCE_VECTOR_INDEX => Self::validate_index(descriptor, &prefix, result),
                _ => {}
            }
        }
    }

    /// Validates a vector bucket descriptor.
    fn validate_bucket(
        descriptor: &ResourceDescriptor,
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        if let Some(Scalar::String(encryption)) = literal(descriptor, "encryption_type")
            && !VALID_ENCRYPTION_TYPES.contains(&encryption.as_str())
        {
            result.errors.push(ValidationError {
                field: format!("{prefix}.attributes.encryption_type"),
                message: format!(
                    "Invalid encryption type '{encryption}'. Must be one of: {}",
                    VALID_ENCRYPTION_TYPES.join(", ")
                ),
            });
        }

        if literal(descriptor, "encryption_type").is_some_and(|s| s.as_str() == Some("KMS"))
            && !descriptor.attributes.contains_key("kms_key_arn")
        {
            result.errors.push(ValidationError {
                field: format!("{prefix}.attributes.kms_key_arn"),
                message: String::from("kms_key_arn is required when encryption_type is KMS"),
            });
        }

        Self::warn_unknown_attributes(descriptor, BUCKET_ATTRIBUTES, prefix, result);
    }

    /// Validates a vector index descriptor.
    fn validate_index(
        descriptor: &ResourceDescriptor,
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        for required in &["bucket_name", "dimension", "distance_metric"] {
            if !descriptor.attributes.contains_key(*required) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.attributes.{required}"),
                    message: format!("Vector index requires attribute '{required}'"),
                });
            }
        }

        if let Some(scalar) = literal(descriptor, "dimension") {
            match scalar.as_int() {
                Some(dimension) if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&dimension) => {
                    result.errors.push(ValidationError {
                        field: format!("{prefix}.attributes.dimension"),
                        message: format!(
                            "Dimension {dimension} is out of range ({MIN_DIMENSION}-{MAX_DIMENSION})"
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    result.errors.push(ValidationError {
                        field: format!("{prefix}.attributes.dimension"),
                        message: String::from("Dimension must be an integer"),
                    });
                }
            }
        }

        if let Some(Scalar::String(metric)) = literal(descriptor, "distance_metric")
            && !VALID_DISTANCE_METRICS.contains(&metric.as_str())
        {
            result.errors.push(ValidationError {
                field: format!("{prefix}.attributes.distance_metric"),
                message: format!(
                    "Invalid distance metric '{metric}'. Must be one of: {}",
                    VALID_DISTANCE_METRICS.join(", ")
                ),
            });
        }

        if let Some(Scalar::String(data_type)) = literal(descriptor, "data_type")
            && !VALID_DATA_TYPES.contains(&data_type.as_str())
        {
            result.errors.push(ValidationError {
                field: format!("{prefix}.attributes.data_type"),
                message: format!(
                    "Invalid data type '{data_type}'. Must be one of: {}",
                    VALID_DATA_TYPES.join(", ")
                ),
            });
        }

        Self::warn_unknown_attributes(descriptor, INDEX_ATTRIBUTES, prefix, result);
    }

    /// Warns about attributes the engine does not understand.
    fn warn_unknown_attributes(
        descriptor: &ResourceDescriptor,
        known: &[&str],
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        for key in descriptor.attributes.keys() {
            if !known.contains(&key.as_str()) && !key.starts_with("tags.") {
                result.warnings.push(format!(
                    "{prefix}.attributes.{key}: Unknown attribute for {}",
                    descriptor.resource_type
                ));
            }
        }
    }
}

/// Returns the literal value of an attribute, if it is a literal.
fn literal<'a>(descriptor: &'a ResourceDescriptor, attribute: &str) -> Option<&'a Scalar> {
    match descriptor.attributes.get(attribute) {
        Some(AttributeValue::Literal(scalar)) => Some(scalar),
        _ => None,
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let mut chars = name.chars();

    // First character must be a letter
    if let Some(first) = chars.next()
        && !first.is_ascii_lowercase()
    {
        return false;
    }

    // Rest must be lowercase alphanumeric or hyphen
    for c in chars {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return false;
        }
    }

    // Cannot end with hyphen
    if name.ends_with('-') {
        return false;
    }

    // Cannot have consecutive hyphens
    if name.contains("--") {
        return false;
    }

    true
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::{ProjectConfig, ProviderSettings};
    use std::collections::BTreeMap;

    fn declaration(descriptors: Vec<ResourceDescriptor>) -> Declaration {
        Declaration {
            project: ProjectConfig {
                name: String::from("test-project"),
                environment: String::from("dev"),
            },
            provider: ProviderSettings {
                backend: ProviderBackend::Memory,
                endpoint: None,
                region: String::from("us-east-1"),
            },
            descriptors,
            outputs: BTreeMap::new(),
        }
    }

    fn valid_index() -> ResourceDescriptor {
        ResourceDescriptor::new(RESOURCE_VECTOR_INDEX, "embeddings")
            .with_literal("bucket_name", "media")
            .with_literal("dimension", 384_i64)
            .with_literal("distance_metric", "cosine")
            .with_literal("data_type", "float32")
    }

    #[test]
    fn test_valid_declaration_passes() {
        let validator = DeclarationValidator::new();
        let result = validator.validate(&declaration(vec![valid_index()])).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_dimension_out_of_range() {
        let mut index = valid_index();
        index.attributes.insert(
            String::from("dimension"),
            AttributeValue::Literal(Scalar::Int(5000)),
        );

        let validator = DeclarationValidator::new();
        let err = validator.validate(&declaration(vec![index])).unwrap_err();
        assert!(matches!(
            err,
            VectorformError::Config(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_invalid_distance_metric() {
        let mut index = valid_index();
        index.attributes.insert(
            String::from("distance_metric"),
            AttributeValue::Literal(Scalar::from("manhattan")),
        );

        let validator = DeclarationValidator::new();
        assert!(validator.validate(&declaration(vec![index])).is_err());
    }

    #[test]
    fn test_index_requires_dimension() {
        let mut index = valid_index();
        index.attributes.remove("dimension");

        let validator = DeclarationValidator::new();
        assert!(validator.validate(&declaration(vec![index])).is_err());
    }

    #[test]
    fn test_kms_requires_key_arn() {
        let bucket = ResourceDescriptor::new(RESOURCE_VECTOR_BUCKET, "media")
            .with_literal("bucket_name", "media")
            .with_literal("encryption_type", "KMS");

        let validator = DeclarationValidator::new();
        assert!(validator.validate(&declaration(vec![bucket])).is_err());
    }

    #[test]
    fn test_http_backend_requires_endpoint() {
        let mut decl = declaration(vec![valid_index()]);
        decl.provider.backend = ProviderBackend::Http;

        let validator = DeclarationValidator::new();
        assert!(validator.validate(&decl).is_err());
    }

    #[test]
    fn test_unknown_attribute_warns() {
        let mut index = valid_index();
        index.attributes.insert(
            String::from("replicas"),
            AttributeValue::Literal(Scalar::Int(3)),
        );

        let validator = DeclarationValidator::new();
        let result = validator.validate(&declaration(vec![index])).unwrap();
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_valid_name_rules() {
        assert!(is_valid_name("media-vectors"));
        assert!(is_valid_name("a"));
        assert!(!is_valid_name("Media")); // uppercase
        assert!(!is_valid_name("1media")); // starts with digit
        assert!(!is_valid_name("media-")); // ends with hyphen
        assert!(!is_valid_name("media--x")); // consecutive hyphens
    }
}
