//! Output resolution after an apply run.
//!
//! Outputs are declared as attribute expressions and resolved against the
//! final attribute sets of applied resources. Resolution is a pure read: it
//! never calls the provider and fails when an output targets an attribute
//! that is absent after apply (for example on a failed or skipped node).

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{ApplyError, Result, VectorformError};
use crate::graph::{AttributeValue, Scalar};

/// Resolver for declared outputs.
#[derive(Debug, Default)]
pub struct OutputResolver;

impl OutputResolver {
    /// Creates a new output resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolves output expressions against per-resource final attributes.
    ///
    /// `resolved` maps resource addresses (`type.name`) to the attribute
    /// sets recorded after a successful apply.
    ///
    /// # Errors
    ///
    /// Returns an error when an output references a resource or attribute
    /// that is not present in the resolved set.
    pub fn resolve(
        &self,
        outputs: &BTreeMap<String, AttributeValue>,
        resolved: &BTreeMap<String, BTreeMap<String, Scalar>>,
    ) -> Result<BTreeMap<String, Scalar>> {
        let mut values = BTreeMap::new();

        for (name, expression) in outputs {
            let value = match expression {
                AttributeValue::Literal(scalar) => scalar.clone(),
                AttributeValue::Reference { target, attribute } => {
                    let address = target.to_string();
                    resolved
                        .get(&address)
                        .and_then(|attrs| attrs.get(attribute))
                        .cloned()
                        .ok_or_else(|| {
                            VectorformError::Apply(ApplyError::OutputUnresolved {
                                output: name.clone(),
                                resource: address.clone(),
                                attribute: attribute.clone(),
                            })
                        })?
                }
                AttributeValue::Computed => {
                    return Err(VectorformError::Apply(ApplyError::OutputUnresolved {
                        output: name.clone(),
                        resource: String::from("(none)"),
                        attribute: String::from("(computed)"),
                    }));
                }
            };

            debug!("Resolved output {name} = {value}");
            values.insert(name.clone(), value);
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResourceRef;

    fn resolved_bucket() -> BTreeMap<String, BTreeMap<String, Scalar>> {
        let mut attrs = BTreeMap::new();
        attrs.insert(String::from("bucket_name"), Scalar::from("media-vectors"));
        attrs.insert(String::from("arn"), Scalar::from("vfrn:memory:vector_bucket/b1"));

        let mut resolved = BTreeMap::new();
        resolved.insert(String::from("vector_bucket.b1"), attrs);
        resolved
    }

    fn reference(attribute: &str) -> AttributeValue {
        AttributeValue::Reference {
            target: ResourceRef::new("vector_bucket", "b1"),
            attribute: attribute.to_string(),
        }
    }

    #[test]
    fn test_resolves_references_and_literals() {
        let mut outputs = BTreeMap::new();
        outputs.insert(String::from("bucket"), reference("bucket_name"));
        outputs.insert(String::from("arn"), reference("arn"));
        outputs.insert(
            String::from("region"),
            AttributeValue::Literal(Scalar::from("us-east-1")),
        );

        let values = OutputResolver::new()
            .resolve(&outputs, &resolved_bucket())
            .unwrap();

        assert_eq!(values.get("bucket"), Some(&Scalar::from("media-vectors")));
        assert_eq!(
            values.get("arn"),
            Some(&Scalar::from("vfrn:memory:vector_bucket/b1"))
        );
        assert_eq!(values.get("region"), Some(&Scalar::from("us-east-1")));
    }

    #[test]
    fn test_missing_resource_is_error() {
        let mut outputs = BTreeMap::new();
        outputs.insert(
            String::from("dim"),
            AttributeValue::Reference {
                target: ResourceRef::new("vector_index", "i1"),
                attribute: String::from("dimension"),
            },
        );

        // The index failed to apply, so it has no resolved attributes.
        let err = OutputResolver::new()
            .resolve(&outputs, &resolved_bucket())
            .unwrap_err();

        match err {
            VectorformError::Apply(ApplyError::OutputUnresolved {
                output,
                resource,
                attribute,
            }) => {
                assert_eq!(output, "dim");
                assert_eq!(resource, "vector_index.i1");
                assert_eq!(attribute, "dimension");
            }
            other => panic!("expected unresolved output, got {other}"),
        }
    }

    #[test]
    fn test_missing_attribute_is_error() {
        let mut outputs = BTreeMap::new();
        outputs.insert(String::from("missing"), reference("nope"));

        let err = OutputResolver::new()
            .resolve(&outputs, &resolved_bucket())
            .unwrap_err();
        assert!(matches!(
            err,
            VectorformError::Apply(ApplyError::OutputUnresolved { .. })
        ));
    }
}
