//! Resource descriptor types for the dependency graph.
//!
//! This module defines the in-memory representation of a single desired
//! resource: its identity, its attribute set, and the references linking it
//! to other descriptors.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    String(String),
}

/// Unique identity of a descriptor within a graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource type (e.g. `vector_bucket`).
    pub resource_type: String,
    /// Logical resource name.
    pub name: String,
}

/// A declared attribute value: a literal, an unresolved reference to another
/// descriptor's attribute, or a computed value unset until apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// A concrete literal value.
    Literal(Scalar),
    /// A reference to another descriptor's attribute, resolved during apply.
    Reference {
        /// The referenced descriptor.
        target: ResourceRef,
        /// The referenced attribute name.
        attribute: String,
    },
    /// A provider-computed value, unset until the resource applies.
    Computed,
}

/// Declared desired state for one resource instance.
///
/// Descriptors are created once per apply invocation and are immutable once
/// the plan is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Resource type.
    pub resource_type: String,
    /// Logical resource name, unique per type.
    pub name: String,
    /// Declared attributes.
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Explicit dependencies in addition to attribute references.
    #[serde(default)]
    pub depends_on: BTreeSet<ResourceRef>,
}

/// Provider-reported actual attributes for a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    /// Actual attribute values, including provider-computed ones.
    pub attributes: BTreeMap<String, Scalar>,
}

impl Scalar {
    /// Returns the string value if this scalar is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value if this scalar is an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl ResourceRef {
    /// Creates a new resource reference.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Parses a `type.name` address into a reference.
    ///
    /// Returns `None` if the address does not contain exactly one dot
    /// separating two non-empty segments.
    #[must_use]
    pub fn parse(address: &str) -> Option<Self> {
        let (resource_type, name) = address.split_once('.')?;
        if resource_type.is_empty() || name.is_empty() || name.contains('.') {
            return None;
        }
        Some(Self::new(resource_type, name))
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

impl AttributeValue {
    /// Returns the literal scalar, if this value is already concrete.
    #[must_use]
    pub const fn as_literal(&self) -> Option<&Scalar> {
        match self {
            Self::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the reference target, if this value is a reference.
    #[must_use]
    pub const fn as_reference(&self) -> Option<(&ResourceRef, &str)> {
        match self {
            Self::Reference { target, attribute } => Some((target, attribute.as_str())),
            _ => None,
        }
    }
}

impl ResourceDescriptor {
    /// Creates a new descriptor with no attributes.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            attributes: BTreeMap::new(),
            depends_on: BTreeSet::new(),
        }
    }

    /// Returns this descriptor's identity.
    #[must_use]
    pub fn address(&self) -> ResourceRef {
        ResourceRef::new(self.resource_type.clone(), self.name.clone())
    }

    /// Adds a literal attribute. Consumes and returns self for chaining.
    #[must_use]
    pub fn with_literal(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.attributes
            .insert(key.into(), AttributeValue::Literal(value.into()));
        self
    }

    /// Adds a reference attribute. Consumes and returns self for chaining.
    #[must_use]
    pub fn with_reference(
        mut self,
        key: impl Into<String>,
        target: ResourceRef,
        attribute: impl Into<String>,
    ) -> Self {
        self.attributes.insert(
            key.into(),
            AttributeValue::Reference {
                target,
                attribute: attribute.into(),
            },
        );
        self
    }

    /// Iterates over every descriptor this one references, pairing each
    /// target with the attribute that carries the reference (`None` for
    /// explicit `depends_on` entries).
    pub fn reference_targets(&self) -> impl Iterator<Item = (&ResourceRef, Option<&str>)> {
        let attribute_refs = self.attributes.iter().filter_map(|(key, value)| {
            value
                .as_reference()
                .map(|(target, _)| (target, Some(key.as_str())))
        });
        let explicit = self.depends_on.iter().map(|target| (target, None));
        attribute_refs.chain(explicit)
    }

    /// Returns the attributes that are already concrete literals.
    #[must_use]
    pub fn literal_attributes(&self) -> BTreeMap<String, Scalar> {
        self.attributes
            .iter()
            .filter_map(|(k, v)| v.as_literal().map(|s| (k.clone(), s.clone())))
            .collect()
    }
}

impl ObservedState {
    /// Creates an observed state from an attribute map.
    #[must_use]
    pub const fn new(attributes: BTreeMap<String, Scalar>) -> Self {
        Self { attributes }
    }

    /// Gets a single observed attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.attributes.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ref_parse() {
        let r = ResourceRef::parse("vector_bucket.b1").unwrap();
        assert_eq!(r.resource_type, "vector_bucket");
        assert_eq!(r.name, "b1");

        assert!(ResourceRef::parse("no-dot").is_none());
        assert!(ResourceRef::parse("too.many.dots").is_none());
        assert!(ResourceRef::parse(".empty").is_none());
    }

    #[test]
    fn test_reference_targets_includes_depends_on() {
        let bucket = ResourceRef::new("vector_bucket", "b1");
        let mut descriptor = ResourceDescriptor::new("vector_index", "i1").with_reference(
            "bucket_name",
            bucket.clone(),
            "bucket_name",
        );
        descriptor
            .depends_on
            .insert(ResourceRef::new("vector_bucket", "b2"));

        let targets: Vec<_> = descriptor.reference_targets().collect();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].0, &bucket);
        assert_eq!(targets[0].1, Some("bucket_name"));
        assert_eq!(targets[1].1, None);
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Int(384).to_string(), "384");
        assert_eq!(Scalar::from("cosine").to_string(), "cosine");
        assert_eq!(Scalar::Bool(true).to_string(), "true");
    }
}
