//! Declaration file types for the provisioning engine.
//!
//! This module defines the structs that map to the `vectorform.yaml` file.
//! These types are declarative and fully describe the desired state; the
//! parser lowers them into resource descriptors with explicit references.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graph::{AttributeValue, ResourceDescriptor};

/// The root structure of a declaration file, prior to interpolation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeclarationFile {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// Provider connection settings.
    #[serde(default)]
    pub provider: ProviderSettings,
    /// Declared variables with optional defaults.
    #[serde(default)]
    pub variables: BTreeMap<String, VariableSpec>,
    /// Declared resources.
    #[serde(default)]
    pub resources: Vec<ResourceBlock>,
    /// Output expressions, resolved after apply.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Unique name for the project.
    pub name: String,
    /// Environment (e.g. "dev", "staging", "prod").
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProviderSettings {
    /// Which adapter backend to use.
    #[serde(default)]
    pub backend: ProviderBackend,
    /// Control-plane endpoint (required for the http backend).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Provider region.
    #[serde(default = "default_region")]
    pub region: String,
}

/// Provider backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderBackend {
    /// REST control-plane adapter.
    #[default]
    Http,
    /// In-memory adapter for local runs and tests.
    Memory,
}

/// A declared variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableSpec {
    /// Default value used when no override is supplied.
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A declared resource, prior to interpolation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceBlock {
    /// Resource type (e.g. `vector_bucket`).
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Logical resource name, unique per type.
    pub name: String,
    /// Declared attributes; string values may contain interpolation.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_yaml::Value>,
    /// Tags, flattened into `tags.<key>` attributes by the parser.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Explicit dependencies as `type.name` addresses.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A fully lowered declaration: descriptors with explicit references,
/// ready for graph construction.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// Provider connection settings.
    pub provider: ProviderSettings,
    /// Resource descriptors in declaration order.
    pub descriptors: Vec<ResourceDescriptor>,
    /// Output expressions as attribute values.
    pub outputs: BTreeMap<String, AttributeValue>,
}

/// Default environment name.
fn default_environment() -> String {
    String::from("dev")
}

/// Default provider region.
fn default_region() -> String {
    String::from("us-east-1")
}

impl Declaration {
    /// Returns the number of declared resources.
    #[must_use]
    pub const fn resource_count(&self) -> usize {
        self.descriptors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_dev() {
        let yaml = "project:\n  name: test\n";
        let file: DeclarationFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.project.environment, "dev");
        assert_eq!(file.provider.backend, ProviderBackend::Http);
    }

    #[test]
    fn test_backend_parses_lowercase() {
        let yaml = "project:\n  name: test\nprovider:\n  backend: memory\n";
        let file: DeclarationFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.provider.backend, ProviderBackend::Memory);
        assert_eq!(file.provider.region, "us-east-1");
    }
}
