//! Error types for the Vectorform provisioning engine.
//!
//! This module provides a comprehensive error hierarchy for all operations
//! in the provisioning lifecycle: configuration, graph construction,
//! provider calls, and plan application.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Vectorform provisioning engine.
#[derive(Debug, Error)]
pub enum VectorformError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dependency graph errors.
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Provider control-plane errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Plan application errors.
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The declaration file was not found.
    #[error("Declaration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The declaration file could not be parsed.
    #[error("Failed to parse declaration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Declaration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A referenced variable has no default and no override.
    #[error("Missing value for variable: {name}")]
    MissingVariable {
        /// Name of the unset variable.
        name: String,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// An interpolation expression could not be understood.
    #[error("Invalid interpolation expression '{expression}': {message}")]
    InvalidInterpolation {
        /// The offending expression.
        expression: String,
        /// Description of the problem.
        message: String,
    },

    /// Unknown resource type in a declaration.
    #[error("Unknown resource type: {resource_type}")]
    UnknownResourceType {
        /// The unrecognized type string.
        resource_type: String,
    },
}

/// Dependency graph errors.
///
/// These are detected before any provider call is made; nothing has been
/// applied when one of these is returned.
#[derive(Debug, Error)]
pub enum GraphError {
    /// An attribute or `depends_on` entry references a descriptor that does
    /// not exist in the graph.
    #[error("Unresolved reference from {from} to {target}")]
    UnresolvedReference {
        /// The referencing resource (`type.name`).
        from: String,
        /// The missing target (`type.name`).
        target: String,
        /// Attribute carrying the reference, if any.
        attribute: Option<String>,
    },

    /// The graph contains a dependency cycle.
    #[error("Cyclic dependency detected: {cycle}")]
    CyclicDependency {
        /// The cycle's node sequence, e.g. `a -> b -> a`.
        cycle: String,
    },

    /// Two descriptors share the same type and name.
    #[error("Duplicate resource: {resource_type}.{name}")]
    DuplicateResource {
        /// Resource type of the duplicate.
        resource_type: String,
        /// Logical name of the duplicate.
        name: String,
    },
}

/// Provider control-plane errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Authentication failed.
    #[error("Provider authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Provider API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited.
    #[error("Provider rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Resource not found where one was required.
    #[error("Resource not found: {resource_type}.{name}")]
    ResourceNotFound {
        /// Resource type.
        resource_type: String,
        /// Logical resource name.
        name: String,
    },

    /// Network error.
    #[error("Network error communicating with provider: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response from provider: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Plan application errors.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A reference attribute was still unresolved when its node applied.
    ///
    /// The graph builder validates references up front, so this is an
    /// internal invariant violation and is treated as fatal.
    #[error("Internal invariant violation: attribute '{attribute}' of {resource} is unresolved at apply time")]
    UnresolvedAttribute {
        /// The resource (`type.name`) being applied.
        resource: String,
        /// The unresolved attribute name.
        attribute: String,
    },

    /// Observed state diverged in a way that requires destroy-and-recreate.
    #[error("Drift conflict on {resource}: changing '{field}' from {observed} to {desired} requires replacement (pass --allow-replace to approve)")]
    DriftConflict {
        /// The resource (`type.name`) that drifted.
        resource: String,
        /// The immutable field that changed.
        field: String,
        /// Value observed on the provider.
        observed: String,
        /// Value in the declaration.
        desired: String,
    },

    /// A node failed to apply.
    #[error("Failed to apply {resource}: {reason}")]
    NodeFailed {
        /// The resource (`type.name`) that failed.
        resource: String,
        /// Reason for the failure.
        reason: String,
    },

    /// An output expression references an attribute that is not present
    /// after apply (e.g. on a failed or skipped node).
    #[error("Output '{output}' references unresolved attribute '{attribute}' of {resource}")]
    OutputUnresolved {
        /// Name of the output.
        output: String,
        /// The referenced resource (`type.name`).
        resource: String,
        /// The referenced attribute.
        attribute: String,
    },

    /// The apply run was aborted.
    #[error("Apply aborted: {reason}")]
    Aborted {
        /// Reason for the abort.
        reason: String,
    },
}

/// Result type alias for Vectorform operations.
pub type Result<T> = std::result::Result<T, VectorformError>;

impl VectorformError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider(ProviderError::RateLimited { .. } | ProviderError::NetworkError { .. })
        )
    }

    /// Returns the provider's suggested retry delay in seconds, when one
    /// was communicated (rate-limit responses carry a Retry-After hint).
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Provider(ProviderError::RateLimited { retry_after_secs }) => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }

    /// Returns true if this error was raised before any side effect.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Graph(_))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl ProviderError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let rate_limited = VectorformError::Provider(ProviderError::RateLimited {
            retry_after_secs: 12,
        });
        assert!(rate_limited.is_retryable());
        assert_eq!(rate_limited.retry_delay_secs(), Some(12));

        let network = VectorformError::Provider(ProviderError::network("connection reset"));
        assert!(network.is_retryable());
        // Network failures carry no server hint; the caller picks a backoff.
        assert_eq!(network.retry_delay_secs(), None);

        let auth = VectorformError::Provider(ProviderError::AuthenticationFailed {
            message: String::from("key rejected"),
        });
        assert!(!auth.is_retryable());
        assert_eq!(auth.retry_delay_secs(), None);
    }

    #[test]
    fn test_validation_classification() {
        let config = VectorformError::Config(ConfigError::validation("bad value", "project.name"));
        assert!(config.is_validation());

        let graph = VectorformError::Graph(GraphError::CyclicDependency {
            cycle: String::from("a -> b -> a"),
        });
        assert!(graph.is_validation());

        let provider = VectorformError::Provider(ProviderError::api_error(500, "boom"));
        assert!(!provider.is_validation());
    }
}
