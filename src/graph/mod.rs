//! Resource descriptors and dependency graph construction.
//!
//! The graph module owns the desired-state data model and the builder that
//! derives a validated, topologically ordered graph from it.

mod builder;
mod descriptor;

pub use builder::{GraphBuilder, GraphNode, ResourceGraph};
pub use descriptor::{AttributeValue, ObservedState, ResourceDescriptor, ResourceRef, Scalar};
