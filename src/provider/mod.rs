//! Provider adapters for the vector-store control plane.
//!
//! The reconciler consumes the [`ProviderAdapter`] capability; this module
//! supplies the trait plus the HTTP and in-memory implementations and the
//! resource catalog.

mod adapter;
mod http;
mod memory;
pub mod types;

pub use adapter::{ProviderAdapter, ReadOutcome};
pub use http::{HttpProvider, ProviderConfig};
pub use memory::MemoryProvider;

#[cfg(test)]
pub use adapter::MockProviderAdapter;
