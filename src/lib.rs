// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Vectorform
//!
//! A declarative, idempotent provisioning engine for vector storage
//! infrastructure.
//!
//! ## Overview
//!
//! Vectorform manages vector-capable storage buckets and the vector search
//! indexes bound to them, the same way general infrastructure-as-code tools
//! manage cloud resources:
//!
//! - Declare buckets, indexes, variables and outputs in a YAML file
//! - Cross-resource references form a dependency graph applied in order
//! - Observed state is diffed against the declaration on every run
//! - Re-applying a converged declaration performs zero mutations
//!
//! ## Architecture
//!
//! The system is built around **desired state reconciliation**:
//!
//! 1. **Desired State**: Declared in `vectorform.yaml`
//! 2. **Observed State**: Read from the provider control plane
//! 3. **Reconciler**: Diffs both and drives the plan through the provider
//!
//! ## Modules
//!
//! - [`config`]: Declaration parsing, interpolation and validation
//! - [`graph`]: Resource descriptors and dependency graph construction
//! - [`planner`]: Diff computation, apply plans and the executor
//! - [`provider`]: Provider adapter trait plus HTTP and in-memory backends
//! - [`outputs`]: Output resolution after apply
//! - [`reconciler`]: Orchestration of the full pipeline
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: search-infra
//!   environment: prod
//!
//! resources:
//!   - type: vector_bucket
//!     name: media
//!     attributes:
//!       encryption_type: AES256
//!
//!   - type: vector_index
//!     name: embeddings
//!     attributes:
//!       bucket_name: ${vector_bucket.media.bucket_name}
//!       dimension: 384
//!       distance_metric: cosine
//!
//! outputs:
//!   bucket_arn: ${vector_bucket.media.arn}
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod outputs;
pub mod planner;
pub mod provider;
pub mod reconciler;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, Declaration, DeclarationValidator, SpecHasher};
pub use error::{Result, VectorformError};
pub use graph::{GraphBuilder, ResourceDescriptor, ResourceGraph};
pub use outputs::OutputResolver;
pub use planner::{ApplyPlan, DiffEngine, ExecutionOptions, PlanExecutor};
pub use provider::{HttpProvider, MemoryProvider, ProviderAdapter, ProviderConfig};
pub use reconciler::{ApplyOutcome, DriftReport, Reconciler};
