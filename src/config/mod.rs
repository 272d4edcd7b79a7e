//! Configuration module for the Vectorform provisioning engine.
//!
//! This module handles all declaration-related functionality:
//! - Parsing and deserializing `vectorform.yaml`
//! - Variable and reference interpolation
//! - Validation of declaration values
//! - Computing declaration hashes for change detection

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{
    Declaration, DeclarationFile, ProjectConfig, ProviderBackend, ProviderSettings, ResourceBlock,
    VariableSpec,
};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use validator::{DeclarationValidator, ValidationError, ValidationResult};
pub use hash::SpecHasher;
