//! CLI module for the Vectorform provisioning tool.
//!
//! This module provides the command-line interface for managing
//! vector storage infrastructure.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
