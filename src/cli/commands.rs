//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::planner::DEFAULT_CONCURRENCY;

/// Vectorform - Declarative vector storage provisioning.
#[derive(Parser, Debug)]
#[command(name = "vectorform")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the declaration file.
    #[arg(short, long, global = true, env = "VECTORFORM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Variable override (`name=value`); may be repeated.
    #[arg(long = "var", global = true, value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new Vectorform project.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the declaration file.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show what an apply would change, without mutating anything.
    Plan {
        /// Show per-attribute diff details.
        #[arg(short, long)]
        detailed: bool,
    },

    /// Apply the declaration to the provider.
    Apply {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Allow destroy-and-recreate when an immutable attribute changed.
        #[arg(long)]
        allow_replace: bool,

        /// Maximum concurrent provider operations.
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },

    /// Check for drift between the declaration and observed state.
    Drift,

    /// Resolve and display declared outputs from live provider state.
    Outputs,

    /// Destroy all declared resources.
    Destroy {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses `--var name=value` overrides into a map.
    ///
    /// Entries without an `=` separator are skipped.
    #[must_use]
    pub fn variable_overrides(&self) -> BTreeMap<String, String> {
        self.vars
            .iter()
            .filter_map(|raw| {
                raw.split_once('=')
                    .map(|(name, value)| (name.to_string(), value.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_overrides_parse() {
        let cli = Cli::parse_from([
            "vectorform",
            "--var",
            "dimension=768",
            "--var",
            "env=prod",
            "--var",
            "malformed",
            "plan",
        ]);

        let overrides = cli.variable_overrides();
        assert_eq!(overrides.get("dimension").map(String::as_str), Some("768"));
        assert_eq!(overrides.get("env").map(String::as_str), Some("prod"));
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::parse_from([
            "vectorform",
            "apply",
            "--yes",
            "--allow-replace",
            "--concurrency",
            "8",
        ]);

        match cli.command {
            Commands::Apply {
                yes,
                allow_replace,
                concurrency,
            } => {
                assert!(yes);
                assert!(allow_replace);
                assert_eq!(concurrency, 8);
            }
            other => panic!("expected apply, got {other:?}"),
        }
    }
}
