//! Vectorform CLI entrypoint.
//!
//! This is the main entrypoint for the vectorform command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use vectorform::cli::{Cli, Commands, OutputFormatter};
use vectorform::config::{find_config_file, ConfigParser, Declaration, ProviderBackend};
use vectorform::error::Result;
use vectorform::planner::ExecutionOptions;
use vectorform::provider::{HttpProvider, MemoryProvider, ProviderAdapter, ProviderConfig};
use vectorform::reconciler::Reconciler;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code for validation failures (bad declaration or graph).
const EXIT_VALIDATION: u8 = 2;

/// Exit code for provider or runtime failures.
const EXIT_PROVIDER: u8 = 3;

/// Exit code for partial convergence (some nodes skipped or failed while
/// others applied).
const EXIT_PARTIAL: u8 = 4;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_validation() {
                ExitCode::from(EXIT_VALIDATION)
            } else {
                ExitCode::from(EXIT_PROVIDER)
            }
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);
    let cancel = spawn_signal_handler();
    let config = cli.config.clone();
    let vars = cli.variable_overrides();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(config.as_ref(), &vars, warnings),
        Commands::Plan { detailed } => {
            cmd_plan(config.as_ref(), &vars, detailed, &formatter, cancel).await
        }
        Commands::Apply {
            yes,
            allow_replace,
            concurrency,
        } => {
            let options = ExecutionOptions {
                concurrency: concurrency.max(1),
                allow_replace,
            };
            cmd_apply(config.as_ref(), &vars, yes, options, &formatter, cancel).await
        }
        Commands::Drift => cmd_drift(config.as_ref(), &vars, &formatter, cancel).await,
        Commands::Outputs => cmd_outputs(config.as_ref(), &vars, &formatter, cancel).await,
        Commands::Destroy { yes } => {
            cmd_destroy(config.as_ref(), &vars, yes, &formatter, cancel).await
        }
    }
}

/// Wires Ctrl-C into a cancellation channel watched by the executor.
fn spawn_signal_handler() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight operations");
            let _ = tx.send(true);
        }
    });

    rx
}

/// Initialize a new project.
fn cmd_init(path: &PathBuf, force: bool) -> Result<ExitCode> {
    info!("Initializing new Vectorform project in: {}", path.display());

    let config_path = path.join("vectorform.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    // Check if files exist
    if !force && config_path.exists() {
        eprintln!("Declaration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(ExitCode::SUCCESS);
    }

    // Create directory if needed
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    // Write declaration template
    let config_template = include_str!("../templates/vectorform.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("Created: {}", config_path.display());

    // Write .env.example
    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    // Write/update .gitignore
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        if !existing.contains(".env") {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# Vectorform")?;
            writeln!(file, ".env")?;
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, ".env\n")?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nProject initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and fill in your API key");
    eprintln!("  2. Edit vectorform.yaml with your buckets and indexes");
    eprintln!("  3. Run 'vectorform validate' to check your declaration");
    eprintln!("  4. Run 'vectorform plan' to see what will change");
    eprintln!("  5. Run 'vectorform apply' to provision");

    Ok(ExitCode::SUCCESS)
}

/// Validate the declaration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    vars: &std::collections::BTreeMap<String, String>,
    show_warnings: bool,
) -> Result<ExitCode> {
    let declaration = load_declaration(config_path, vars)?;

    let validator = vectorform::config::DeclarationValidator::new();
    let result = validator.validate(&declaration)?;

    eprintln!("Declaration is valid!");
    if show_warnings && !result.warnings.is_empty() {
        eprintln!("\nWarnings:");
        for warning in &result.warnings {
            eprintln!("  - {warning}");
        }
    }

    eprintln!("\nDeclaration summary:");
    eprintln!("  Project: {}", declaration.project.name);
    eprintln!("  Environment: {}", declaration.project.environment);
    eprintln!("  Resources: {}", declaration.resource_count());
    eprintln!("  Outputs: {}", declaration.outputs.len());

    Ok(ExitCode::SUCCESS)
}

/// Show the plan without mutating anything.
async fn cmd_plan(
    config: Option<&PathBuf>,
    vars: &std::collections::BTreeMap<String, String>,
    detailed: bool,
    formatter: &OutputFormatter,
    cancel: watch::Receiver<bool>,
) -> Result<ExitCode> {
    let declaration = load_declaration(config, vars)?;
    let reconciler = Reconciler::new(create_provider(&declaration)?, cancel);

    let plan = reconciler.preview(&declaration).await?;
    eprintln!("{}", formatter.format_plan(&plan, detailed));

    Ok(ExitCode::SUCCESS)
}

/// Apply the declaration.
async fn cmd_apply(
    config: Option<&PathBuf>,
    vars: &std::collections::BTreeMap<String, String>,
    auto_approve: bool,
    options: ExecutionOptions,
    formatter: &OutputFormatter,
    cancel: watch::Receiver<bool>,
) -> Result<ExitCode> {
    let declaration = load_declaration(config, vars)?;
    let reconciler = Reconciler::new(create_provider(&declaration)?, cancel);

    // Show what is about to happen
    let preview = reconciler.preview(&declaration).await?;
    if !preview.has_changes() {
        eprintln!("No changes to apply.");
        return Ok(ExitCode::SUCCESS);
    }
    eprintln!("{}", formatter.format_plan(&preview, false));

    // Confirm
    if !auto_approve && !confirm("Do you want to apply this plan? [y/N]: ", "y")? {
        eprintln!("Apply cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = reconciler.apply(&declaration, options).await?;
    eprintln!("{}", formatter.format_report(&outcome.report));

    if let Some(outputs) = &outcome.outputs {
        eprintln!("{}", formatter.format_outputs(outputs));
    }

    if outcome.report.failed() > 0 {
        Ok(ExitCode::from(EXIT_PROVIDER))
    } else if outcome.report.skipped() > 0 {
        Ok(ExitCode::from(EXIT_PARTIAL))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Check for drift.
async fn cmd_drift(
    config: Option<&PathBuf>,
    vars: &std::collections::BTreeMap<String, String>,
    formatter: &OutputFormatter,
    cancel: watch::Receiver<bool>,
) -> Result<ExitCode> {
    let declaration = load_declaration(config, vars)?;
    let reconciler = Reconciler::new(create_provider(&declaration)?, cancel);

    let report = reconciler.check_drift(&declaration).await?;
    eprintln!("{}", formatter.format_drift(&report));

    Ok(ExitCode::SUCCESS)
}

/// Resolve and display outputs from live state.
async fn cmd_outputs(
    config: Option<&PathBuf>,
    vars: &std::collections::BTreeMap<String, String>,
    formatter: &OutputFormatter,
    cancel: watch::Receiver<bool>,
) -> Result<ExitCode> {
    let declaration = load_declaration(config, vars)?;
    let reconciler = Reconciler::new(create_provider(&declaration)?, cancel);

    let outputs = reconciler.resolve_outputs(&declaration).await?;
    eprintln!("{}", formatter.format_outputs(&outputs));

    Ok(ExitCode::SUCCESS)
}

/// Destroy all declared resources.
async fn cmd_destroy(
    config: Option<&PathBuf>,
    vars: &std::collections::BTreeMap<String, String>,
    auto_approve: bool,
    formatter: &OutputFormatter,
    cancel: watch::Receiver<bool>,
) -> Result<ExitCode> {
    let declaration = load_declaration(config, vars)?;
    let reconciler = Reconciler::new(create_provider(&declaration)?, cancel);

    eprintln!("The following resources will be destroyed:");
    for descriptor in &declaration.descriptors {
        eprintln!("  - {}", descriptor.address());
    }

    if !auto_approve
        && !confirm(
            "\nThis action is IRREVERSIBLE. Type 'destroy' to confirm: ",
            "destroy",
        )?
    {
        eprintln!("Destruction cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let report = reconciler.destroy(&declaration).await?;
    eprintln!("{}", formatter.format_destroy(&report));

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Prompts for confirmation on stderr and matches the expected answer.
fn confirm(prompt: &str, expected: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case(expected))
}

/// Resolves the declaration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads and lowers the declaration.
fn load_declaration(
    config_path: Option<&PathBuf>,
    vars: &std::collections::BTreeMap<String, String>,
) -> Result<Declaration> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading declaration from: {}", config_file.display());

    let parser = ConfigParser::new()
        .with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")))
        .with_variable_overrides(vars.clone());
    parser.load_dotenv()?;

    parser.load_file(&config_file)
}

/// Creates the provider adapter from declaration settings.
fn create_provider(declaration: &Declaration) -> Result<Arc<dyn ProviderAdapter>> {
    match declaration.provider.backend {
        ProviderBackend::Memory => Ok(Arc::new(MemoryProvider::new())),
        ProviderBackend::Http => {
            let endpoint = declaration
                .provider
                .endpoint
                .clone()
                .ok_or_else(|| vectorform::VectorformError::internal("provider endpoint not set"))?;
            let api_key = ConfigParser::get_api_key()?;
            let config = ProviderConfig::new(endpoint, declaration.provider.region.clone(), api_key);
            Ok(Arc::new(HttpProvider::new(config)?))
        }
    }
}
