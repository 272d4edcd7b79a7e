//! Declaration parser: file loading, variable interpolation, and lowering
//! into resource descriptors.
//!
//! The parser turns the YAML declaration into [`Declaration`] form: variable
//! interpolations (`${var.x}`) are substituted eagerly, and whole-string
//! resource interpolations (`${type.name.attribute}`) become explicit
//! `Reference` attribute values that the reconciler resolves in a dedicated
//! pass. There is no ambient lookup at apply time.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ConfigError, Result, VectorformError};
use crate::graph::{AttributeValue, ResourceDescriptor, ResourceRef, Scalar};
use crate::provider::types::RESOURCE_VECTOR_BUCKET;

use super::spec::{Declaration, DeclarationFile, ResourceBlock};

/// Parser for declaration files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
    /// Variable overrides from the command line (`--var name=value`).
    overrides: BTreeMap<String, String>,
}

impl ConfigParser {
    /// Creates a new declaration parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Adds variable overrides, taking precedence over declared defaults.
    #[must_use]
    pub fn with_variable_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Loads and lowers a declaration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or interpolated.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Declaration> {
        let path = path.as_ref();
        info!("Loading declaration from: {}", path.display());

        if !path.exists() {
            return Err(VectorformError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            VectorformError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses and lowers a declaration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or interpolation fails.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Declaration> {
        debug!("Parsing YAML declaration");

        let mut file: DeclarationFile = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            VectorformError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        Self::apply_env_overrides(&mut file);
        self.lower(file)
    }

    /// Lowers a parsed declaration file into descriptor form.
    fn lower(&self, file: DeclarationFile) -> Result<Declaration> {
        let variables = self.variable_table(&file)?;

        let mut descriptors = Vec::with_capacity(file.resources.len());
        for block in &file.resources {
            descriptors.push(Self::lower_resource(block, &variables)?);
        }

        let mut outputs = BTreeMap::new();
        for (name, expression) in &file.outputs {
            outputs.insert(name.clone(), interpolate(expression, &variables)?);
        }

        debug!(
            "Lowered declaration for project '{}': {} resources, {} outputs",
            file.project.name,
            descriptors.len(),
            outputs.len()
        );

        Ok(Declaration {
            project: file.project,
            provider: file.provider,
            descriptors,
            outputs,
        })
    }

    /// Builds the variable table from declared defaults and CLI overrides.
    fn variable_table(&self, file: &DeclarationFile) -> Result<BTreeMap<String, Scalar>> {
        let mut table = BTreeMap::new();

        for (name, spec) in &file.variables {
            if let Some(raw) = self.overrides.get(name) {
                table.insert(name.clone(), parse_scalar(raw));
            } else if let Some(default) = &spec.default {
                let value = scalar_from_yaml(default).ok_or_else(|| {
                    VectorformError::Config(ConfigError::validation(
                        format!("Variable '{name}' default must be a scalar"),
                        format!("variables.{name}"),
                    ))
                })?;
                table.insert(name.clone(), value);
            }
        }

        // Overrides may also introduce variables that have no declaration.
        for (name, raw) in &self.overrides {
            table
                .entry(name.clone())
                .or_insert_with(|| parse_scalar(raw));
        }

        Ok(table)
    }

    /// Lowers a single resource block into a descriptor.
    fn lower_resource(
        block: &ResourceBlock,
        variables: &BTreeMap<String, Scalar>,
    ) -> Result<ResourceDescriptor> {
        let mut descriptor = ResourceDescriptor::new(&block.resource_type, &block.name);

        for (key, value) in &block.attributes {
            let lowered = match value {
                serde_yaml::Value::String(s) => interpolate(s, variables)?,
                other => AttributeValue::Literal(scalar_from_yaml(other).ok_or_else(|| {
                    VectorformError::Config(ConfigError::validation(
                        format!(
                            "Attribute '{key}' of {}.{} must be a scalar",
                            block.resource_type, block.name
                        ),
                        format!("resources.{}.attributes.{key}", block.name),
                    ))
                })?),
            };
            descriptor.attributes.insert(key.clone(), lowered);
        }

        // Tags are mutable scalar attributes under a `tags.` prefix.
        for (key, value) in &block.tags {
            let lowered = interpolate(value, variables)?;
            descriptor.attributes.insert(format!("tags.{key}"), lowered);
        }

        // A bucket without an explicit bucket_name is named after itself.
        if block.resource_type == RESOURCE_VECTOR_BUCKET
            && !descriptor.attributes.contains_key("bucket_name")
        {
            descriptor.attributes.insert(
                String::from("bucket_name"),
                AttributeValue::Literal(Scalar::String(block.name.clone())),
            );
        }

        for address in &block.depends_on {
            let target = ResourceRef::parse(address).ok_or_else(|| {
                VectorformError::Config(ConfigError::validation(
                    format!("depends_on entry '{address}' is not a 'type.name' address"),
                    format!("resources.{}.depends_on", block.name),
                ))
            })?;
            descriptor.depends_on.insert(target);
        }

        Ok(descriptor)
    }

    /// Applies environment variable overrides to the declaration.
    fn apply_env_overrides(file: &mut DeclarationFile) {
        if let Ok(name) = std::env::var("VECTORFORM_PROJECT_NAME") {
            debug!("Overriding project.name from environment");
            file.project.name = name;
        }

        if let Ok(env) = std::env::var("VECTORFORM_PROJECT_ENVIRONMENT") {
            debug!("Overriding project.environment from environment");
            file.project.environment = env;
        }

        if let Ok(endpoint) = std::env::var("VECTORFORM_PROVIDER_ENDPOINT") {
            debug!("Overriding provider.endpoint from environment");
            file.provider.endpoint = Some(endpoint);
        }

        if let Ok(region) = std::env::var("VECTORFORM_PROVIDER_REGION") {
            debug!("Overriding provider.region from environment");
            file.provider.region = region;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                VectorformError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the provider API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not set.
    pub fn get_api_key() -> Result<String> {
        std::env::var("VECTORFORM_API_KEY").map_err(|_| {
            VectorformError::Config(ConfigError::MissingEnvVar {
                name: String::from("VECTORFORM_API_KEY"),
            })
        })
    }
}

/// Interpolates a string attribute value.
///
/// A whole-string `${type.name.attribute}` becomes a `Reference`; `${var.x}`
/// substitutes the variable (a whole-string variable keeps the variable's
/// scalar type). Resource references embedded inside larger strings are
/// rejected.
fn interpolate(input: &str, variables: &BTreeMap<String, Scalar>) -> Result<AttributeValue> {
    if let Some(inner) = whole_expression(input) {
        if let Some(var_name) = inner.strip_prefix("var.") {
            let value = variables.get(var_name).ok_or_else(|| {
                VectorformError::Config(ConfigError::MissingVariable {
                    name: var_name.to_string(),
                })
            })?;
            return Ok(AttributeValue::Literal(value.clone()));
        }
        return parse_resource_reference(inner);
    }

    // Mixed string: substitute variables inline; resource references are
    // only allowed as whole-string expressions.
    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(VectorformError::Config(ConfigError::InvalidInterpolation {
                expression: input.to_string(),
                message: String::from("unterminated '${'"),
            }));
        };
        let inner = &after[..end];
        let Some(var_name) = inner.strip_prefix("var.") else {
            return Err(VectorformError::Config(ConfigError::InvalidInterpolation {
                expression: input.to_string(),
                message: String::from(
                    "resource references must be the entire value, not embedded in a string",
                ),
            }));
        };
        let value = variables.get(var_name).ok_or_else(|| {
            VectorformError::Config(ConfigError::MissingVariable {
                name: var_name.to_string(),
            })
        })?;
        result.push_str(&value.to_string());
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    Ok(AttributeValue::Literal(Scalar::String(result)))
}

/// Returns the inner expression when the input is exactly one `${...}`.
fn whole_expression(input: &str) -> Option<&str> {
    let inner = input.strip_prefix("${")?.strip_suffix('}')?;
    if inner.contains("${") || inner.contains('}') {
        return None;
    }
    Some(inner)
}

/// Parses a `type.name.attribute` expression into a `Reference`.
fn parse_resource_reference(expression: &str) -> Result<AttributeValue> {
    let invalid = || {
        VectorformError::Config(ConfigError::InvalidInterpolation {
            expression: expression.to_string(),
            message: String::from("expected 'var.<name>' or '<type>.<name>.<attribute>'"),
        })
    };

    let (address, attribute) = expression.rsplit_once('.').ok_or_else(invalid)?;
    if attribute.is_empty() {
        return Err(invalid());
    }
    let target = ResourceRef::parse(address).ok_or_else(invalid)?;

    Ok(AttributeValue::Reference {
        target,
        attribute: attribute.to_string(),
    })
}

/// Converts a YAML scalar into a `Scalar`.
fn scalar_from_yaml(value: &serde_yaml::Value) -> Option<Scalar> {
    match value {
        serde_yaml::Value::Bool(b) => Some(Scalar::Bool(*b)),
        serde_yaml::Value::Number(n) => n.as_i64().map_or_else(
            || n.as_f64().map(Scalar::Float),
            |i| Some(Scalar::Int(i)),
        ),
        serde_yaml::Value::String(s) => Some(Scalar::String(s.clone())),
        _ => None,
    }
}

/// Parses a CLI override string into the narrowest scalar type.
fn parse_scalar(raw: &str) -> Scalar {
    if let Ok(b) = raw.parse::<bool>() {
        return Scalar::Bool(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Scalar::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Scalar::Float(f);
    }
    Scalar::String(raw.to_string())
}

/// Default declaration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["vectorform.yaml", "vectorform.yml"];

/// Finds the declaration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no declaration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found declaration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(VectorformError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
