//! Logic for loading configuration in to an object model
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::OnceLock;

use displaydoc::Display;
use jsonschema::Validator;
use schemars::JsonSchema;
use schemars::Schema;
use schemars::generate::SchemaSettings;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::calculator::CalculatorOptions;
use crate::calculator::QueryCostCalculator;
use crate::cost_map::CostMap;
use crate::error::QueryCostError;
use crate::limits::CostLimit;

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not read configuration file {path}: {error}
    CannotRead { path: String, error: std::io::Error },
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
    /// could not deserialize configuration: {0}
    DeserializeConfigError(serde_json::Error),
}

/// Where the cost map comes from.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub enum CostMapSource {
    /// Path to a YAML or JSON cost map, relative to the configuration file.
    File(PathBuf),
    /// The cost map itself.
    Inline(CostMap),
}

impl Default for CostMapSource {
    fn default() -> Self {
        CostMapSource::Inline(CostMap::default())
    }
}

/// Query cost configuration.
///
/// Can be created through `serde::Deserialize` from various formats, or parsed and validated
/// from YAML with [`FromStr`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    /// Operations whose estimated cost exceeds this value are rejected. Unlimited when unset.
    pub max_complexity: Option<u64>,

    /// Complexity of cost map entries that do not set one.
    pub default_complexity: u64,

    /// Cost of fields missing from the cost map.
    pub default_cost: u64,

    /// Leave selections excluded by `@skip` and `@include` out of the estimate.
    pub respect_conditional_directives: bool,

    /// The cost map, inline or as a file.
    pub cost_map: CostMapSource,
}

impl Default for Configuration {
    fn default() -> Self {
        let options = CalculatorOptions::default();
        Self {
            max_complexity: None,
            default_complexity: options.default_complexity,
            default_cost: options.default_cost,
            respect_conditional_directives: options.respect_conditional_directives,
            cost_map: CostMapSource::default(),
        }
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_yaml_configuration(s)
    }
}

impl Configuration {
    /// Reads and validates a YAML configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigurationError> {
        let raw_yaml =
            std::fs::read_to_string(path).map_err(|error| ConfigurationError::CannotRead {
                path: path.display().to_string(),
                error,
            })?;
        let configuration = raw_yaml.parse()?;
        tracing::info!(path = %path.display(), "loaded query cost configuration");
        Ok(configuration)
    }

    pub fn calculator_options(&self) -> CalculatorOptions {
        CalculatorOptions {
            default_complexity: self.default_complexity,
            default_cost: self.default_cost,
            respect_conditional_directives: self.respect_conditional_directives,
        }
    }

    pub fn cost_limit(&self) -> Option<CostLimit> {
        self.max_complexity.map(CostLimit::new)
    }

    /// Loads the configured cost map. Relative file paths are resolved against `base_dir`.
    pub fn load_cost_map(&self, base_dir: Option<&Path>) -> Result<CostMap, QueryCostError> {
        match &self.cost_map {
            CostMapSource::Inline(cost_map) => Ok(cost_map.clone()),
            CostMapSource::File(path) => match base_dir {
                Some(base_dir) if path.is_relative() => CostMap::from_path(&base_dir.join(path)),
                _ => CostMap::from_path(path),
            },
        }
    }

    pub fn calculator(
        &self,
        base_dir: Option<&Path>,
    ) -> Result<QueryCostCalculator, QueryCostError> {
        Ok(QueryCostCalculator::new(
            Arc::new(self.load_cost_map(base_dir)?),
            self.calculator_options(),
        ))
    }
}

/// Generate a JSON schema for the configuration.
pub fn generate_config_schema() -> Schema {
    let settings = SchemaSettings::draft07();
    settings.into_generator().into_root_schema_for::<Configuration>()
}

/// Validate config yaml against the generated json schema, then deserialize it.
///
/// Schema validation reports every problem at once, where serde would stop at the first one.
fn validate_yaml_configuration(raw_yaml: &str) -> Result<Configuration, ConfigurationError> {
    let defaulted_yaml = if raw_yaml.trim().is_empty() {
        "{}"
    } else {
        raw_yaml
    };

    let yaml: serde_json::Value = serde_yaml::from_str(defaulted_yaml).map_err(|e| {
        ConfigurationError::InvalidConfiguration {
            message: "failed to parse yaml",
            error: e.to_string(),
        }
    })?;

    static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();
    let validator = VALIDATOR
        .get_or_init(|| {
            let config_schema =
                serde_json::to_value(generate_config_schema()).map_err(|e| e.to_string())?;
            jsonschema::draft7::new(&config_schema).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|error| ConfigurationError::InvalidConfiguration {
            message: "failed to compile configuration schema",
            error: error.clone(),
        })?;

    let errors: Vec<String> = validator
        .iter_errors(&yaml)
        .map(|error| error.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(ConfigurationError::InvalidConfiguration {
            message: "configuration had errors",
            error: errors.join("\n"),
        });
    }

    serde_json::from_value(yaml).map_err(ConfigurationError::DeserializeConfigError)
}
