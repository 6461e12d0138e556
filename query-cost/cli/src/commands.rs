use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::bail;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use query_cost::Configuration;
use query_cost::CostLimit;
use query_cost::CostMap;
use query_cost::CostReport;
use query_cost::Object;
use query_cost::QueryCostCalculator;
use query_cost::QueryCostError;
use query_cost::configuration::generate_config_schema;
use query_cost::validate_query_cost;
use serde_json::json;

#[derive(clap::Args)]
pub(crate) struct EstimateArgs {
    /// The path to the operation file, or `-` for stdin
    pub(crate) operation: PathBuf,

    /// The path to the schema file
    #[arg(long)]
    pub(crate) schema: PathBuf,

    /// The path to a YAML configuration file
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// The path to a cost map file, replacing the cost map of the configuration
    #[arg(long)]
    pub(crate) cost_map: Option<PathBuf>,

    /// Name of the operation to estimate. Every operation of the document is counted when absent
    #[arg(long)]
    pub(crate) operation_name: Option<String>,

    /// The path to a JSON file holding the request variables
    #[arg(long)]
    pub(crate) variables: Option<PathBuf>,

    /// Maximum cost, replacing `max_complexity` from the configuration
    #[arg(long, env = "QUERY_COST_MAX_COMPLEXITY")]
    pub(crate) max_complexity: Option<u64>,
}

/// What a command prints on stdout, and whether the process should exit successfully.
pub(crate) struct Outcome {
    pub(crate) output: String,
    pub(crate) success: bool,
}

fn read_input(input_path: &Path) -> anyhow::Result<String> {
    if input_path == Path::new("-") {
        io::read_to_string(io::stdin()).context("could not read stdin")
    } else {
        fs::read_to_string(input_path)
            .with_context(|| format!("could not read {}", input_path.display()))
    }
}

fn parse_schema(path: &Path) -> anyhow::Result<Valid<Schema>> {
    let source = read_input(path)?;
    Ok(Schema::parse_and_validate(source, path).map_err(QueryCostError::from)?)
}

fn read_variables(path: Option<&Path>) -> anyhow::Result<Object> {
    let Some(path) = path else {
        return Ok(Object::new());
    };
    let source = read_input(path)?;
    let variables: serde_json_bytes::Value = serde_json::from_str(&source)
        .with_context(|| format!("could not parse variables from {}", path.display()))?;
    match variables {
        serde_json_bytes::Value::Object(variables) => Ok(variables),
        _ => bail!("variables in {} must be a JSON object", path.display()),
    }
}

pub(crate) fn estimate(args: &EstimateArgs) -> anyhow::Result<Outcome> {
    let configuration = match &args.config {
        Some(path) => Configuration::from_path(path)?,
        None => Configuration::default(),
    };
    let cost_map = match &args.cost_map {
        Some(path) => CostMap::from_path(path)?,
        None => configuration.load_cost_map(args.config.as_deref().and_then(Path::parent))?,
    };
    let calculator =
        QueryCostCalculator::new(Arc::new(cost_map), configuration.calculator_options());
    let limit = args
        .max_complexity
        .map(CostLimit::new)
        .or_else(|| configuration.cost_limit());

    let schema = parse_schema(&args.schema)?;
    let operation = read_input(&args.operation)?;
    let variables = read_variables(args.variables.as_deref())?;

    let result = ExecutableDocument::parse_and_validate(&schema, operation, &args.operation)
        .map_err(QueryCostError::from)
        .and_then(|document| {
            validate_query_cost(
                &schema,
                &document,
                args.operation_name.as_deref(),
                &variables,
                &calculator,
                limit,
            )
        });
    respond(result)
}

/// Renders the result the way a GraphQL server would answer a rejected request, or with the
/// cost extension of an accepted one.
fn respond(result: Result<CostReport, QueryCostError>) -> anyhow::Result<Outcome> {
    let (response, success) = match result {
        Ok(report) => (json!({ "extensions": report.to_extensions() }), true),
        Err(error) => {
            tracing::info!(code = error.code(), "operation rejected: {error}");
            (json!({ "errors": [error.to_graphql_error()] }), false)
        }
    };
    Ok(Outcome {
        output: serde_json::to_string_pretty(&response)?,
        success,
    })
}

pub(crate) fn validate_cost_map(schema: &Path, cost_map: &Path) -> anyhow::Result<Outcome> {
    let schema = parse_schema(schema)?;
    let cost_map = CostMap::from_path(cost_map)?;
    Ok(match cost_map.validate(&schema) {
        Ok(()) => Outcome {
            output: "cost map is valid".to_string(),
            success: true,
        },
        Err(error) => Outcome {
            output: error.to_string(),
            success: false,
        },
    })
}

pub(crate) fn config_schema() -> anyhow::Result<Outcome> {
    Ok(Outcome {
        output: serde_json::to_string_pretty(&generate_config_schema())?,
        success: true,
    })
}
