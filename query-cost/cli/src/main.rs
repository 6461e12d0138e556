use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

/// CLI arguments. See <https://docs.rs/clap/latest/clap/_derive/index.html>
#[derive(Parser)]
struct Args {
    /// Format of the logs written to stderr. Verbosity is controlled with `RUST_LOG`.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Estimates the cost of an operation and checks it against the maximum cost
    Estimate(commands::EstimateArgs),
    /// Checks that a cost map only names object types and fields defined by the schema
    ValidateCostMap {
        /// The path to the schema file
        schema: PathBuf,
        /// The path to the cost map file (YAML, or JSON with a `.json` extension)
        cost_map: PathBuf,
    },
    /// Prints the JSON schema of the configuration file
    ConfigSchema,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_format);

    let result = match args.command {
        Command::Estimate(estimate_args) => commands::estimate(&estimate_args),
        Command::ValidateCostMap { schema, cost_map } => {
            commands::validate_cost_map(&schema, &cost_map)
        }
        Command::ConfigSchema => commands::config_schema(),
    };

    match result {
        Ok(outcome) => {
            println!("{}", outcome.output);
            if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
