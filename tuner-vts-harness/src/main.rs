//! tuner-vts-check: lint a tuner topology configuration.
//!
//! Loads the configuration, validates it and prints the scenario bindings
//! each dataflow context would be tested with.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use tuner_vts_harness::config::{self, TopologyConfig};
use tuner_vts_harness::logging::{self, LogOptions};
use tuner_vts_harness::{init_configuration, SuiteTopology};
use tuner_vts_protocol::DataflowContext;

/// tuner-vts-check - validate a tuner topology and list its test scenarios
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration base path (without variant and extension)
    #[arg(short = 'f', long, default_value = config::DEFAULT_CONFIG_BASE)]
    config: PathBuf,

    /// Configuration variant, e.g. the device name
    #[arg(long)]
    variant: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory where log files are stored
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Number of days to keep log files [default: 7]
    #[arg(long)]
    log_retention_days: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let variant = args.variant.clone().or_else(config::variant_from_env);

    let file_config = match TopologyConfig::load(&args.config, variant.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let log_options = LogOptions {
        level: file_config.logging.level.clone(),
        verbose: args.verbose,
        log_dir: args
            .log_dir
            .clone()
            .or_else(|| file_config.logging.log_dir.as_ref().map(PathBuf::from)),
        retention_days: args
            .log_retention_days
            .or(file_config.logging.retention_days)
            .unwrap_or(7),
    };
    if let Err(e) = logging::init_logging(&log_options) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let suite = match init_configuration(&file_config) {
        Ok(suite) => suite,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&suite.summary()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize summary: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_table(&suite);
    }

    ExitCode::SUCCESS
}

fn print_table(suite: &SuiteTopology) {
    let summary = suite.summary();
    println!("Resources:");
    for resource in &summary.resources {
        match resource.filter_type {
            Some(filter_type) => println!(
                "  {:<16} {:>3}  {:?}",
                resource.kind.name(),
                resource.count,
                filter_type.sub_type
            ),
            None => println!("  {:<16} {:>3}", resource.kind.name(), resource.count),
        }
    }
    println!("Connections: {}", summary.connections);
    println!();

    for context in DataflowContext::ALL {
        let enabled = if suite.enabled().contains(&context) {
            " (enabled)"
        } else {
            ""
        };
        let bindings = suite.bindings().get(context);
        println!("{}{}: {} binding(s)", context, enabled, bindings.len());
        if bindings.is_empty() {
            println!("  - not instantiated");
        }
        for binding in bindings {
            println!("  - {}", binding);
        }
    }
}
