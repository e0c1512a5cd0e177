//! sproc - Main entry point.
//!
//! Runs one stored procedure against a configured connection and prints the
//! result rows as JSON lines, or the affected-row count with `--execute`.

use sproc_adapter::DataAdapter;
use sproc_adapter::config::Config;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    if !config.enable_logs {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // stdout carries results; logs go to stderr
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    }
}

fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let args = config.procedure_args()?;
    let adapter = DataAdapter::default().with_options(config.adapter_options());
    adapter.configure(None)?;

    let connection = config.connection.as_deref();
    let mut out = io::stdout().lock();

    if config.execute {
        let affected = adapter.execute(&config.procedure, args, connection)?;
        writeln!(out, "{affected}")?;
        return Ok(());
    }

    let rows = adapter.query_rows(&config.procedure, args, connection)?;
    for row in &rows {
        writeln!(out, "{}", serde_json::Value::Object(row.to_json_map()))?;
    }
    info!(rows = rows.len(), "Done");
    Ok(())
}

fn main() -> ExitCode {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    init_tracing(&config);

    info!(
        procedure = %config.procedure,
        "Starting sproc v{}",
        env!("CARGO_PKG_VERSION")
    );

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Procedure failed");
            eprintln!("Error: {e}");
            if let Some(suggestion) = e
                .downcast_ref::<sproc_adapter::DbError>()
                .and_then(|e| e.suggestion())
            {
                eprintln!("Hint: {suggestion}");
            }
            ExitCode::FAILURE
        }
    }
}
