mod cli;
mod error;
mod logging;
mod output;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use pricesync_core::{ReqwestHttpClient, SyncPipeline};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(exit_code = error.exit_code(), "{error}");
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_format)?;

    let config = cli.to_config()?;
    tracing::debug!(config = ?config, "configuration loaded");

    let http_client = Arc::new(ReqwestHttpClient::new()?);
    let pipeline = SyncPipeline::with_http_client(config, http_client);
    let report = pipeline.run().await?;

    output::render(&report, cli.pretty)?;

    if cli.strict && report.has_failed_writes() {
        return Err(CliError::StrictModeViolation {
            failed: report.result.updates.failed,
            attempted: report.result.updates.attempted,
        });
    }

    Ok(ExitCode::SUCCESS)
}
