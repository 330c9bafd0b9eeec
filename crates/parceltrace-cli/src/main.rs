mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;
use crate::error::CliError;
use crate::output::Envelope;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    let result = commands::run(&cli).await?;
    let envelope = Envelope::new(result.data, result.latency_ms);
    output::render(&envelope, cli.pretty)?;

    if cli.strict && result.failed > 0 {
        return Err(CliError::StrictModeViolation {
            failed: result.failed,
            total: result.total,
        });
    }

    Ok(())
}
