mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use factorpool_core::FactorpoolConfig;

use crate::cli::Cli;
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = FactorpoolConfig::load(cli.config.as_deref())?;
    config.logging.init();

    let envelope = commands::run(&cli, &config)?;
    output::render(&envelope, cli.format, cli.pretty)?;

    if !envelope.errors.is_empty() {
        return Err(CliError::PartialFailure {
            error_count: envelope.errors.len(),
        });
    }

    Ok(())
}
