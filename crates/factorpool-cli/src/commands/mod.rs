mod coverage;
mod dates;
mod reference;
mod sample;
mod sql;
mod sync;

use std::time::Instant;

use factorpool_core::{
    DatasetKind, Envelope, EnvelopeError, EnvelopeMeta, FactorpoolConfig, TradeDate, Warehouse,
};
use serde_json::Value;
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

/// Shared state handed to every command.
pub struct Context<'a> {
    pub config: &'a FactorpoolConfig,
}

impl Context<'_> {
    pub fn open_warehouse(&self) -> Result<Warehouse, CliError> {
        Ok(Warehouse::open(self.config.warehouse.to_warehouse_config())?)
    }

    /// `value` parsed as a trade date, or `fallback` when absent.
    pub fn date_or(value: Option<&str>, fallback: &TradeDate) -> Result<TradeDate, CliError> {
        match value {
            Some(raw) => Ok(TradeDate::parse(raw)?),
            None => Ok(fallback.clone()),
        }
    }
}

pub fn parse_dataset(raw: &str) -> Result<DatasetKind, CliError> {
    Ok(raw.parse::<DatasetKind>()?)
}

pub fn run(cli: &Cli, config: &FactorpoolConfig) -> Result<Envelope<Value>, CliError> {
    let started = Instant::now();
    let context = Context { config };

    let CommandResult {
        data,
        warnings,
        errors,
    } = match &cli.command {
        Command::SyncSecurities => reference::sync_securities(&context)?,
        Command::SyncCalendar(args) => reference::sync_calendar(args, &context)?,
        Command::Sync(args) => sync::run(args, &context)?,
        Command::RebalanceDates => dates::run(&context)?,
        Command::Sample(args) => sample::run(args, &context)?,
        Command::Coverage(args) => coverage::run(args, &context)?,
        Command::Sql(args) => sql::run(args, &context)?,
    };

    let mut meta = EnvelopeMeta::new(
        Uuid::new_v4().to_string(),
        started.elapsed().as_millis() as u64,
    )?;
    for warning in warnings {
        meta.push_warning(warning);
    }

    Envelope::with_errors(meta, data, errors).map_err(CliError::from)
}
