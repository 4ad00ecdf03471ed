use factorpool_core::{EnvelopeError, TradeDate, UniverseError, UniverseFilter};
use serde_json::{json, Value};

use crate::cli::SampleArgs;
use crate::error::CliError;

use super::dates::rebalance_dates;
use super::{CommandResult, Context};

pub fn run(args: &SampleArgs, context: &Context<'_>) -> Result<CommandResult, CliError> {
    let warehouse = context.open_warehouse()?;
    let dates = match args.date.as_deref() {
        Some(raw) => vec![TradeDate::parse(raw)?],
        None => rebalance_dates(&warehouse, context.config)?.0,
    };

    let mut filter = UniverseFilter::new(&warehouse, &context.config.universe)?;
    let mut samples = Vec::with_capacity(dates.len());
    let mut errors = Vec::new();

    for date in &dates {
        match filter.build_sample(date) {
            Ok(sample) => samples.push(json!({
                "date": sample.date,
                "summary": sample.summary,
                "codes": sample.codes,
            })),
            Err(error @ UniverseError::MissingBenchmark { .. }) => {
                errors.push(
                    EnvelopeError::new("universe.missing_benchmark", error.to_string())?
                        .with_retryable(false)
                        .with_subject(date.as_str()),
                );
            }
            Err(error) => return Err(error.into()),
        }
    }

    let result = CommandResult::ok(Value::Array(samples)).with_errors(errors);
    if dates.is_empty() {
        return Ok(result.with_warning("no rebalance dates in the sampling window"));
    }
    Ok(result)
}
