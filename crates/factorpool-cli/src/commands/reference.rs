use factorpool_core::{ReferenceSync, TushareClient, ValidationError};
use serde_json::json;

use crate::cli::SyncCalendarArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

pub fn sync_securities(context: &Context<'_>) -> Result<CommandResult, CliError> {
    let warehouse = context.open_warehouse()?;
    let provider = TushareClient::new(&context.config.provider)?;

    let rows = ReferenceSync::new(&warehouse, &provider).sync_securities()?;
    Ok(CommandResult::ok(json!({
        "table": "securities",
        "rows_written": rows,
    })))
}

pub fn sync_calendar(
    args: &SyncCalendarArgs,
    context: &Context<'_>,
) -> Result<CommandResult, CliError> {
    let sampling = &context.config.sampling;
    let exchange = args.exchange.as_deref().unwrap_or(sampling.exchange.as_str());
    let start = Context::date_or(args.start.as_deref(), &sampling.start_date)?;
    let end = Context::date_or(args.end.as_deref(), &sampling.end_date)?;
    if start > end {
        return Err(ValidationError::InvertedRange {
            start: start.to_string(),
            end: end.to_string(),
        }
        .into());
    }

    let warehouse = context.open_warehouse()?;
    let provider = TushareClient::new(&context.config.provider)?;

    let rows = ReferenceSync::new(&warehouse, &provider).sync_calendar(exchange, &start, &end)?;
    Ok(CommandResult::ok(json!({
        "table": "trade_calendar",
        "exchange": exchange,
        "start": start,
        "end": end,
        "rows_written": rows,
    })))
}
