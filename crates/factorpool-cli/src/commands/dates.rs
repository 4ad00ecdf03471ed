use factorpool_core::{select_dates, FactorpoolConfig, TradeDate, Warehouse};
use serde_json::json;

use crate::error::CliError;

use super::{CommandResult, Context};

pub fn run(context: &Context<'_>) -> Result<CommandResult, CliError> {
    let warehouse = context.open_warehouse()?;
    let (dates, calendar_days) = rebalance_dates(&warehouse, context.config)?;

    let sampling = &context.config.sampling;
    let result = CommandResult::ok(json!({
        "exchange": sampling.exchange,
        "anchors": sampling.anchors,
        "policy": sampling.anchor_policy,
        "dates": dates,
    }));
    if calendar_days == 0 {
        return Ok(result.with_warning(format!(
            "trade calendar for {} is empty; run sync-calendar first",
            sampling.exchange
        )));
    }
    Ok(result)
}

/// Rebalance dates for the configured window and the number of calendar rows read.
pub fn rebalance_dates(
    warehouse: &Warehouse,
    config: &FactorpoolConfig,
) -> Result<(Vec<TradeDate>, usize), CliError> {
    let sampling = &config.sampling;
    let calendar = warehouse.trade_calendar(
        sampling.exchange.as_str(),
        sampling.start_date.as_str(),
        sampling.end_date.as_str(),
    )?;
    let dates = select_dates(
        &calendar,
        &sampling.start_date,
        &sampling.end_date,
        &sampling.anchors,
        sampling.anchor_policy,
    );
    Ok((dates, calendar.len()))
}
