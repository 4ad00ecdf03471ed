use factorpool_core::DatasetAdapter;
use serde_json::json;

use crate::cli::CoverageArgs;
use crate::error::CliError;

use super::{parse_dataset, CommandResult, Context};

pub fn run(args: &CoverageArgs, context: &Context<'_>) -> Result<CommandResult, CliError> {
    let kind = parse_dataset(&args.dataset)?;
    let warehouse = context.open_warehouse()?;
    let rows = warehouse.coverage(kind.spec().table)?;

    let total_rows = rows.iter().map(|row| row.row_count).sum::<i64>();
    Ok(CommandResult::ok(json!({
        "dataset": kind.as_str(),
        "codes": rows.len(),
        "total_rows": total_rows,
        "coverage": rows,
    })))
}
