use std::time::Duration;

use factorpool_core::{
    DatasetAdapter, DatasetKind, EnvelopeError, IngestionPipeline, RateLimitedScheduler,
    SecurityCode, SyncMode, SyncStateResolver, TushareClient, Warehouse,
};
use serde_json::json;
use tracing::{info, warn};

use crate::cli::SyncArgs;
use crate::error::CliError;

use super::{parse_dataset, CommandResult, Context};

pub fn run(args: &SyncArgs, context: &Context<'_>) -> Result<CommandResult, CliError> {
    let config = context.config;
    let kind = parse_dataset(&args.dataset)?;
    let mode = args.mode.map_or(config.ingestion.sync_mode, SyncMode::from);

    let warehouse = context.open_warehouse()?;
    let codes = target_codes(args, kind, context, &warehouse)?;
    let provider = TushareClient::new(&config.provider)?;

    let resolver = SyncStateResolver::new(
        &warehouse,
        config.sampling.start_date.clone(),
        config.sampling.end_date.clone(),
        mode,
    );
    let pipeline = IngestionPipeline::new(&warehouse, &provider, resolver);
    let scheduler = RateLimitedScheduler::new(
        config.ingestion.quota_per_minute,
        Duration::from_millis(config.ingestion.safety_margin_ms),
    );

    info!(dataset = %kind, codes = codes.len(), ?mode, "starting sync");
    let table = kind.spec().table;
    let report = scheduler.run(
        &codes,
        |code| pipeline.ingest(code, kind),
        |code| mode == SyncMode::OneShot && has_stored_rows(&warehouse, table, code),
    );

    let errors = report
        .failed
        .iter()
        .map(|failed| {
            EnvelopeError::new(failed.error_code.as_str(), failed.message.as_str()).map(|error| {
                error
                    .with_retryable(failed.retryable)
                    .with_subject(failed.code.as_str())
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let data = json!({
        "dataset": kind.as_str(),
        "codes": codes.len(),
        "report": serde_json::to_value(&report)?,
    });
    let mut result = CommandResult::ok(data).with_errors(errors);
    if codes.is_empty() {
        result = result.with_warning("no codes to sync; run sync-securities first");
    }
    Ok(result)
}

/// Whether `code` already has rows in `table`. A failed check is logged and
/// treated as "no rows" so the pipeline decides from its own sync state.
fn has_stored_rows(warehouse: &Warehouse, table: &str, code: &SecurityCode) -> bool {
    match warehouse.has_rows(table, code.as_str()) {
        Ok(stored) => stored,
        Err(error) => {
            warn!(%code, table, %error, "stored row check failed; ingesting anyway");
            false
        }
    }
}

fn target_codes(
    args: &SyncArgs,
    kind: DatasetKind,
    context: &Context<'_>,
    warehouse: &Warehouse,
) -> Result<Vec<SecurityCode>, CliError> {
    if !args.codes.is_empty() {
        return args
            .codes
            .iter()
            .map(|raw| SecurityCode::parse(raw).map_err(CliError::from))
            .collect();
    }

    if kind == DatasetKind::IndexDaily {
        return Ok(vec![context.config.universe.benchmark_index.clone()]);
    }

    Ok(warehouse
        .securities()?
        .into_iter()
        .filter_map(|security| SecurityCode::parse(&security.code).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use factorpool_core::WarehouseConfig;

    use super::*;

    fn code(value: &str) -> SecurityCode {
        SecurityCode::parse(value).expect("valid code")
    }

    #[test]
    fn stored_row_check_falls_back_to_ingesting_on_error() {
        // Given: an empty warehouse
        let temp = tempfile::tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("open");

        // When: the check targets a table the store does not know
        let stored = has_stored_rows(&warehouse, "not_a_table", &code("600000.SH"));

        // Then: the error is swallowed and the code is not skipped
        assert!(!stored);
        assert!(!has_stored_rows(&warehouse, "daily_trading", &code("600000.SH")));
    }
}
