//! Reporting views over the dataset tables.

use ::duckdb::Connection;

/// Create the reporting views.
///
/// - `vw_sync_coverage`: first/last date and row count per dataset and code
/// - `vw_ingest_summary`: batch counts, rows and mean latency per dataset and status
///
/// # Errors
/// Returns an error if the view creation SQL fails to execute.
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_sync_coverage AS
SELECT 'daily_trading' AS dataset, code, MIN(trade_date) AS min_date, MAX(trade_date) AS max_date, COUNT(*) AS row_count
FROM daily_trading GROUP BY code
UNION ALL
SELECT 'name_history', code, MIN(start_date), MAX(start_date), COUNT(*)
FROM name_history GROUP BY code
UNION ALL
SELECT 'daily_basic', code, MIN(trade_date), MAX(trade_date), COUNT(*)
FROM daily_basic GROUP BY code
UNION ALL
SELECT 'balance_sheet', code, MIN(end_date), MAX(end_date), COUNT(*)
FROM balance_sheet GROUP BY code
UNION ALL
SELECT 'income', code, MIN(end_date), MAX(end_date), COUNT(*)
FROM income GROUP BY code
UNION ALL
SELECT 'cash_flow', code, MIN(end_date), MAX(end_date), COUNT(*)
FROM cash_flow GROUP BY code
UNION ALL
SELECT 'fin_indicator', code, MIN(end_date), MAX(end_date), COUNT(*)
FROM fin_indicator GROUP BY code
UNION ALL
SELECT 'index_daily', code, MIN(trade_date), MAX(trade_date), COUNT(*)
FROM index_daily GROUP BY code;

CREATE OR REPLACE VIEW vw_ingest_summary AS
SELECT
    dataset,
    status,
    COUNT(*) AS batches,
    CAST(SUM(row_count) AS BIGINT) AS rows_written,
    AVG(latency_ms) AS avg_latency_ms
FROM ingest_log
GROUP BY dataset, status;
",
    )?;
    Ok(())
}
