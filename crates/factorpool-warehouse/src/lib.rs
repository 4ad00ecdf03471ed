//! Local relational store for factorpool.
//!
//! All persisted tables live in one `DuckDB` file. Writers go through
//! [`Warehouse::insert_rows`], which binds positional rows into a single
//! transaction; readers use the typed accessors in [`records`] or the guarded
//! read-only SQL console in [`Warehouse::execute_query`].

pub mod cell;
pub mod duckdb;
pub mod migrations;
pub mod records;
pub mod views;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ::duckdb::types::Value as DuckValue;
use ::duckdb::Connection;
use ::duckdb::ToSql;
use serde::Serialize;
use serde_json::{Number, Value};
use thiserror::Error;

pub use crate::cell::Cell;
pub use crate::duckdb::{ConnectionPool, StoreConnection};
pub use crate::records::{
    CalendarRow, CoverageRow, DateValueRow, NameHistoryRow, SecurityRow,
};

/// Tables written by the per-code ingestion pipeline.
pub const DATASET_TABLES: &[&str] = &[
    "daily_trading",
    "name_history",
    "daily_basic",
    "balance_sheet",
    "income",
    "cash_flow",
    "fin_indicator",
    "index_daily",
];

/// Tables written by reference-data sync.
pub const REFERENCE_TABLES: &[&str] = &["securities", "trade_calendar"];

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("query rejected: {0}")]
    QueryRejected(String),

    #[error("query timed out after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    #[error("unknown table or column '{0}'")]
    UnknownTable(String),
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::in_home(resolve_factorpool_home())
    }
}

impl WarehouseConfig {
    pub fn in_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let db_path = home.join("warehouse.duckdb");
        Self {
            home,
            db_path,
            max_pool_size: 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryGuardrails {
    pub max_rows: usize,
    pub query_timeout_ms: u64,
}

impl Default for QueryGuardrails {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            query_timeout_ms: 5_000,
        }
    }
}

impl QueryGuardrails {
    fn timeout(self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.max(1))
    }

    fn validate(self) -> Result<(), WarehouseError> {
        if self.max_rows == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "--max-rows must be greater than zero",
            )));
        }
        if self.query_timeout_ms == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "--query-timeout-ms must be greater than zero",
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<SqlColumn>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub truncated: bool,
}

/// Conflict handling for bulk inserts keyed by a table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Keep the stored row; used by dataset ingestion so re-runs are idempotent.
    Ignore,
    /// Overwrite the stored row; used for reference data whose attributes change.
    Replace,
}

impl OnConflict {
    const fn verb(self) -> &'static str {
        match self {
            Self::Ignore => "INSERT OR IGNORE",
            Self::Replace => "INSERT OR REPLACE",
        }
    }
}

/// Audit row written alongside every bulk insert.
#[derive(Debug, Clone)]
pub struct IngestLogEntry {
    pub request_id: String,
    pub code: Option<String>,
    pub dataset: String,
    pub latency_ms: u64,
}

#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    pub fn home(&self) -> &Path {
        self.config.home.as_path()
    }

    pub(crate) fn connection(&self) -> Result<StoreConnection, WarehouseError> {
        Ok(self.pool.acquire()?)
    }

    /// Smallest and largest value of `column` stored for `code`; `(None, None)` when
    /// the code has no rows.
    pub fn min_max(
        &self,
        table: &str,
        column: &str,
        code: &str,
    ) -> Result<(Option<String>, Option<String>), WarehouseError> {
        ensure_known_table(table)?;
        ensure_identifier(column)?;

        let sql = format!("SELECT MIN({column}), MAX({column}) FROM {table} WHERE code = ?");
        let connection = self.connection()?;
        let range = connection.query_row(sql.as_str(), [code], |row| {
            let min: Option<String> = row.get(0)?;
            let max: Option<String> = row.get(1)?;
            Ok((min, max))
        })?;
        Ok(range)
    }

    pub fn has_rows(&self, table: &str, code: &str) -> Result<bool, WarehouseError> {
        ensure_known_table(table)?;

        let sql = format!("SELECT COUNT(*) FROM {table} WHERE code = ?");
        let connection = self.connection()?;
        let count: i64 = connection.query_row(sql.as_str(), [code], |row| row.get(0))?;
        Ok(count > 0)
    }

    pub fn count_rows(&self, table: &str) -> Result<i64, WarehouseError> {
        ensure_known_table(table)?;

        let sql = format!("SELECT COUNT(*) FROM {table}");
        let connection = self.connection()?;
        Ok(connection.query_row(sql.as_str(), [], |row| row.get(0))?)
    }

    /// Writes `rows` positionally into `columns` of `table` inside one transaction,
    /// together with an `ingest_log` entry. Either every row is applied or none is.
    ///
    /// Returns the number of rows the store reports as changed; rows ignored on
    /// conflict are not counted.
    pub fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<Cell>],
        conflict: OnConflict,
        log: &IngestLogEntry,
    ) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        ensure_known_table(table)?;
        if columns.is_empty() {
            return Err(WarehouseError::QueryRejected(String::from(
                "insert requires at least one column",
            )));
        }
        for column in columns {
            ensure_identifier(column)?;
        }
        if let Some(bad) = rows.iter().find(|row| row.len() != columns.len()) {
            return Err(WarehouseError::QueryRejected(format!(
                "row has {} values but {} columns were projected",
                bad.len(),
                columns.len()
            )));
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "{verb} INTO {table} ({columns}) VALUES ({placeholders})",
            verb = conflict.verb(),
            columns = columns.join(", "),
        );

        let connection = self.connection()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let mut statement = connection.prepare(sql.as_str())?;
            let mut changed = 0;
            for row in rows {
                changed += statement.execute(::duckdb::params_from_iter(row.iter()))?;
            }
            drop(statement);

            let latency_ms = i64::try_from(log.latency_ms).unwrap_or(i64::MAX);
            let row_count = i64::try_from(changed).unwrap_or(i64::MAX);
            connection.execute(
                "INSERT INTO ingest_log (request_id, code, dataset, status, row_count, latency_ms) \
                 VALUES (?, ?, ?, 'ok', ?, ?)",
                ::duckdb::params![
                    log.request_id.as_str(),
                    log.code.as_deref(),
                    log.dataset.as_str(),
                    row_count,
                    latency_ms,
                ],
            )?;
            Ok(changed)
        })();

        finalize_transaction(&connection, result)
    }

    /// Runs one read-only statement. Dataset and reference tables are written
    /// only through [`Warehouse::insert_rows`]; the statement executes inside a
    /// transaction that is always rolled back.
    pub fn execute_query(
        &self,
        sql: &str,
        guardrails: QueryGuardrails,
    ) -> Result<QueryResult, WarehouseError> {
        guardrails.validate()?;
        let sql = normalize_sql(sql)?;
        enforce_read_only_query(sql)?;

        let connection = self.connection()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = execute_select_query(&connection, sql, guardrails, Instant::now());
        let _ = connection.execute_batch("ROLLBACK");
        result
    }
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

pub(crate) fn ensure_known_table(table: &str) -> Result<(), WarehouseError> {
    if DATASET_TABLES.contains(&table) || REFERENCE_TABLES.contains(&table) {
        Ok(())
    } else {
        Err(WarehouseError::UnknownTable(table.to_owned()))
    }
}

fn ensure_identifier(name: &str) -> Result<(), WarehouseError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(WarehouseError::UnknownTable(name.to_owned()))
    }
}

fn execute_select_query(
    connection: &Connection,
    sql: &str,
    guardrails: QueryGuardrails,
    started: Instant,
) -> Result<QueryResult, WarehouseError> {
    // Column metadata is only available once the statement has run.
    let mut statement = connection.prepare(sql)?;
    let _ = statement.query([] as [&dyn ToSql; 0])?;

    let column_count = statement.column_count();
    let mut columns = Vec::with_capacity(column_count);
    for index in 0..column_count {
        let name = statement
            .column_name(index)
            .map(ToString::to_string)
            .unwrap_or_else(|_| format!("column_{index}"));
        columns.push(SqlColumn {
            name,
            r#type: statement.column_type(index).to_string(),
        });
    }

    let mut rows_cursor = statement.query([] as [&dyn ToSql; 0])?;
    let mut rows = Vec::new();
    let mut truncated = false;

    while let Some(row) = rows_cursor.next()? {
        ensure_timeout(started, guardrails.timeout())?;

        if rows.len() >= guardrails.max_rows {
            truncated = true;
            break;
        }

        rows.push(read_row(row, column_count)?);
    }

    ensure_timeout(started, guardrails.timeout())?;

    Ok(QueryResult {
        columns,
        row_count: rows.len(),
        rows,
        truncated,
    })
}

fn read_row(row: &::duckdb::Row<'_>, column_count: usize) -> Result<Vec<Value>, ::duckdb::Error> {
    let mut output = Vec::with_capacity(column_count);
    for index in 0..column_count {
        let value: DuckValue = row.get(index)?;
        output.push(to_json_value(value));
    }
    Ok(output)
}

fn to_json_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(value) => Value::Bool(value),
        DuckValue::TinyInt(value) => Value::Number(Number::from(value)),
        DuckValue::SmallInt(value) => Value::Number(Number::from(value)),
        DuckValue::Int(value) => Value::Number(Number::from(value)),
        DuckValue::BigInt(value) => Value::Number(Number::from(value)),
        DuckValue::UTinyInt(value) => Value::Number(Number::from(value)),
        DuckValue::USmallInt(value) => Value::Number(Number::from(value)),
        DuckValue::UInt(value) => Value::Number(Number::from(value)),
        DuckValue::UBigInt(value) => Value::Number(Number::from(value)),
        DuckValue::Float(value) => number_from_f64(f64::from(value)),
        DuckValue::Double(value) => number_from_f64(value),
        DuckValue::Text(value) => Value::String(value),
        DuckValue::Blob(value) => Value::String(hex::encode(value)),
        other => Value::String(format!("{other:?}")),
    }
}

fn number_from_f64(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn normalize_sql(sql: &str) -> Result<&str, WarehouseError> {
    let normalized = sql.trim();
    if normalized.is_empty() {
        return Err(WarehouseError::QueryRejected(String::from(
            "query must not be empty",
        )));
    }
    Ok(normalized.trim_end_matches(';').trim())
}

fn enforce_read_only_query(sql: &str) -> Result<(), WarehouseError> {
    if !is_select_like(sql) {
        return Err(WarehouseError::QueryRejected(String::from(
            "only SELECT/CTE queries are accepted",
        )));
    }
    if has_multiple_statements(sql) {
        return Err(WarehouseError::QueryRejected(String::from(
            "multiple SQL statements are not allowed",
        )));
    }
    Ok(())
}

fn is_select_like(sql: &str) -> bool {
    let first_keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        first_keyword.as_str(),
        "SELECT" | "WITH" | "SHOW" | "DESCRIBE"
    )
}

fn has_multiple_statements(sql: &str) -> bool {
    sql.split(';')
        .filter(|part| !part.trim().is_empty())
        .count()
        > 1
}

fn ensure_timeout(started: Instant, timeout: Duration) -> Result<(), WarehouseError> {
    if started.elapsed() > timeout {
        return Err(WarehouseError::QueryTimeout {
            timeout_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
        });
    }
    Ok(())
}

fn resolve_factorpool_home() -> PathBuf {
    if let Some(path) = env::var_os("FACTORPOOL_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".factorpool");
    }

    PathBuf::from(".factorpool")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp(temp: &tempfile::TempDir) -> Warehouse {
        Warehouse::open(WarehouseConfig {
            home: temp.path().to_path_buf(),
            db_path: temp.path().join("warehouse.duckdb"),
            max_pool_size: 2,
        })
        .expect("warehouse open")
    }

    fn log_entry(code: &str) -> IngestLogEntry {
        IngestLogEntry {
            request_id: String::from("test-request"),
            code: Some(code.to_owned()),
            dataset: String::from("name_history"),
            latency_ms: 3,
        }
    }

    fn name_row(code: &str, name: &str, start: &str) -> Vec<Cell> {
        vec![
            Cell::text(code),
            Cell::text(name),
            Cell::text(start),
            Cell::Null,
        ]
    }

    const NAME_COLUMNS: &[&str] = &["code", "name", "start_date", "end_date"];

    #[test]
    fn initializes_tables_and_views() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let query = warehouse
            .execute_query(
                "SELECT COUNT(*) AS c FROM information_schema.tables WHERE table_name = 'daily_trading'",
                QueryGuardrails::default(),
            )
            .expect("query");
        assert_eq!(query.row_count, 1);
        assert_eq!(query.rows[0][0], Value::from(1));
    }

    #[test]
    fn rejects_write_statements() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let error = warehouse
            .execute_query(
                "CREATE TABLE test_write (id INTEGER)",
                QueryGuardrails::default(),
            )
            .expect_err("should reject");

        assert!(matches!(error, WarehouseError::QueryRejected(_)));
    }

    #[test]
    fn min_max_is_empty_for_unsynced_codes() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let range = warehouse
            .min_max("daily_trading", "trade_date", "600000.SH")
            .expect("min max");
        assert_eq!(range, (None, None));
    }

    #[test]
    fn insert_or_ignore_keeps_the_first_row_per_key() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let first = vec![name_row("000001.SZ", "PAB", "20100101")];
        let changed = warehouse
            .insert_rows("name_history", NAME_COLUMNS, &first, OnConflict::Ignore, &log_entry("000001.SZ"))
            .expect("first insert");
        assert_eq!(changed, 1);

        let duplicate = vec![name_row("000001.SZ", "OTHER", "20100101")];
        warehouse
            .insert_rows("name_history", NAME_COLUMNS, &duplicate, OnConflict::Ignore, &log_entry("000001.SZ"))
            .expect("duplicate insert");

        let rows = warehouse.name_history().expect("read names");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "PAB");
    }

    #[test]
    fn failed_batches_leave_no_rows_behind() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let rows = vec![
            name_row("000001.SZ", "PAB", "20100101"),
            vec![Cell::text("000001.SZ"), Cell::Null, Cell::text("20120101"), Cell::Null],
        ];
        let error = warehouse
            .insert_rows("name_history", NAME_COLUMNS, &rows, OnConflict::Ignore, &log_entry("000001.SZ"))
            .expect_err("null name violates NOT NULL");
        assert!(matches!(error, WarehouseError::DuckDb(_)));

        assert_eq!(warehouse.count_rows("name_history").expect("count"), 0);
    }

    #[test]
    fn rejects_unknown_tables_and_ragged_rows() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let error = warehouse
            .min_max("quotes; DROP TABLE securities", "trade_date", "X")
            .expect_err("unknown table");
        assert!(matches!(error, WarehouseError::UnknownTable(_)));

        let ragged = vec![vec![Cell::text("000001.SZ")]];
        let error = warehouse
            .insert_rows("name_history", NAME_COLUMNS, &ragged, OnConflict::Ignore, &log_entry("000001.SZ"))
            .expect_err("ragged row");
        assert!(matches!(error, WarehouseError::QueryRejected(_)));
    }
}
