//! Typed read models used by universe construction and reporting.

use serde::Serialize;

use crate::{ensure_known_table, Warehouse, WarehouseError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarRow {
    pub exchange: String,
    pub cal_date: String,
    pub is_open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityRow {
    pub code: String,
    pub name: String,
    pub list_status: Option<String>,
    pub list_date: Option<String>,
    pub delist_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameHistoryRow {
    pub code: String,
    pub name: String,
    pub start_date: String,
    pub end_date: Option<String>,
}

/// A per-code numeric observation on a single date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateValueRow {
    pub code: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageRow {
    pub dataset: String,
    pub code: String,
    pub min_date: Option<String>,
    pub max_date: Option<String>,
    pub row_count: i64,
}

impl Warehouse {
    /// Calendar days for `exchange` within `[start, end]`, ascending.
    pub fn trade_calendar(
        &self,
        exchange: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<CalendarRow>, WarehouseError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(
            "SELECT exchange, cal_date, CAST(is_open AS BIGINT) FROM trade_calendar \
             WHERE exchange = ? AND cal_date >= ? AND cal_date <= ? ORDER BY cal_date",
        )?;
        let rows = statement.query_map([exchange, start, end], |row| {
            let is_open: i64 = row.get(2)?;
            Ok(CalendarRow {
                exchange: row.get(0)?,
                cal_date: row.get(1)?,
                is_open: is_open != 0,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn securities(&self) -> Result<Vec<SecurityRow>, WarehouseError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(
            "SELECT code, name, list_status, list_date, delist_date FROM securities ORDER BY code",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(SecurityRow {
                code: row.get(0)?,
                name: row.get(1)?,
                list_status: row.get(2)?,
                list_date: row.get(3)?,
                delist_date: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every name interval, ordered by code then start date.
    pub fn name_history(&self) -> Result<Vec<NameHistoryRow>, WarehouseError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(
            "SELECT code, name, start_date, end_date FROM name_history ORDER BY code, start_date",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(NameHistoryRow {
                code: row.get(0)?,
                name: row.get(1)?,
                start_date: row.get(2)?,
                end_date: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Percent change of every code that traded on `trade_date`.
    pub fn pct_changes_on(&self, trade_date: &str) -> Result<Vec<DateValueRow>, WarehouseError> {
        self.values_on("daily_trading", "pct_change", trade_date)
    }

    /// Total market value of every code with a daily-basic row on `trade_date`.
    pub fn market_values_on(&self, trade_date: &str) -> Result<Vec<DateValueRow>, WarehouseError> {
        self.values_on("daily_basic", "total_mv", trade_date)
    }

    pub fn index_market_value(
        &self,
        index_code: &str,
        trade_date: &str,
    ) -> Result<Option<f64>, WarehouseError> {
        let connection = self.connection()?;
        let mut statement = connection
            .prepare("SELECT total_mv FROM index_daily WHERE code = ? AND trade_date = ?")?;
        let mut rows = statement.query([index_code, trade_date])?;
        let value = match rows.next()? {
            Some(row) => row.get(0)?,
            None => None,
        };
        Ok(value)
    }

    pub fn coverage(&self, dataset: &str) -> Result<Vec<CoverageRow>, WarehouseError> {
        ensure_known_table(dataset)?;

        let connection = self.connection()?;
        let mut statement = connection.prepare(
            "SELECT dataset, code, min_date, max_date, row_count FROM vw_sync_coverage \
             WHERE dataset = ? ORDER BY code",
        )?;
        let rows = statement.query_map([dataset], |row| {
            Ok(CoverageRow {
                dataset: row.get(0)?,
                code: row.get(1)?,
                min_date: row.get(2)?,
                max_date: row.get(3)?,
                row_count: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn values_on(
        &self,
        table: &str,
        column: &str,
        trade_date: &str,
    ) -> Result<Vec<DateValueRow>, WarehouseError> {
        ensure_known_table(table)?;

        let sql = format!(
            "SELECT code, {column} FROM {table} WHERE trade_date = ? ORDER BY code"
        );
        let connection = self.connection()?;
        let mut statement = connection.prepare(sql.as_str())?;
        let rows = statement.query_map([trade_date], |row| {
            Ok(DateValueRow {
                code: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::{Cell, IngestLogEntry, OnConflict, Warehouse, WarehouseConfig};

    #[test]
    fn calendar_reads_are_bounded_and_ordered() {
        let temp = tempdir().expect("tempdir");
        let warehouse =
            Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("warehouse open");

        let rows = ["20190502", "20190430", "20190501", "20190429"]
            .iter()
            .map(|date| {
                vec![
                    Cell::text("SSE"),
                    Cell::text(*date),
                    Cell::Int(i64::from(*date != "20190501")),
                ]
            })
            .collect::<Vec<_>>();
        warehouse
            .insert_rows(
                "trade_calendar",
                &["exchange", "cal_date", "is_open"],
                &rows,
                OnConflict::Replace,
                &IngestLogEntry {
                    request_id: String::from("calendar-test"),
                    code: None,
                    dataset: String::from("trade_calendar"),
                    latency_ms: 0,
                },
            )
            .expect("insert calendar");

        let calendar = warehouse
            .trade_calendar("SSE", "20190430", "20190501")
            .expect("read calendar");
        let dates = calendar
            .iter()
            .map(|row| (row.cal_date.as_str(), row.is_open))
            .collect::<Vec<_>>();
        assert_eq!(dates, vec![("20190430", true), ("20190501", false)]);
    }
}
