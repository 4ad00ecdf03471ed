//! Shared fixtures for factorpool behavior tests: a scripted provider that
//! never touches the network and helpers that seed a throwaway warehouse.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use factorpool_core::{
    Cell, DatasetKind, FetchFailure, IngestionTask, ListStatus, MarketDataProvider, RawTable,
    SecurityCode, Sleeper, TradeDate, Warehouse, WarehouseConfig,
};
use factorpool_warehouse::{IngestLogEntry, OnConflict};
use tempfile::TempDir;

pub const DAILY_FIELDS: &[&str] = &[
    "ts_code",
    "trade_date",
    "open",
    "high",
    "low",
    "close",
    "pre_close",
    "pct_chg",
    "vol",
    "amount",
    "turnover_rate",
    "volume_ratio",
    "adj_factor",
];

pub const SECURITY_FIELDS: &[&str] = &["ts_code", "name", "list_status", "list_date", "delist_date"];

/// Provider whose replies are scripted per (dataset, code). Unscripted pairs
/// return no rows. Every fetch is recorded.
#[derive(Default)]
pub struct StubProvider {
    replies: HashMap<(DatasetKind, String), Result<RawTable, FetchFailure>>,
    securities: HashMap<ListStatus, RawTable>,
    calendar: Option<RawTable>,
    calls: RefCell<Vec<IngestionTask>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, kind: DatasetKind, code: &str, table: RawTable) -> Self {
        self.replies.insert((kind, code.to_owned()), Ok(table));
        self
    }

    pub fn with_failure(mut self, kind: DatasetKind, code: &str, failure: FetchFailure) -> Self {
        self.replies.insert((kind, code.to_owned()), Err(failure));
        self
    }

    pub fn with_securities(mut self, status: ListStatus, table: RawTable) -> Self {
        self.securities.insert(status, table);
        self
    }

    pub fn with_calendar(mut self, table: RawTable) -> Self {
        self.calendar = Some(table);
        self
    }

    pub fn calls(&self) -> Vec<IngestionTask> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl MarketDataProvider for StubProvider {
    fn fetch(&self, task: &IngestionTask) -> Result<Option<RawTable>, FetchFailure> {
        self.calls.borrow_mut().push(task.clone());
        match self.replies.get(&(task.kind, task.code.as_str().to_owned())) {
            Some(Ok(table)) => Ok(Some(table.clone())),
            Some(Err(failure)) => Err(failure.clone()),
            None => Ok(None),
        }
    }

    fn securities(&self, status: ListStatus) -> Result<RawTable, FetchFailure> {
        Ok(self
            .securities
            .get(&status)
            .cloned()
            .unwrap_or_else(|| RawTable::new(SECURITY_FIELDS)))
    }

    fn trade_calendar(
        &self,
        _exchange: &str,
        _start: &TradeDate,
        _end: &TradeDate,
    ) -> Result<RawTable, FetchFailure> {
        Ok(self
            .calendar
            .clone()
            .unwrap_or_else(|| RawTable::new(&["exchange", "cal_date", "is_open"])))
    }
}

/// Sleeper that records pauses instead of blocking.
#[derive(Default)]
pub struct NoSleep {
    pauses: RefCell<Vec<Duration>>,
}

impl NoSleep {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.borrow().clone()
    }
}

impl Sleeper for NoSleep {
    fn sleep(&self, duration: Duration) {
        self.pauses.borrow_mut().push(duration);
    }
}

pub fn temp_warehouse() -> (TempDir, Warehouse) {
    let temp = tempfile::tempdir().expect("tempdir");
    let warehouse = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("open warehouse");
    (temp, warehouse)
}

pub fn code(value: &str) -> SecurityCode {
    SecurityCode::parse(value).expect("valid code")
}

pub fn date(value: &str) -> TradeDate {
    TradeDate::parse(value).expect("valid date")
}

pub fn text(value: &str) -> Cell {
    Cell::text(value)
}

pub fn table(fields: &[&str], rows: Vec<Vec<Cell>>) -> RawTable {
    RawTable {
        fields: fields.iter().map(|field| (*field).to_owned()).collect(),
        items: rows,
    }
}

/// Vendor daily rows in the joined daily/adj_factor/daily_basic shape.
pub fn daily_table(code: &str, days: &[(&str, f64)]) -> RawTable {
    let rows = days
        .iter()
        .map(|(day, pct_change)| {
            vec![
                text(code),
                text(day),
                Cell::Real(10.0),
                Cell::Real(10.5),
                Cell::Real(9.8),
                Cell::Real(10.2),
                Cell::Real(10.0),
                Cell::Real(*pct_change),
                Cell::Real(120_000.0),
                Cell::Real(1_224_000.0),
                Cell::Real(0.8),
                Cell::Real(1.1),
                Cell::Real(1.0),
            ]
        })
        .collect();
    table(DAILY_FIELDS, rows)
}

fn seed(warehouse: &Warehouse, table: &str, columns: &[&str], rows: Vec<Vec<Cell>>) {
    let log = IngestLogEntry {
        request_id: String::from("seed-request"),
        code: None,
        dataset: table.to_owned(),
        latency_ms: 0,
    };
    warehouse
        .insert_rows(table, columns, &rows, OnConflict::Ignore, &log)
        .expect("seed rows");
}

pub fn seed_calendar(warehouse: &Warehouse, days: &[(&str, bool)]) {
    let rows = days
        .iter()
        .map(|(day, open)| vec![text("SSE"), text(day), Cell::Int(i64::from(*open))])
        .collect();
    seed(warehouse, "trade_calendar", &["exchange", "cal_date", "is_open"], rows);
}

pub fn seed_security(warehouse: &Warehouse, code: &str, list_date: &str, delist_date: Option<&str>) {
    let delisted = delist_date.map_or(Cell::Null, text);
    let status = if delist_date.is_some() { "D" } else { "L" };
    seed(
        warehouse,
        "securities",
        &["code", "name", "list_status", "list_date", "delist_date"],
        vec![vec![text(code), text(code), text(status), text(list_date), delisted]],
    );
}

pub fn seed_name(warehouse: &Warehouse, code: &str, name: &str, start: &str, end: Option<&str>) {
    seed(
        warehouse,
        "name_history",
        &["code", "name", "start_date", "end_date"],
        vec![vec![text(code), text(name), text(start), end.map_or(Cell::Null, text)]],
    );
}

pub fn seed_trading(warehouse: &Warehouse, code: &str, day: &str, pct_change: Option<f64>) {
    seed(
        warehouse,
        "daily_trading",
        &["code", "trade_date", "open", "high", "low", "close", "pct_change", "volume", "amount"],
        vec![vec![
            text(code),
            text(day),
            Cell::Real(10.0),
            Cell::Real(10.5),
            Cell::Real(9.8),
            Cell::Real(10.2),
            pct_change.map_or(Cell::Null, Cell::Real),
            Cell::Real(1_000.0),
            Cell::Real(10_200.0),
        ]],
    );
}

pub fn seed_market_value(warehouse: &Warehouse, code: &str, day: &str, total_mv: f64) {
    seed(
        warehouse,
        "daily_basic",
        &["code", "trade_date", "total_mv"],
        vec![vec![text(code), text(day), Cell::Real(total_mv)]],
    );
}

pub fn seed_index_value(warehouse: &Warehouse, code: &str, day: &str, total_mv: f64) {
    seed(
        warehouse,
        "index_daily",
        &["code", "trade_date", "total_mv"],
        vec![vec![text(code), text(day), Cell::Real(total_mv)]],
    );
}
