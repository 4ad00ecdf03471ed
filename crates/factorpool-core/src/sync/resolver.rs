use factorpool_warehouse::{Warehouse, WarehouseError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::adapters::DatasetAdapter;
use crate::domain::{DatasetKind, IngestionTask, SecurityCode, TradeDate};

/// How codes that already have rows are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Any stored row marks the pair as complete.
    #[default]
    OneShot,
    /// Fetch from the day after the stored maximum up to the window end.
    TopUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Fetch(IngestionTask),
    AlreadySynced,
}

/// Turns the stored date range of a (code, dataset) pair into the fetch it still needs.
#[derive(Clone)]
pub struct SyncStateResolver<'a> {
    warehouse: &'a Warehouse,
    start: TradeDate,
    end: TradeDate,
    mode: SyncMode,
}

impl<'a> SyncStateResolver<'a> {
    pub fn new(warehouse: &'a Warehouse, start: TradeDate, end: TradeDate, mode: SyncMode) -> Self {
        Self {
            warehouse,
            start,
            end,
            mode,
        }
    }

    pub fn resolve(
        &self,
        code: &SecurityCode,
        kind: DatasetKind,
    ) -> Result<Resolution, WarehouseError> {
        let spec = kind.spec();
        let (min, max) = self
            .warehouse
            .min_max(spec.table, spec.date_column, code.as_str())?;

        if min.is_none() && max.is_none() {
            return Ok(Resolution::Fetch(IngestionTask::new(
                kind,
                code.clone(),
                self.start.clone(),
                self.end.clone(),
            )));
        }

        match (self.mode, max) {
            (SyncMode::TopUp, Some(max)) => Ok(self.top_up(code, kind, &max)),
            _ => Ok(Resolution::AlreadySynced),
        }
    }

    fn top_up(&self, code: &SecurityCode, kind: DatasetKind, max: &str) -> Resolution {
        let stored_max = match TradeDate::parse(max) {
            Ok(date) => date,
            Err(_) => {
                warn!(%code, dataset = %kind, max, "stored max date is malformed; treating as synced");
                return Resolution::AlreadySynced;
            }
        };

        match stored_max.next_day() {
            Some(next) if stored_max < self.end => Resolution::Fetch(IngestionTask::new(
                kind,
                code.clone(),
                next,
                self.end.clone(),
            )),
            _ => Resolution::AlreadySynced,
        }
    }
}

#[cfg(test)]
mod tests {
    use factorpool_warehouse::{Cell, IngestLogEntry, OnConflict, WarehouseConfig};
    use tempfile::tempdir;

    use super::*;

    fn date(value: &str) -> TradeDate {
        TradeDate::parse(value).expect("date")
    }

    fn seed_bar(warehouse: &Warehouse, code: &str, trade_date: &str) {
        let row = vec![
            Cell::text(code),
            Cell::text(trade_date),
            Cell::Real(1.0),
            Cell::Real(1.0),
            Cell::Real(1.0),
            Cell::Real(1.0),
            Cell::Real(100.0),
            Cell::Real(100.0),
        ];
        warehouse
            .insert_rows(
                "daily_trading",
                &["code", "trade_date", "open", "high", "low", "close", "volume", "amount"],
                &[row],
                OnConflict::Ignore,
                &IngestLogEntry {
                    request_id: String::from("seed"),
                    code: Some(code.to_owned()),
                    dataset: String::from("daily_trading"),
                    latency_ms: 0,
                },
            )
            .expect("seed bar");
    }

    #[test]
    fn empty_pairs_resolve_to_the_full_window() {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("open");
        let resolver = SyncStateResolver::new(
            &warehouse,
            date("20050430"),
            date("20190430"),
            SyncMode::OneShot,
        );
        let code = SecurityCode::parse("600000.SH").expect("code");

        let resolution = resolver
            .resolve(&code, DatasetKind::DailyTrading)
            .expect("resolve");
        assert_eq!(
            resolution,
            Resolution::Fetch(IngestionTask::new(
                DatasetKind::DailyTrading,
                code,
                date("20050430"),
                date("20190430"),
            ))
        );
    }

    #[test]
    fn stored_rows_are_synced_in_one_shot_mode() {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("open");
        seed_bar(&warehouse, "600000.SH", "20100104");
        let resolver = SyncStateResolver::new(
            &warehouse,
            date("20050430"),
            date("20190430"),
            SyncMode::OneShot,
        );
        let code = SecurityCode::parse("600000.SH").expect("code");

        assert_eq!(
            resolver.resolve(&code, DatasetKind::DailyTrading).expect("resolve"),
            Resolution::AlreadySynced
        );
        // Other datasets for the same code are independent.
        assert!(matches!(
            resolver.resolve(&code, DatasetKind::DailyBasic).expect("resolve"),
            Resolution::Fetch(_)
        ));
    }

    #[test]
    fn top_up_resumes_after_the_stored_maximum() {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("open");
        seed_bar(&warehouse, "600000.SH", "20181231");
        let code = SecurityCode::parse("600000.SH").expect("code");

        let resolver = SyncStateResolver::new(
            &warehouse,
            date("20050430"),
            date("20190430"),
            SyncMode::TopUp,
        );
        match resolver.resolve(&code, DatasetKind::DailyTrading).expect("resolve") {
            Resolution::Fetch(task) => {
                assert_eq!(task.start.as_str(), "20190101");
                assert_eq!(task.end.as_str(), "20190430");
            }
            other => panic!("expected a top-up task, got {other:?}"),
        }

        let finished = SyncStateResolver::new(
            &warehouse,
            date("20050430"),
            date("20181231"),
            SyncMode::TopUp,
        );
        assert_eq!(
            finished.resolve(&code, DatasetKind::DailyTrading).expect("resolve"),
            Resolution::AlreadySynced
        );
    }
}
