//! Security master and trading calendar downloads.

use std::time::Instant;

use factorpool_warehouse::{Cell, IngestLogEntry, OnConflict, Warehouse};
use tracing::info;
use uuid::Uuid;

use crate::adapters::tables::{SECURITIES, TRADE_CALENDAR};
use crate::adapters::TableSpec;
use crate::domain::TradeDate;
use crate::provider::{ListStatus, MarketDataProvider, RawTable};
use crate::sync::pipeline::IngestFailure;

/// Sole writer of the `securities` and `trade_calendar` tables. Rows are
/// replaced on conflict because listing status and delist dates change.
pub struct ReferenceSync<'a, P: ?Sized> {
    warehouse: &'a Warehouse,
    provider: &'a P,
}

impl<'a, P> ReferenceSync<'a, P>
where
    P: MarketDataProvider + ?Sized,
{
    pub fn new(warehouse: &'a Warehouse, provider: &'a P) -> Self {
        Self {
            warehouse,
            provider,
        }
    }

    /// Downloads listed, delisted and paused securities and returns rows written.
    pub fn sync_securities(&self) -> Result<usize, IngestFailure> {
        let started = Instant::now();
        let vendor_fields = SECURITIES
            .columns
            .iter()
            .map(|(_, vendor)| *vendor)
            .collect::<Vec<_>>();
        let mut combined = RawTable::new(&vendor_fields);
        let status_index = combined.field_index("list_status");

        for status in ListStatus::ALL {
            let mut batch = RawTable::new(&vendor_fields);
            batch.extend_aligned(self.provider.securities(status)?);
            if let Some(index) = status_index {
                for row in &mut batch.items {
                    if row[index].is_null() {
                        row[index] = Cell::text(status.as_str());
                    }
                }
            }
            info!(status = %status, rows = batch.len(), "fetched security master");
            combined.extend_aligned(batch);
        }

        self.persist(&SECURITIES, &combined, started)
    }

    /// Downloads `exchange` calendar days in `[start, end]` and returns rows written.
    pub fn sync_calendar(
        &self,
        exchange: &str,
        start: &TradeDate,
        end: &TradeDate,
    ) -> Result<usize, IngestFailure> {
        let started = Instant::now();
        let mut calendar = self.provider.trade_calendar(exchange, start, end)?;

        if let Some(index) = calendar.field_index("is_open") {
            for row in &mut calendar.items {
                if let Some(cell) = row.get_mut(index) {
                    if let Some(flag) = cell.as_f64() {
                        *cell = Cell::Int(i64::from(flag != 0.0));
                    }
                }
            }
        }

        self.persist(&TRADE_CALENDAR, &calendar, started)
    }

    fn persist(
        &self,
        spec: &TableSpec,
        raw: &RawTable,
        started: Instant,
    ) -> Result<usize, IngestFailure> {
        let rows = spec.project(raw)?;
        let log = IngestLogEntry {
            request_id: Uuid::new_v4().to_string(),
            code: None,
            dataset: spec.table.to_owned(),
            latency_ms: started.elapsed().as_millis() as u64,
        };
        let written = self
            .warehouse
            .insert_rows(
                spec.table,
                &spec.column_names(),
                &rows,
                OnConflict::Replace,
                &log,
            )
            .map_err(IngestFailure::Persist)?;

        info!(
            table = spec.table,
            rows = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reference data synced"
        );
        Ok(written)
    }
}
