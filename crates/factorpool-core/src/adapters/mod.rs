//! Per-dataset fetch, clean and projection rules.

pub mod tables;

use factorpool_warehouse::Cell;

use crate::domain::{DatasetKind, IngestionTask};
use crate::provider::{FetchFailure, MarketDataProvider, RawTable};

pub use tables::{ProjectionError, TableSpec};

/// Capability set every dataset kind provides to the ingestion pipeline.
pub trait DatasetAdapter {
    fn spec(&self) -> &'static TableSpec;

    fn fetch<P>(&self, provider: &P, task: &IngestionTask) -> Result<Option<RawTable>, FetchFailure>
    where
        P: MarketDataProvider + ?Sized;

    fn clean(&self, raw: RawTable) -> RawTable {
        self.spec().clean(raw)
    }

    fn project(&self, rows: &RawTable) -> Result<Vec<Vec<Cell>>, ProjectionError> {
        self.spec().project(rows)
    }
}

impl DatasetAdapter for DatasetKind {
    fn spec(&self) -> &'static TableSpec {
        match self {
            Self::DailyTrading => &tables::DAILY_TRADING,
            Self::NameHistory => &tables::NAME_HISTORY,
            Self::DailyBasic => &tables::DAILY_BASIC,
            Self::BalanceSheet => &tables::BALANCE_SHEET,
            Self::Income => &tables::INCOME,
            Self::CashFlow => &tables::CASH_FLOW,
            Self::FinIndicator => &tables::FIN_INDICATOR,
            Self::IndexDaily => &tables::INDEX_DAILY,
        }
    }

    fn fetch<P>(&self, provider: &P, task: &IngestionTask) -> Result<Option<RawTable>, FetchFailure>
    where
        P: MarketDataProvider + ?Sized,
    {
        let fetched = provider.fetch(task)?;
        Ok(fetched.filter(|table| !table.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_resolves_its_table() {
        for kind in DatasetKind::ALL {
            let spec = kind.spec();
            assert_eq!(spec.table, kind.as_str());
            assert_eq!(spec.columns[0].0, "code");
            assert_eq!(spec.period.is_some(), kind.is_statement());
            assert!(spec.column_names().contains(&spec.date_column));
        }
    }
}
