//! Market data provider contract and the vendor table shape it returns.

mod tushare;

use std::fmt::{Display, Formatter};

use factorpool_warehouse::Cell;
use serde::{Deserialize, Serialize};

use crate::domain::{IngestionTask, TradeDate};

pub use tushare::{adjust_forward, TushareClient};

/// Column-oriented vendor payload: field names plus positional rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub fields: Vec<String>,
    #[serde(default)]
    pub items: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|field| (*field).to_owned()).collect(),
            items: Vec::new(),
        }
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|name| name == field)
    }

    /// Value of `field` in row `row`; `None` when the field or row is absent.
    pub fn value(&self, row: usize, field: &str) -> Option<&Cell> {
        let index = self.field_index(field)?;
        self.items.get(row).and_then(|items| items.get(index))
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.items.push(row);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends rows of `other`, aligning by field name. Fields unknown to `self`
    /// are dropped; fields missing from `other` become null.
    pub fn extend_aligned(&mut self, other: RawTable) {
        let mapping = self
            .fields
            .iter()
            .map(|field| other.field_index(field))
            .collect::<Vec<_>>();
        for row in other.items {
            let aligned = mapping
                .iter()
                .map(|index| {
                    index
                        .and_then(|index| row.get(index).cloned())
                        .unwrap_or(Cell::Null)
                })
                .collect();
            self.items.push(aligned);
        }
    }
}

/// Listing status filter for the security master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListStatus {
    Listed,
    Delisted,
    Paused,
}

impl ListStatus {
    pub const ALL: [Self; 3] = [Self::Listed, Self::Delisted, Self::Paused];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Listed => "L",
            Self::Delisted => "D",
            Self::Paused => "P",
        }
    }
}

impl Display for ListStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailureKind {
    Transport,
    Vendor,
    Decode,
    RateLimited,
    InvalidRequest,
}

/// Structured provider error. Carries whether a later run may succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    kind: FetchFailureKind,
    message: String,
    retryable: bool,
}

impl FetchFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FetchFailureKind::Transport,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn vendor(message: impl Into<String>) -> Self {
        Self {
            kind: FetchFailureKind::Vendor,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: FetchFailureKind::Decode,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: FetchFailureKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: FetchFailureKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> FetchFailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchFailureKind::Transport => "fetch.transport",
            FetchFailureKind::Vendor => "fetch.vendor",
            FetchFailureKind::Decode => "fetch.decode",
            FetchFailureKind::RateLimited => "fetch.rate_limited",
            FetchFailureKind::InvalidRequest => "fetch.invalid_request",
        }
    }
}

impl Display for FetchFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchFailure {}

/// Remote vendor contract. Implementations perform no retries.
pub trait MarketDataProvider {
    /// Rows for `task`; `Ok(None)` when the vendor has nothing for the range.
    fn fetch(&self, task: &IngestionTask) -> Result<Option<RawTable>, FetchFailure>;

    /// Security master rows with `list_status`.
    fn securities(&self, status: ListStatus) -> Result<RawTable, FetchFailure>;

    fn trade_calendar(
        &self,
        exchange: &str,
        start: &TradeDate,
        end: &TradeDate,
    ) -> Result<RawTable, FetchFailure>;
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for &P {
    fn fetch(&self, task: &IngestionTask) -> Result<Option<RawTable>, FetchFailure> {
        (**self).fetch(task)
    }

    fn securities(&self, status: ListStatus) -> Result<RawTable, FetchFailure> {
        (**self).securities(status)
    }

    fn trade_calendar(
        &self,
        exchange: &str,
        start: &TradeDate,
        end: &TradeDate,
    ) -> Result<RawTable, FetchFailure> {
        (**self).trade_calendar(exchange, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failure_codes_are_stable() {
        let failure = FetchFailure::transport("connection reset");
        assert_eq!(failure.code(), "fetch.transport");
        assert!(failure.retryable());
        assert_eq!(failure.to_string(), "connection reset (fetch.transport)");

        assert!(!FetchFailure::vendor("bad token").retryable());
        assert!(FetchFailure::rate_limited("slow down").retryable());
    }

    #[test]
    fn extend_aligned_matches_fields_by_name() {
        let mut table = RawTable::new(&["ts_code", "name", "list_date"]);
        let other = RawTable {
            fields: vec![
                String::from("list_date"),
                String::from("ts_code"),
                String::from("extra"),
            ],
            items: vec![vec![
                Cell::text("19910403"),
                Cell::text("000001.SZ"),
                Cell::Int(1),
            ]],
        };
        table.extend_aligned(other);

        assert_eq!(
            table.items,
            vec![vec![
                Cell::text("000001.SZ"),
                Cell::Null,
                Cell::text("19910403")
            ]]
        );
        assert_eq!(table.value(0, "list_date"), Some(&Cell::text("19910403")));
        assert_eq!(table.value(0, "missing"), None);
    }
}
