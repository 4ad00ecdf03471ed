use serde::Serialize;

use crate::domain::{DatasetKind, SecurityCode, TradeDate};

/// A single fetch request for one security and dataset over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionTask {
    pub kind: DatasetKind,
    pub code: SecurityCode,
    pub start: TradeDate,
    pub end: TradeDate,
}

impl IngestionTask {
    pub fn new(kind: DatasetKind, code: SecurityCode, start: TradeDate, end: TradeDate) -> Self {
        Self {
            kind,
            code,
            start,
            end,
        }
    }
}
