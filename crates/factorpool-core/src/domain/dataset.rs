use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Per-security dataset kinds synced by the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    DailyTrading,
    NameHistory,
    DailyBasic,
    BalanceSheet,
    Income,
    CashFlow,
    FinIndicator,
    IndexDaily,
}

impl DatasetKind {
    pub const ALL: [Self; 8] = [
        Self::DailyTrading,
        Self::NameHistory,
        Self::DailyBasic,
        Self::BalanceSheet,
        Self::Income,
        Self::CashFlow,
        Self::FinIndicator,
        Self::IndexDaily,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DailyTrading => "daily_trading",
            Self::NameHistory => "name_history",
            Self::DailyBasic => "daily_basic",
            Self::BalanceSheet => "balance_sheet",
            Self::Income => "income",
            Self::CashFlow => "cash_flow",
            Self::FinIndicator => "fin_indicator",
            Self::IndexDaily => "index_daily",
        }
    }

    /// Financial statement kinds carry one row per report period.
    pub const fn is_statement(self) -> bool {
        matches!(
            self,
            Self::BalanceSheet | Self::Income | Self::CashFlow | Self::FinIndicator
        )
    }

    fn expected() -> String {
        Self::ALL
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Display for DatasetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidDataset {
                value: value.to_owned(),
                expected: Self::expected(),
            })
    }
}
