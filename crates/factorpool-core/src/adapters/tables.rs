use std::collections::HashMap;

use factorpool_warehouse::Cell;
use thiserror::Error;

use crate::provider::RawTable;

/// Destination table layout and the vendor field feeding each column.
#[derive(Debug)]
pub struct TableSpec {
    pub table: &'static str,
    /// Column used for sync-state min/max.
    pub date_column: &'static str,
    /// `(store column, vendor field)` in insert order.
    pub columns: &'static [(&'static str, &'static str)],
    /// `(period field, announcement field)` for kinds reported once per period.
    pub period: Option<(&'static str, &'static str)>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("vendor payload for '{table}' has none of the expected fields ({expected})")]
pub struct ProjectionError {
    pub table: &'static str,
    pub expected: String,
}

impl TableSpec {
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|(column, _)| *column).collect()
    }

    /// Collapses repeated reports of one period to the earliest announcement.
    /// Ties keep the first row seen; rows without an announcement date lose to
    /// any dated row. Identity when the table has no period.
    pub fn clean(&self, raw: RawTable) -> RawTable {
        let Some((period_field, announced_field)) = self.period else {
            return raw;
        };
        let (Some(period_index), Some(announced_index)) = (
            raw.field_index(period_field),
            raw.field_index(announced_field),
        ) else {
            return raw;
        };

        let announced = |row: &[Cell]| {
            row.get(announced_index)
                .filter(|cell| !cell.is_null())
                .map(ToString::to_string)
        };

        let mut kept: Vec<Vec<Cell>> = Vec::with_capacity(raw.items.len());
        let mut slot_by_period: HashMap<String, usize> = HashMap::new();
        for row in raw.items {
            let period = row
                .get(period_index)
                .filter(|cell| !cell.is_null())
                .map(ToString::to_string);
            let Some(period) = period else {
                kept.push(row);
                continue;
            };

            match slot_by_period.get(&period) {
                Some(slot) => {
                    let replace = match (announced(&row), announced(&kept[*slot])) {
                        (Some(candidate), Some(current)) => candidate < current,
                        (Some(_), None) => true,
                        _ => false,
                    };
                    if replace {
                        kept[*slot] = row;
                    }
                }
                None => {
                    slot_by_period.insert(period, kept.len());
                    kept.push(row);
                }
            }
        }

        RawTable {
            fields: raw.fields,
            items: kept,
        }
    }

    /// Reorders vendor fields into store column order. Absent fields become
    /// null and are left for the store's constraints to reject.
    pub fn project(&self, raw: &RawTable) -> Result<Vec<Vec<Cell>>, ProjectionError> {
        let indexes = self
            .columns
            .iter()
            .map(|(_, vendor)| raw.field_index(vendor))
            .collect::<Vec<_>>();

        if !raw.is_empty() && indexes.iter().all(Option::is_none) {
            return Err(ProjectionError {
                table: self.table,
                expected: self
                    .columns
                    .iter()
                    .map(|(_, vendor)| *vendor)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        Ok(raw
            .items
            .iter()
            .map(|row| {
                indexes
                    .iter()
                    .map(|index| {
                        index
                            .and_then(|index| row.get(index).cloned())
                            .unwrap_or(Cell::Null)
                    })
                    .collect()
            })
            .collect())
    }
}

pub static DAILY_TRADING: TableSpec = TableSpec {
    table: "daily_trading",
    date_column: "trade_date",
    columns: &[
        ("code", "ts_code"),
        ("trade_date", "trade_date"),
        ("open", "open"),
        ("high", "high"),
        ("low", "low"),
        ("close", "close"),
        ("pre_close", "pre_close"),
        ("pct_change", "pct_chg"),
        ("volume", "vol"),
        ("amount", "amount"),
        ("turnover_rate", "turnover_rate"),
        ("volume_ratio", "volume_ratio"),
        ("adj_factor", "adj_factor"),
    ],
    period: None,
};

pub static NAME_HISTORY: TableSpec = TableSpec {
    table: "name_history",
    date_column: "start_date",
    columns: &[
        ("code", "ts_code"),
        ("name", "name"),
        ("start_date", "start_date"),
        ("end_date", "end_date"),
        ("ann_date", "ann_date"),
        ("change_reason", "change_reason"),
    ],
    period: None,
};

pub static DAILY_BASIC: TableSpec = TableSpec {
    table: "daily_basic",
    date_column: "trade_date",
    columns: &[
        ("code", "ts_code"),
        ("trade_date", "trade_date"),
        ("close", "close"),
        ("turnover_rate", "turnover_rate"),
        ("volume_ratio", "volume_ratio"),
        ("pe", "pe"),
        ("pb", "pb"),
        ("total_share", "total_share"),
        ("float_share", "float_share"),
        ("total_mv", "total_mv"),
        ("circ_mv", "circ_mv"),
    ],
    period: None,
};

pub static BALANCE_SHEET: TableSpec = TableSpec {
    table: "balance_sheet",
    date_column: "end_date",
    columns: &[
        ("code", "ts_code"),
        ("end_date", "end_date"),
        ("ann_date", "ann_date"),
        ("report_type", "report_type"),
        ("total_assets", "total_assets"),
        ("total_liab", "total_liab"),
        ("total_equity_exc_min", "total_hldr_eqy_exc_min_int"),
    ],
    period: Some(("end_date", "ann_date")),
};

pub static INCOME: TableSpec = TableSpec {
    table: "income",
    date_column: "end_date",
    columns: &[
        ("code", "ts_code"),
        ("end_date", "end_date"),
        ("ann_date", "ann_date"),
        ("total_revenue", "total_revenue"),
        ("revenue", "revenue"),
        ("operate_profit", "operate_profit"),
        ("n_income", "n_income"),
        ("n_income_attr_p", "n_income_attr_p"),
    ],
    period: Some(("end_date", "ann_date")),
};

pub static CASH_FLOW: TableSpec = TableSpec {
    table: "cash_flow",
    date_column: "end_date",
    columns: &[
        ("code", "ts_code"),
        ("end_date", "end_date"),
        ("ann_date", "ann_date"),
        ("n_cashflow_act", "n_cashflow_act"),
        ("n_cashflow_inv_act", "n_cashflow_inv_act"),
        ("n_cash_flows_fnc_act", "n_cash_flows_fnc_act"),
        ("free_cashflow", "free_cashflow"),
    ],
    period: Some(("end_date", "ann_date")),
};

pub static FIN_INDICATOR: TableSpec = TableSpec {
    table: "fin_indicator",
    date_column: "end_date",
    columns: &[
        ("code", "ts_code"),
        ("end_date", "end_date"),
        ("ann_date", "ann_date"),
        ("eps", "eps"),
        ("bps", "bps"),
        ("roe", "roe"),
        ("roa", "roa"),
        ("debt_to_assets", "debt_to_assets"),
        ("grossprofit_margin", "grossprofit_margin"),
    ],
    period: Some(("end_date", "ann_date")),
};

pub static INDEX_DAILY: TableSpec = TableSpec {
    table: "index_daily",
    date_column: "trade_date",
    columns: &[
        ("code", "ts_code"),
        ("trade_date", "trade_date"),
        ("total_mv", "total_mv"),
        ("float_mv", "float_mv"),
        ("total_share", "total_share"),
        ("float_share", "float_share"),
        ("turnover_rate", "turnover_rate"),
        ("pe", "pe"),
        ("pb", "pb"),
    ],
    period: None,
};

pub static SECURITIES: TableSpec = TableSpec {
    table: "securities",
    date_column: "list_date",
    columns: &[
        ("code", "ts_code"),
        ("symbol", "symbol"),
        ("name", "name"),
        ("area", "area"),
        ("industry", "industry"),
        ("market", "market"),
        ("list_status", "list_status"),
        ("list_date", "list_date"),
        ("delist_date", "delist_date"),
    ],
    period: None,
};

pub static TRADE_CALENDAR: TableSpec = TableSpec {
    table: "trade_calendar",
    date_column: "cal_date",
    columns: &[
        ("exchange", "exchange"),
        ("cal_date", "cal_date"),
        ("is_open", "is_open"),
    ],
    period: None,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn statement_rows(rows: &[(&str, Option<&str>, f64)]) -> RawTable {
        RawTable {
            fields: vec![
                String::from("ts_code"),
                String::from("ann_date"),
                String::from("end_date"),
                String::from("total_assets"),
            ],
            items: rows
                .iter()
                .map(|(end, ann, assets)| {
                    vec![
                        Cell::text("600000.SH"),
                        ann.map_or(Cell::Null, Cell::text),
                        Cell::text(*end),
                        Cell::Real(*assets),
                    ]
                })
                .collect(),
        }
    }

    #[test]
    fn clean_keeps_earliest_announcement_per_period() {
        let raw = statement_rows(&[
            ("20181231", Some("20190430"), 3.0),
            ("20181231", Some("20190329"), 1.0),
            ("20180930", Some("20181030"), 7.0),
            ("20181231", Some("20190329"), 2.0),
            ("20180930", None, 8.0),
        ]);

        let cleaned = BALANCE_SHEET.clean(raw);
        let assets = cleaned
            .items
            .iter()
            .map(|row| row[3].clone())
            .collect::<Vec<_>>();
        assert_eq!(assets, vec![Cell::Real(1.0), Cell::Real(7.0)]);
    }

    #[test]
    fn clean_is_identity_without_period() {
        let raw = statement_rows(&[("20181231", Some("20190430"), 3.0); 2]);
        let cleaned = DAILY_BASIC.clean(raw.clone());
        assert_eq!(cleaned, raw);
    }

    #[test]
    fn project_renames_and_reorders_vendor_fields() {
        let raw = statement_rows(&[("20181231", Some("20190329"), 1.0)]);
        let rows = BALANCE_SHEET.project(&raw).expect("project");
        assert_eq!(
            rows,
            vec![vec![
                Cell::text("600000.SH"),
                Cell::text("20181231"),
                Cell::text("20190329"),
                Cell::Null,
                Cell::Real(1.0),
                Cell::Null,
                Cell::Null,
            ]]
        );
        assert_eq!(BALANCE_SHEET.column_names()[6], "total_equity_exc_min");
    }

    #[test]
    fn project_rejects_unrelated_payloads() {
        let raw = RawTable {
            fields: vec![String::from("unexpected")],
            items: vec![vec![Cell::Int(1)]],
        };
        let error = DAILY_TRADING.project(&raw).expect_err("no known fields");
        assert_eq!(error.table, "daily_trading");
        assert!(DAILY_TRADING.project(&RawTable::default()).expect("empty").is_empty());
    }
}
