//! Blocking client for the Tushare Pro JSON API.
//!
//! Every call is a POST of `{api_name, token, params, fields}`; the reply is
//! `{code, msg, data: {fields, items}}` with `code == 0` on success.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use factorpool_warehouse::Cell;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::domain::{DatasetKind, IngestionTask, TradeDate};
use crate::provider::{FetchFailure, ListStatus, MarketDataProvider, RawTable};

/// Vendor status code for "too many calls per minute".
const RATE_LIMIT_CODE: i64 = 40203;

/// Daily-basic market values arrive in units of 10,000 yuan.
const TEN_THOUSAND: f64 = 10_000.0;

const DAILY_FIELDS: &[&str] = &[
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
];
const ADJ_FACTOR_FIELDS: &[&str] = &["ts_code", "trade_date", "adj_factor"];
const DAILY_FACTOR_FIELDS: &[&str] = &["ts_code", "trade_date", "turnover_rate", "volume_ratio"];
const ADJUSTED_PRICE_FIELDS: &[&str] = &["open", "high", "low", "close", "pre_close"];

/// Field layout of the joined daily trading table handed to the adapter.
pub(crate) const DAILY_TRADING_FIELDS: &[&str] = &[
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

const SECURITY_FIELDS: &[&str] = &[
    "ts_code",
    "symbol",
    "name",
    "area",
    "industry",
    "market",
    "list_status",
    "list_date",
    "delist_date",
];
const CALENDAR_FIELDS: &[&str] = &["exchange", "cal_date", "is_open"];

#[derive(Debug, Deserialize)]
struct TushareReply {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<RawTable>,
}

pub struct TushareClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

impl TushareClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, FetchFailure> {
        let token = config
            .token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                FetchFailure::invalid_request(
                    "tushare token missing; set FACTORPOOL_TUSHARE_TOKEN",
                )
            })?;

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("factorpool/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| FetchFailure::transport(format!("http client setup: {error}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            token,
        })
    }

    /// Runs one vendor API call and decodes its table.
    pub fn query(
        &self,
        api_name: &str,
        params: Value,
        fields: &[&str],
    ) -> Result<RawTable, FetchFailure> {
        let body = json!({
            "api_name": api_name,
            "token": self.token,
            "params": params,
            "fields": fields.join(","),
        });

        let started = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|error| {
                if error.is_timeout() {
                    FetchFailure::transport(format!("{api_name}: request timeout: {error}"))
                } else {
                    FetchFailure::transport(format!("{api_name}: request failed: {error}"))
                }
            })?;

        let status = response.status();
        let text = response.text().map_err(|error| {
            FetchFailure::transport(format!("{api_name}: failed to read response body: {error}"))
        })?;

        if status.as_u16() == 429 {
            return Err(FetchFailure::rate_limited(format!(
                "{api_name}: upstream returned status 429"
            )));
        }
        if status.is_server_error() {
            return Err(FetchFailure::transport(format!(
                "{api_name}: upstream returned status {status}"
            )));
        }
        if !status.is_success() {
            return Err(FetchFailure::vendor(format!(
                "{api_name}: upstream returned status {status}"
            )));
        }

        let table = decode_reply(api_name, &text)?;
        debug!(
            api = api_name,
            rows = table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tushare query"
        );
        Ok(table)
    }

    fn range_params(task: &IngestionTask) -> Value {
        json!({
            "ts_code": task.code.as_str(),
            "start_date": task.start.as_str(),
            "end_date": task.end.as_str(),
        })
    }

    fn daily_trading(&self, task: &IngestionTask) -> Result<RawTable, FetchFailure> {
        let params = Self::range_params(task);
        let daily = self.query("daily", params.clone(), DAILY_FIELDS)?;
        if daily.is_empty() {
            return Ok(daily);
        }
        let factors = self.query("adj_factor", params.clone(), ADJ_FACTOR_FIELDS)?;
        let basics = self.query("daily_basic", params, DAILY_FACTOR_FIELDS)?;
        Ok(join_daily(&daily, &factors, &basics))
    }
}

impl MarketDataProvider for TushareClient {
    fn fetch(&self, task: &IngestionTask) -> Result<Option<RawTable>, FetchFailure> {
        let table = match task.kind {
            DatasetKind::DailyTrading => self.daily_trading(task)?,
            DatasetKind::NameHistory => self.query(
                "namechange",
                json!({ "ts_code": task.code.as_str() }),
                &[
                    "ts_code",
                    "name",
                    "start_date",
                    "end_date",
                    "ann_date",
                    "change_reason",
                ],
            )?,
            DatasetKind::DailyBasic => {
                let mut table = self.query(
                    "daily_basic",
                    Self::range_params(task),
                    &[
                        "ts_code",
                        "trade_date",
                        "close",
                        "turnover_rate",
                        "volume_ratio",
                        "pe",
                        "pb",
                        "total_share",
                        "float_share",
                        "total_mv",
                        "circ_mv",
                    ],
                )?;
                scale_fields(&mut table, &["total_mv", "circ_mv"], TEN_THOUSAND);
                table
            }
            DatasetKind::BalanceSheet => self.query(
                "balancesheet",
                Self::range_params(task),
                &[
                    "ts_code",
                    "ann_date",
                    "end_date",
                    "report_type",
                    "total_assets",
                    "total_liab",
                    "total_hldr_eqy_exc_min_int",
                ],
            )?,
            DatasetKind::Income => self.query(
                "income",
                Self::range_params(task),
                &[
                    "ts_code",
                    "ann_date",
                    "end_date",
                    "total_revenue",
                    "revenue",
                    "operate_profit",
                    "n_income",
                    "n_income_attr_p",
                ],
            )?,
            DatasetKind::CashFlow => self.query(
                "cashflow",
                Self::range_params(task),
                &[
                    "ts_code",
                    "ann_date",
                    "end_date",
                    "n_cashflow_act",
                    "n_cashflow_inv_act",
                    "n_cash_flows_fnc_act",
                    "free_cashflow",
                ],
            )?,
            DatasetKind::FinIndicator => self.query(
                "fina_indicator",
                Self::range_params(task),
                &[
                    "ts_code",
                    "ann_date",
                    "end_date",
                    "eps",
                    "bps",
                    "roe",
                    "roa",
                    "debt_to_assets",
                    "grossprofit_margin",
                ],
            )?,
            DatasetKind::IndexDaily => self.query(
                "index_dailybasic",
                Self::range_params(task),
                &[
                    "ts_code",
                    "trade_date",
                    "total_mv",
                    "float_mv",
                    "total_share",
                    "float_share",
                    "turnover_rate",
                    "pe",
                    "pb",
                ],
            )?,
        };

        Ok(if table.is_empty() { None } else { Some(table) })
    }

    fn securities(&self, status: ListStatus) -> Result<RawTable, FetchFailure> {
        self.query(
            "stock_basic",
            json!({ "exchange": "", "list_status": status.as_str() }),
            SECURITY_FIELDS,
        )
    }

    fn trade_calendar(
        &self,
        exchange: &str,
        start: &TradeDate,
        end: &TradeDate,
    ) -> Result<RawTable, FetchFailure> {
        self.query(
            "trade_cal",
            json!({
                "exchange": exchange,
                "start_date": start.as_str(),
                "end_date": end.as_str(),
            }),
            CALENDAR_FIELDS,
        )
    }
}

fn decode_reply(api_name: &str, body: &str) -> Result<RawTable, FetchFailure> {
    let reply: TushareReply = serde_json::from_str(body)
        .map_err(|error| FetchFailure::decode(format!("{api_name}: {error}")))?;

    if reply.code != 0 {
        let message = format!(
            "{api_name}: vendor code {}: {}",
            reply.code,
            reply.msg.unwrap_or_default()
        );
        return Err(if reply.code == RATE_LIMIT_CODE {
            FetchFailure::rate_limited(message)
        } else {
            FetchFailure::vendor(message)
        });
    }

    let table = reply.data.unwrap_or_default();
    if let Some(bad) = table
        .items
        .iter()
        .find(|row| row.len() != table.fields.len())
    {
        return Err(FetchFailure::decode(format!(
            "{api_name}: row has {} values for {} fields",
            bad.len(),
            table.fields.len()
        )));
    }
    Ok(table)
}

/// Forward-adjusted (qfq) price, rounded to cents.
pub fn adjust_forward(price: f64, adj_factor: f64, latest_adj_factor: f64) -> f64 {
    let adjusted = price * adj_factor / latest_adj_factor;
    (adjusted * 100.0).round() / 100.0
}

fn by_trade_date(table: &RawTable) -> HashMap<String, usize> {
    (0..table.len())
        .filter_map(|row| {
            table
                .value(row, "trade_date")
                .and_then(Cell::as_str)
                .map(|date| (date.to_owned(), row))
        })
        .collect()
}

/// Joins daily bars with adjustment factors and daily-basic turnover fields on
/// trade date and applies forward adjustment against the latest factor in range.
fn join_daily(daily: &RawTable, factors: &RawTable, basics: &RawTable) -> RawTable {
    let factor_rows = by_trade_date(factors);
    let basic_rows = by_trade_date(basics);

    let latest_factor = factor_rows
        .iter()
        .max_by(|left, right| left.0.cmp(right.0))
        .and_then(|(_, row)| factors.value(*row, "adj_factor"))
        .and_then(Cell::as_f64)
        .filter(|factor| *factor != 0.0);

    let mut joined = RawTable::new(DAILY_TRADING_FIELDS);
    for row in 0..daily.len() {
        let date = daily.value(row, "trade_date").and_then(Cell::as_str);
        let factor = date
            .and_then(|date| factor_rows.get(date))
            .and_then(|factor_row| factors.value(*factor_row, "adj_factor"))
            .and_then(Cell::as_f64);
        let basic_row = date.and_then(|date| basic_rows.get(date)).copied();

        let cells = DAILY_TRADING_FIELDS
            .iter()
            .map(|field| match *field {
                "adj_factor" => factor.map_or(Cell::Null, Cell::Real),
                "turnover_rate" | "volume_ratio" => basic_row
                    .and_then(|basic_row| basics.value(basic_row, field))
                    .cloned()
                    .unwrap_or(Cell::Null),
                price if ADJUSTED_PRICE_FIELDS.contains(&price) => {
                    let raw = daily.value(row, price).cloned().unwrap_or(Cell::Null);
                    match (raw.as_f64(), factor, latest_factor) {
                        (Some(value), Some(factor), Some(latest)) => {
                            Cell::Real(adjust_forward(value, factor, latest))
                        }
                        _ => raw,
                    }
                }
                other => daily.value(row, other).cloned().unwrap_or(Cell::Null),
            })
            .collect();
        joined.push_row(cells);
    }
    joined
}

fn scale_fields(table: &mut RawTable, fields: &[&str], factor: f64) {
    let indexes = fields
        .iter()
        .filter_map(|field| table.field_index(field))
        .collect::<Vec<_>>();
    for row in &mut table.items {
        for index in &indexes {
            if let Some(cell) = row.get_mut(*index) {
                if let Some(value) = cell.as_f64() {
                    *cell = Cell::Real(value * factor);
                }
            }
        }
    }
}
