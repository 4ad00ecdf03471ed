//! Point-in-time universe filter cascade.

use std::collections::{BTreeSet, HashMap};

use factorpool_warehouse::{DateValueRow, SecurityRow, Warehouse, WarehouseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::UniverseConfig;
use crate::domain::{SecurityCode, TradeDate};
use crate::universe::lru::LruCache;
use crate::universe::name_index::NameIndex;
use crate::ValidationError;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("benchmark index {index} has no market value on {date}")]
    MissingBenchmark { index: String, date: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// Traded on the date and not limit-up.
    Tradable,
    /// Name in effect on the date carries no special-treatment marker.
    NotSt,
    /// Listed long enough and not yet delisted.
    ListingAge,
    /// Market value at or above the benchmark-relative floor.
    MarketCap,
}

impl FilterStage {
    pub const ALL: [Self; 4] = [Self::Tradable, Self::NotSt, Self::ListingAge, Self::MarketCap];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tradable => "tradable",
            Self::NotSt => "not_st",
            Self::ListingAge => "listing_age",
            Self::MarketCap => "market_cap",
        }
    }
}

/// Market value statistics over the final sample members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSummary {
    pub date: TradeDate,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub count: usize,
}

impl SampleSummary {
    pub fn from_values(date: TradeDate, mut values: Vec<f64>) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                date,
                mean: None,
                median: None,
                min: None,
                count,
            };
        }

        values.sort_by(f64::total_cmp);
        let mean = values.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 1 {
            values[count / 2]
        } else {
            (values[count / 2 - 1] + values[count / 2]) / 2.0
        };

        Self {
            date,
            mean: Some(mean),
            median: Some(median),
            min: Some(values[0]),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub date: TradeDate,
    pub codes: BTreeSet<SecurityCode>,
    pub summary: SampleSummary,
}

/// One cascade instance: loads the security master and name history once and
/// owns the benchmark cache for its lifetime.
pub struct UniverseFilter<'a> {
    warehouse: &'a Warehouse,
    config: &'a UniverseConfig,
    securities: Vec<SecurityRow>,
    names: NameIndex,
    benchmark: LruCache<String, Option<f64>>,
}

impl<'a> UniverseFilter<'a> {
    pub fn new(warehouse: &'a Warehouse, config: &'a UniverseConfig) -> Result<Self, UniverseError> {
        let securities = warehouse.securities()?;
        let names = NameIndex::build(warehouse.name_history()?);
        debug!(
            securities = securities.len(),
            named_codes = names.code_count(),
            "universe filter loaded"
        );

        Ok(Self {
            warehouse,
            config,
            securities,
            names,
            benchmark: LruCache::new(config.benchmark_cache_capacity),
        })
    }

    pub fn build_sample(&mut self, date: &TradeDate) -> Result<Sample, UniverseError> {
        let mut members: Option<BTreeSet<SecurityCode>> = None;
        let mut market_values = HashMap::new();

        for stage in self.config.stage_order.clone() {
            let passed = match stage {
                FilterStage::Tradable => self.tradable(date)?,
                FilterStage::NotSt => self.not_special_treatment(date),
                FilterStage::ListingAge => self.listed_long_enough(date),
                FilterStage::MarketCap => {
                    let (passed, values) = self.above_market_cap_floor(date)?;
                    market_values = values;
                    passed
                }
            };

            let passed_count = passed.len();
            let remaining = match members.take() {
                Some(current) => current.intersection(&passed).cloned().collect(),
                None => passed,
            };
            debug!(
                date = %date,
                stage = stage.as_str(),
                passed = passed_count,
                remaining = remaining.len(),
                "filter stage"
            );
            members = Some(remaining);
        }

        let codes = members.unwrap_or_default();
        let values = codes
            .iter()
            .filter_map(|code| market_values.get(code).copied())
            .collect();
        let summary = SampleSummary::from_values(date.clone(), values);
        info!(date = %date, members = summary.count, "sample built");

        Ok(Sample {
            date: date.clone(),
            codes,
            summary,
        })
    }

    pub fn tradable(&self, date: &TradeDate) -> Result<BTreeSet<SecurityCode>, UniverseError> {
        let rows = self.warehouse.pct_changes_on(date.as_str())?;
        Ok(rows
            .into_iter()
            .filter(|row| {
                row.value
                    .is_some_and(|pct_change| pct_change < self.config.limit_up_pct)
            })
            .filter_map(|row| parse_code(&row.code))
            .collect())
    }

    pub fn not_special_treatment(&self, date: &TradeDate) -> BTreeSet<SecurityCode> {
        self.securities
            .iter()
            .filter(|security| {
                self.names
                    .name_on(&security.code, date.as_str())
                    .map_or(true, |name| !name.contains(self.config.st_marker.as_str()))
            })
            .filter_map(|security| parse_code(&security.code))
            .collect()
    }

    pub fn listed_long_enough(&self, date: &TradeDate) -> BTreeSet<SecurityCode> {
        self.securities
            .iter()
            .filter(|security| {
                let Some(list_date) = security.list_date.as_deref() else {
                    return false;
                };
                let Ok(listed) = TradeDate::parse(list_date) else {
                    warn!(code = %security.code, list_date, "malformed list date");
                    return false;
                };
                let still_listed = security
                    .delist_date
                    .as_deref()
                    .map_or(true, |delisted| date.as_str() < delisted);
                date.days_since(&listed) > self.config.min_listed_days && still_listed
            })
            .filter_map(|security| parse_code(&security.code))
            .collect()
    }

    /// Codes at or above the floor, plus every code's market value on `date`.
    pub fn above_market_cap_floor(
        &mut self,
        date: &TradeDate,
    ) -> Result<(BTreeSet<SecurityCode>, HashMap<SecurityCode, f64>), UniverseError> {
        let benchmark = self.benchmark_value(date)?;
        let floor = self.config.market_cap_ratio * benchmark;

        let values = self
            .warehouse
            .market_values_on(date.as_str())?
            .into_iter()
            .filter_map(|DateValueRow { code, value }| Some((parse_code(&code)?, value?)))
            .collect::<HashMap<_, _>>();
        let passed = values
            .iter()
            .filter(|(_, value)| **value >= floor)
            .map(|(code, _)| code.clone())
            .collect();
        Ok((passed, values))
    }

    fn benchmark_value(&mut self, date: &TradeDate) -> Result<f64, UniverseError> {
        let warehouse = self.warehouse;
        let config = self.config;
        let index = config.benchmark_index.as_str();
        let cached = self
            .benchmark
            .get_or_try_insert_with(date.as_str().to_owned(), || {
                warehouse.index_market_value(index, date.as_str())
            })?;

        cached.ok_or_else(|| UniverseError::MissingBenchmark {
            index: index.to_owned(),
            date: date.to_string(),
        })
    }

    pub fn benchmark_cache_len(&self) -> usize {
        self.benchmark.len()
    }
}

fn parse_code(raw: &str) -> Option<SecurityCode> {
    match SecurityCode::parse(raw) {
        Ok(code) => Some(code),
        Err(error) => {
            warn!(code = raw, %error, "skipping malformed stored code");
            None
        }
    }
}
