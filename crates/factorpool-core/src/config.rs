//! Application configuration loading and validation.
//!
//! Configuration is read from an optional TOML file; every section falls back to
//! defaults. The vendor token and store location can be overridden from the
//! environment (`FACTORPOOL_TUSHARE_TOKEN`, `FACTORPOOL_HOME`).

use std::path::{Path, PathBuf};

use factorpool_warehouse::WarehouseConfig;
use serde::Deserialize;

use crate::domain::{SecurityCode, TradeDate};
use crate::logging::LoggingConfig;
use crate::sync::SyncMode;
use crate::universe::{AnchorPolicy, FilterStage};
use crate::{ConfigError, ValidationError};

pub const HOME_ENV: &str = "FACTORPOOL_HOME";
pub const TOKEN_ENV: &str = "FACTORPOOL_TUSHARE_TOKEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FactorpoolConfig {
    pub sampling: SamplingConfig,
    pub ingestion: IngestionConfig,
    pub universe: UniverseConfig,
    pub provider: ProviderConfig,
    pub warehouse: WarehouseSection,
    pub logging: LoggingConfig,
}

/// Sampling window and rebalance anchors.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub start_date: TradeDate,
    pub end_date: TradeDate,
    /// `MMDD` month/day anchors, e.g. `0430` and `1031`.
    pub anchors: Vec<String>,
    pub anchor_policy: AnchorPolicy,
    /// Exchange whose trading calendar drives rebalance dates.
    pub exchange: String,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            start_date: TradeDate::from_date(time::macros::date!(2005 - 04 - 30)),
            end_date: TradeDate::from_date(time::macros::date!(2019 - 04 - 30)),
            anchors: vec![String::from("0430"), String::from("1031")],
            anchor_policy: AnchorPolicy::default(),
            exchange: String::from("SSE"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub quota_per_minute: u32,
    pub safety_margin_ms: u64,
    pub sync_mode: SyncMode,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            quota_per_minute: 200,
            safety_margin_ms: 100,
            sync_mode: SyncMode::default(),
        }
    }
}

/// Thresholds for the universe filter cascade.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// Percent change at or above which a name counts as limit-up and is not tradable.
    pub limit_up_pct: f64,
    /// Listing age must strictly exceed this many calendar days.
    pub min_listed_days: i64,
    /// Market value floor as a fraction of the benchmark index market value.
    pub market_cap_ratio: f64,
    pub benchmark_index: SecurityCode,
    pub st_marker: String,
    pub benchmark_cache_capacity: usize,
    pub stage_order: Vec<FilterStage>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            limit_up_pct: 9.6,
            min_listed_days: 730,
            market_cap_ratio: 0.05,
            benchmark_index: default_benchmark_index(),
            st_marker: String::from("ST"),
            benchmark_cache_capacity: 64,
            stage_order: FilterStage::ALL.to_vec(),
        }
    }
}

fn default_benchmark_index() -> SecurityCode {
    SecurityCode::from_normalized("000001.SH")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    /// Loaded from `FACTORPOOL_TUSHARE_TOKEN`, never from the file.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("http://api.tushare.pro"),
            timeout_ms: 30_000,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseSection {
    pub home: Option<PathBuf>,
    pub max_pool_size: usize,
}

impl Default for WarehouseSection {
    fn default() -> Self {
        Self {
            home: None,
            max_pool_size: 4,
        }
    }
}

impl WarehouseSection {
    pub fn to_warehouse_config(&self) -> WarehouseConfig {
        let mut config = match &self.home {
            Some(home) => WarehouseConfig::in_home(home),
            None => WarehouseConfig::default(),
        };
        config.max_pool_size = self.max_pool_size;
        config
    }
}

impl FactorpoolConfig {
    /// Loads `path` when given, applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(TOKEN_ENV).filter(|value| !value.trim().is_empty()) {
            self.provider.token = Some(token.trim().to_owned());
        }
        if let Some(home) = lookup(HOME_ENV).filter(|value| !value.trim().is_empty()) {
            self.warehouse.home = Some(PathBuf::from(home));
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let sampling = &self.sampling;
        if sampling.start_date > sampling.end_date {
            return Err(ValidationError::InvertedRange {
                start: sampling.start_date.to_string(),
                end: sampling.end_date.to_string(),
            });
        }
        if sampling.anchors.is_empty() {
            return Err(invalid("sampling.anchors", "must list at least one anchor"));
        }
        for anchor in &sampling.anchors {
            validate_anchor(anchor)?;
        }
        if sampling.exchange.trim().is_empty() {
            return Err(invalid("sampling.exchange", "must not be empty"));
        }

        if self.ingestion.quota_per_minute == 0 {
            return Err(invalid("ingestion.quota_per_minute", "must be greater than zero"));
        }

        let universe = &self.universe;
        if !(universe.market_cap_ratio > 0.0 && universe.market_cap_ratio <= 1.0) {
            return Err(invalid("universe.market_cap_ratio", "must be in (0, 1]"));
        }
        if !(universe.limit_up_pct.is_finite() && universe.limit_up_pct > 0.0) {
            return Err(invalid("universe.limit_up_pct", "must be a positive number"));
        }
        if universe.min_listed_days < 0 {
            return Err(invalid("universe.min_listed_days", "must not be negative"));
        }
        if universe.st_marker.is_empty() {
            return Err(invalid("universe.st_marker", "must not be empty"));
        }
        if universe.benchmark_cache_capacity == 0 {
            return Err(invalid(
                "universe.benchmark_cache_capacity",
                "must be greater than zero",
            ));
        }
        let all_stages_once = universe.stage_order.len() == FilterStage::ALL.len()
            && FilterStage::ALL
                .iter()
                .all(|stage| universe.stage_order.contains(stage));
        if !all_stages_once {
            return Err(invalid(
                "universe.stage_order",
                "must list each of tradable, not_st, listing_age, market_cap exactly once",
            ));
        }

        if self.provider.timeout_ms == 0 {
            return Err(invalid("provider.timeout_ms", "must be greater than zero"));
        }
        if self.warehouse.max_pool_size == 0 {
            return Err(invalid("warehouse.max_pool_size", "must be greater than zero"));
        }

        Ok(())
    }
}

/// Accepts `MMDD` strings that name a real month/day (Feb 29 allowed).
pub fn validate_anchor(anchor: &str) -> Result<(), ValidationError> {
    let invalid_anchor = || ValidationError::InvalidAnchor {
        value: anchor.to_owned(),
    };
    if anchor.len() != 4 || !anchor.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid_anchor());
    }

    // Leap year so that 0229 is a valid anchor.
    TradeDate::parse(&format!("2000{anchor}"))
        .map(|_| ())
        .map_err(|_| invalid_anchor())
}

fn invalid(field: &'static str, reason: &str) -> ValidationError {
    ValidationError::InvalidConfigValue {
        field,
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn defaults_are_valid() {
        let config = FactorpoolConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.sampling.start_date.as_str(), "20050430");
        assert_eq!(config.sampling.end_date.as_str(), "20190430");
        assert_eq!(config.sampling.anchors, vec!["0430", "1031"]);
        assert_eq!(config.ingestion.quota_per_minute, 200);
        assert_eq!(config.universe.benchmark_index.as_str(), "000001.SH");
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config = FactorpoolConfig::from_toml(
            r#"
            [sampling]
            anchors = ["0430"]
            anchor_policy = "next_open_day"

            [ingestion]
            quota_per_minute = 60
            sync_mode = "top_up"

            [universe]
            stage_order = ["market_cap", "listing_age", "not_st", "tradable"]

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .expect("parse");

        config.validate().expect("valid");
        assert_eq!(config.sampling.anchor_policy, AnchorPolicy::NextOpenDay);
        assert_eq!(config.ingestion.sync_mode, SyncMode::TopUp);
        assert_eq!(config.ingestion.safety_margin_ms, 100);
        assert_eq!(config.universe.stage_order[0], FilterStage::MarketCap);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.sampling.end_date.as_str(), "20190430");
    }

    #[test]
    fn rejects_malformed_dates_in_file() {
        let err = FactorpoolConfig::from_toml("[sampling]\nstart_date = \"2005-04-30\"\n")
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn environment_overrides_token_and_home() {
        let mut config = FactorpoolConfig::default();
        config.apply_env(|key| match key {
            TOKEN_ENV => Some(String::from(" secret-token ")),
            HOME_ENV => Some(String::from("/tmp/factorpool-home")),
            _ => None,
        });

        assert_eq!(config.provider.token.as_deref(), Some("secret-token"));
        let warehouse = config.warehouse.to_warehouse_config();
        assert_eq!(
            warehouse.db_path,
            PathBuf::from("/tmp/factorpool-home/warehouse.duckdb")
        );
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = FactorpoolConfig::default();
        config.universe.market_cap_ratio = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidConfigValue {
                field: "universe.market_cap_ratio",
                ..
            })
        ));

        let mut config = FactorpoolConfig::default();
        config.sampling.anchors = vec![String::from("1332")];
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidAnchor { .. })
        ));

        let mut config = FactorpoolConfig::default();
        config.universe.stage_order = vec![FilterStage::Tradable, FilterStage::Tradable];
        assert!(config.validate().is_err());

        let mut config = FactorpoolConfig::default();
        config.ingestion.quota_per_minute = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn anchors_accept_leap_day() {
        validate_anchor("0229").expect("leap day anchor");
        assert!(validate_anchor("0230").is_err());
        assert!(validate_anchor("430").is_err());
    }
}
