//! Core contracts for factorpool.
//!
//! This crate contains:
//! - Domain types and validation (codes, dates, dataset kinds)
//! - Configuration and logging setup
//! - The market data provider contract and the Tushare client
//! - Per-dataset adapters and the incremental, rate-limited sync pipeline
//! - Rebalance date selection and the point-in-time universe filter cascade

pub mod adapters;
pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod provider;
pub mod sync;
pub mod universe;

pub use adapters::{DatasetAdapter, ProjectionError, TableSpec};
pub use config::{
    FactorpoolConfig, IngestionConfig, ProviderConfig, SamplingConfig, UniverseConfig,
    WarehouseSection,
};
pub use domain::{DatasetKind, IngestionTask, SecurityCode, TradeDate, UtcDateTime};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta, SCHEMA_VERSION};
pub use error::{ConfigError, ValidationError};
pub use factorpool_warehouse::{
    Cell, CoverageRow, QueryGuardrails, QueryResult, SqlColumn, Warehouse, WarehouseConfig,
    WarehouseError,
};
pub use logging::{LogFormat, LoggingConfig};
pub use provider::{
    FetchFailure, FetchFailureKind, ListStatus, MarketDataProvider, RawTable, TushareClient,
};
pub use sync::{
    FailedCode, IngestFailure, IngestionPipeline, NoOpReason, Outcome, RateLimitedScheduler,
    ReferenceSync, Resolution, SchedulerReport, Sleeper, SyncMode, SyncStateResolver,
    ThreadSleeper,
};
pub use universe::{
    select_dates, AnchorPolicy, FilterStage, Sample, SampleSummary, UniverseError, UniverseFilter,
};
