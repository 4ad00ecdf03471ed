use std::time::Instant;

use factorpool_warehouse::{IngestLogEntry, OnConflict, Warehouse, WarehouseError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{DatasetAdapter, ProjectionError};
use crate::domain::{DatasetKind, SecurityCode};
use crate::provider::{FetchFailure, MarketDataProvider};
use crate::sync::resolver::{Resolution, SyncStateResolver};

/// Why a pipeline call or reference sync did not persist.
#[derive(Debug, Error)]
pub enum IngestFailure {
    #[error("sync state query failed: {0}")]
    SyncState(#[source] WarehouseError),

    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    #[error("persist failed: {0}")]
    Persist(#[source] WarehouseError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl IngestFailure {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SyncState(_) => "ingest.sync_state",
            Self::Fetch(failure) => failure.code(),
            Self::Persist(_) => "ingest.persist",
            Self::Projection(_) => "ingest.projection",
        }
    }

    pub const fn retryable(&self) -> bool {
        match self {
            Self::Fetch(failure) => failure.retryable(),
            Self::SyncState(_) | Self::Persist(_) => true,
            Self::Projection(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    AlreadySynced,
    EmptyResult,
}

#[derive(Debug)]
pub enum Outcome {
    Persisted(usize),
    NoOp(NoOpReason),
    Failed(IngestFailure),
}

impl Outcome {
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Resolve, fetch, clean, project and persist one (code, dataset) pair.
pub struct IngestionPipeline<'a, P: ?Sized> {
    warehouse: &'a Warehouse,
    provider: &'a P,
    resolver: SyncStateResolver<'a>,
}

impl<'a, P> IngestionPipeline<'a, P>
where
    P: MarketDataProvider + ?Sized,
{
    pub fn new(warehouse: &'a Warehouse, provider: &'a P, resolver: SyncStateResolver<'a>) -> Self {
        Self {
            warehouse,
            provider,
            resolver,
        }
    }

    /// Never returns an error: failures are logged and reported as [`Outcome::Failed`].
    pub fn ingest(&self, code: &SecurityCode, kind: DatasetKind) -> Outcome {
        match self.try_ingest(code, kind) {
            Ok(outcome) => outcome,
            Err(failure) => {
                warn!(
                    %code,
                    dataset = %kind,
                    error_code = failure.code(),
                    retryable = failure.retryable(),
                    error = %failure,
                    "ingestion failed"
                );
                Outcome::Failed(failure)
            }
        }
    }

    fn try_ingest(&self, code: &SecurityCode, kind: DatasetKind) -> Result<Outcome, IngestFailure> {
        let task = match self
            .resolver
            .resolve(code, kind)
            .map_err(IngestFailure::SyncState)?
        {
            Resolution::Fetch(task) => task,
            Resolution::AlreadySynced => {
                debug!(%code, dataset = %kind, "already synced");
                return Ok(Outcome::NoOp(NoOpReason::AlreadySynced));
            }
        };

        let started = Instant::now();
        let Some(raw) = kind.fetch(self.provider, &task)? else {
            debug!(%code, dataset = %kind, start = %task.start, end = %task.end, "vendor returned no rows");
            return Ok(Outcome::NoOp(NoOpReason::EmptyResult));
        };

        let rows = kind.project(&kind.clean(raw))?;
        if rows.is_empty() {
            return Ok(Outcome::NoOp(NoOpReason::EmptyResult));
        }

        let spec = kind.spec();
        let log = IngestLogEntry {
            request_id: Uuid::new_v4().to_string(),
            code: Some(code.to_string()),
            dataset: kind.as_str().to_owned(),
            latency_ms: started.elapsed().as_millis() as u64,
        };
        let persisted = self
            .warehouse
            .insert_rows(
                spec.table,
                &spec.column_names(),
                &rows,
                OnConflict::Ignore,
                &log,
            )
            .map_err(IngestFailure::Persist)?;

        info!(
            %code,
            dataset = %kind,
            rows = persisted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "persisted"
        );
        Ok(Outcome::Persisted(persisted))
    }
}
