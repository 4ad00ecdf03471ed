//! Incremental, rate-limited ingestion into the local store.

mod pipeline;
mod reference;
mod resolver;
mod scheduler;

pub use pipeline::{IngestFailure, IngestionPipeline, NoOpReason, Outcome};
pub use reference::ReferenceSync;
pub use resolver::{Resolution, SyncMode, SyncStateResolver};
pub use scheduler::{
    pacing_delay, FailedCode, RateLimitedScheduler, SchedulerReport, Sleeper, ThreadSleeper,
};
