//! Rebalance dates and point-in-time sample construction.

mod filter;
mod lru;
mod name_index;
mod rebalance;

pub use filter::{FilterStage, Sample, SampleSummary, UniverseError, UniverseFilter};
pub use lru::LruCache;
pub use name_index::NameIndex;
pub use rebalance::{select_dates, AnchorPolicy};
