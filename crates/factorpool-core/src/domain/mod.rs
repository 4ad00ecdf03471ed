mod code;
mod dataset;
mod task;
mod timestamp;
mod trade_date;

pub use code::SecurityCode;
pub use dataset::DatasetKind;
pub use task::IngestionTask;
pub use timestamp::UtcDateTime;
pub use trade_date::TradeDate;
