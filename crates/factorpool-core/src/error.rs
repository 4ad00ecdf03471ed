use thiserror::Error;

/// Validation and contract errors exposed by `factorpool-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("security code cannot be empty")]
    EmptyCode,
    #[error("security code length {len} exceeds max {max}")]
    CodeTooLong { len: usize, max: usize },
    #[error("security code must look like '<ticker>.<exchange>': '{value}'")]
    CodeMissingExchange { value: String },
    #[error("security code contains invalid character '{ch}' at index {index}")]
    CodeInvalidChar { ch: char, index: usize },

    #[error("date must be an 8-digit YYYYMMDD calendar date: '{value}'")]
    InvalidDate { value: String },
    #[error("anchor must be a 4-digit MMDD month/day: '{value}'")]
    InvalidAnchor { value: String },
    #[error("date range start {start} is after end {end}")]
    InvertedRange { start: String, end: String },

    #[error("invalid dataset '{value}', expected one of {expected}")]
    InvalidDataset { value: String, expected: String },

    #[error("field '{field}' {reason}")]
    InvalidConfigValue { field: &'static str, reason: String },

    #[error("timestamp must be RFC3339 in UTC: '{value}'")]
    InvalidTimestamp { value: String },
    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema version must look like 'v1.0.0': '{value}'")]
    InvalidSchemaVersion { value: String },
    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
