use factorpool_core::{
    ConfigError, FetchFailure, IngestFailure, UniverseError, ValidationError, WarehouseError,
};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("provider error: {0}")]
    Provider(#[from] FetchFailure),

    #[error(transparent)]
    Ingest(#[from] IngestFailure),

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error("command error: {0}")]
    Command(String),

    #[error("completed with {error_count} error(s)")]
    PartialFailure { error_count: usize },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) => 2,
            Self::PartialFailure { .. } => 3,
            Self::Warehouse(_)
            | Self::Provider(_)
            | Self::Ingest(_)
            | Self::Universe(_)
            | Self::Command(_)
            | Self::Serialization(_)
            | Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        assert_eq!(CliError::from(ValidationError::EmptyCode).exit_code(), 2);
        assert_eq!(CliError::PartialFailure { error_count: 1 }.exit_code(), 3);
        assert_eq!(
            CliError::from(FetchFailure::transport("reset")).exit_code(),
            10
        );
    }
}
