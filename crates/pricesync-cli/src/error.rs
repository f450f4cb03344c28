use pricesync_core::{ConfigError, HttpError, SyncError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("failed to prepare http client: {0}")]
    Transport(#[from] HttpError),

    #[error("strict mode failed: {failed} of {attempted} writes failed")]
    StrictModeViolation { failed: usize, attempted: usize },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to initialise logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::Sync(SyncError::Configuration(_)) => 2,
            Self::Sync(SyncError::Authentication(_)) => 3,
            Self::Sync(SyncError::Read(_)) => 4,
            Self::Serialization(_) => 5,
            Self::StrictModeViolation { .. } => 6,
            Self::Transport(_) | Self::Io(_) | Self::Logging(_) => 10,
        }
    }
}
