use thiserror::Error;

use crate::store::StoreError;

/// Configuration problems detected before any I/O.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required secret '{name}' is missing or blank")]
    MissingSecret { name: &'static str },
    #[error("setting '{name}' must not be blank")]
    BlankSetting { name: &'static str },
    #[error("setting '{name}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("setting '{name}' must be an http(s) URL: '{value}'")]
    InvalidUrl { name: &'static str, value: String },
}

/// Fatal run errors. Anything recoverable is absorbed into the run report instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("authentication failed: {0}")]
    Authentication(StoreError),

    #[error("failed to read records: {0}")]
    Read(StoreError),
}

impl SyncError {
    /// Routes a store failure from the read phase to the matching fatal category.
    pub fn from_read(error: StoreError) -> Self {
        if error.is_auth() {
            Self::Authentication(error)
        } else {
            Self::Read(error)
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "sync.configuration",
            Self::Authentication(_) => "sync.authentication",
            Self::Read(_) => "sync.read",
        }
    }
}
