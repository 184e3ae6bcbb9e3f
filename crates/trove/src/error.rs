//! Error types for the economy.

use thiserror::Error;
use trove_core::ConfigError;
use trove_store::StoreError;

use crate::ledger::Grant;

/// Errors that can occur during economy operations.
#[derive(Debug, Error)]
pub enum EconomyError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Invalid game configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A grant batch failed after some of its grants were written.
    ///
    /// Writes are not rolled back; `applied` lists what the user received.
    #[error("grant batch failed after {} grants: {source}", applied.len())]
    PartialGrant {
        applied: Vec<Grant>,
        #[source]
        source: StoreError,
    },

    /// The user does not hold enough of a powerup.
    #[error("not enough {powerup}: have {available}, need {requested}")]
    InsufficientPowerups {
        powerup: String,
        available: i64,
        requested: i64,
    },
}

impl EconomyError {
    /// The underlying store error, if this error came from the store.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) | Self::PartialGrant { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

/// Result type for economy operations.
pub type Result<T> = std::result::Result<T, EconomyError>;
