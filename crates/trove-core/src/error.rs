//! Error types for Trove Core.

use thiserror::Error;

/// Errors raised while loading or validating a [`GameConfig`](crate::GameConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("bonus item {item} belongs to tier {rarity}, which itself grants a bonus")]
    ChainedBonus { item: String, rarity: String },

    #[error("item {item} is listed in both {first} and {second}")]
    DuplicateItem {
        item: String,
        first: String,
        second: String,
    },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: i64 },

    #[error("reset offset {0}ms is outside a single day")]
    ResetOffsetOutOfRange(i64),
}
