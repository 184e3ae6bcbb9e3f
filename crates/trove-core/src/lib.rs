//! # Trove Core
//!
//! Pure primitives for the Trove collectible economy: identifiers, the reward
//! multiplier curve, daily streak rules and the game configuration.
//!
//! This crate contains no I/O and no storage. Everything here is a function of
//! its inputs (plus the [`Clock`] seam for the current time).
//!
//! ## Key Types
//!
//! - [`UserId`] / [`ItemId`] - Opaque identifiers for users and collectibles
//! - [`ObtainType`] - How an item was obtained, persisted as a tag
//! - [`GameConfig`] - Rarity tiers, bonus item, boost and reset constants
//! - [`ResetSchedule`] - Computes daily reset boundaries
//!
//! ## Rules
//!
//! - [`compute_multiplier`] - Diminishing-return boost curve
//! - [`check_claim_eligibility`] / [`reconcile_streak`] - Daily claim rules

pub mod clock;
pub mod config;
pub mod error;
pub mod multiplier;
pub mod streak;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use config::{GameConfig, PowerupGrant, RarityConfig};
pub use error::ConfigError;
pub use multiplier::compute_multiplier;
pub use streak::{check_claim_eligibility, reconcile_streak, ClaimEligibility, ResetSchedule};
pub use types::{ItemId, ObtainType, UserId};
