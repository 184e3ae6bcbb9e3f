//! # Trove
//!
//! Per-user sessions, daily claims and reward grants for a collectible
//! economy.
//!
//! ## Overview
//!
//! - **Sessions**: one shared, reference-counted session per live user, with
//!   a gate that serializes every operation for that user
//! - **Claims**: one daily claim per reset cycle, with a streak that breaks
//!   after a missed cycle
//! - **Grants**: items receive globally increasing editions; the first
//!   edition of a special item also grants the configured bonus item
//! - **Boosts**: consumable powerups that raise the claim multiplier with
//!   diminishing returns
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trove::{ClaimOutcome, Economy};
//! use trove::core::{GameConfig, ItemId, UserId};
//! use trove::store::SqliteStore;
//!
//! async fn example() -> trove::Result<()> {
//!     let config = GameConfig::from_json(&std::fs::read_to_string("game.json").unwrap())?;
//!     let store = SqliteStore::open("trove.db")?;
//!     let economy = Economy::new(store, config)?;
//!     economy.sync_catalog().await?;
//!
//!     let session = economy.session(&UserId::new("42")).await?;
//!     match economy.claim_daily(&session, &[ItemId::from("pebble")]).await? {
//!         ClaimOutcome::Claimed { grants, streak, .. } => {
//!             println!("{} items, streak {streak}", grants.len());
//!         }
//!         ClaimOutcome::AlreadyClaimed { next_reset } => {
//!             println!("come back at {next_reset}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `trove::core` - Identifiers, configuration and the pure reward rules
//! - `trove::store` - Storage abstraction, SQLite and in-memory stores

pub mod cache;
pub mod economy;
pub mod error;
pub mod ledger;
pub mod session;

// Re-export component crates
pub use trove_core as core;
pub use trove_store as store;

pub use cache::{SessionCache, SessionHandle};
pub use economy::{ClaimOutcome, Economy};
pub use error::{EconomyError, Result};
pub use ledger::{Grant, RewardLedger};
pub use session::{SessionGuard, UserSession};

pub use trove_core::{GameConfig, ItemId, ObtainType, UserId};
