//! # Trove Store
//!
//! Storage abstraction for Trove. Provides a trait-based interface for the
//! persistent user records, collections and powerup balances the economy
//! reads and writes, with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`UserRecord`] - The persistent per-user record
//! - [`InsertedItem`] - Edition and bucks assigned to a collection insert
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trove_core::{ItemId, ObtainType, UserId};
//! use trove_store::{CatalogItem, SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("trove.db").unwrap();
//!     store
//!         .upsert_catalog(&[CatalogItem::new("pebble", 1)])
//!         .await
//!         .unwrap();
//!
//!     let user = UserId::new("42");
//!     store.ensure_user(&user, None, 1).await.unwrap();
//!     let inserted = store
//!         .insert_collected(&user, &ItemId::from("pebble"), ObtainType::Daily)
//!         .await
//!         .unwrap();
//!     assert_eq!(inserted.map(|i| i.edition), Some(1));
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Editions**: assigned by the store, strictly increasing per item across
//!   all users, inside the same atomic step as the insert.
//! - **Rejections**: inserting an item missing from the catalog returns `None`
//!   rather than an error.
//! - **Atomic pairs**: boost activation and bonus grants touch several rows
//!   and are applied as one unit.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    CatalogItem, CollectedItem, InsertedItem, PowerupBalance, Store, StoreExt, UserRecord,
};
