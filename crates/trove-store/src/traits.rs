//! Store trait: the abstract interface for economy persistence.
//!
//! This trait keeps the economy storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trove_core::{GameConfig, ItemId, ObtainType, PowerupGrant, UserId};

use crate::error::{Result, StoreError};

/// The persistent record of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: Option<String>,
    /// When the user last claimed their daily reward (Unix ms).
    pub last_claim_at: Option<i64>,
    pub streak: u32,
    pub base_multiplier: u64,
    /// Boosts activated and not yet spent by a claim.
    pub active_boosts: u32,
    pub notifications_enabled: bool,
    pub notification_target: Option<String>,
    /// Sum of bucks granted by collection inserts. Bonus rows add nothing.
    pub total_bucks: i64,
    /// The one-time first-claim bonus has been handed out.
    pub first_bonus_granted: bool,
}

impl UserRecord {
    /// A freshly created record.
    pub fn new(user_id: UserId, username: Option<String>, base_multiplier: u64) -> Self {
        Self {
            user_id,
            username,
            last_claim_at: None,
            streak: 0,
            base_multiplier,
            active_boosts: 0,
            notifications_enabled: false,
            notification_target: None,
            total_bucks: 0,
            first_bonus_granted: false,
        }
    }
}

/// What the store assigned to a successful collection insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedItem {
    /// Per-item edition, strictly increasing across all users.
    pub edition: u64,
    pub bucks: i64,
}

/// A collection row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedItem {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub obtain_type: ObtainType,
    pub edition: u64,
    pub bucks_granted: i64,
}

/// A user's holdings of one powerup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerupBalance {
    /// Currently available.
    pub amount: i64,
    /// Consumed over the user's lifetime.
    pub amount_used: i64,
}

/// An item the store accepts collection inserts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item_id: ItemId,
    /// Bucks granted by each insert of this item.
    pub bucks: i64,
}

impl CatalogItem {
    pub fn new(item_id: impl Into<ItemId>, bucks: i64) -> Self {
        Self {
            item_id: item_id.into(),
            bucks,
        }
    }

    /// Every item of every rarity tier, priced at its tier's bucks, sorted by id.
    pub fn from_config(config: &GameConfig) -> Vec<Self> {
        let mut items: Vec<Self> = config
            .rarities
            .values()
            .flat_map(|rarity| {
                rarity
                    .items
                    .iter()
                    .map(|item| Self::new(item.clone(), rarity.bucks))
            })
            .collect();
        items.sort_by(|a, b| a.item_id.as_str().cmp(b.item_id.as_str()));
        items
    }
}

/// The Store trait: async interface for economy persistence.
///
/// # Design Notes
///
/// - **Idempotent user creation**: `ensure_user` never overwrites an existing record.
/// - **Edition assignment**: `insert_collected` assigns the next edition for the
///   item atomically with the insert, so concurrent inserts from different
///   users never share an edition. Bonus rows (`insert_bonus_item`) take
///   an edition the same way but never credit bucks.
/// - **Rejection is not an error**: items missing from the catalog yield `None`.
/// - **Multi-row updates** (`activate_boost`, `grant_powerups`,
///   `grant_first_claim_bonus`, `record_claim`) are applied atomically.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // User Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a user record if none exists.
    ///
    /// Returns `true` if a record was created.
    async fn ensure_user(
        &self,
        user: &UserId,
        username: Option<&str>,
        base_multiplier: u64,
    ) -> Result<bool>;

    /// Get a user's record.
    async fn user_record(&self, user: &UserId) -> Result<Option<UserRecord>>;

    /// Set the user's streak to zero.
    async fn reset_streak(&self, user: &UserId) -> Result<()>;

    /// Record a daily claim at `at`, incrementing the streak and spending
    /// the active boosts in the same atomic update.
    ///
    /// Returns the new streak.
    async fn record_claim(&self, user: &UserId, at: i64) -> Result<u32>;

    /// Set or clear the notification target.
    ///
    /// Notifications are enabled exactly when a target is given.
    async fn set_notifications(&self, user: &UserId, target: Option<&str>) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Collection Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a collection row, assigning the next edition of `item`.
    ///
    /// Returns `None` if the store rejects the item.
    async fn insert_collected(
        &self,
        user: &UserId,
        item: &ItemId,
        obtain: ObtainType,
    ) -> Result<Option<InsertedItem>>;

    /// Insert a chained bonus row for `item` with obtain type `Other`.
    ///
    /// Assigns the next edition like `insert_collected` but grants no bucks,
    /// whatever the catalog price of the item. Returns `None` if the store
    /// rejects the item.
    async fn insert_bonus_item(&self, user: &UserId, item: &ItemId)
        -> Result<Option<InsertedItem>>;

    /// All collection rows of a user, in insertion order.
    async fn collected(&self, user: &UserId) -> Result<Vec<CollectedItem>>;

    /// Add or update catalog entries.
    async fn upsert_catalog(&self, items: &[CatalogItem]) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Powerup Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a user's balance of a powerup (zero if they never held any).
    async fn powerup_balance(&self, user: &UserId, powerup: &str) -> Result<PowerupBalance>;

    /// Apply deltas to a powerup balance in one update.
    async fn adjust_powerup(
        &self,
        user: &UserId,
        powerup: &str,
        amount_delta: i64,
        used_delta: i64,
    ) -> Result<()>;

    /// Add several powerup amounts atomically.
    async fn grant_powerups(&self, user: &UserId, grants: &[PowerupGrant]) -> Result<()>;

    /// Grant the first-claim bonus unless the user already received it.
    ///
    /// Marks the user and adds the powerups in one atomic step. Returns
    /// `false` without writing anything if the bonus was granted before or
    /// the user does not exist.
    async fn grant_first_claim_bonus(&self, user: &UserId, grants: &[PowerupGrant])
        -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Boost Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add `delta` to the active-boost counter.
    async fn adjust_active_boosts(&self, user: &UserId, delta: i64) -> Result<()>;

    /// Set the active-boost counter to zero.
    async fn clear_active_boosts(&self, user: &UserId) -> Result<()>;

    /// Activate `amount` boosts, consuming as many units of `powerup`.
    ///
    /// The counter increment and the powerup consumption are one atomic unit.
    async fn activate_boost(&self, user: &UserId, powerup: &str, amount: i64) -> Result<()>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Get a user's record, failing with `NotFound` if it is missing.
    fn require_user(
        &self,
        user: &UserId,
    ) -> impl std::future::Future<Output = Result<UserRecord>> + Send;

    /// Consume `amount` units of a powerup.
    fn use_powerup(
        &self,
        user: &UserId,
        powerup: &str,
        amount: i64,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn require_user(&self, user: &UserId) -> Result<UserRecord> {
        self.user_record(user)
            .await?
            .ok_or_else(|| StoreError::NotFound(user.to_string()))
    }

    async fn use_powerup(&self, user: &UserId, powerup: &str, amount: i64) -> Result<()> {
        self.adjust_powerup(user, powerup, -amount, amount).await
    }
}
