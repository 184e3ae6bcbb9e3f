//! Test fixtures and helpers.
//!
//! Common setup code for unit and integration tests.

use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use trove_core::{Clock, GameConfig, ItemId, ObtainType, PowerupGrant, UserId};
use trove_store::{
    CatalogItem, CollectedItem, InsertedItem, MemoryStore, PowerupBalance, SqliteStore, Store,
    StoreError, UserRecord,
};

/// A common item worth 1 buck.
pub const COMMON_ITEM: &str = "pebble";

/// A second common item.
pub const OTHER_COMMON_ITEM: &str = "twig";

/// A legendary item: its first edition grants the bonus item.
pub const RARE_ITEM: &str = "rare-x";

/// The bonus item, worth 0 bucks.
pub const BONUS_ITEM: &str = "first-edition";

/// 2024-03-10T00:00:00Z, a UTC midnight.
pub const MIDNIGHT: i64 = 1_710_028_800_000;

/// JSON form of [`sample_config`].
pub const SAMPLE_CONFIG_JSON: &str = r#"{
    "firstItemId": "first-edition",
    "rarities": {
        "common": { "bucks": 1, "items": ["pebble", "twig"] },
        "rare": { "bucks": 5, "items": ["gem"] },
        "legendary": { "givesSpecial": true, "bucks": 20, "items": ["rare-x", "crown"] },
        "special": { "bucks": 0, "items": ["first-edition"] }
    },
    "reset": { "offsetMs": 0 }
}"#;

/// The sample game configuration.
///
/// Resets at UTC midnight and uses the default boost constants
/// (`miracle`, cap 50) and first-claim bonus (5 `miracle`, 1 `gift`).
pub fn sample_config() -> GameConfig {
    GameConfig::from_json(SAMPLE_CONFIG_JSON).expect("sample config is valid")
}

/// Load the catalog for `config` into `store`.
pub async fn seed_catalog<S: Store + ?Sized>(
    store: &S,
    config: &GameConfig,
) -> trove_store::Result<()> {
    store.upsert_catalog(&CatalogItem::from_config(config)).await
}

/// An in-memory store with the catalog for `config`.
pub async fn seeded_memory_store(config: &GameConfig) -> trove_store::Result<MemoryStore> {
    let store = MemoryStore::new();
    seed_catalog(&store, config).await?;
    Ok(store)
}

/// A SQLite store at `path` with the catalog for `config`.
pub async fn seeded_sqlite_store(
    path: impl AsRef<Path>,
    config: &GameConfig,
) -> trove_store::Result<SqliteStore> {
    let store = SqliteStore::open(path)?;
    seed_catalog(&store, config).await?;
    Ok(store)
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Store wrapper whose collection inserts fail once a budget is spent.
///
/// Every other operation is passed through unchanged.
pub struct FlakyStore<S: Store> {
    inner: S,
    inserts_left: AtomicUsize,
}

impl<S: Store> FlakyStore<S> {
    /// Allow `successful_inserts` inserts, then fail every one after.
    pub fn new(inner: S, successful_inserts: usize) -> Self {
        Self {
            inner,
            inserts_left: AtomicUsize::new(successful_inserts),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn take_insert(&self) -> bool {
        self.inserts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl<S: Store> Store for FlakyStore<S> {
    async fn ensure_user(
        &self,
        user: &UserId,
        username: Option<&str>,
        base_multiplier: u64,
    ) -> trove_store::Result<bool> {
        self.inner.ensure_user(user, username, base_multiplier).await
    }

    async fn user_record(&self, user: &UserId) -> trove_store::Result<Option<UserRecord>> {
        self.inner.user_record(user).await
    }

    async fn reset_streak(&self, user: &UserId) -> trove_store::Result<()> {
        self.inner.reset_streak(user).await
    }

    async fn record_claim(&self, user: &UserId, at: i64) -> trove_store::Result<u32> {
        self.inner.record_claim(user, at).await
    }

    async fn set_notifications(
        &self,
        user: &UserId,
        target: Option<&str>,
    ) -> trove_store::Result<()> {
        self.inner.set_notifications(user, target).await
    }

    async fn insert_collected(
        &self,
        user: &UserId,
        item: &ItemId,
        obtain: ObtainType,
    ) -> trove_store::Result<Option<InsertedItem>> {
        if !self.take_insert() {
            return Err(StoreError::Task("injected insert failure".into()));
        }
        self.inner.insert_collected(user, item, obtain).await
    }

    async fn insert_bonus_item(
        &self,
        user: &UserId,
        item: &ItemId,
    ) -> trove_store::Result<Option<InsertedItem>> {
        if !self.take_insert() {
            return Err(StoreError::Task("injected insert failure".into()));
        }
        self.inner.insert_bonus_item(user, item).await
    }

    async fn collected(&self, user: &UserId) -> trove_store::Result<Vec<CollectedItem>> {
        self.inner.collected(user).await
    }

    async fn upsert_catalog(&self, items: &[CatalogItem]) -> trove_store::Result<()> {
        self.inner.upsert_catalog(items).await
    }

    async fn powerup_balance(
        &self,
        user: &UserId,
        powerup: &str,
    ) -> trove_store::Result<PowerupBalance> {
        self.inner.powerup_balance(user, powerup).await
    }

    async fn adjust_powerup(
        &self,
        user: &UserId,
        powerup: &str,
        amount_delta: i64,
        used_delta: i64,
    ) -> trove_store::Result<()> {
        self.inner
            .adjust_powerup(user, powerup, amount_delta, used_delta)
            .await
    }

    async fn grant_powerups(
        &self,
        user: &UserId,
        grants: &[PowerupGrant],
    ) -> trove_store::Result<()> {
        self.inner.grant_powerups(user, grants).await
    }

    async fn grant_first_claim_bonus(
        &self,
        user: &UserId,
        grants: &[PowerupGrant],
    ) -> trove_store::Result<bool> {
        self.inner.grant_first_claim_bonus(user, grants).await
    }

    async fn adjust_active_boosts(&self, user: &UserId, delta: i64) -> trove_store::Result<()> {
        self.inner.adjust_active_boosts(user, delta).await
    }

    async fn clear_active_boosts(&self, user: &UserId) -> trove_store::Result<()> {
        self.inner.clear_active_boosts(user).await
    }

    async fn activate_boost(
        &self,
        user: &UserId,
        powerup: &str,
        amount: i64,
    ) -> trove_store::Result<()> {
        self.inner.activate_boost(user, powerup, amount).await
    }
}
