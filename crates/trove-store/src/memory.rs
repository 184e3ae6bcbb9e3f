//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use trove_core::{ItemId, ObtainType, PowerupGrant, UserId};

use crate::error::{Result, StoreError};
use crate::traits::{CatalogItem, CollectedItem, InsertedItem, PowerupBalance, Store, UserRecord};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; every
/// write operation holds the write lock for its whole duration, which makes
/// each one atomic.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: HashMap<UserId, UserRecord>,

    /// Bucks per catalog item.
    catalog: HashMap<ItemId, i64>,

    /// Last edition handed out per item.
    editions: HashMap<ItemId, u64>,

    collected: Vec<CollectedItem>,

    powerups: HashMap<(UserId, String), PowerupBalance>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn user_mut(&mut self, user: &UserId) -> Result<&mut UserRecord> {
        self.users
            .get_mut(user)
            .ok_or_else(|| StoreError::NotFound(user.to_string()))
    }

    /// Append a collection row with the next edition of `item`. Unpaid rows
    /// record zero bucks.
    fn insert_row(
        &mut self,
        user: &UserId,
        item: &ItemId,
        obtain: ObtainType,
        paid: bool,
    ) -> Option<InsertedItem> {
        let price = *self.catalog.get(item)?;
        let bucks = if paid { price } else { 0 };

        let edition = {
            let last = self.editions.entry(item.clone()).or_insert(0);
            *last += 1;
            *last
        };

        self.collected.push(CollectedItem {
            user_id: user.clone(),
            item_id: item.clone(),
            obtain_type: obtain,
            edition,
            bucks_granted: bucks,
        });
        if let Some(record) = self.users.get_mut(user) {
            record.total_bucks += bucks;
        }

        Some(InsertedItem { edition, bucks })
    }

    fn powerup_mut(&mut self, user: &UserId, powerup: &str) -> &mut PowerupBalance {
        self.powerups
            .entry((user.clone(), powerup.to_string()))
            .or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ensure_user(
        &self,
        user: &UserId,
        username: Option<&str>,
        base_multiplier: u64,
    ) -> Result<bool> {
        let mut inner = self.write()?;

        if inner.users.contains_key(user) {
            return Ok(false);
        }

        inner.users.insert(
            user.clone(),
            UserRecord::new(user.clone(), username.map(String::from), base_multiplier),
        );
        Ok(true)
    }

    async fn user_record(&self, user: &UserId) -> Result<Option<UserRecord>> {
        let inner = self.read()?;
        Ok(inner.users.get(user).cloned())
    }

    async fn reset_streak(&self, user: &UserId) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(record) = inner.users.get_mut(user) {
            record.streak = 0;
        }
        Ok(())
    }

    async fn record_claim(&self, user: &UserId, at: i64) -> Result<u32> {
        let mut inner = self.write()?;
        let record = inner.user_mut(user)?;

        record.last_claim_at = Some(at);
        record.streak = record.streak.saturating_add(1);
        record.active_boosts = 0;
        Ok(record.streak)
    }

    async fn set_notifications(&self, user: &UserId, target: Option<&str>) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(record) = inner.users.get_mut(user) {
            record.notifications_enabled = target.is_some();
            record.notification_target = target.map(String::from);
        }
        Ok(())
    }

    async fn insert_collected(
        &self,
        user: &UserId,
        item: &ItemId,
        obtain: ObtainType,
    ) -> Result<Option<InsertedItem>> {
        let mut inner = self.write()?;
        Ok(inner.insert_row(user, item, obtain, true))
    }

    async fn insert_bonus_item(
        &self,
        user: &UserId,
        item: &ItemId,
    ) -> Result<Option<InsertedItem>> {
        let mut inner = self.write()?;
        Ok(inner.insert_row(user, item, ObtainType::Other, false))
    }

    async fn collected(&self, user: &UserId) -> Result<Vec<CollectedItem>> {
        let inner = self.read()?;
        Ok(inner
            .collected
            .iter()
            .filter(|row| &row.user_id == user)
            .cloned()
            .collect())
    }

    async fn upsert_catalog(&self, items: &[CatalogItem]) -> Result<()> {
        let mut inner = self.write()?;
        for item in items {
            inner.catalog.insert(item.item_id.clone(), item.bucks);
        }
        Ok(())
    }

    async fn powerup_balance(&self, user: &UserId, powerup: &str) -> Result<PowerupBalance> {
        let inner = self.read()?;
        Ok(inner
            .powerups
            .get(&(user.clone(), powerup.to_string()))
            .copied()
            .unwrap_or_default())
    }

    async fn adjust_powerup(
        &self,
        user: &UserId,
        powerup: &str,
        amount_delta: i64,
        used_delta: i64,
    ) -> Result<()> {
        let mut inner = self.write()?;
        let balance = inner.powerup_mut(user, powerup);
        balance.amount += amount_delta;
        balance.amount_used += used_delta;
        Ok(())
    }

    async fn grant_powerups(&self, user: &UserId, grants: &[PowerupGrant]) -> Result<()> {
        let mut inner = self.write()?;
        for grant in grants {
            inner.powerup_mut(user, &grant.powerup_id).amount += grant.amount;
        }
        Ok(())
    }

    async fn grant_first_claim_bonus(
        &self,
        user: &UserId,
        grants: &[PowerupGrant],
    ) -> Result<bool> {
        let mut inner = self.write()?;

        let Some(record) = inner.users.get_mut(user) else {
            return Ok(false);
        };
        if record.first_bonus_granted {
            return Ok(false);
        }
        record.first_bonus_granted = true;

        for grant in grants {
            inner.powerup_mut(user, &grant.powerup_id).amount += grant.amount;
        }
        Ok(true)
    }

    async fn adjust_active_boosts(&self, user: &UserId, delta: i64) -> Result<()> {
        let mut inner = self.write()?;
        let record = inner.user_mut(user)?;
        record.active_boosts = apply_boost_delta(record.active_boosts, delta)?;
        Ok(())
    }

    async fn clear_active_boosts(&self, user: &UserId) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(record) = inner.users.get_mut(user) {
            record.active_boosts = 0;
        }
        Ok(())
    }

    async fn activate_boost(&self, user: &UserId, powerup: &str, amount: i64) -> Result<()> {
        let mut inner = self.write()?;

        let record = inner.user_mut(user)?;
        record.active_boosts = apply_boost_delta(record.active_boosts, amount)?;

        let balance = inner.powerup_mut(user, powerup);
        balance.amount -= amount;
        balance.amount_used += amount;
        Ok(())
    }
}

fn apply_boost_delta(current: u32, delta: i64) -> Result<u32> {
    u32::try_from(i64::from(current) + delta)
        .map_err(|_| StoreError::InvalidData(format!("active boosts {current} + {delta} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use proptest::prelude::*;

    fn catalog() -> Vec<CatalogItem> {
        vec![CatalogItem::new("pebble", 1), CatalogItem::new("rare-x", 20)]
    }

    #[tokio::test]
    async fn test_memory_store_ensure_user_idempotent() {
        let store = MemoryStore::new();
        let user = UserId::new("u1");

        assert!(store.ensure_user(&user, Some("alice"), 1).await.unwrap());
        store.record_claim(&user, 1000).await.unwrap();
        assert!(!store.ensure_user(&user, Some("bob"), 5).await.unwrap());

        let record = store.require_user(&user).await.unwrap();
        assert_eq!(record.username.as_deref(), Some("alice"));
        assert_eq!(record.last_claim_at, Some(1000));
        assert_eq!(record.base_multiplier, 1);
    }

    #[tokio::test]
    async fn test_memory_store_editions_per_item() {
        let store = MemoryStore::new();
        store.upsert_catalog(&catalog()).await.unwrap();
        let (a, b) = (UserId::new("a"), UserId::new("b"));
        store.ensure_user(&a, None, 1).await.unwrap();

        let pebble = ItemId::from("pebble");
        let rare = ItemId::from("rare-x");

        let first = store.insert_collected(&a, &pebble, ObtainType::Daily).await.unwrap().unwrap();
        let second = store.insert_collected(&b, &pebble, ObtainType::Gift).await.unwrap().unwrap();
        let other = store.insert_collected(&b, &rare, ObtainType::Daily).await.unwrap().unwrap();

        assert_eq!((first.edition, second.edition, other.edition), (1, 2, 1));
        assert_eq!(other.bucks, 20);
        assert_eq!(store.require_user(&a).await.unwrap().total_bucks, 1);
        assert_eq!(store.collected(&b).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_unknown_item() {
        let store = MemoryStore::new();
        let user = UserId::new("u1");
        let result = store
            .insert_collected(&user, &ItemId::from("ghost"), ObtainType::Daily)
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_memory_store_activate_boost() {
        let store = MemoryStore::new();
        let user = UserId::new("u1");
        store.ensure_user(&user, None, 1).await.unwrap();
        store
            .grant_powerups(&user, &[PowerupGrant::new("miracle", 5)])
            .await
            .unwrap();

        store.activate_boost(&user, "miracle", 3).await.unwrap();

        let balance = store.powerup_balance(&user, "miracle").await.unwrap();
        assert_eq!(balance, PowerupBalance { amount: 2, amount_used: 3 });
        assert_eq!(store.require_user(&user).await.unwrap().active_boosts, 3);

        store.clear_active_boosts(&user).await.unwrap();
        assert_eq!(store.require_user(&user).await.unwrap().active_boosts, 0);
    }

    #[tokio::test]
    async fn test_memory_store_bonus_item_grants_no_bucks() {
        let store = MemoryStore::new();
        store.upsert_catalog(&catalog()).await.unwrap();
        let user = UserId::new("u1");
        store.ensure_user(&user, None, 1).await.unwrap();
        let rare = ItemId::from("rare-x");

        let paid = store.insert_collected(&user, &rare, ObtainType::Daily).await.unwrap().unwrap();
        let bonus = store.insert_bonus_item(&user, &rare).await.unwrap().unwrap();

        assert_eq!((paid.edition, paid.bucks), (1, 20));
        assert_eq!((bonus.edition, bonus.bucks), (2, 0));
        assert_eq!(store.require_user(&user).await.unwrap().total_bucks, 20);

        let rows = store.collected(&user).await.unwrap();
        assert_eq!(rows[1].obtain_type, ObtainType::Other);
        assert_eq!(rows[1].bucks_granted, 0);
        assert_eq!(
            store.insert_bonus_item(&user, &ItemId::from("ghost")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_memory_store_record_claim_spends_boosts() {
        let store = MemoryStore::new();
        let user = UserId::new("u1");
        store.ensure_user(&user, None, 1).await.unwrap();
        store.adjust_active_boosts(&user, 4).await.unwrap();

        assert_eq!(store.record_claim(&user, 1000).await.unwrap(), 1);

        let record = store.require_user(&user).await.unwrap();
        assert_eq!(record.active_boosts, 0);
        assert_eq!(record.last_claim_at, Some(1000));
    }

    #[tokio::test]
    async fn test_memory_store_first_bonus_once() {
        let store = MemoryStore::new();
        let user = UserId::new("u1");
        store.ensure_user(&user, None, 1).await.unwrap();
        let bonus = [PowerupGrant::new("miracle", 5)];

        assert!(store.grant_first_claim_bonus(&user, &bonus).await.unwrap());
        assert!(!store.grant_first_claim_bonus(&user, &bonus).await.unwrap());

        assert_eq!(store.powerup_balance(&user, "miracle").await.unwrap().amount, 5);
        assert!(store.require_user(&user).await.unwrap().first_bonus_granted);
    }

    #[tokio::test]
    async fn test_memory_store_missing_user() {
        let store = MemoryStore::new();
        let user = UserId::new("nobody");
        assert!(matches!(
            store.record_claim(&user, 1).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.require_user(&user).await,
            Err(StoreError::NotFound(_))
        ));
    }

    proptest! {
        #[test]
        fn editions_count_up_per_item(inserts in prop::collection::vec((0usize..4, any::<bool>()), 0..64)) {
            let store = MemoryStore::new();
            let users: Vec<UserId> = (0..4).map(|i| UserId::new(format!("u{i}"))).collect();
            let items = [ItemId::from("pebble"), ItemId::from("rare-x")];
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

            let editions = runtime.block_on(async {
                store.upsert_catalog(&catalog()).await.unwrap();
                let mut editions: Vec<(usize, u64)> = Vec::new();
                for (user, rare) in &inserts {
                    let item = usize::from(*rare);
                    let inserted = store
                        .insert_collected(&users[*user], &items[item], ObtainType::Daily)
                        .await
                        .unwrap()
                        .unwrap();
                    editions.push((item, inserted.edition));
                }
                editions
            });

            for item in 0..2 {
                let seen: Vec<u64> = editions.iter().filter(|(i, _)| *i == item).map(|(_, e)| *e).collect();
                let expected: Vec<u64> = (1..=seen.len() as u64).collect();
                prop_assert_eq!(seen, expected);
            }
        }
    }
}
