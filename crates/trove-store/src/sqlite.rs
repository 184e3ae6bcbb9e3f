//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use trove_core::{ItemId, ObtainType, PowerupGrant, UserId};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{CatalogItem, CollectedItem, InsertedItem, PowerupBalance, Store, UserRecord};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// Helper to convert a row to UserRecord
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let base_multiplier: i64 = row.get("base_multiplier")?;

    Ok(UserRecord {
        user_id: UserId::new(row.get::<_, String>("user_id")?),
        username: row.get("username")?,
        last_claim_at: row.get("last_claim_at")?,
        streak: row.get("streak")?,
        base_multiplier: u64::try_from(base_multiplier).map_err(|_| {
            rusqlite::Error::IntegralValueOutOfRange(4, base_multiplier)
        })?,
        active_boosts: row.get("active_boosts")?,
        notifications_enabled: row.get("notifications_on")?,
        notification_target: row.get("notification_target")?,
        total_bucks: row.get("total_bucks")?,
        first_bonus_granted: row.get("first_bonus_granted")?,
    })
}

// Helper to convert a row to CollectedItem
fn row_to_collected(row: &rusqlite::Row<'_>) -> rusqlite::Result<CollectedItem> {
    let obtain: String = row.get("obtain_type")?;
    let edition: i64 = row.get("edition")?;

    Ok(CollectedItem {
        user_id: UserId::new(row.get::<_, String>("user_id")?),
        item_id: ItemId::new(row.get::<_, String>("item_id")?),
        obtain_type: obtain.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?,
        edition: u64::try_from(edition)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(3, edition))?,
        bucks_granted: row.get("bucks_granted")?,
    })
}

fn to_sql_int(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| StoreError::InvalidData(format!("{what} {value} too large")))
}

/// Insert a collection row with the next edition of `item`, crediting the
/// catalog price when `paid`.
fn insert_row(
    conn: &mut Connection,
    user: &UserId,
    item: &ItemId,
    obtain: ObtainType,
    paid: bool,
) -> Result<Option<InsertedItem>> {
    // Immediate: the edition read and the insert must not interleave
    // with another writer.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let price: Option<i64> = tx
        .query_row(
            "SELECT bucks FROM catalog_items WHERE item_id = ?1",
            params![item.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    let Some(price) = price else {
        return Ok(None);
    };
    let bucks = if paid { price } else { 0 };

    let edition: i64 = tx.query_row(
        "SELECT COALESCE(MAX(edition), 0) + 1 FROM collected_items WHERE item_id = ?1",
        params![item.as_str()],
        |row| row.get(0),
    )?;

    tx.execute(
        "INSERT INTO collected_items (
            user_id, item_id, obtain_type, edition, bucks_granted, obtained_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.as_str(),
            item.as_str(),
            obtain.as_str(),
            edition,
            bucks,
            now_millis(),
        ],
    )?;
    if bucks != 0 {
        tx.execute(
            "UPDATE users SET total_bucks = total_bucks + ?1 WHERE user_id = ?2",
            params![bucks, user.as_str()],
        )?;
    }

    tx.commit()?;

    let edition = u64::try_from(edition)
        .map_err(|_| StoreError::InvalidData(format!("edition {edition}")))?;
    Ok(Some(InsertedItem { edition, bucks }))
}

const UPSERT_POWERUP: &str = "INSERT INTO collected_powerups (user_id, powerup_id, amount, amount_used)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(user_id, powerup_id) DO UPDATE SET
        amount = amount + excluded.amount,
        amount_used = amount_used + excluded.amount_used";

#[async_trait]
impl Store for SqliteStore {
    async fn ensure_user(
        &self,
        user: &UserId,
        username: Option<&str>,
        base_multiplier: u64,
    ) -> Result<bool> {
        let user = user.clone();
        let username = username.map(String::from);
        let base_multiplier = to_sql_int(base_multiplier, "base multiplier")?;

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (user_id, username, base_multiplier, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user.as_str(), username, base_multiplier, now_millis()],
            )?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn user_record(&self, user: &UserId) -> Result<Option<UserRecord>> {
        let user = user.clone();

        self.run(move |conn| {
            conn.query_row(
                "SELECT user_id, username, last_claim_at, streak, base_multiplier,
                        active_boosts, notifications_on, notification_target, total_bucks,
                        first_bonus_granted
                 FROM users WHERE user_id = ?1",
                params![user.as_str()],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn reset_streak(&self, user: &UserId) -> Result<()> {
        let user = user.clone();

        self.run(move |conn| {
            conn.execute(
                "UPDATE users SET streak = 0 WHERE user_id = ?1",
                params![user.as_str()],
            )?;
            Ok(())
        })
        .await
    }

    async fn record_claim(&self, user: &UserId, at: i64) -> Result<u32> {
        let user = user.clone();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let updated = tx.execute(
                "UPDATE users SET last_claim_at = ?1, streak = streak + 1, active_boosts = 0
                 WHERE user_id = ?2",
                params![at, user.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(user.to_string()));
            }

            let streak: u32 = tx.query_row(
                "SELECT streak FROM users WHERE user_id = ?1",
                params![user.as_str()],
                |row| row.get(0),
            )?;

            tx.commit()?;
            Ok(streak)
        })
        .await
    }

    async fn set_notifications(&self, user: &UserId, target: Option<&str>) -> Result<()> {
        let user = user.clone();
        let target = target.map(String::from);

        self.run(move |conn| {
            conn.execute(
                "UPDATE users SET notifications_on = ?1, notification_target = ?2
                 WHERE user_id = ?3",
                params![target.is_some(), target, user.as_str()],
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_collected(
        &self,
        user: &UserId,
        item: &ItemId,
        obtain: ObtainType,
    ) -> Result<Option<InsertedItem>> {
        let user = user.clone();
        let item = item.clone();

        self.run(move |conn| insert_row(conn, &user, &item, obtain, true))
            .await
    }

    async fn insert_bonus_item(
        &self,
        user: &UserId,
        item: &ItemId,
    ) -> Result<Option<InsertedItem>> {
        let user = user.clone();
        let item = item.clone();

        self.run(move |conn| insert_row(conn, &user, &item, ObtainType::Other, false))
            .await
    }

    async fn collected(&self, user: &UserId) -> Result<Vec<CollectedItem>> {
        let user = user.clone();

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, item_id, obtain_type, edition, bucks_granted
                 FROM collected_items WHERE user_id = ?1
                 ORDER BY row_id",
            )?;

            let rows = stmt
                .query_map(params![user.as_str()], row_to_collected)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(rows)
        })
        .await
    }

    async fn upsert_catalog(&self, items: &[CatalogItem]) -> Result<()> {
        let items = items.to_vec();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO catalog_items (item_id, bucks) VALUES (?1, ?2)
                     ON CONFLICT(item_id) DO UPDATE SET bucks = excluded.bucks",
                )?;
                for item in &items {
                    stmt.execute(params![item.item_id.as_str(), item.bucks])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn powerup_balance(&self, user: &UserId, powerup: &str) -> Result<PowerupBalance> {
        let user = user.clone();
        let powerup = powerup.to_string();

        self.run(move |conn| {
            let balance = conn
                .query_row(
                    "SELECT amount, amount_used FROM collected_powerups
                     WHERE user_id = ?1 AND powerup_id = ?2",
                    params![user.as_str(), powerup],
                    |row| {
                        Ok(PowerupBalance {
                            amount: row.get(0)?,
                            amount_used: row.get(1)?,
                        })
                    },
                )
                .optional()?;

            Ok(balance.unwrap_or_default())
        })
        .await
    }

    async fn adjust_powerup(
        &self,
        user: &UserId,
        powerup: &str,
        amount_delta: i64,
        used_delta: i64,
    ) -> Result<()> {
        let user = user.clone();
        let powerup = powerup.to_string();

        self.run(move |conn| {
            conn.execute(
                UPSERT_POWERUP,
                params![user.as_str(), powerup, amount_delta, used_delta],
            )?;
            Ok(())
        })
        .await
    }

    async fn grant_powerups(&self, user: &UserId, grants: &[PowerupGrant]) -> Result<()> {
        let user = user.clone();
        let grants = grants.to_vec();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for grant in &grants {
                tx.execute(
                    UPSERT_POWERUP,
                    params![user.as_str(), grant.powerup_id, grant.amount, 0i64],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn grant_first_claim_bonus(
        &self,
        user: &UserId,
        grants: &[PowerupGrant],
    ) -> Result<bool> {
        let user = user.clone();
        let grants = grants.to_vec();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let marked = tx.execute(
                "UPDATE users SET first_bonus_granted = 1
                 WHERE user_id = ?1 AND first_bonus_granted = 0",
                params![user.as_str()],
            )?;
            if marked == 0 {
                return Ok(false);
            }

            for grant in &grants {
                tx.execute(
                    UPSERT_POWERUP,
                    params![user.as_str(), grant.powerup_id, grant.amount, 0i64],
                )?;
            }

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    async fn adjust_active_boosts(&self, user: &UserId, delta: i64) -> Result<()> {
        let user = user.clone();

        self.run(move |conn| {
            conn.execute(
                "UPDATE users SET active_boosts = active_boosts + ?1 WHERE user_id = ?2",
                params![delta, user.as_str()],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear_active_boosts(&self, user: &UserId) -> Result<()> {
        let user = user.clone();

        self.run(move |conn| {
            conn.execute(
                "UPDATE users SET active_boosts = 0 WHERE user_id = ?1",
                params![user.as_str()],
            )?;
            Ok(())
        })
        .await
    }

    async fn activate_boost(&self, user: &UserId, powerup: &str, amount: i64) -> Result<()> {
        let user = user.clone();
        let powerup = powerup.to_string();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let updated = tx.execute(
                "UPDATE users SET active_boosts = active_boosts + ?1 WHERE user_id = ?2",
                params![amount, user.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(user.to_string()));
            }
            tx.execute(
                UPSERT_POWERUP,
                params![user.as_str(), powerup, -amount, amount],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }
}
