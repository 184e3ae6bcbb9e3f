//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;
use trove_core::{Clock, SystemClock};

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per user
        CREATE TABLE users (
            user_id TEXT PRIMARY KEY,
            username TEXT,
            last_claim_at INTEGER,                  -- Unix ms, NULL until the first claim
            streak INTEGER NOT NULL DEFAULT 0,
            base_multiplier INTEGER NOT NULL,
            active_boosts INTEGER NOT NULL DEFAULT 0 CHECK (active_boosts >= 0),
            notifications_on INTEGER NOT NULL DEFAULT 0,
            notification_target TEXT,
            total_bucks INTEGER NOT NULL DEFAULT 0,
            first_bonus_granted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        -- Items that may be collected, with the bucks each insert grants
        CREATE TABLE catalog_items (
            item_id TEXT PRIMARY KEY,
            bucks INTEGER NOT NULL
        );

        -- Every collected item; editions are unique per item
        CREATE TABLE collected_items (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            obtain_type TEXT NOT NULL,
            edition INTEGER NOT NULL,
            bucks_granted INTEGER NOT NULL,
            obtained_at INTEGER NOT NULL,

            UNIQUE(item_id, edition)
        );

        -- Powerup holdings
        CREATE TABLE collected_powerups (
            user_id TEXT NOT NULL,
            powerup_id TEXT NOT NULL,
            amount INTEGER NOT NULL DEFAULT 0,
            amount_used INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, powerup_id)
        );

        CREATE INDEX idx_collected_user ON collected_items(user_id);
        "#,
    )?;

    Ok(())
}

/// Wall-clock time in Unix ms, for bookkeeping columns.
pub(crate) fn now_millis() -> i64 {
    SystemClock.now_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"catalog_items".to_string()));
        assert!(tables.contains(&"collected_items".to_string()));
        assert!(tables.contains(&"collected_powerups".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_unreadable_version_is_an_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_migrations (version TEXT, applied_at INTEGER);
             INSERT INTO schema_migrations VALUES ('bogus', 0);",
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Database(_))));

        let tables: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='users'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }
}
