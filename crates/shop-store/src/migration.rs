//! Schema migrations.
//!
//! Migrations are static SQL strings keyed by version. Applied versions are
//! recorded in `_migrations`, so running them again is a no-op. The tables
//! themselves use `IF NOT EXISTS` so a database whose shop tables were
//! created by another process is adopted rather than rejected.
//!
//! All value columns of `items` are `TEXT`; the gateway parses them on read.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{ShopError, ShopResult};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Append only.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "shop schema: items and inventories",
    sql: r#"
        CREATE TABLE IF NOT EXISTS items (
            guild_id  TEXT,
            name      TEXT,
            content   TEXT,
            type      TEXT NOT NULL DEFAULT 'string',
            price     TEXT,
            quantity  TEXT NOT NULL DEFAULT '0',
            remaining TEXT,
            id        INTEGER PRIMARY KEY AUTOINCREMENT
        );
        CREATE INDEX IF NOT EXISTS idx_items_guild ON items(guild_id);

        CREATE TABLE IF NOT EXISTS inventories (
            guild_id TEXT NOT NULL,
            user_id  TEXT NOT NULL,
            items    TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_guild_user ON inventories(guild_id, user_id);
    "#,
}];

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations against `conn`.
///
/// Synchronous; call it through [`crate::Database::execute`].
pub fn run_all(conn: &Connection) -> ShopResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "shop schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }
    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> ShopResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| ShopError::Migration {
        version: 0,
        message: format!("failed to read current version: {e}"),
    })
}

// ── internals ────────────────────────────────────────────────────────

fn ensure_migrations_table(conn: &Connection) -> ShopResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| ShopError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })
}

/// Apply a single migration inside a transaction.
fn apply(conn: &Connection, migration: &Migration) -> ShopResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    let fail = |message: String| ShopError::Migration {
        version: migration.version,
        message,
    };

    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| fail(format!("failed to begin transaction: {e}")))?;

    let result = (|| -> ShopResult<()> {
        conn.execute_batch(migration.sql)
            .map_err(|e| fail(format!("SQL execution failed: {e}")))?;

        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description,
                chrono::Utc::now().timestamp()
            ],
        )
        .map_err(|e| fail(format!("failed to record migration: {e}")))?;
        Ok(())
    })();

    match &result {
        Ok(()) => {
            conn.execute_batch("COMMIT;")
                .map_err(|e| fail(format!("failed to commit: {e}")))?;
        }
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
        }
    }

    result
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(window[1].version > window[0].version);
        }
    }

    #[test]
    fn run_all_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 1);
    }

    #[test]
    fn adopts_preexisting_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (guild_id TEXT, name TEXT, content TEXT, type TEXT NOT NULL DEFAULT 'string', \
             price TEXT, quantity TEXT NOT NULL DEFAULT '0', remaining TEXT, id INTEGER PRIMARY KEY AUTOINCREMENT);",
        )
        .unwrap();

        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 1);
    }

    #[test]
    fn item_defaults_match_schema() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO items (guild_id, name, content, price, remaining) VALUES ('g', 'n', 'c', '5', '0')",
            [],
        )
        .unwrap();
        let (kind, quantity): (String, String) = conn
            .query_row("SELECT type, quantity FROM items", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(kind, "string");
        assert_eq!(quantity, "0");
    }

    #[test]
    fn inventories_are_unique_per_guild_and_user() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO inventories (guild_id, user_id, items) VALUES ('g', 'u', '[]')",
            [],
        )
        .unwrap();
        let duplicate = conn.execute(
            "INSERT INTO inventories (guild_id, user_id, items) VALUES ('g', 'u', '[]')",
            [],
        );
        assert!(duplicate.is_err());
    }
}
