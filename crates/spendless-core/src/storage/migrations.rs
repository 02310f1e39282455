//! Database schema migrations.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| row.get::<_, i32>(0)) {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: enrollments and transactions.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS enrollments (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL,
            template_id         TEXT NOT NULL,
            status              TEXT NOT NULL,
            joined_at           TEXT NOT NULL,
            streak              INTEGER NOT NULL DEFAULT 0,
            last_checked_at     TEXT,
            last_evaluated_date TEXT,
            failure_reason      TEXT,
            completed_at        TEXT,
            version             INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS transactions (
            user_id           TEXT NOT NULL,
            id                TEXT NOT NULL,
            amount            TEXT NOT NULL,
            date              TEXT NOT NULL,
            authorized_date   TEXT,
            merchant_name     TEXT,
            category_primary  TEXT,
            category_detailed TEXT,
            PRIMARY KEY (user_id, id)
        );",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: lookup indexes and the one-active-enrollment guard.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_pair
            ON enrollments(user_id, template_id, joined_at);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_enrollments_one_active
            ON enrollments(user_id, template_id) WHERE status = 'active';
        CREATE INDEX IF NOT EXISTS idx_transactions_user_date
            ON transactions(user_id, date);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}
