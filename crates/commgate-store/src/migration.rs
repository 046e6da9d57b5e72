//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::{Connection, TransactionBehavior};

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
/// The version is read under the write lock, so connections opening the
/// same file at once apply each migration exactly once.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    tx.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = tx.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    for version in (current + 1)..=CURRENT_VERSION {
        apply_migration(&tx, version)?;

        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, now_millis()],
        )?;
        tracing::debug!(version, "applied schema migration");
    }

    tx.commit()?;
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
        CREATE TABLE groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE principals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            group_id INTEGER NOT NULL REFERENCES groups(id),
            role TEXT NOT NULL
        );

        -- group_lo/group_hi hold the normalized unordered pair
        CREATE TABLE communication_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_a INTEGER NOT NULL REFERENCES groups(id),
            group_b INTEGER NOT NULL REFERENCES groups(id),
            group_lo INTEGER NOT NULL,
            group_hi INTEGER NOT NULL,
            rule_type TEXT NOT NULL CHECK (rule_type IN ('permanent', 'temporary')),
            requester_id INTEGER,
            target_principal_id INTEGER,
            decided_by INTEGER,
            expires_at INTEGER,                  -- Unix ms, temporary only
            user_specific INTEGER NOT NULL DEFAULT 0,
            reason TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            CHECK (group_a <> group_b),
            CHECK (group_lo < group_hi),
            CHECK (rule_type = 'temporary' OR (user_specific = 0 AND expires_at IS NULL))
        );

        -- At most one permanent rule per unordered pair
        CREATE UNIQUE INDEX idx_rules_permanent_pair
            ON communication_rules(group_lo, group_hi)
            WHERE rule_type = 'permanent';

        CREATE TABLE message_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id INTEGER NOT NULL,
            receiver_id INTEGER NOT NULL,
            subject TEXT,
            body TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('sent', 'blocked')),
            reason TEXT,
            sent_at INTEGER NOT NULL
        );

        CREATE INDEX idx_principals_group ON principals(group_id);
        CREATE INDEX idx_rules_pair ON communication_rules(group_lo, group_hi);
        CREATE INDEX idx_rules_group_a ON communication_rules(group_a);
        CREATE INDEX idx_rules_group_b ON communication_rules(group_b);
        CREATE INDEX idx_rules_status ON communication_rules(status);
        CREATE INDEX idx_messages_sender ON message_logs(sender_id, sent_at);
        CREATE INDEX idx_messages_receiver ON message_logs(receiver_id, sent_at);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
