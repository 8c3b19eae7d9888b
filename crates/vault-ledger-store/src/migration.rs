//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;
use tracing::debug;

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

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            debug!(version, "applying schema migration");
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
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
        -- Registered files. Rows are never deleted and ids never change;
        -- locator and name may be replaced by a repeated registration.
        CREATE TABLE files (
            file_id INTEGER PRIMARY KEY,      -- FileId (u64 stored as i64 bits)
            locator TEXT NOT NULL,
            display_name TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Read grants. Additive only.
        CREATE TABLE acl (
            file_id INTEGER NOT NULL,
            identity BLOB NOT NULL,           -- 32 bytes
            granted_at INTEGER NOT NULL,
            PRIMARY KEY (file_id, identity)
        );

        -- The administrator: a single slot.
        CREATE TABLE administrator (
            slot INTEGER PRIMARY KEY CHECK (slot = 1),
            identity BLOB NOT NULL,           -- 32 bytes
            updated_at INTEGER NOT NULL
        );

        -- Sealed audit records.
        CREATE TABLE audit_log (
            seq INTEGER PRIMARY KEY,          -- 1-indexed, contiguous
            record_id BLOB NOT NULL UNIQUE,   -- 32 bytes, Blake3 of canonical bytes
            kind INTEGER NOT NULL,            -- EventKind as u16
            file_id INTEGER,                  -- event subject, NULL for ownership transfers
            actor BLOB NOT NULL,              -- 32 bytes
            timestamp INTEGER NOT NULL,       -- environment-supplied (Unix ms)
            canonical_bytes BLOB NOT NULL,    -- header || payload || signature
            appended_at INTEGER NOT NULL
        );

        CREATE INDEX idx_audit_log_file ON audit_log(file_id, seq);
        CREATE INDEX idx_audit_log_actor ON audit_log(actor);
        CREATE INDEX idx_audit_log_kind ON audit_log(kind);
        CREATE INDEX idx_audit_log_timestamp ON audit_log(timestamp);

        -- Append-only enforcement.
        CREATE TRIGGER audit_log_no_update BEFORE UPDATE ON audit_log
        BEGIN
            SELECT RAISE(ABORT, 'audit_log is append-only');
        END;

        CREATE TRIGGER audit_log_no_delete BEFORE DELETE ON audit_log
        BEGIN
            SELECT RAISE(ABORT, 'audit_log is append-only');
        END;

        CREATE TRIGGER acl_no_update BEFORE UPDATE ON acl
        BEGIN
            SELECT RAISE(ABORT, 'acl is append-only');
        END;

        CREATE TRIGGER acl_no_delete BEFORE DELETE ON acl
        BEGIN
            SELECT RAISE(ABORT, 'acl is append-only');
        END;

        CREATE TRIGGER files_no_rekey BEFORE UPDATE OF file_id ON files
        BEGIN
            SELECT RAISE(ABORT, 'file ids are immutable');
        END;

        CREATE TRIGGER files_no_delete BEFORE DELETE ON files
        BEGIN
            SELECT RAISE(ABORT, 'files are never deleted');
        END;
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

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_migration_creates_tables() {
        let conn = migrated();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in ["files", "acl", "administrator", "audit_log", "schema_migrations"] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = migrated();
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
    fn test_audit_log_rejects_update_and_delete() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO audit_log (seq, record_id, kind, file_id, actor, timestamp,
                                    canonical_bytes, appended_at)
             VALUES (1, x'00', 1, 1, x'00', 0, x'00', 0)",
            [],
        )
        .unwrap();

        assert!(conn
            .execute("UPDATE audit_log SET timestamp = 5 WHERE seq = 1", [])
            .is_err());
        assert!(conn.execute("DELETE FROM audit_log", []).is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_acl_rejects_delete() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO acl (file_id, identity, granted_at) VALUES (1, x'01', 0)",
            [],
        )
        .unwrap();

        assert!(conn.execute("DELETE FROM acl WHERE file_id = 1", []).is_err());
    }

    #[test]
    fn test_files_allow_overwrite_but_not_delete() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO files (file_id, locator, display_name, created_at, updated_at)
             VALUES (1, 'QmOld', 'a.pdf', 0, 0)",
            [],
        )
        .unwrap();

        conn.execute("UPDATE files SET locator = 'QmNew' WHERE file_id = 1", [])
            .unwrap();
        assert!(conn
            .execute("UPDATE files SET file_id = 2 WHERE file_id = 1", [])
            .is_err());
        assert!(conn.execute("DELETE FROM files", []).is_err());
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = migrated();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
