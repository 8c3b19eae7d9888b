//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for the vault ledger. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.
//! Sealed records are stored as their canonical bytes alongside a few
//! indexed columns; reads decode the canonical bytes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use vault_ledger_core::{
    canonical_bytes, decode_record, AuditRecord, FileId, Identity, Locator, LogHead, RecordId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Commit, CommitResult, FileRecord, Mutation, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
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

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn file_id_to_sql(id: FileId) -> i64 {
    id.get() as i64
}

fn file_id_from_sql(raw: i64) -> FileId {
    FileId::new(raw as u64)
}

fn blob32(bytes: Vec<u8>, column: &str) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData(format!("{} must be 32 bytes", column)))
}

fn decode_stored(bytes: &[u8]) -> Result<AuditRecord> {
    decode_record(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn query_records(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<AuditRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| row.get::<_, Vec<u8>>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.iter().map(|bytes| decode_stored(bytes)).collect()
}

fn read_head(conn: &Connection) -> Result<LogHead> {
    let row: Option<(i64, Vec<u8>, i64)> = conn
        .query_row(
            "SELECT seq, record_id, timestamp FROM audit_log ORDER BY seq DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    match row {
        Some((seq, id, timestamp)) => Ok(LogHead::new(
            seq as u64,
            RecordId(blob32(id, "record_id")?),
            timestamp,
        )),
        None => Ok(LogHead::genesis()),
    }
}

/// Apply one mutation. Returns `false` when an `InitAdmin` finds the slot
/// already taken.
fn apply_mutation(tx: &rusqlite::Transaction<'_>, mutation: &Mutation, at: i64) -> Result<bool> {
    match mutation {
        Mutation::PutFile(file) => {
            tx.execute(
                "INSERT INTO files (file_id, locator, display_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(file_id) DO UPDATE SET
                    locator = excluded.locator,
                    display_name = excluded.display_name,
                    updated_at = excluded.updated_at",
                params![
                    file_id_to_sql(file.id),
                    file.locator.as_str(),
                    file.display_name,
                    at
                ],
            )?;
        }
        Mutation::Grant { file_id, identity } => {
            tx.execute(
                "INSERT OR IGNORE INTO acl (file_id, identity, granted_at) VALUES (?1, ?2, ?3)",
                params![file_id_to_sql(*file_id), identity.0.as_slice(), at],
            )?;
        }
        Mutation::SetAdmin(identity) => {
            tx.execute(
                "INSERT INTO administrator (slot, identity, updated_at) VALUES (1, ?1, ?2)
                 ON CONFLICT(slot) DO UPDATE SET
                    identity = excluded.identity,
                    updated_at = excluded.updated_at",
                params![identity.0.as_slice(), at],
            )?;
        }
        Mutation::InitAdmin(identity) => {
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO administrator (slot, identity, updated_at) VALUES (1, ?1, ?2)",
                params![identity.0.as_slice(), at],
            )?;
            return Ok(inserted == 1);
        }
    }
    Ok(true)
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_file(&self, id: FileId) -> Result<Option<FileRecord>> {
        self.run(move |conn| {
            conn.query_row(
                "SELECT locator, display_name FROM files WHERE file_id = ?1",
                params![file_id_to_sql(id)],
                |row| {
                    Ok(FileRecord {
                        id,
                        locator: Locator::new(row.get::<_, String>(0)?),
                        display_name: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn is_authorized(&self, id: FileId, identity: &Identity) -> Result<bool> {
        let identity = *identity;
        self.run(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM acl WHERE file_id = ?1 AND identity = ?2)",
                params![file_id_to_sql(id), identity.0.as_slice()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn authorized_identities(&self, id: FileId) -> Result<Vec<Identity>> {
        self.run(move |conn| {
            let mut stmt =
                conn.prepare("SELECT identity FROM acl WHERE file_id = ?1 ORDER BY identity")?;
            let rows = stmt
                .query_map(params![file_id_to_sql(id)], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|bytes| blob32(bytes, "identity").map(Identity))
                .collect()
        })
        .await
    }

    async fn get_admin(&self) -> Result<Option<Identity>> {
        self.run(|conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT identity FROM administrator WHERE slot = 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            bytes
                .map(|b| blob32(b, "identity").map(Identity))
                .transpose()
        })
        .await
    }

    async fn get_head(&self) -> Result<LogHead> {
        self.run(|conn| read_head(conn)).await
    }

    async fn get_record(&self, seq: u64) -> Result<Option<AuditRecord>> {
        self.run(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT canonical_bytes FROM audit_log WHERE seq = ?1",
                    params![seq as i64],
                    |row| row.get(0),
                )
                .optional()?;
            bytes.map(|b| decode_stored(&b)).transpose()
        })
        .await
    }

    async fn get_records_range(&self, start: u64, end: u64) -> Result<Vec<AuditRecord>> {
        if start > end {
            return Ok(Vec::new());
        }
        // Clamp so u64::MAX does not wrap to a negative bound.
        let start = start.min(i64::MAX as u64) as i64;
        let end = end.min(i64::MAX as u64) as i64;
        self.run(move |conn| {
            query_records(
                conn,
                "SELECT canonical_bytes FROM audit_log WHERE seq >= ?1 AND seq <= ?2 ORDER BY seq",
                params![start, end],
            )
        })
        .await
    }

    async fn get_records_for_file(&self, id: FileId) -> Result<Vec<AuditRecord>> {
        self.run(move |conn| {
            query_records(
                conn,
                "SELECT canonical_bytes FROM audit_log WHERE file_id = ?1 ORDER BY seq",
                params![file_id_to_sql(id)],
            )
        })
        .await
    }

    async fn commit(&self, commit: Commit) -> Result<CommitResult> {
        if commit.is_empty() {
            return Ok(CommitResult::Committed);
        }

        // Encode and index outside the lock; a record that cannot be decoded
        // never reaches the transaction.
        let prepared = match &commit.record {
            Some(record) => {
                let event = record
                    .event()
                    .map_err(|e| StoreError::InvalidData(e.to_string()))?;
                Some((
                    record.header.clone(),
                    record.compute_id(),
                    canonical_bytes(record),
                    event.subject(),
                    event.actor(),
                ))
            }
            None => None,
        };

        self.run(move |conn| {
            let tx = conn.transaction()?;

            if let Some((header, _, _, _, _)) = &prepared {
                let head = read_head(&tx)?;
                if head.check_next(header).is_err() {
                    return Ok(CommitResult::Conflict {
                        expected_seq: head.next_seq(),
                        existing: head.record_id,
                    });
                }
            }

            for mutation in &commit.mutations {
                if !apply_mutation(&tx, mutation, commit.at)? {
                    // Dropping the transaction rolls back earlier mutations.
                    return Ok(CommitResult::AlreadyInitialized);
                }
            }

            if let Some((header, record_id, canonical, subject, actor)) = &prepared {
                tx.execute(
                    "INSERT INTO audit_log (
                        seq, record_id, kind, file_id, actor, timestamp,
                        canonical_bytes, appended_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        header.seq as i64,
                        record_id.0.as_slice(),
                        header.kind.to_u16() as i64,
                        subject.map(file_id_to_sql),
                        actor.0.as_slice(),
                        header.timestamp,
                        canonical.as_slice(),
                        commit.at,
                    ],
                )?;
                debug!(seq = header.seq, kind = %header.kind, "appended record");
            }

            tx.commit()?;
            Ok(CommitResult::Committed)
        })
        .await
    }
}
