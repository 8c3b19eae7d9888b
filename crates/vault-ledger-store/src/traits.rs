//! Store trait: the abstract interface for ledger persistence.
//!
//! The ledger is storage-agnostic. Implementations include SQLite (primary)
//! and in-memory (for tests). Every state change goes through a single
//! [`Store::commit`] so that registry, ACL, administrator and audit log move
//! together or not at all.

use std::sync::Arc;

use async_trait::async_trait;
use vault_ledger_core::{AuditRecord, FileId, Identity, Locator, LogHead, RecordId};

use crate::error::Result;

/// A registered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Caller-chosen identifier.
    pub id: FileId,
    /// Opaque content reference.
    pub locator: Locator,
    /// Human-readable name recorded in access events.
    pub display_name: String,
}

/// A single state change inside a [`Commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a file, or replace the locator and name of an existing one.
    PutFile(FileRecord),
    /// Grant `identity` read access to `file_id`. Idempotent.
    Grant { file_id: FileId, identity: Identity },
    /// Replace the administrator.
    SetAdmin(Identity),
    /// Install the first administrator. The whole commit is refused with
    /// [`CommitResult::AlreadyInitialized`] if one is already set.
    InitAdmin(Identity),
}

/// An atomic unit of work: state mutations plus at most one sealed record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Commit {
    /// Mutations, applied in order.
    pub mutations: Vec<Mutation>,
    /// The record to append to the audit log.
    pub record: Option<AuditRecord>,
    /// Commit time (Unix ms), used for bookkeeping columns.
    pub at: i64,
}

impl Commit {
    /// An empty commit at time `at`.
    pub fn new(at: i64) -> Self {
        Self {
            mutations: Vec::new(),
            record: None,
            at,
        }
    }

    /// Add a mutation.
    pub fn mutate(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// Attach the record to append.
    pub fn append(mut self, record: AuditRecord) -> Self {
        self.record = Some(record);
        self
    }

    /// Whether this commit carries neither mutations nor a record.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.record.is_none()
    }
}

/// Result of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// Everything was applied.
    Committed,
    /// The record does not continue the current log head; nothing was applied.
    Conflict {
        /// The sequence number the record needed to carry.
        expected_seq: u64,
        /// Id of the record currently at the head.
        existing: Option<RecordId>,
    },
    /// An `InitAdmin` mutation found an administrator in place; nothing was
    /// applied.
    AlreadyInitialized,
}

impl CommitResult {
    /// Whether the commit was applied.
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitResult::Committed)
    }
}

/// The Store trait: async interface for ledger persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    // Registry and ACL

    /// Get a file by id.
    async fn get_file(&self, id: FileId) -> Result<Option<FileRecord>>;

    /// Check whether `identity` may read `id`.
    async fn is_authorized(&self, id: FileId, identity: &Identity) -> Result<bool>;

    /// Every identity granted on `id`, in byte order.
    async fn authorized_identities(&self, id: FileId) -> Result<Vec<Identity>>;

    /// The current administrator, if the store has been bootstrapped.
    async fn get_admin(&self) -> Result<Option<Identity>>;

    // Audit log

    /// Position of the last appended record.
    async fn get_head(&self) -> Result<LogHead>;

    /// Get a record by sequence number.
    async fn get_record(&self, seq: u64) -> Result<Option<AuditRecord>>;

    /// Get records with `start <= seq <= end`, ordered by seq.
    async fn get_records_range(&self, start: u64, end: u64) -> Result<Vec<AuditRecord>>;

    /// Get every record whose event is about `id`, ordered by seq.
    async fn get_records_for_file(&self, id: FileId) -> Result<Vec<AuditRecord>>;

    // Writes

    /// Apply a commit atomically.
    ///
    /// When the commit carries a record, its seq must be `head.seq + 1` and its
    /// prev link must equal the head id; otherwise nothing is applied and
    /// `Conflict` is returned. An empty commit is a no-op.
    async fn commit(&self, commit: Commit) -> Result<CommitResult>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn get_file(&self, id: FileId) -> Result<Option<FileRecord>> {
        (**self).get_file(id).await
    }

    async fn is_authorized(&self, id: FileId, identity: &Identity) -> Result<bool> {
        (**self).is_authorized(id, identity).await
    }

    async fn authorized_identities(&self, id: FileId) -> Result<Vec<Identity>> {
        (**self).authorized_identities(id).await
    }

    async fn get_admin(&self) -> Result<Option<Identity>> {
        (**self).get_admin().await
    }

    async fn get_head(&self) -> Result<LogHead> {
        (**self).get_head().await
    }

    async fn get_record(&self, seq: u64) -> Result<Option<AuditRecord>> {
        (**self).get_record(seq).await
    }

    async fn get_records_range(&self, start: u64, end: u64) -> Result<Vec<AuditRecord>> {
        (**self).get_records_range(start, end).await
    }

    async fn get_records_for_file(&self, id: FileId) -> Result<Vec<AuditRecord>> {
        (**self).get_records_for_file(id).await
    }

    async fn commit(&self, commit: Commit) -> Result<CommitResult> {
        (**self).commit(commit).await
    }
}
