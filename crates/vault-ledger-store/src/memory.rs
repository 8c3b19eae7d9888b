//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use vault_ledger_core::{AuditRecord, FileId, Identity, LogHead};

use crate::error::{Result, StoreError};
use crate::traits::{Commit, CommitResult, FileRecord, Mutation, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; a
/// commit is applied under a single write guard.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Files indexed by id.
    files: BTreeMap<FileId, FileRecord>,

    /// Grants per file.
    acl: BTreeMap<FileId, BTreeSet<Identity>>,

    /// Current administrator.
    admin: Option<Identity>,

    /// The audit log; index `i` holds seq `i + 1`.
    records: Vec<StoredRecord>,

    /// Tip of the audit log.
    head: LogHead,
}

struct StoredRecord {
    record: AuditRecord,
    subject: Option<FileId>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_file(&self, id: FileId) -> Result<Option<FileRecord>> {
        Ok(self.read()?.files.get(&id).cloned())
    }

    async fn is_authorized(&self, id: FileId, identity: &Identity) -> Result<bool> {
        Ok(self
            .read()?
            .acl
            .get(&id)
            .map(|set| set.contains(identity))
            .unwrap_or(false))
    }

    async fn authorized_identities(&self, id: FileId) -> Result<Vec<Identity>> {
        Ok(self
            .read()?
            .acl
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn get_admin(&self) -> Result<Option<Identity>> {
        Ok(self.read()?.admin)
    }

    async fn get_head(&self) -> Result<LogHead> {
        Ok(self.read()?.head)
    }

    async fn get_record(&self, seq: u64) -> Result<Option<AuditRecord>> {
        if seq == 0 {
            return Ok(None);
        }
        let inner = self.read()?;
        Ok(inner
            .records
            .get((seq - 1) as usize)
            .map(|stored| stored.record.clone()))
    }

    async fn get_records_range(&self, start: u64, end: u64) -> Result<Vec<AuditRecord>> {
        let inner = self.read()?;
        Ok(inner
            .records
            .iter()
            .filter(|stored| {
                let seq = stored.record.seq();
                seq >= start && seq <= end
            })
            .map(|stored| stored.record.clone())
            .collect())
    }

    async fn get_records_for_file(&self, id: FileId) -> Result<Vec<AuditRecord>> {
        let inner = self.read()?;
        Ok(inner
            .records
            .iter()
            .filter(|stored| stored.subject == Some(id))
            .map(|stored| stored.record.clone())
            .collect())
    }

    async fn commit(&self, commit: Commit) -> Result<CommitResult> {
        if commit.is_empty() {
            return Ok(CommitResult::Committed);
        }
        let mut inner = self.write()?;

        // Everything that can fail is checked before the first write.
        let bootstraps = commit
            .mutations
            .iter()
            .any(|m| matches!(m, Mutation::InitAdmin(_)));
        if bootstraps && inner.admin.is_some() {
            return Ok(CommitResult::AlreadyInitialized);
        }

        let appended = match commit.record {
            Some(record) => {
                if inner.head.check_next(&record.header).is_err() {
                    return Ok(CommitResult::Conflict {
                        expected_seq: inner.head.next_seq(),
                        existing: inner.head.record_id,
                    });
                }
                let event = record
                    .event()
                    .map_err(|e| StoreError::InvalidData(e.to_string()))?;
                Some(StoredRecord {
                    subject: event.subject(),
                    record,
                })
            }
            None => None,
        };

        for mutation in commit.mutations {
            match mutation {
                Mutation::PutFile(file) => {
                    inner.files.insert(file.id, file);
                }
                Mutation::Grant { file_id, identity } => {
                    inner.acl.entry(file_id).or_default().insert(identity);
                }
                Mutation::SetAdmin(identity) | Mutation::InitAdmin(identity) => {
                    inner.admin = Some(identity);
                }
            }
        }

        if let Some(stored) = appended {
            inner.head = LogHead::at(&stored.record);
            debug!(seq = inner.head.seq, kind = %stored.record.kind(), "appended record");
            inner.records.push(stored);
        }

        Ok(CommitResult::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_ledger_core::{AuditEvent, Keypair, Locator, RecordBuilder};

    fn file(id: u64, locator: &str) -> FileRecord {
        FileRecord {
            id: FileId(id),
            locator: Locator::from(locator),
            display_name: format!("file-{}.pdf", id),
        }
    }

    fn access(head: &LogHead, id: u64, actor: Identity) -> AuditRecord {
        let event = AuditEvent::FileAccessed {
            file_id: FileId(id),
            file_name: format!("file-{}.pdf", id),
            actor,
        };
        RecordBuilder::new(head.next_seq(), &event)
            .timestamp(1_234_567_890_000)
            .prev_opt(head.record_id)
            .sign(&Keypair::from_seed(&[0x42; 32]))
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let admin = Identity::from_bytes([1; 32]);

        let result = store
            .commit(
                Commit::new(0)
                    .mutate(Mutation::SetAdmin(admin))
                    .mutate(Mutation::PutFile(file(1, "Qm1")))
                    .mutate(Mutation::Grant {
                        file_id: FileId(1),
                        identity: admin,
                    }),
            )
            .await
            .unwrap();
        assert_eq!(result, CommitResult::Committed);

        assert_eq!(store.get_admin().await.unwrap(), Some(admin));
        assert_eq!(store.get_file(FileId(1)).await.unwrap(), Some(file(1, "Qm1")));
        assert!(store.is_authorized(FileId(1), &admin).await.unwrap());
        assert!(store.get_head().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_appends_in_order() {
        let store = MemoryStore::new();
        let actor = Identity::from_bytes([2; 32]);

        for id in [1, 2, 1] {
            let head = store.get_head().await.unwrap();
            let record = access(&head, id, actor);
            let result = store.commit(Commit::new(0).append(record)).await.unwrap();
            assert!(result.is_committed());
        }

        assert_eq!(store.get_head().await.unwrap().seq, 3);
        assert_eq!(store.get_record(2).await.unwrap().unwrap().seq(), 2);
        assert_eq!(store.get_record(0).await.unwrap(), None);
        assert_eq!(store.get_records_range(2, 10).await.unwrap().len(), 2);

        let for_one: Vec<u64> = store
            .get_records_for_file(FileId(1))
            .await
            .unwrap()
            .iter()
            .map(|r| r.seq())
            .collect();
        assert_eq!(for_one, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_memory_store_conflict_applies_nothing() {
        let store = MemoryStore::new();
        let actor = Identity::from_bytes([2; 32]);

        let stale = store.get_head().await.unwrap();
        store
            .commit(Commit::new(0).append(access(&stale, 1, actor)))
            .await
            .unwrap();

        // A second writer still holding the empty head.
        let result = store
            .commit(
                Commit::new(0)
                    .mutate(Mutation::SetAdmin(actor))
                    .append(access(&stale, 1, actor)),
            )
            .await
            .unwrap();

        assert!(matches!(
            result,
            CommitResult::Conflict { expected_seq: 2, existing: Some(_) }
        ));
        assert_eq!(store.get_admin().await.unwrap(), None);
        assert_eq!(store.get_head().await.unwrap().seq, 1);
    }

    #[tokio::test]
    async fn test_memory_store_put_file_overwrites() {
        let store = MemoryStore::new();
        store
            .commit(Commit::new(0).mutate(Mutation::PutFile(file(7, "QmOld"))))
            .await
            .unwrap();
        store
            .commit(Commit::new(1).mutate(Mutation::PutFile(file(7, "QmNew"))))
            .await
            .unwrap();

        let stored = store.get_file(FileId(7)).await.unwrap().unwrap();
        assert_eq!(stored.locator, "QmNew");
    }

    #[tokio::test]
    async fn test_memory_store_init_admin_once() {
        let store = MemoryStore::new();
        let first = Identity::from_bytes([1; 32]);
        let second = Identity::from_bytes([2; 32]);

        let result = store
            .commit(Commit::new(0).mutate(Mutation::InitAdmin(first)))
            .await
            .unwrap();
        assert_eq!(result, CommitResult::Committed);

        let result = store
            .commit(
                Commit::new(1)
                    .mutate(Mutation::InitAdmin(second))
                    .mutate(Mutation::PutFile(file(1, "Qm1"))),
            )
            .await
            .unwrap();
        assert_eq!(result, CommitResult::AlreadyInitialized);
        assert_eq!(store.get_admin().await.unwrap(), Some(first));
        assert_eq!(store.get_file(FileId(1)).await.unwrap(), None);

        // SetAdmin still replaces freely.
        store
            .commit(Commit::new(2).mutate(Mutation::SetAdmin(second)))
            .await
            .unwrap();
        assert_eq!(store.get_admin().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_memory_store_empty_commit() {
        let store = MemoryStore::new();
        let commit = Commit::new(0);
        assert!(commit.is_empty());
        assert!(store.commit(commit).await.unwrap().is_committed());
        assert!(store.get_head().await.unwrap().is_empty());
    }
}
