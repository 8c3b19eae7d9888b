//! Store wrappers for exercising timing-sensitive ledger paths.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use vault_ledger_core::{AuditRecord, FileId, Identity, LogHead};
use vault_ledger_store::{Commit, CommitResult, FileRecord, Result, Store};

/// Delegates to an inner store, sleeping before administrator and head
/// reads and before every commit.
///
/// Widens the window between a ledger's checks and its commit so that racing
/// or cancelled operations land inside it.
pub struct DelayedStore<S> {
    inner: Arc<S>,
    delay: Duration,
}

impl<S: Store> DelayedStore<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self::shared(Arc::new(inner), delay)
    }

    /// Wrap a store that other handles also reach directly.
    pub fn shared(inner: Arc<S>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<S: Store> Store for DelayedStore<S> {
    async fn get_file(&self, id: FileId) -> Result<Option<FileRecord>> {
        self.inner.get_file(id).await
    }

    async fn is_authorized(&self, id: FileId, identity: &Identity) -> Result<bool> {
        self.inner.is_authorized(id, identity).await
    }

    async fn authorized_identities(&self, id: FileId) -> Result<Vec<Identity>> {
        self.inner.authorized_identities(id).await
    }

    async fn get_admin(&self) -> Result<Option<Identity>> {
        sleep(self.delay).await;
        self.inner.get_admin().await
    }

    async fn get_head(&self) -> Result<LogHead> {
        sleep(self.delay).await;
        self.inner.get_head().await
    }

    async fn get_record(&self, seq: u64) -> Result<Option<AuditRecord>> {
        self.inner.get_record(seq).await
    }

    async fn get_records_range(&self, start: u64, end: u64) -> Result<Vec<AuditRecord>> {
        self.inner.get_records_range(start, end).await
    }

    async fn get_records_for_file(&self, id: FileId) -> Result<Vec<AuditRecord>> {
        self.inner.get_records_for_file(id).await
    }

    async fn commit(&self, commit: Commit) -> Result<CommitResult> {
        sleep(self.delay).await;
        self.inner.commit(commit).await
    }
}
