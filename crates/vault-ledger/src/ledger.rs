//! The Ledger: access-controlled file registry with a sealed audit log.
//!
//! The Ledger brings together the store, the access policy and the record
//! sealer. Each mutating operation runs under one write lock, performs every
//! check first, then hands its state changes and its audit record to the
//! store as a single atomic commit.
//!
//! The commit and the broadcast of its record run on a spawned task that
//! owns the write lock guard. Dropping an operation's future part-way never
//! leaves a committed record unpublished, and the next operation waits until
//! both have happened.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use vault_ledger_acl::{policy, AclView};
use vault_ledger_core::{
    validate_record, AuditEvent, AuditRecord, ChainSummary, ChainVerifier, Ed25519PublicKey,
    FileId, Identity, Keypair, Locator, LogHead, RecordBuilder, RecordId, ValidationError,
};
use vault_ledger_store::{Commit, CommitResult, FileRecord, Mutation, Store, StoreError};

use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};

/// The main Ledger struct.
///
/// Provides a unified API for:
/// - Registering files (`add_file`)
/// - Granting read access (`authorize_user`)
/// - Retrieving locators and logging sub-item views (`access_file`, `log_sub_file`)
/// - Moving the administrator role (`transfer_ownership`)
/// - Querying and verifying the audit log
pub struct Ledger<S: Store> {
    /// Key that seals every audit record.
    sealer: Keypair,
    /// The storage backend, shared with in-flight commit tasks.
    store: Arc<S>,
    /// Configuration.
    config: LedgerConfig,
    /// Timestamp source.
    clock: Arc<dyn Clock>,
    /// Serializes mutating operations. Held until the commit task finishes.
    write_lock: Arc<Mutex<()>>,
    /// Committed records, in commit order.
    records_tx: broadcast::Sender<AuditRecord>,
}

impl<S: Store> Ledger<S> {
    /// Bootstrap a fresh store with `deployer` as administrator.
    ///
    /// The store installs the administrator only if none is set, so of
    /// several ledgers racing to bootstrap one store exactly one succeeds.
    pub async fn create(
        sealer: Keypair,
        store: S,
        config: LedgerConfig,
        deployer: &Identity,
    ) -> Result<Self> {
        policy::require_valid_admin(deployer)?;

        let ledger = Self::assemble(sealer, store, config);
        let guard = ledger.lock().await;
        let commit = Commit::new(ledger.clock.now_millis()).mutate(Mutation::InitAdmin(*deployer));
        ledger.apply(commit, guard).await?;

        info!(admin = %deployer, sealer = ?ledger.sealer.public_key(), "ledger created");
        Ok(ledger)
    }

    /// Reopen a bootstrapped store.
    ///
    /// With `verify_on_open` the whole log is verified against `sealer`
    /// before the ledger is returned.
    pub async fn open(sealer: Keypair, store: S, config: LedgerConfig) -> Result<Self> {
        let admin = store
            .get_admin()
            .await?
            .ok_or(LedgerError::NotInitialized)?;

        let ledger = Self::assemble(sealer, store, config);
        if ledger.config.verify_on_open {
            let summary = ledger.verify_log().await?;
            debug!(length = summary.length, "verified log on open");
        }

        info!(admin = %admin, "ledger opened");
        Ok(ledger)
    }

    fn assemble(sealer: Keypair, store: S, config: LedgerConfig) -> Self {
        let (records_tx, _) = broadcast::channel(config.subscriber_capacity.max(1));
        Self {
            sealer,
            store: Arc::new(store),
            config,
            clock: Arc::new(SystemClock),
            write_lock: Arc::new(Mutex::new(())),
            records_tx,
        }
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Public key that seals this ledger's records.
    pub fn sealer_key(&self) -> Ed25519PublicKey {
        self.sealer.public_key()
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // Registry

    /// Register a file, or replace the locator and name of an existing one.
    ///
    /// The administrator is granted read access in the same commit. No audit
    /// record is written.
    pub async fn add_file(
        &self,
        caller: &Identity,
        id: FileId,
        locator: impl Into<Locator>,
        display_name: impl Into<String>,
    ) -> Result<()> {
        let guard = self.lock().await;
        let file = FileRecord {
            id,
            locator: locator.into(),
            display_name: display_name.into(),
        };

        let result = async {
            let admin = self.admin().await?;
            policy::require_admin(&admin, caller)?;

            let commit = Commit::new(self.clock.now_millis())
                .mutate(Mutation::PutFile(file))
                .mutate(Mutation::Grant {
                    file_id: id,
                    identity: admin,
                });
            self.apply(commit, guard).await
        }
        .await;

        log_outcome("add_file", caller, result).map(|()| {
            info!(file_id = %id, actor = %caller, "file registered");
        })
    }

    // Access control

    /// Grant `identity` read access to `id`.
    ///
    /// Granting twice is allowed; each call is logged.
    pub async fn authorize_user(
        &self,
        caller: &Identity,
        id: FileId,
        identity: &Identity,
    ) -> Result<RecordId> {
        let guard = self.lock().await;

        let result = async {
            let admin = self.admin().await?;
            policy::require_admin(&admin, caller)?;
            policy::require_file(id, self.store.get_file(id).await?)?;

            let event = AuditEvent::AccessGranted {
                file_id: id,
                grantee: *identity,
                actor: *caller,
            };
            let grant = Mutation::Grant {
                file_id: id,
                identity: *identity,
            };
            self.seal_and_commit(&event, vec![grant], guard).await
        }
        .await;

        log_outcome("authorize_user", caller, result).map(|record| {
            info!(file_id = %id, grantee = %identity, seq = record.seq(), "access granted");
            record.compute_id()
        })
    }

    // Audited access

    /// Return the locator of `id`, logging the retrieval.
    pub async fn access_file(&self, caller: &Identity, id: FileId) -> Result<Locator> {
        let guard = self.lock().await;

        let result = async {
            let file = self.require_readable(caller, id).await?;
            let event = AuditEvent::FileAccessed {
                file_id: id,
                file_name: file.display_name,
                actor: *caller,
            };
            let record = self.seal_and_commit(&event, Vec::new(), guard).await?;
            Ok::<_, LedgerError>((file.locator, record.seq()))
        }
        .await;

        log_outcome("access_file", caller, result).map(|(locator, seq)| {
            info!(file_id = %id, actor = %caller, seq, "file accessed");
            locator
        })
    }

    /// Log that `caller` viewed `sub_name` inside the container `id`.
    pub async fn log_sub_file(
        &self,
        caller: &Identity,
        id: FileId,
        sub_name: impl Into<String>,
    ) -> Result<RecordId> {
        let guard = self.lock().await;
        let sub_name = sub_name.into();

        let result = async {
            self.require_readable(caller, id).await?;
            let event = AuditEvent::SubFileAccessed {
                file_id: id,
                sub_name,
                actor: *caller,
            };
            self.seal_and_commit(&event, Vec::new(), guard).await
        }
        .await;

        log_outcome("log_sub_file", caller, result).map(|record| {
            info!(file_id = %id, actor = %caller, seq = record.seq(), "sub-file accessed");
            record.compute_id()
        })
    }

    // Administration

    /// Hand the administrator role to `new_admin`, effective immediately.
    ///
    /// Existing grants are untouched; the new administrator gains no read
    /// access to files registered before the transfer.
    pub async fn transfer_ownership(
        &self,
        caller: &Identity,
        new_admin: &Identity,
    ) -> Result<RecordId> {
        let guard = self.lock().await;

        let result = async {
            let admin = self.admin().await?;
            policy::require_admin(&admin, caller)?;
            policy::require_valid_admin(new_admin)?;

            let event = AuditEvent::OwnershipTransferred {
                previous: admin,
                new: *new_admin,
            };
            self.seal_and_commit(&event, vec![Mutation::SetAdmin(*new_admin)], guard)
                .await
        }
        .await;

        log_outcome("transfer_ownership", caller, result).map(|record| {
            info!(previous = %caller, new = %new_admin, seq = record.seq(), "ownership transferred");
            record.compute_id()
        })
    }

    // Queries

    /// The current administrator.
    pub async fn administrator(&self) -> Result<Identity> {
        self.admin().await
    }

    /// The log head, or `None` when nothing has been logged.
    pub async fn head(&self) -> Result<Option<LogHead>> {
        let head = self.store.get_head().await?;
        Ok((!head.is_empty()).then_some(head))
    }

    /// Records with `start <= seq <= end`, ordered by seq.
    pub async fn records(&self, start: u64, end: u64) -> Result<Vec<AuditRecord>> {
        Ok(self.store.get_records_range(start, end).await?)
    }

    /// Every record about `id`, ordered by seq.
    pub async fn records_for_file(&self, id: FileId) -> Result<Vec<AuditRecord>> {
        Ok(self.store.get_records_for_file(id).await?)
    }

    /// Observe every record committed from now on, in commit order.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditRecord> {
        self.records_tx.subscribe()
    }

    // Verification

    /// Re-validate the whole log against this ledger's sealing key.
    ///
    /// Records are read `replay_batch` at a time.
    pub async fn verify_log(&self) -> Result<ChainSummary> {
        let head = self.store.get_head().await?;
        let mut verifier = ChainVerifier::new(Some(self.sealer.public_key()));
        self.replay(head.seq, |record| Ok(verifier.push(record)?)).await?;
        let summary = verifier.finish();

        if summary.length != head.seq || summary.head != head.record_id {
            return Err(ValidationError::StructuralError(format!(
                "store head at seq {} does not match {} verified records",
                head.seq, summary.length
            ))
            .into());
        }

        Ok(summary)
    }

    /// Rebuild grants, administrator history and access tallies from the
    /// log alone.
    pub async fn audit_view(&self) -> Result<AclView> {
        let head = self.store.get_head().await?;
        let mut view = AclView::new();
        self.replay(head.seq, |record| Ok(view.apply_record(record)?)).await?;
        Ok(view)
    }

    // Internals

    async fn lock(&self) -> OwnedMutexGuard<()> {
        self.write_lock.clone().lock_owned().await
    }

    /// Feed records `1..=last` to `visit` in seq order, one batch in memory
    /// at a time.
    async fn replay<F>(&self, last: u64, mut visit: F) -> Result<()>
    where
        F: FnMut(&AuditRecord) -> Result<()>,
    {
        let batch = self.config.replay_batch.max(1);
        let mut start = 1;
        while start <= last {
            let end = last.min(start.saturating_add(batch - 1));
            let records = self.store.get_records_range(start, end).await?;
            if records.len() as u64 != end - start + 1 {
                return Err(ValidationError::StructuralError(format!(
                    "store returned {} records for seq {}..={}",
                    records.len(),
                    start,
                    end
                ))
                .into());
            }
            for record in &records {
                visit(record)?;
            }
            debug!(start, end, "replayed batch");
            start = end + 1;
        }
        Ok(())
    }

    async fn admin(&self) -> Result<Identity> {
        self.store
            .get_admin()
            .await?
            .ok_or(LedgerError::NotInitialized)
    }

    /// Existence first, then the caller's grant.
    async fn require_readable(&self, caller: &Identity, id: FileId) -> Result<FileRecord> {
        let file = policy::require_file(id, self.store.get_file(id).await?)?;
        policy::require_reader(caller, self.store.is_authorized(id, caller).await?)?;
        Ok(file)
    }

    /// Seal `event` at the next log position and commit it with `mutations`.
    async fn seal_and_commit(
        &self,
        event: &AuditEvent,
        mutations: Vec<Mutation>,
        guard: OwnedMutexGuard<()>,
    ) -> Result<AuditRecord> {
        let head = self.store.get_head().await?;
        let now = self.clock.now_millis();

        let record = RecordBuilder::new(head.next_seq(), event)
            .timestamp(now)
            .prev_opt(head.record_id)
            .sign(&self.sealer);

        if self.config.verify_records {
            head.check_next(&record.header)?;
            validate_record(&record)?;
        }

        let commit = Commit {
            mutations,
            record: Some(record.clone()),
            at: now,
        };
        self.apply(commit, guard).await?;
        Ok(record)
    }

    /// Commit and publish on a task of its own, holding `guard` until both
    /// are done. The task runs to completion even if this future is dropped.
    async fn apply(&self, commit: Commit, guard: OwnedMutexGuard<()>) -> Result<()> {
        let store = Arc::clone(&self.store);
        let records_tx = self.records_tx.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            let record = commit.record.clone();
            let result = store.commit(commit).await?;
            if let (CommitResult::Committed, Some(record)) = (&result, record) {
                // No subscribers is not an error.
                let _ = records_tx.send(record);
            }
            Ok::<_, StoreError>(result)
        });
        let result = task.await.map_err(|e| StoreError::Task(e.to_string()))??;

        match result {
            CommitResult::Committed => Ok(()),
            CommitResult::AlreadyInitialized => Err(LedgerError::AlreadyInitialized),
            CommitResult::Conflict {
                expected_seq,
                existing,
            } => Err(LedgerError::Conflict {
                seq: expected_seq,
                existing,
            }),
        }
    }
}

/// Log a rejected operation and pass the result through.
fn log_outcome<T>(op: &'static str, caller: &Identity, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        warn!(op, actor = %caller, error = err.label(), "operation rejected: {}", err);
    }
    result
}
