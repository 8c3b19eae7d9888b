//! ACL state rebuilt from the audit log.
//!
//! An auditor holding only the sealed records can replay them into an
//! [`AclView`] and learn every grant made through the ledger, every change of
//! administrator and how often each file was read, without trusting the
//! registry or ACL tables.
//!
//! Grants given implicitly to the administrator at file registration are not
//! logged and so never appear here.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use vault_ledger_core::{AuditEvent, AuditRecord, CoreError, FileId, Identity, RecordId};

/// A grant observed in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantEntry {
    pub file_id: FileId,
    pub grantee: Identity,
    /// Administrator that made the first grant.
    pub granted_by: Identity,
    /// Sequence number of the first grant.
    pub seq: u64,
    pub timestamp: i64,
    pub record_id: RecordId,
    /// How many `AccessGranted` records name this pair.
    pub times_granted: u64,
}

/// An ownership transfer observed in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminChange {
    pub previous: Identity,
    pub new: Identity,
    pub seq: u64,
    pub timestamp: i64,
}

/// Access counts for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTally {
    /// Locator retrievals.
    pub file_accesses: u64,
    /// Sub-item views.
    pub sub_file_accesses: u64,
    /// Access records per actor.
    pub by_actor: BTreeMap<Identity, u64>,
    /// Sequence number of the most recent access.
    pub last_seq: u64,
}

impl AccessTally {
    /// Total access records for the file.
    pub fn total(&self) -> u64 {
        self.file_accesses + self.sub_file_accesses
    }
}

/// Replayed ACL state.
#[derive(Debug, Clone, Default)]
pub struct AclView {
    grants: BTreeMap<FileId, BTreeMap<Identity, GrantEntry>>,
    admin_history: Vec<AdminChange>,
    tallies: BTreeMap<FileId, AccessTally>,
    records_applied: u64,
}

impl AclView {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay `records` in order.
    pub fn from_records<'a, I>(records: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = &'a AuditRecord>,
    {
        let mut view = Self::new();
        for record in records {
            view.apply_record(record)?;
        }
        Ok(view)
    }

    /// Apply one sealed record.
    pub fn apply_record(&mut self, record: &AuditRecord) -> Result<(), CoreError> {
        let event = record.event()?;
        self.apply_event(record.seq(), record.timestamp(), record.compute_id(), &event);
        Ok(())
    }

    /// Apply an already decoded event.
    pub fn apply_event(&mut self, seq: u64, timestamp: i64, record_id: RecordId, event: &AuditEvent) {
        self.records_applied += 1;

        match event {
            AuditEvent::FileAccessed { file_id, actor, .. } => {
                let tally = self.tallies.entry(*file_id).or_default();
                tally.file_accesses += 1;
                *tally.by_actor.entry(*actor).or_insert(0) += 1;
                tally.last_seq = seq;
            }
            AuditEvent::SubFileAccessed { file_id, actor, .. } => {
                let tally = self.tallies.entry(*file_id).or_default();
                tally.sub_file_accesses += 1;
                *tally.by_actor.entry(*actor).or_insert(0) += 1;
                tally.last_seq = seq;
            }
            AuditEvent::AccessGranted {
                file_id,
                grantee,
                actor,
            } => {
                self.grants
                    .entry(*file_id)
                    .or_default()
                    .entry(*grantee)
                    .and_modify(|entry| entry.times_granted += 1)
                    .or_insert(GrantEntry {
                        file_id: *file_id,
                        grantee: *grantee,
                        granted_by: *actor,
                        seq,
                        timestamp,
                        record_id,
                        times_granted: 1,
                    });
            }
            AuditEvent::OwnershipTransferred { previous, new } => {
                self.admin_history.push(AdminChange {
                    previous: *previous,
                    new: *new,
                    seq,
                    timestamp,
                });
            }
        }
    }

    /// Whether the log shows `identity` was granted on `file_id`.
    pub fn is_granted(&self, file_id: FileId, identity: &Identity) -> bool {
        self.grants
            .get(&file_id)
            .map(|g| g.contains_key(identity))
            .unwrap_or(false)
    }

    /// Identities granted on `file_id`, in byte order.
    pub fn grantees(&self, file_id: FileId) -> Vec<Identity> {
        self.grants
            .get(&file_id)
            .map(|g| g.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Every observed grant, ordered by file then grantee.
    pub fn grants(&self) -> impl Iterator<Item = &GrantEntry> {
        self.grants.values().flat_map(|g| g.values())
    }

    /// Number of distinct (file, grantee) pairs.
    pub fn grant_count(&self) -> usize {
        self.grants.values().map(|g| g.len()).sum()
    }

    /// Ownership transfers in log order.
    pub fn admin_history(&self) -> &[AdminChange] {
        &self.admin_history
    }

    /// Administrator after the last observed transfer.
    pub fn latest_admin(&self) -> Option<Identity> {
        self.admin_history.last().map(|change| change.new)
    }

    /// Access counts for `file_id`.
    pub fn tally(&self, file_id: FileId) -> Option<&AccessTally> {
        self.tallies.get(&file_id)
    }

    /// Every file mentioned by an access or grant record.
    pub fn files(&self) -> BTreeSet<FileId> {
        self.grants
            .keys()
            .chain(self.tallies.keys())
            .copied()
            .collect()
    }

    /// Number of records replayed.
    pub fn records_applied(&self) -> u64 {
        self.records_applied
    }
}
