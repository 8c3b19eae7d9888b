//! Record validation: signature verification, structural checks and whole
//! chain verification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::signed_message;
use crate::chain::LogHead;
use crate::crypto::{Blake3Hash, Ed25519PublicKey};
use crate::error::ValidationError;
use crate::event::EventKind;
use crate::record::{AuditRecord, RECORD_VERSION};
use crate::types::RecordId;

/// Validate a record in isolation, including its seal.
///
/// This performs:
/// - Version check
/// - Payload hash verification
/// - Sequence and link rules
/// - Event decoding against the header kind
/// - Signature verification
pub fn validate_record(record: &AuditRecord) -> Result<(), ValidationError> {
    validate_record_structure(record)?;

    let message = signed_message(record);
    record
        .header
        .sealer
        .verify(&message, &record.signature)
        .map_err(|_| ValidationError::SignatureFailed {
            seq: record.header.seq,
        })
}

/// Validate record structure without signature verification.
pub fn validate_record_structure(record: &AuditRecord) -> Result<(), ValidationError> {
    let seq = record.header.seq;

    if record.header.version != RECORD_VERSION {
        return Err(ValidationError::UnsupportedVersion(record.header.version));
    }

    if Blake3Hash::hash(&record.payload) != record.header.payload_hash {
        return Err(ValidationError::PayloadHashMismatch { seq });
    }

    if seq == 0 {
        return Err(ValidationError::StructuralError(
            "sequence numbers start at 1".into(),
        ));
    }

    // The first record has no predecessor; every later one must name it.
    if seq == 1 && record.header.prev_record_id.is_some() {
        return Err(ValidationError::InvalidPrevRecord {
            seq,
            expected: None,
            got: record.header.prev_record_id,
        });
    }
    if seq > 1 && record.header.prev_record_id.is_none() {
        return Err(ValidationError::StructuralError(
            "seq > 1 requires prev_record_id".into(),
        ));
    }

    record
        .event()
        .map_err(|e| ValidationError::MalformedEvent {
            seq,
            reason: e.to_string(),
        })?;

    Ok(())
}

/// Summary of a verified chain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainSummary {
    /// Number of records.
    pub length: u64,

    /// Id of the last record.
    pub head: Option<RecordId>,

    /// Record count per event kind.
    pub by_kind: BTreeMap<EventKind, u64>,
}

impl ChainSummary {
    /// Number of records of the given kind.
    pub fn count(&self, kind: EventKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

/// Incremental chain verification.
///
/// Feed records in seq order with [`ChainVerifier::push`]; the verifier keeps
/// only the running head and per-kind counts, so a log can be checked in
/// batches without holding it in memory.
#[derive(Debug, Clone, Default)]
pub struct ChainVerifier {
    sealer: Option<Ed25519PublicKey>,
    head: LogHead,
    summary: ChainSummary,
}

impl ChainVerifier {
    /// Start at genesis. When `sealer` is given every record must have been
    /// sealed by that key.
    pub fn new(sealer: Option<Ed25519PublicKey>) -> Self {
        Self {
            sealer,
            head: LogHead::genesis(),
            summary: ChainSummary::default(),
        }
    }

    /// Check the next record and advance past it.
    pub fn push(&mut self, record: &AuditRecord) -> Result<(), ValidationError> {
        if let Some(expected) = &self.sealer {
            if &record.header.sealer != expected {
                return Err(ValidationError::UnexpectedSealer {
                    seq: record.header.seq,
                });
            }
        }

        self.head.check_next(&record.header)?;
        validate_record(record)?;
        self.head.advance(record)?;

        self.summary.length += 1;
        *self.summary.by_kind.entry(record.header.kind).or_insert(0) += 1;
        Ok(())
    }

    /// Records verified so far.
    pub fn verified(&self) -> u64 {
        self.summary.length
    }

    /// Summary of everything pushed.
    pub fn finish(mut self) -> ChainSummary {
        self.summary.head = self.head.record_id;
        self.summary
    }
}

/// Verify a full chain, in order, starting from the first record.
///
/// When `sealer` is given every record must have been sealed by that key.
/// Returns the first failure found.
pub fn verify_chain<'a, I>(
    records: I,
    sealer: Option<&Ed25519PublicKey>,
) -> Result<ChainSummary, ValidationError>
where
    I: IntoIterator<Item = &'a AuditRecord>,
{
    let mut verifier = ChainVerifier::new(sealer.copied());
    for record in records {
        verifier.push(record)?;
    }
    Ok(verifier.finish())
}
