//! AuditRecord: an event sealed into the hash chain.
//!
//! A record is immutable once signed. Its id commits to the header, the
//! event payload and the signature, and each header commits to the id of the
//! record before it, so rewriting any entry breaks every later link.

use bytes::Bytes;

use crate::canonical::{canonical_bytes, signed_message_from_parts};
use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair, RECORD_ID_DOMAIN};
use crate::error::CoreError;
use crate::event::{AuditEvent, EventKind};
use crate::types::RecordId;

/// The current record schema version.
pub const RECORD_VERSION: u8 = 0;

/// Header of a sealed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Schema version (currently 0).
    pub version: u8,

    /// Position in the log (1-indexed, contiguous).
    pub seq: u64,

    /// Environment-supplied timestamp (Unix milliseconds). Trusted as given.
    pub timestamp: i64,

    /// Kind of the event in the payload.
    pub kind: EventKind,

    /// Id of the record at `seq - 1` (None for the first record).
    pub prev_record_id: Option<RecordId>,

    /// Blake3 hash of the payload bytes.
    pub payload_hash: Blake3Hash,

    /// Public key of the ledger that sealed this record.
    pub sealer: Ed25519PublicKey,
}

/// A complete record: header + canonical event payload + signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// The record header.
    pub header: RecordHeader,

    /// Canonical event bytes.
    pub payload: Bytes,

    /// Ed25519 signature over (seal domain || canonical header || payload).
    pub signature: Ed25519Signature,
}

impl AuditRecord {
    /// Compute the record id.
    pub fn compute_id(&self) -> RecordId {
        let bytes = canonical_bytes(self);
        RecordId(Blake3Hash::hash_with_domain(RECORD_ID_DOMAIN, &bytes).0)
    }

    /// Get the sequence number.
    pub fn seq(&self) -> u64 {
        self.header.seq
    }

    /// Get the timestamp.
    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    /// Get the event kind.
    pub fn kind(&self) -> EventKind {
        self.header.kind
    }

    /// Get the previous record id.
    pub fn prev_record_id(&self) -> Option<&RecordId> {
        self.header.prev_record_id.as_ref()
    }

    /// Get the sealing key.
    pub fn sealer(&self) -> &Ed25519PublicKey {
        &self.header.sealer
    }

    /// Check if this is the first record in the log.
    pub fn is_genesis(&self) -> bool {
        self.header.seq == 1 && self.header.prev_record_id.is_none()
    }

    /// Decode the event carried by this record.
    pub fn event(&self) -> Result<AuditEvent, CoreError> {
        AuditEvent::from_payload(self.header.kind, &self.payload)
    }
}

/// Builder for sealing events into records.
pub struct RecordBuilder {
    seq: u64,
    timestamp: i64,
    prev_record_id: Option<RecordId>,
    kind: EventKind,
    payload: Bytes,
}

impl RecordBuilder {
    /// Start sealing `event` at position `seq`.
    pub fn new(seq: u64, event: &AuditEvent) -> Self {
        Self {
            seq,
            timestamp: 0,
            prev_record_id: None,
            kind: event.kind(),
            payload: Bytes::from(event.to_payload()),
        }
    }

    /// Set the timestamp.
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = ts;
        self
    }

    /// Set the previous record id.
    pub fn prev(mut self, prev: RecordId) -> Self {
        self.prev_record_id = Some(prev);
        self
    }

    /// Set the previous record id from a log head position.
    pub fn prev_opt(mut self, prev: Option<RecordId>) -> Self {
        self.prev_record_id = prev;
        self
    }

    /// Build and sign the record.
    pub fn sign(self, keypair: &Keypair) -> AuditRecord {
        let header = RecordHeader {
            version: RECORD_VERSION,
            seq: self.seq,
            timestamp: self.timestamp,
            kind: self.kind,
            prev_record_id: self.prev_record_id,
            payload_hash: Blake3Hash::hash(&self.payload),
            sealer: keypair.public_key(),
        };

        let message = signed_message_from_parts(&header, &self.payload);
        let signature = keypair.sign(&message);

        AuditRecord {
            header,
            payload: self.payload,
            signature,
        }
    }
}
