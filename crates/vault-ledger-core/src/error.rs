//! Error types for the vault ledger core.

use thiserror::Error;

use crate::types::RecordId;

/// Errors raised while building, encoding or decoding records.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("payload hash mismatch: expected {expected}, got {actual}")]
    PayloadHashMismatch { expected: String, actual: String },

    #[error("unsupported record version: {0}")]
    UnsupportedVersion(u8),

    #[error("unknown event kind: {0:#06x}")]
    UnknownEventKind(u16),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Validation failures for a single record or a chain of records.
///
/// Variants that can only be detected in context carry the sequence number
/// of the first offending record.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("signature verification failed at seq {seq}")]
    SignatureFailed { seq: u64 },

    #[error("payload hash does not match header at seq {seq}")]
    PayloadHashMismatch { seq: u64 },

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("invalid sequence number: expected {expected}, got {got}")]
    InvalidSequence { expected: u64, got: u64 },

    #[error("invalid prev_record_id at seq {seq}: expected {expected:?}, got {got:?}")]
    InvalidPrevRecord {
        seq: u64,
        expected: Option<RecordId>,
        got: Option<RecordId>,
    },

    #[error("record at seq {seq} was sealed by an unexpected key")]
    UnexpectedSealer { seq: u64 },

    #[error("event at seq {seq} is malformed: {reason}")]
    MalformedEvent { seq: u64, reason: String },

    #[error("structural error: {0}")]
    StructuralError(String),
}
