//! # Vault Ledger Core
//!
//! Pure primitives for the vault ledger: identities, file identifiers, audit
//! events, sealed audit records and their canonical encoding.
//!
//! This crate contains no I/O, no storage, no clock. Timestamps and sealing
//! keys are handed in by the caller.
//!
//! ## Key Types
//!
//! - [`FileId`] - Caller-chosen numeric key of a file record
//! - [`Identity`] - Pre-authenticated principal (32 bytes)
//! - [`Locator`] - Opaque reference to externally stored content
//! - [`AuditEvent`] - One of the four auditable actions
//! - [`AuditRecord`] - An event sealed into the hash chain
//! - [`RecordId`] - Content-addressed identifier of a record (Blake3)
//!
//! ## Canonicalization
//!
//! Record headers and event payloads are encoded as deterministic CBOR. See the
//! [`canonical`] module.

pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod event;
pub mod record;
pub mod types;
pub mod validation;

pub use canonical::{canonical_bytes, canonical_header_bytes, decode_record};
pub use chain::LogHead;
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, ValidationError};
pub use event::{AuditEvent, EventKind};
pub use record::{AuditRecord, RecordBuilder, RecordHeader, RECORD_VERSION};
pub use types::{FileId, Identity, Locator, RecordId};
pub use validation::{
    validate_record, validate_record_structure, verify_chain, ChainSummary, ChainVerifier,
};
