//! Error types for the Ledger.

use thiserror::Error;
use vault_ledger_acl::{AclError, Denial};
use vault_ledger_core::{CoreError, FileId, Identity, RecordId, ValidationError};
use vault_ledger_store::StoreError;

/// Errors that can occur during Ledger operations.
///
/// The first three variants are the contract errors. They are raised before
/// anything is written, so a failed operation leaves no trace in the store
/// or the log.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Caller lacks the required role or grant.
    #[error("unauthorized {caller}: {reason}")]
    Unauthorized { caller: Identity, reason: Denial },

    /// The referenced file was never registered.
    #[error("file not found: {0}")]
    NotFound(FileId),

    /// Malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A record or the chain failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Encoding or decoding error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Another writer advanced the log underneath this ledger.
    #[error("log conflict: expected to write seq {seq}, head is {existing:?}")]
    Conflict {
        seq: u64,
        existing: Option<RecordId>,
    },

    /// `create` was called on a store that already has an administrator.
    #[error("ledger already initialized")]
    AlreadyInitialized,

    /// `open` was called on a store with no administrator.
    #[error("ledger not initialized")]
    NotInitialized,
}

impl LedgerError {
    /// Short label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            LedgerError::Unauthorized { .. } => "unauthorized",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::InvalidArgument(_) => "invalid_argument",
            LedgerError::Store(_) => "store",
            LedgerError::Validation(_) => "validation",
            LedgerError::Core(_) => "core",
            LedgerError::Conflict { .. } => "conflict",
            LedgerError::AlreadyInitialized => "already_initialized",
            LedgerError::NotInitialized => "not_initialized",
        }
    }

    /// Whether this is one of the three contract errors.
    pub fn is_contract(&self) -> bool {
        matches!(
            self,
            LedgerError::Unauthorized { .. }
                | LedgerError::NotFound(_)
                | LedgerError::InvalidArgument(_)
        )
    }
}

impl From<AclError> for LedgerError {
    fn from(err: AclError) -> Self {
        match err {
            AclError::Unauthorized { caller, reason } => {
                LedgerError::Unauthorized { caller, reason }
            }
            AclError::NotFound(id) => LedgerError::NotFound(id),
            AclError::InvalidArgument(msg) => LedgerError::InvalidArgument(msg),
        }
    }
}

/// Result type for Ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
