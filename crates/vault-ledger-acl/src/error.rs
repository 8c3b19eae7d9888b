//! Error types for access control.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vault_ledger_core::{FileId, Identity};

/// Why a caller was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Denial {
    /// The operation is reserved for the administrator.
    NotAdministrator,
    /// The caller holds no read grant on the file.
    NotGranted,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::NotAdministrator => f.write_str("caller is not the administrator"),
            Denial::NotGranted => f.write_str("caller has no read grant"),
        }
    }
}

/// The contract errors every ledger operation can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AclError {
    /// Caller lacks the required role or grant.
    #[error("unauthorized {caller}: {reason}")]
    Unauthorized { caller: Identity, reason: Denial },

    /// The referenced file was never registered.
    #[error("file not found: {0}")]
    NotFound(FileId),

    /// Malformed input, such as the null identity as a new administrator.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for access checks.
pub type Result<T> = std::result::Result<T, AclError>;
