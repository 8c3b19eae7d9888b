//! Access policy checks.
//!
//! Each check is a pure function over state the caller has already loaded.
//! Read paths must run [`require_file`] before [`require_reader`] so that a
//! missing file is reported as `NotFound` even to callers without a grant.

use vault_ledger_core::{FileId, Identity};

use crate::error::{AclError, Denial, Result};

/// The caller must be the current administrator.
pub fn require_admin(admin: &Identity, caller: &Identity) -> Result<()> {
    if admin != caller {
        return Err(AclError::Unauthorized {
            caller: *caller,
            reason: Denial::NotAdministrator,
        });
    }
    Ok(())
}

/// The file must exist. Returns the loaded file.
pub fn require_file<T>(id: FileId, file: Option<T>) -> Result<T> {
    file.ok_or(AclError::NotFound(id))
}

/// The caller must hold a read grant on the file.
pub fn require_reader(caller: &Identity, granted: bool) -> Result<()> {
    if !granted {
        return Err(AclError::Unauthorized {
            caller: *caller,
            reason: Denial::NotGranted,
        });
    }
    Ok(())
}

/// The identity must be usable as an administrator.
pub fn require_valid_admin(identity: &Identity) -> Result<()> {
    if identity.is_zero() {
        return Err(AclError::InvalidArgument(
            "the null identity cannot be administrator".into(),
        ));
    }
    Ok(())
}
