//! # Vault Ledger ACL
//!
//! Access control for the vault ledger.
//!
//! ## Overview
//!
//! Authorization has two halves:
//!
//! - [`policy`]: the checks every ledger operation runs before it writes
//!   anything (administrator gate, file existence, read grant, administrator
//!   validity)
//! - [`AclView`]: grants, administrator history and access tallies rebuilt
//!   from the sealed audit log alone, for third-party verification
//!
//! The live ACL lives in the store; the view is what the log can prove.

pub mod error;
pub mod policy;
pub mod state;

pub use error::{AclError, Denial, Result};
pub use policy::{require_admin, require_file, require_reader, require_valid_admin};
pub use state::{AccessTally, AclView, AdminChange, GrantEntry};
