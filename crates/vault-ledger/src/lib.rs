//! # Vault Ledger
//!
//! An access-controlled file registry with an immutable, verifiable audit
//! trail.
//!
//! ## Overview
//!
//! A single administrator registers files (an opaque content locator plus a
//! display name) and grants per-file read access to identities. Every
//! locator retrieval, sub-item view, grant and ownership transfer is sealed
//! into a signed Blake3 hash chain that anyone can verify from the log alone.
//!
//! - **Registry**: `add_file`, keyed by a caller-chosen [`FileId`]
//! - **ACL**: `authorize_user`, additive grants checked on every read
//! - **Audit log**: `access_file`, `log_sub_file`, sealed [`AuditRecord`]s
//! - **Administration**: `transfer_ownership`, single step and immediate
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vault_ledger::{FileId, Identity, Keypair, Ledger, LedgerConfig};
//! use vault_ledger::store::SqliteStore;
//!
//! async fn example() {
//!     let admin = Identity::from_bytes([1; 32]);
//!     let reader = Identity::from_bytes([2; 32]);
//!
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!     let ledger = Ledger::create(Keypair::generate(), store, LedgerConfig::default(), &admin)
//!         .await
//!         .unwrap();
//!
//!     ledger.add_file(&admin, FileId(1), "Qm123", "report.pdf").await.unwrap();
//!     ledger.authorize_user(&admin, FileId(1), &reader).await.unwrap();
//!
//!     let locator = ledger.access_file(&reader, FileId(1)).await.unwrap();
//!     assert_eq!(locator, "Qm123");
//!
//!     let summary = ledger.verify_log().await.unwrap();
//!     assert_eq!(summary.length, 2);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `vault_ledger::core` - Identities, events, sealed records, validation
//! - `vault_ledger::store` - Storage abstraction and SQLite
//! - `vault_ledger::acl` - Access policy and replayed ACL state

pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;

// Re-export component crates
pub use vault_ledger_acl as acl;
pub use vault_ledger_core as core;
pub use vault_ledger_store as store;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use ledger::Ledger;

pub use vault_ledger_acl::{AclView, Denial};
pub use vault_ledger_core::{
    AuditEvent, AuditRecord, ChainSummary, EventKind, FileId, Identity, Keypair, Locator, LogHead,
    RecordId,
};
