//! # Vault Ledger Store
//!
//! Storage abstraction for the vault ledger. Provides a trait-based interface
//! for registry, ACL, administrator and audit log persistence with SQLite and
//! in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`Commit`] - An atomic set of mutations plus at most one sealed record
//! - [`CommitResult`] - Result of applying a commit
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vault_ledger_store::{Commit, Mutation, SqliteStore, Store};
//! use vault_ledger_core::Identity;
//!
//! async fn example() {
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!
//!     let admin = Identity::from_bytes([1; 32]);
//!     store
//!         .commit(Commit::new(0).mutate(Mutation::SetAdmin(admin)))
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic commits**: every write goes through [`Store::commit`]
//! - **Chain position check**: a record that does not continue the head is
//!   rejected with [`CommitResult::Conflict`]
//! - **Append-only**: the SQLite schema rejects updates and deletes on the
//!   audit log and ACL, and deletes on files

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Commit, CommitResult, FileRecord, Mutation, Store};
