//! # Vault Ledger Testkit
//!
//! Testing utilities for the vault ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known records with pinned canonical bytes
//! - **Generators**: Proptest strategies for identities, events, sealed chains
//!   and ledger operation sequences
//! - **Fixtures**: A bootstrapped ledger with a cast of named identities
//! - **Stores**: [`DelayedStore`], a wrapper that slows reads and commits
//!
//! ## Golden Vectors
//!
//! ```rust
//! use vault_ledger_testkit::vectors::{all_vectors, generate_record_from_vector};
//!
//! for vector in all_vectors() {
//!     let record = generate_record_from_vector(&vector);
//!     println!("{}: {}", vector.name, record.compute_id().to_hex());
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use vault_ledger_testkit::generators::{sealed_chain, ChainParams};
//!
//! proptest! {
//!     #[test]
//!     fn chain_verifies(params in any::<ChainParams>()) {
//!         let records = sealed_chain(&params);
//!         prop_assert!(vault_ledger_core::verify_chain(&records, None).is_ok());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use vault_ledger_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new().await;
//! fixture.seed_file(1, "Qm123", "report.pdf").await;
//! ```

pub mod fixtures;
pub mod generators;
pub mod store;
pub mod vectors;

pub use fixtures::{identity, TestFixture, SEALER_SEED};
pub use generators::{sealed_chain, ChainParams, LedgerOp, CAST_SIZE};
pub use store::DelayedStore;
pub use vectors::{all_vectors, generate_record_from_vector, verify_all_vectors, GoldenVector};
