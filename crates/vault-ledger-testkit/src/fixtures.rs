//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use vault_ledger::{Ledger, LedgerConfig, ManualClock};
use vault_ledger_core::{FileId, Identity, Keypair};
use vault_ledger_store::{MemoryStore, Store};

/// Seed of the sealing key every fixture ledger uses.
pub const SEALER_SEED: [u8; 32] = [0x42; 32];

/// Start time of the fixture clock (2025-01-14T16:00:00Z).
pub const START_MILLIS: i64 = 1_736_870_400_000;

/// A deterministic principal: the public key derived from `[tag; 32]`.
pub fn identity(tag: u8) -> Identity {
    Keypair::from_seed(&[tag; 32]).identity()
}

/// The fixture sealing key.
pub fn sealer() -> Keypair {
    Keypair::from_seed(&SEALER_SEED)
}

/// A bootstrapped ledger with a cast of named identities.
///
/// `admin` deployed the ledger; `alice`, `bob` and `carol` start with no
/// grants. The clock only moves through [`TestFixture::tick`].
pub struct TestFixture<S: Store = MemoryStore> {
    pub admin: Identity,
    pub alice: Identity,
    pub bob: Identity,
    pub carol: Identity,
    pub clock: Arc<ManualClock>,
    pub ledger: Ledger<S>,
}

impl TestFixture<MemoryStore> {
    /// Fixture over a fresh in-memory store.
    pub async fn new() -> Self {
        Self::with_store(MemoryStore::new()).await
    }
}

impl<S: Store> TestFixture<S> {
    /// Fixture over `store`, which must not be bootstrapped yet.
    pub async fn with_store(store: S) -> Self {
        Self::with_config(store, LedgerConfig::default()).await
    }

    /// Fixture over `store` with a custom configuration.
    pub async fn with_config(store: S, config: LedgerConfig) -> Self {
        let admin = identity(0xa0);
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let ledger = Ledger::create(sealer(), store, config, &admin)
            .await
            .expect("fixture ledger bootstraps")
            .with_clock(clock.clone());

        Self {
            admin,
            alice: identity(0xa1),
            bob: identity(0xb0),
            carol: identity(0xc0),
            clock,
            ledger,
        }
    }

    /// Register a file as the administrator.
    pub async fn seed_file(&self, id: u64, locator: &str, name: &str) {
        self.ledger
            .add_file(&self.admin, FileId(id), locator, name)
            .await
            .expect("administrator can register files");
    }

    /// Grant `who` read access as the administrator.
    pub async fn grant(&self, id: u64, who: &Identity) {
        self.ledger
            .authorize_user(&self.admin, FileId(id), who)
            .await
            .expect("administrator can grant access");
    }

    /// Advance the clock.
    pub fn tick(&self, millis: i64) {
        self.clock.advance(millis);
    }

    /// Number of records in the log.
    pub async fn log_len(&self) -> u64 {
        self.ledger
            .head()
            .await
            .expect("head is readable")
            .map(|head| head.seq)
            .unwrap_or(0)
    }
}
