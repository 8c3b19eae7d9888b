//! Proptest generators for property-based testing.

use proptest::prelude::*;

use vault_ledger_core::{
    AuditEvent, AuditRecord, FileId, Identity, Keypair, Locator, LogHead, RecordBuilder,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate any identity, including the null identity.
pub fn identity() -> impl Strategy<Value = Identity> {
    prop_oneof![
        1 => Just(Identity::ZERO),
        9 => any::<[u8; 32]>().prop_map(Identity::from_bytes),
    ]
}

/// Generate a non-null identity.
pub fn non_zero_identity() -> impl Strategy<Value = Identity> {
    any::<[u8; 32]>()
        .prop_filter("null identity", |b| b != &[0u8; 32])
        .prop_map(Identity::from_bytes)
}

/// Generate any file id.
pub fn file_id() -> impl Strategy<Value = FileId> {
    any::<u64>().prop_map(FileId)
}

/// Generate a file id from a small space, so generated operations collide.
pub fn small_file_id() -> impl Strategy<Value = FileId> {
    (0u64..6).prop_map(FileId)
}

/// Generate a content locator.
pub fn locator() -> impl Strategy<Value = Locator> {
    "Qm[1-9A-HJ-NP-Za-km-z]{8,44}".prop_map(Locator::from)
}

/// Generate a display or sub-item name, including non-ASCII text.
pub fn name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9_-]{1,24}\\.(pdf|docx|txt)".prop_map(String::from),
        "\\PC{0,32}".prop_map(String::from),
    ]
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 2
}

/// Generate any audit event.
pub fn audit_event() -> impl Strategy<Value = AuditEvent> {
    prop_oneof![
        (file_id(), name(), identity()).prop_map(|(file_id, file_name, actor)| {
            AuditEvent::FileAccessed {
                file_id,
                file_name,
                actor,
            }
        }),
        (file_id(), name(), identity()).prop_map(|(file_id, sub_name, actor)| {
            AuditEvent::SubFileAccessed {
                file_id,
                sub_name,
                actor,
            }
        }),
        (file_id(), identity(), identity()).prop_map(|(file_id, grantee, actor)| {
            AuditEvent::AccessGranted {
                file_id,
                grantee,
                actor,
            }
        }),
        (identity(), non_zero_identity())
            .prop_map(|(previous, new)| AuditEvent::OwnershipTransferred { previous, new }),
    ]
}

/// Parameters for generating a sealed chain.
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub sealer_seed: [u8; 32],
    pub start: i64,
    pub events: Vec<AuditEvent>,
}

impl Arbitrary for ChainParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(),
            0i64..=1_700_000_000_000i64,
            prop::collection::vec(audit_event(), 1..16),
        )
            .prop_map(|(sealer_seed, start, events)| ChainParams {
                sealer_seed,
                start,
                events,
            })
            .boxed()
    }
}

/// Seal `params.events` into a contiguous chain, one second apart.
pub fn sealed_chain(params: &ChainParams) -> Vec<AuditRecord> {
    let sealer = Keypair::from_seed(&params.sealer_seed);
    let mut head = LogHead::genesis();
    let mut records = Vec::with_capacity(params.events.len());

    for (i, event) in params.events.iter().enumerate() {
        let record = RecordBuilder::new(head.next_seq(), event)
            .timestamp(params.start + i as i64 * 1_000)
            .prev_opt(head.record_id)
            .sign(&sealer);
        head = LogHead::at(&record);
        records.push(record);
    }

    records
}

/// A ledger call, with callers drawn from a cast of five identities by index.
#[derive(Debug, Clone)]
pub enum LedgerOp {
    AddFile {
        caller: usize,
        file: FileId,
        locator: Locator,
        name: String,
    },
    Authorize {
        caller: usize,
        file: FileId,
        grantee: usize,
    },
    Access {
        caller: usize,
        file: FileId,
    },
    SubAccess {
        caller: usize,
        file: FileId,
        sub_name: String,
    },
    Transfer {
        caller: usize,
        new_admin: usize,
    },
}

/// Number of identities a [`LedgerOp`] can refer to.
pub const CAST_SIZE: usize = 5;

/// Generate one ledger call.
pub fn ledger_op() -> impl Strategy<Value = LedgerOp> {
    let who = || 0..CAST_SIZE;
    prop_oneof![
        3 => (who(), small_file_id(), locator(), name()).prop_map(|(caller, file, locator, name)| {
            LedgerOp::AddFile {
                caller,
                file,
                locator,
                name,
            }
        }),
        3 => (who(), small_file_id(), who())
            .prop_map(|(caller, file, grantee)| LedgerOp::Authorize { caller, file, grantee }),
        4 => (who(), small_file_id()).prop_map(|(caller, file)| LedgerOp::Access { caller, file }),
        2 => (who(), small_file_id(), name()).prop_map(|(caller, file, sub_name)| {
            LedgerOp::SubAccess {
                caller,
                file,
                sub_name,
            }
        }),
        1 => (who(), who()).prop_map(|(caller, new_admin)| LedgerOp::Transfer { caller, new_admin }),
    ]
}

/// Generate a sequence of ledger calls.
pub fn ledger_ops(max: usize) -> impl Strategy<Value = Vec<LedgerOp>> {
    prop::collection::vec(ledger_op(), 0..=max)
}
