//! Golden test vectors.
//!
//! Each vector pins the event payload, the header bytes that precede the
//! payload hash, and the sealer key derived from a fixed seed. A change to any
//! of them changes every record id in every existing log, so these must only
//! move together with a version bump.

use serde::{Deserialize, Serialize};

use vault_ledger_core::{
    canonical_bytes, canonical_header_bytes, decode_record, validate_record, AuditEvent,
    AuditRecord, Blake3Hash, FileId, Identity, Keypair, RecordBuilder, RecordId,
};

/// A golden test vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenVector {
    pub name: String,
    pub description: String,
    pub sealer_seed: [u8; 32],
    pub seq: u64,
    pub timestamp: i64,
    pub prev: Option<RecordId>,
    pub event: AuditEvent,
    /// Hex of the sealer public key.
    pub expected_sealer: String,
    /// Hex of the canonical event payload.
    pub expected_payload: String,
    /// Hex of the canonical header up to and including the payload hash's
    /// byte-string prefix.
    pub expected_header_prefix: String,
}

const BB: Identity = Identity([0xbb; 32]);
const AA: Identity = Identity([0xaa; 32]);
const CC: Identity = Identity([0xcc; 32]);

const SEALER_42: &str = "2152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12";
const SEALER_01: &str = "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c";

const GENESIS_PREFIX: &str = "a700000101021b00000194658b1000030104f6055820";

/// Every golden vector.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "file_accessed_genesis".into(),
            description: "First record of a log: a locator retrieval with no predecessor".into(),
            sealer_seed: [0x42; 32],
            seq: 1,
            timestamp: 1_736_870_400_000,
            prev: None,
            event: AuditEvent::FileAccessed {
                file_id: FileId(1),
                file_name: "report.pdf".into(),
                actor: BB,
            },
            expected_sealer: SEALER_42.into(),
            expected_payload: "a30001015820bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\
                               026a7265706f72742e706466"
                .into(),
            expected_header_prefix: GENESIS_PREFIX.into(),
        },
        GoldenVector {
            name: "sub_file_accessed".into(),
            description: "Sub-item view linked to a predecessor".into(),
            sealer_seed: [0x42; 32],
            seq: 2,
            timestamp: 1_736_870_401_000,
            prev: Some(RecordId([0x11; 32])),
            event: AuditEvent::SubFileAccessed {
                file_id: FileId(1),
                sub_name: "appendix.docx".into(),
                actor: BB,
            },
            expected_sealer: SEALER_42.into(),
            expected_payload: "a30001015820bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\
                               026d617070656e6469782e646f6378"
                .into(),
            expected_header_prefix: "a700000102021b00000194658b13e8030204582011111111111111111111\
                                     11111111111111111111111111111111111111111111055820"
                .into(),
        },
        GoldenVector {
            name: "access_granted".into(),
            description: "Grant with a file id that needs a two-byte integer".into(),
            sealer_seed: [0x42; 32],
            seq: 7,
            timestamp: 1_736_870_400_000,
            prev: Some(RecordId([0x22; 32])),
            event: AuditEvent::AccessGranted {
                file_id: FileId(300),
                grantee: BB,
                actor: AA,
            },
            expected_sealer: SEALER_42.into(),
            expected_payload: "a30019012c015820aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
                               035820bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
                .into(),
            expected_header_prefix: "a700000107021b00000194658b1000031901000458202222222222222222\
                                     222222222222222222222222222222222222222222222222055820"
                .into(),
        },
        GoldenVector {
            name: "ownership_transferred".into(),
            description: "Administrator change sealed by a different key at time zero".into(),
            sealer_seed: [0x01; 32],
            seq: 3,
            timestamp: 0,
            prev: Some(RecordId([0x33; 32])),
            event: AuditEvent::OwnershipTransferred {
                previous: AA,
                new: CC,
            },
            expected_sealer: SEALER_01.into(),
            expected_payload: "a2045820aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
                               055820cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc"
                .into(),
            expected_header_prefix: "a700000103020003190200045820333333333333333333333333333333333\
                                     3333333333333333333333333333333055820"
                .into(),
        },
        GoldenVector {
            name: "max_file_id_empty_name".into(),
            description: "Largest file id with an empty display name".into(),
            sealer_seed: [0x42; 32],
            seq: 1,
            timestamp: 1_736_870_400_000,
            prev: None,
            event: AuditEvent::FileAccessed {
                file_id: FileId(u64::MAX),
                file_name: String::new(),
                actor: BB,
            },
            expected_sealer: SEALER_42.into(),
            expected_payload: "a3001bffffffffffffffff015820bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\
                               0260"
                .into(),
            expected_header_prefix: GENESIS_PREFIX.into(),
        },
    ]
}

/// Build and seal the record a vector describes.
pub fn generate_record_from_vector(vector: &GoldenVector) -> AuditRecord {
    let sealer = Keypair::from_seed(&vector.sealer_seed);
    RecordBuilder::new(vector.seq, &vector.event)
        .timestamp(vector.timestamp)
        .prev_opt(vector.prev)
        .sign(&sealer)
}

/// Check one vector against the current encoder.
pub fn verify_vector(vector: &GoldenVector) -> Result<AuditRecord, String> {
    let record = generate_record_from_vector(vector);
    let fail = |what: &str, expected: &str, actual: &str| {
        Err(format!(
            "{}: {} mismatch\n  expected: {}\n  actual:   {}",
            vector.name, what, expected, actual
        ))
    };

    let sealer = record.sealer().to_hex();
    if sealer != vector.expected_sealer {
        return fail("sealer", &vector.expected_sealer, &sealer);
    }

    let payload = hex::encode(&record.payload);
    if payload != vector.expected_payload {
        return fail("payload", &vector.expected_payload, &payload);
    }

    let prefix = hex::decode(&vector.expected_header_prefix)
        .map_err(|e| format!("{}: bad prefix hex: {}", vector.name, e))?;
    let header = canonical_header_bytes(&record.header);
    if !header.starts_with(&prefix) {
        let actual = hex::encode(&header[..prefix.len().min(header.len())]);
        return fail("header prefix", &vector.expected_header_prefix, &actual);
    }

    // payload hash (32), sealer key (0x06 0x58 0x20, 32)
    let mut tail = Blake3Hash::hash(&record.payload).as_bytes().to_vec();
    tail.extend_from_slice(&[0x06, 0x58, 0x20]);
    tail.extend_from_slice(record.sealer().as_bytes());
    if header[prefix.len()..] != tail[..] {
        return fail(
            "header tail",
            &hex::encode(&tail),
            &hex::encode(&header[prefix.len()..]),
        );
    }

    validate_record(&record).map_err(|e| format!("{}: {}", vector.name, e))?;

    let decoded = decode_record(&canonical_bytes(&record))
        .map_err(|e| format!("{}: decode failed: {}", vector.name, e))?;
    if decoded.compute_id() != record.compute_id() {
        return Err(format!("{}: decoded record has a different id", vector.name));
    }

    let again = generate_record_from_vector(vector);
    if again.compute_id() != record.compute_id() {
        return Err(format!("{}: record id is not deterministic", vector.name));
    }

    Ok(record)
}

/// Check every vector, stopping at the first failure.
pub fn verify_all_vectors() -> Result<(), String> {
    for vector in all_vectors() {
        verify_vector(&vector)?;
    }
    Ok(())
}
