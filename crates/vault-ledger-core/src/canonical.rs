//! Canonical CBOR encoding for deterministic serialization.
//!
//! Implements RFC 8949 Core Deterministic Encoding for the subset of CBOR the
//! ledger produces:
//! - Map keys are small integers, sorted by encoded byte comparison
//! - Integers use the smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! The same record always produces the same bytes, and so the same id, on
//! every platform. Decoding re-encodes what it parsed and rejects input that
//! is not byte-for-byte canonical.

use ciborium::value::Value;

use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, SEAL_DOMAIN};
use crate::error::CoreError;
use crate::event::{AuditEvent, EventKind};
use crate::record::{AuditRecord, RecordHeader};
use crate::types::{FileId, Identity, RecordId};

const SIGNATURE_LEN: usize = 64;

/// Header field keys.
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const SEQ: u64 = 1;
    pub const TIMESTAMP: u64 = 2;
    pub const KIND: u64 = 3;
    pub const PREV_RECORD_ID: u64 = 4;
    pub const PAYLOAD_HASH: u64 = 5;
    pub const SEALER: u64 = 6;
}

/// Event payload field keys.
mod event_keys {
    pub const FILE_ID: u64 = 0;
    pub const ACTOR: u64 = 1;
    pub const NAME: u64 = 2;
    pub const GRANTEE: u64 = 3;
    pub const PREVIOUS: u64 = 4;
    pub const NEW: u64 = 5;
}

/// Encode a record header to canonical CBOR bytes.
pub fn canonical_header_bytes(header: &RecordHeader) -> Vec<u8> {
    encode_cbor_value_canonical(&header_to_cbor_value(header))
}

/// Encode an entire record to canonical bytes.
///
/// Format: canonical_header || payload || signature
pub fn canonical_bytes(record: &AuditRecord) -> Vec<u8> {
    let mut buf = canonical_header_bytes(&record.header);
    buf.extend_from_slice(&record.payload);
    buf.extend_from_slice(&record.signature.0);
    buf
}

/// Construct the sealed message for a record.
pub fn signed_message(record: &AuditRecord) -> Vec<u8> {
    signed_message_from_parts(&record.header, &record.payload)
}

/// Construct the sealed message from header and payload.
///
/// Format: seal domain || canonical_header || payload
pub fn signed_message_from_parts(header: &RecordHeader, payload: &[u8]) -> Vec<u8> {
    let mut buf = SEAL_DOMAIN.to_vec();
    buf.extend_from_slice(&canonical_header_bytes(header));
    buf.extend_from_slice(payload);
    buf
}

/// Encode an event payload to canonical CBOR bytes.
pub fn canonical_event_bytes(event: &AuditEvent) -> Vec<u8> {
    encode_cbor_value_canonical(&event_to_cbor_value(event))
}

fn uint_key(key: u64) -> Value {
    Value::Integer(key.into())
}

fn header_to_cbor_value(header: &RecordHeader) -> Value {
    let prev = match &header.prev_record_id {
        Some(id) => Value::Bytes(id.0.to_vec()),
        None => Value::Null,
    };

    Value::Map(vec![
        (uint_key(keys::VERSION), Value::Integer(header.version.into())),
        (uint_key(keys::SEQ), Value::Integer(header.seq.into())),
        (uint_key(keys::TIMESTAMP), Value::Integer(header.timestamp.into())),
        (uint_key(keys::KIND), Value::Integer(header.kind.to_u16().into())),
        (uint_key(keys::PREV_RECORD_ID), prev),
        (uint_key(keys::PAYLOAD_HASH), Value::Bytes(header.payload_hash.0.to_vec())),
        (uint_key(keys::SEALER), Value::Bytes(header.sealer.0.to_vec())),
    ])
}

fn event_to_cbor_value(event: &AuditEvent) -> Value {
    let entries = match event {
        AuditEvent::FileAccessed {
            file_id,
            file_name,
            actor,
        } => vec![
            (uint_key(event_keys::FILE_ID), Value::Integer(file_id.0.into())),
            (uint_key(event_keys::ACTOR), Value::Bytes(actor.0.to_vec())),
            (uint_key(event_keys::NAME), Value::Text(file_name.clone())),
        ],
        AuditEvent::SubFileAccessed {
            file_id,
            sub_name,
            actor,
        } => vec![
            (uint_key(event_keys::FILE_ID), Value::Integer(file_id.0.into())),
            (uint_key(event_keys::ACTOR), Value::Bytes(actor.0.to_vec())),
            (uint_key(event_keys::NAME), Value::Text(sub_name.clone())),
        ],
        AuditEvent::AccessGranted {
            file_id,
            grantee,
            actor,
        } => vec![
            (uint_key(event_keys::FILE_ID), Value::Integer(file_id.0.into())),
            (uint_key(event_keys::ACTOR), Value::Bytes(actor.0.to_vec())),
            (uint_key(event_keys::GRANTEE), Value::Bytes(grantee.0.to_vec())),
        ],
        AuditEvent::OwnershipTransferred { previous, new } => vec![
            (uint_key(event_keys::PREVIOUS), Value::Bytes(previous.0.to_vec())),
            (uint_key(event_keys::NEW), Value::Bytes(new.0.to_vec())),
        ],
    };
    Value::Map(entries)
}

fn encode_cbor_value_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Recursively encode a CBOR value.
///
/// Only the value shapes built in this module reach the encoder.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        _ => unreachable!("record encoder only builds integer, bytes, text, map and null values"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n = i128::from(i);
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map with keys sorted by their encoded bytes (major type 5).
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

/// Decode a record from canonical bytes.
pub fn decode_record(bytes: &[u8]) -> Result<AuditRecord, CoreError> {
    if bytes.len() < SIGNATURE_LEN {
        return Err(CoreError::MalformedRecord("too short".into()));
    }

    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    let header = cbor_value_to_header(&value)?;

    let header_bytes = canonical_header_bytes(&header);
    if !bytes.starts_with(&header_bytes) {
        return Err(CoreError::MalformedRecord("header is not canonical".into()));
    }

    let remaining = &bytes[header_bytes.len()..];
    if remaining.len() < SIGNATURE_LEN {
        return Err(CoreError::MalformedRecord(
            "insufficient bytes for signature".into(),
        ));
    }

    let payload_len = remaining.len() - SIGNATURE_LEN;
    let sig_bytes: [u8; 64] = remaining[payload_len..]
        .try_into()
        .map_err(|_| CoreError::MalformedRecord("invalid signature length".into()))?;

    Ok(AuditRecord {
        header,
        payload: remaining[..payload_len].to_vec().into(),
        signature: Ed25519Signature(sig_bytes),
    })
}

/// Decode an event payload of the given kind.
pub fn decode_event(kind: EventKind, payload: &[u8]) -> Result<AuditEvent, CoreError> {
    let value: Value =
        ciborium::from_reader(payload).map_err(|e| CoreError::MalformedEvent(e.to_string()))?;
    let map = as_map(&value).map_err(|_| CoreError::MalformedEvent("expected map".into()))?;

    let field = |key: u64, name: &str| {
        map_get(map, key).ok_or_else(|| CoreError::MalformedEvent(format!("missing {}", name)))
    };

    let event = match kind {
        EventKind::FileAccessed => AuditEvent::FileAccessed {
            file_id: FileId(as_uint(field(event_keys::FILE_ID, "file_id")?, "file_id")?),
            file_name: as_text(field(event_keys::NAME, "file_name")?, "file_name")?,
            actor: Identity(as_bytes32(field(event_keys::ACTOR, "actor")?, "actor")?),
        },
        EventKind::SubFileAccessed => AuditEvent::SubFileAccessed {
            file_id: FileId(as_uint(field(event_keys::FILE_ID, "file_id")?, "file_id")?),
            sub_name: as_text(field(event_keys::NAME, "sub_name")?, "sub_name")?,
            actor: Identity(as_bytes32(field(event_keys::ACTOR, "actor")?, "actor")?),
        },
        EventKind::AccessGranted => AuditEvent::AccessGranted {
            file_id: FileId(as_uint(field(event_keys::FILE_ID, "file_id")?, "file_id")?),
            grantee: Identity(as_bytes32(field(event_keys::GRANTEE, "grantee")?, "grantee")?),
            actor: Identity(as_bytes32(field(event_keys::ACTOR, "actor")?, "actor")?),
        },
        EventKind::OwnershipTransferred => AuditEvent::OwnershipTransferred {
            previous: Identity(as_bytes32(field(event_keys::PREVIOUS, "previous")?, "previous")?),
            new: Identity(as_bytes32(field(event_keys::NEW, "new")?, "new")?),
        },
    };

    if canonical_event_bytes(&event) != payload {
        return Err(CoreError::MalformedEvent(
            "payload is not canonical for its kind".into(),
        ));
    }

    Ok(event)
}

fn cbor_value_to_header(value: &Value) -> Result<RecordHeader, CoreError> {
    let map = as_map(value)?;
    let field = |key: u64, name: &str| {
        map_get(map, key).ok_or_else(|| CoreError::MalformedRecord(format!("missing {}", name)))
    };

    let version = u8::try_from(as_uint(field(keys::VERSION, "version")?, "version")?)
        .map_err(|_| CoreError::MalformedRecord("version out of range".into()))?;
    let seq = as_uint(field(keys::SEQ, "seq")?, "seq")?;
    let timestamp = as_int(field(keys::TIMESTAMP, "timestamp")?, "timestamp")?;

    let kind_raw = u16::try_from(as_uint(field(keys::KIND, "kind")?, "kind")?)
        .map_err(|_| CoreError::MalformedRecord("kind out of range".into()))?;
    let kind = EventKind::from_u16(kind_raw).ok_or(CoreError::UnknownEventKind(kind_raw))?;

    let prev_record_id = match field(keys::PREV_RECORD_ID, "prev_record_id")? {
        Value::Null => None,
        other => Some(RecordId(as_bytes32(other, "prev_record_id")?)),
    };

    let payload_hash = Blake3Hash(as_bytes32(
        field(keys::PAYLOAD_HASH, "payload_hash")?,
        "payload_hash",
    )?);
    let sealer = Ed25519PublicKey(as_bytes32(field(keys::SEALER, "sealer")?, "sealer")?);

    Ok(RecordHeader {
        version,
        seq,
        timestamp,
        kind,
        prev_record_id,
        payload_hash,
        sealer,
    })
}

fn as_map(value: &Value) -> Result<&[(Value, Value)], CoreError> {
    match value {
        Value::Map(m) => Ok(m),
        _ => Err(CoreError::MalformedRecord("expected map".into())),
    }
}

fn map_get(map: &[(Value, Value)], key: u64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
        .map(|(_, v)| v)
}

fn as_uint(value: &Value, name: &str) -> Result<u64, CoreError> {
    match value {
        Value::Integer(i) => u64::try_from(i128::from(*i))
            .map_err(|_| CoreError::MalformedRecord(format!("{} out of range", name))),
        _ => Err(CoreError::MalformedRecord(format!("invalid {}", name))),
    }
}

fn as_int(value: &Value, name: &str) -> Result<i64, CoreError> {
    match value {
        Value::Integer(i) => i64::try_from(i128::from(*i))
            .map_err(|_| CoreError::MalformedRecord(format!("{} out of range", name))),
        _ => Err(CoreError::MalformedRecord(format!("invalid {}", name))),
    }
}

fn as_bytes32(value: &Value, name: &str) -> Result<[u8; 32], CoreError> {
    match value {
        Value::Bytes(b) => b
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::MalformedRecord(format!("{} must be 32 bytes", name))),
        _ => Err(CoreError::MalformedRecord(format!("invalid {}", name))),
    }
}

fn as_text(value: &Value, name: &str) -> Result<String, CoreError> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        _ => Err(CoreError::MalformedEvent(format!("invalid {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::record::RecordBuilder;

    fn sample_record() -> AuditRecord {
        let sealer = Keypair::from_seed(&[0x42; 32]);
        let event = AuditEvent::AccessGranted {
            file_id: FileId(300),
            grantee: Identity::from_bytes([0xb0; 32]),
            actor: Identity::from_bytes([0xa0; 32]),
        };
        RecordBuilder::new(3, &event)
            .timestamp(1_736_870_400_000)
            .prev(RecordId::from_bytes([0x11; 32]))
            .sign(&sealer)
    }

    #[test]
    fn test_canonical_encoding_deterministic() {
        let record = sample_record();
        assert_eq!(canonical_bytes(&record), canonical_bytes(&record));
    }

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();

        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_integer(&mut buf, (-1i64).into());
        assert_eq!(buf, vec![0x20]);
    }

    #[test]
    fn test_record_decodes_from_canonical_bytes() {
        let record = sample_record();
        let decoded = decode_record(&canonical_bytes(&record)).unwrap();

        assert_eq!(decoded, record);
        assert_eq!(decoded.compute_id(), record.compute_id());
        assert_eq!(decoded.event().unwrap(), record.event().unwrap());
    }

    #[test]
    fn test_genesis_header_encodes_null_prev() {
        let sealer = Keypair::from_seed(&[0x42; 32]);
        let event = AuditEvent::OwnershipTransferred {
            previous: Identity::from_bytes([1; 32]),
            new: Identity::from_bytes([2; 32]),
        };
        let record = RecordBuilder::new(1, &event).timestamp(5).sign(&sealer);

        let decoded = decode_record(&canonical_bytes(&record)).unwrap();
        assert_eq!(decoded.header.prev_record_id, None);
    }

    #[test]
    fn test_truncated_record_rejected() {
        let bytes = canonical_bytes(&sample_record());
        assert!(decode_record(&bytes[..40]).is_err());
    }

    #[test]
    fn test_event_payload_with_foreign_kind_rejected() {
        let record = sample_record();
        // An AccessGranted payload has no name field.
        let result = decode_event(EventKind::FileAccessed, &record.payload);
        assert!(matches!(result, Err(CoreError::MalformedEvent(_))));
    }

    #[test]
    fn test_map_key_ordering() {
        let mut buf = Vec::new();
        let entries = vec![
            (Value::Integer(5.into()), Value::Integer(50.into())),
            (Value::Integer(0.into()), Value::Integer(0.into())),
        ];
        encode_map_canonical(&mut buf, &entries);

        assert_eq!(buf, vec![0xa2, 0x00, 0x00, 0x05, 0x18, 50]);
    }
}
