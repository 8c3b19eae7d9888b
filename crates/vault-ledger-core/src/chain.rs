//! Log head: the tip of the audit hash chain.
//!
//! The head is the only state needed to seal the next record. It advances by
//! exactly one position per appended record.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::{AuditRecord, RecordHeader};
use crate::types::RecordId;

/// Position of the last sealed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogHead {
    /// Sequence number of the last record (0 when the log is empty).
    pub seq: u64,

    /// Id of the last record.
    pub record_id: Option<RecordId>,

    /// Timestamp of the last record (Unix milliseconds).
    pub updated_at: i64,
}

impl LogHead {
    /// Head of an empty log.
    pub const fn genesis() -> Self {
        Self {
            seq: 0,
            record_id: None,
            updated_at: 0,
        }
    }

    /// Head positioned at an existing record.
    pub fn new(seq: u64, record_id: RecordId, updated_at: i64) -> Self {
        Self {
            seq,
            record_id: Some(record_id),
            updated_at,
        }
    }

    /// Head positioned at `record`.
    pub fn at(record: &AuditRecord) -> Self {
        Self::new(record.seq(), record.compute_id(), record.timestamp())
    }

    /// Whether nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.seq == 0
    }

    /// Sequence number the next record must carry.
    pub fn next_seq(&self) -> u64 {
        self.seq + 1
    }

    /// Check that `header` continues this head.
    pub fn check_next(&self, header: &RecordHeader) -> Result<(), ValidationError> {
        let expected = self.next_seq();
        if header.seq != expected {
            return Err(ValidationError::InvalidSequence {
                expected,
                got: header.seq,
            });
        }

        if header.prev_record_id != self.record_id {
            return Err(ValidationError::InvalidPrevRecord {
                seq: header.seq,
                expected: self.record_id,
                got: header.prev_record_id,
            });
        }

        Ok(())
    }

    /// Move the head to `record`, which must continue it.
    pub fn advance(&mut self, record: &AuditRecord) -> Result<RecordId, ValidationError> {
        self.check_next(&record.header)?;
        let id = record.compute_id();
        *self = Self::new(record.seq(), id, record.timestamp());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::event::AuditEvent;
    use crate::record::RecordBuilder;
    use crate::types::{FileId, Identity};

    fn event() -> AuditEvent {
        AuditEvent::FileAccessed {
            file_id: FileId(1),
            file_name: "a.txt".into(),
            actor: Identity::from_bytes([9; 32]),
        }
    }

    #[test]
    fn test_head_advances_one_record_at_a_time() {
        let sealer = Keypair::from_seed(&[1; 32]);
        let mut head = LogHead::genesis();
        assert!(head.is_empty());

        let first = RecordBuilder::new(head.next_seq(), &event())
            .timestamp(10)
            .prev_opt(head.record_id)
            .sign(&sealer);
        let first_id = head.advance(&first).unwrap();

        assert_eq!(head.seq, 1);
        assert_eq!(head.record_id, Some(first_id));
        assert_eq!(head.updated_at, 10);

        let second = RecordBuilder::new(head.next_seq(), &event())
            .timestamp(20)
            .prev_opt(head.record_id)
            .sign(&sealer);
        head.advance(&second).unwrap();
        assert_eq!(head.seq, 2);
    }

    #[test]
    fn test_head_rejects_gap() {
        let sealer = Keypair::from_seed(&[1; 32]);
        let mut head = LogHead::genesis();
        let record = RecordBuilder::new(2, &event()).sign(&sealer);

        let result = head.advance(&record);
        assert!(matches!(
            result,
            Err(ValidationError::InvalidSequence { expected: 1, got: 2 })
        ));
        assert_eq!(head, LogHead::genesis());
    }

    #[test]
    fn test_head_rejects_wrong_link() {
        let sealer = Keypair::from_seed(&[1; 32]);
        let head = LogHead::new(1, RecordId::from_bytes([1; 32]), 0);
        let record = RecordBuilder::new(2, &event())
            .prev(RecordId::from_bytes([2; 32]))
            .sign(&sealer);

        assert!(matches!(
            head.check_next(&record.header),
            Err(ValidationError::InvalidPrevRecord { seq: 2, .. })
        ));
    }
}
