//! Audit events: the four actions the ledger records.
//!
//! An event says who did what to which file. When it is appended to the log
//! it is sealed into an [`AuditRecord`](crate::record::AuditRecord), which
//! adds the sequence number, timestamp and hash-chain link.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{canonical_event_bytes, decode_event};
use crate::error::CoreError;
use crate::types::{FileId, Identity};

/// Discriminator stored in a record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventKind {
    // Access kinds (0x0000 - 0x00FF)
    /// A file's locator was retrieved.
    FileAccessed = 0x0001,
    /// An item inside a container file was viewed.
    SubFileAccessed = 0x0002,

    // Permission kinds (0x0100 - 0x01FF)
    /// Read access to a file was granted.
    AccessGranted = 0x0100,

    // Administrative kinds (0x0200 - 0x02FF)
    /// The administrator role moved to a new identity.
    OwnershipTransferred = 0x0200,
}

impl EventKind {
    /// All kinds, in discriminant order.
    pub const ALL: [EventKind; 4] = [
        EventKind::FileAccessed,
        EventKind::SubFileAccessed,
        EventKind::AccessGranted,
        EventKind::OwnershipTransferred,
    ];

    /// Convert to u16 for serialization.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Try to parse from u16.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::FileAccessed),
            0x0002 => Some(Self::SubFileAccessed),
            0x0100 => Some(Self::AccessGranted),
            0x0200 => Some(Self::OwnershipTransferred),
            _ => None,
        }
    }

    /// Check if this is an access kind.
    pub fn is_access(self) -> bool {
        (self.to_u16() & 0xFF00) == 0x0000
    }

    /// Check if this is a permission kind.
    pub fn is_permission(self) -> bool {
        (self.to_u16() & 0xFF00) == 0x0100
    }

    /// Check if this is an administrative kind.
    pub fn is_administrative(self) -> bool {
        (self.to_u16() & 0xFF00) == 0x0200
    }

    /// Stable name used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::FileAccessed => "file_accessed",
            EventKind::SubFileAccessed => "sub_file_accessed",
            EventKind::AccessGranted => "access_granted",
            EventKind::OwnershipTransferred => "ownership_transferred",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An auditable action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEvent {
    /// `actor` retrieved the locator of `file_id`.
    FileAccessed {
        file_id: FileId,
        file_name: String,
        actor: Identity,
    },

    /// `actor` viewed `sub_name` inside the container `file_id`.
    SubFileAccessed {
        file_id: FileId,
        sub_name: String,
        actor: Identity,
    },

    /// `actor` granted `grantee` read access to `file_id`.
    AccessGranted {
        file_id: FileId,
        grantee: Identity,
        actor: Identity,
    },

    /// The administrator role moved from `previous` to `new`.
    OwnershipTransferred { previous: Identity, new: Identity },
}

impl AuditEvent {
    /// The kind written into the record header.
    pub fn kind(&self) -> EventKind {
        match self {
            AuditEvent::FileAccessed { .. } => EventKind::FileAccessed,
            AuditEvent::SubFileAccessed { .. } => EventKind::SubFileAccessed,
            AuditEvent::AccessGranted { .. } => EventKind::AccessGranted,
            AuditEvent::OwnershipTransferred { .. } => EventKind::OwnershipTransferred,
        }
    }

    /// The file this event is about. Ownership transfers are process-wide
    /// and have no file subject.
    pub fn subject(&self) -> Option<FileId> {
        match self {
            AuditEvent::FileAccessed { file_id, .. }
            | AuditEvent::SubFileAccessed { file_id, .. }
            | AuditEvent::AccessGranted { file_id, .. } => Some(*file_id),
            AuditEvent::OwnershipTransferred { .. } => None,
        }
    }

    /// The identity that performed the action.
    ///
    /// For an ownership transfer this is the outgoing administrator.
    pub fn actor(&self) -> Identity {
        match self {
            AuditEvent::FileAccessed { actor, .. }
            | AuditEvent::SubFileAccessed { actor, .. }
            | AuditEvent::AccessGranted { actor, .. } => *actor,
            AuditEvent::OwnershipTransferred { previous, .. } => *previous,
        }
    }

    /// Canonical payload bytes.
    pub fn to_payload(&self) -> Vec<u8> {
        canonical_event_bytes(self)
    }

    /// Decode a payload written by [`AuditEvent::to_payload`].
    pub fn from_payload(kind: EventKind, payload: &[u8]) -> Result<Self, CoreError> {
        decode_event(kind, payload)
    }
}
