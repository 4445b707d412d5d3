//! Audit record types.

use chrono::NaiveDateTime;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Timestamp layout of the `Timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp layout used in snapshot file names.
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Column names of the access log.
pub const HEADER: [&str; 3] = ["Timestamp", "Event_Type", "User"];

/// Security-relevant events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A recognized user was let in.
    UnlockFace,
    /// An operator opened the door.
    UnlockManual,
    /// The unlock window expired.
    LockAuto,
    /// An operator closed the unlock window.
    LockManual,
    /// Someone unrecognized lingered in view.
    AlertUnknown,
    /// The controller reported the door held open.
    AlertDoorAjar,
}

impl EventKind {
    /// All kinds, in log-column spelling order.
    pub const ALL: [EventKind; 6] = [
        EventKind::UnlockFace,
        EventKind::UnlockManual,
        EventKind::LockAuto,
        EventKind::LockManual,
        EventKind::AlertUnknown,
        EventKind::AlertDoorAjar,
    ];

    /// Spelling used in the log.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::UnlockFace => "UNLOCK_FACE",
            EventKind::UnlockManual => "UNLOCK_MANUAL",
            EventKind::LockAuto => "LOCK_AUTO",
            EventKind::LockManual => "LOCK_MANUAL",
            EventKind::AlertUnknown => "ALERT_UNKNOWN",
            EventKind::AlertDoorAjar => "ALERT_DOOR_AJAR",
        }
    }

    /// Whether this kind carries an image of the scene.
    pub fn takes_snapshot(self) -> bool {
        self == EventKind::AlertUnknown
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event kind `{s}`"))
    }
}

/// One row of the audit trail. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Local time the event was recorded.
    pub timestamp: NaiveDateTime,
    /// Event type.
    pub kind: EventKind,
    /// User name, or `Unknown`/`System`/`Admin`/`User`.
    pub subject: String,
    /// Where the scene snapshot was written, if one was taken.
    pub snapshot: Option<PathBuf>,
}

impl AuditRecord {
    /// Creates a record without a snapshot.
    pub fn new(timestamp: NaiveDateTime, kind: EventKind, subject: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind,
            subject: subject.into(),
            snapshot: None,
        }
    }

    /// Formatted `Timestamp` column.
    pub fn timestamp_column(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Snapshot file name: `ALERT_{subject}_{YYYYMMDD_HHMMSS}.{ext}`.
    ///
    /// Characters outside `[A-Za-z0-9_-]` in the subject become `_`.
    pub fn snapshot_file_name(&self, extension: &str) -> String {
        let subject: String = self
            .subject
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!(
            "ALERT_{}_{}.{}",
            subject,
            self.timestamp.format(SNAPSHOT_TIMESTAMP_FORMAT),
            extension
        )
    }
}
