//! Audit trail for security-relevant events.
//!
//! Every unlock, relock and alert becomes one append-only row. Unknown-person
//! alerts also keep an image of the scene. Persistence failures are returned
//! to the caller, which logs them and carries on; the door never waits on
//! the audit log.

mod log;
mod record;

pub use log::{read_log, AuditError, AuditSink, EventLog, MemoryAuditSink};
pub use record::{AuditRecord, EventKind, HEADER, SNAPSHOT_TIMESTAMP_FORMAT, TIMESTAMP_FORMAT};
