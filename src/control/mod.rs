//! Access decisions and lock control.
//!
//! The [`AccessStateMachine`] turns perception events, door reports and
//! operator commands into relay actions, audit rows and prompts. The
//! [`AccessWorker`] runs it on a dedicated thread.

mod machine;
mod state;
mod timer;
mod worker;

pub use machine::{
    AccessStateMachine, ShutdownReport, MANUAL_DISPLAY_USER, SUBJECT_ADMIN, SUBJECT_SYSTEM,
    SUBJECT_UNKNOWN, SUBJECT_USER,
};
pub use state::{AccessStats, DisplayStatus, LockState, StatusColor};
pub use timer::IntervalTimer;
pub use worker::{
    AccessWorker, CommandError, CommandHandle, ControlCommand, SessionSummary, StatusUpdate,
    StopReason, WorkerHandle,
};
