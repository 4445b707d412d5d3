//! Facegate access controller library
//!
//! Decides when a face-recognition door lock opens and makes sure it closes
//! again. Perception (face detection, eye landmarks, identity matching)
//! happens outside the crate; the controller consumes one
//! [`PerceptionEvent`] per frame and drives a relay, an audit log and a
//! prompt queue.
//!
//! # Architecture
//!
//! ```text
//! perception → liveness → control ─┬→ relay   (serial strike controller)
//!                                  ├→ audit   (CSV log + snapshots)
//!                                  └→ notify  (spoken/printed prompts)
//!                    metrics ← status updates
//! ```
//!
//! # Design Principles
//!
//! - **Fail-secure**: every exit path sends a final lock command
//! - **Liveness before identity**: a face must blink before it is matched
//! - **Never block on side effects**: audit and prompt failures are logged
//!   and counted, the loop keeps running
//!
//! # Example
//!
//! ```no_run
//! use facegate::{
//!     audit::MemoryAuditSink,
//!     config::FileConfig,
//!     control::AccessStateMachine,
//!     notify::NotificationSink,
//!     perception::{FrameSize, PerceptionEvent},
//!     relay::RelayChannel,
//! };
//!
//! let config = FileConfig::default();
//! let relay = RelayChannel::virtual_mode(&config.relay);
//! let mut machine = AccessStateMachine::new(
//!     config.access,
//!     relay,
//!     Box::new(MemoryAuditSink::new()),
//!     NotificationSink::disabled(),
//! );
//!
//! machine.start();
//! let status = machine.tick(&PerceptionEvent::absent(FrameSize::new(640, 480)));
//! println!("{status}");
//! let report = machine.shutdown();
//! assert_eq!(report.final_state, "locked");
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod audit;
pub mod config;
pub mod control;
pub mod error;
pub mod liveness;
pub mod metrics;
pub mod notify;
pub mod perception;
pub mod relay;

// Re-export commonly used types at crate root
pub use audit::{AuditSink, EventKind, EventLog};
pub use config::FileConfig;
pub use control::{
    AccessStateMachine, AccessWorker, CommandHandle, DisplayStatus, LockState, StatusUpdate,
};
pub use error::CoreError;
pub use notify::{NotificationSink, Prompt};
pub use perception::{PerceptionEvent, PerceptionSource};
pub use relay::{RelayChannel, RelayCommand};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
