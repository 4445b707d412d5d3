//! Prometheus metrics exporter for the access controller.
//!
//! Counters mirror the controller's session statistics; gauges mirror the
//! current door state. With the `metrics` feature an HTTP endpoint serves
//! them in Prometheus text format.
//!
//! # Metrics Exposed
//!
//! ## State
//! - `facegate_door_unlocked` - 1 while the unlock window runs
//! - `facegate_admin_paused` - 1 while the admin panel is open
//! - `facegate_relay_virtual` - 1 when no relay hardware is attached
//! - `facegate_door_ajar` - 1 while the controller reports the door open
//!
//! ## Decisions
//! - `facegate_ticks_total` - Perception events processed
//! - `facegate_liveness_confirmed_total` - Blink checks passed
//! - `facegate_unlock_face_total` / `facegate_unlock_manual_total`
//! - `facegate_lock_auto_total` / `facegate_lock_manual_total`
//! - `facegate_alert_unknown_total` / `facegate_alert_door_ajar_total`
//!
//! ## Faults
//! - `facegate_perception_gaps_total`
//! - `facegate_relay_errors_total`
//! - `facegate_audit_failures_total`
//! - `facegate_prompts_rejected_total`
//!
//! # Example
//!
//! ```no_run
//! use facegate::control::AccessStats;
//! use facegate::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     stats: AccessStats { ticks: 300, unlocks_face: 1, ..Default::default() },
//!     unlocked: true,
//!     ..Default::default()
//! };
//!
//! registry.update(&snapshot);
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
