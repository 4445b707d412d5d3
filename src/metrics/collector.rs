//! Metrics collection and registry.

use crate::control::{AccessStats, LockState, StatusUpdate};
use crate::relay::DoorEvent;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of controller state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Session counters.
    pub stats: AccessStats,
    /// Whether the door is currently unlocked.
    pub unlocked: bool,
    /// Whether the admin panel has perception paused.
    pub admin_paused: bool,
    /// Whether the relay runs without hardware.
    pub relay_virtual: bool,
    /// Whether the door is reported open past its timeout.
    pub door_ajar: bool,
}

impl MetricsSnapshot {
    /// Creates a snapshot from the worker's latest status.
    pub fn from_status(update: &StatusUpdate, relay_virtual: bool) -> Self {
        Self {
            stats: update.stats,
            unlocked: update.lock_state.is_unlocking(),
            admin_paused: matches!(update.lock_state, LockState::AdminPaused),
            relay_virtual,
            door_ajar: update.door == Some(DoorEvent::Ajar),
        }
    }
}

/// Prometheus metrics registry for the access controller.
pub struct MetricsRegistry {
    registry: Registry,

    // State gauges
    door_unlocked: IntGauge,
    admin_paused: IntGauge,
    relay_virtual: IntGauge,
    door_ajar: IntGauge,

    // Decision counters
    ticks_total: IntCounter,
    liveness_confirmed_total: IntCounter,
    unlock_face_total: IntCounter,
    unlock_manual_total: IntCounter,
    lock_auto_total: IntCounter,
    lock_manual_total: IntCounter,
    alert_unknown_total: IntCounter,
    alert_door_ajar_total: IntCounter,

    // Fault counters
    perception_gaps_total: IntCounter,
    relay_errors_total: IntCounter,
    audit_failures_total: IntCounter,
    prompts_rejected_total: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all access metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let door_unlocked = IntGauge::new(
            "facegate_door_unlocked",
            "Whether the door is unlocked (1=unlocked, 0=locked)",
        )?;
        let admin_paused = IntGauge::new(
            "facegate_admin_paused",
            "Whether perception is paused for the admin panel",
        )?;
        let relay_virtual = IntGauge::new(
            "facegate_relay_virtual",
            "Whether the relay is running without hardware",
        )?;
        let door_ajar = IntGauge::new(
            "facegate_door_ajar",
            "Whether the controller reports the door held open",
        )?;

        let ticks_total = IntCounter::new(
            "facegate_ticks_total",
            "Perception events processed",
        )?;
        let liveness_confirmed_total = IntCounter::new(
            "facegate_liveness_confirmed_total",
            "Faces that passed the blink check",
        )?;
        let unlock_face_total = IntCounter::new(
            "facegate_unlock_face_total",
            "Unlocks by face recognition",
        )?;
        let unlock_manual_total = IntCounter::new(
            "facegate_unlock_manual_total",
            "Unlocks by operator override",
        )?;
        let lock_auto_total = IntCounter::new(
            "facegate_lock_auto_total",
            "Relocks after the unlock countdown",
        )?;
        let lock_manual_total = IntCounter::new(
            "facegate_lock_manual_total",
            "Relocks by operator or admin panel",
        )?;
        let alert_unknown_total = IntCounter::new(
            "facegate_alert_unknown_total",
            "Unknown-person alerts raised",
        )?;
        let alert_door_ajar_total = IntCounter::new(
            "facegate_alert_door_ajar_total",
            "Door-ajar alerts reported by the controller",
        )?;

        let perception_gaps_total = IntCounter::new(
            "facegate_perception_gaps_total",
            "Ticks with no frame from the camera",
        )?;
        let relay_errors_total = IntCounter::new(
            "facegate_relay_errors_total",
            "Relay commands that failed to write",
        )?;
        let audit_failures_total = IntCounter::new(
            "facegate_audit_failures_total",
            "Audit rows or snapshots that failed to persist",
        )?;
        let prompts_rejected_total = IntCounter::new(
            "facegate_prompts_rejected_total",
            "Prompts dropped because the notification queue was full",
        )?;

        // Register all metrics
        registry.register(Box::new(door_unlocked.clone()))?;
        registry.register(Box::new(admin_paused.clone()))?;
        registry.register(Box::new(relay_virtual.clone()))?;
        registry.register(Box::new(door_ajar.clone()))?;
        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(liveness_confirmed_total.clone()))?;
        registry.register(Box::new(unlock_face_total.clone()))?;
        registry.register(Box::new(unlock_manual_total.clone()))?;
        registry.register(Box::new(lock_auto_total.clone()))?;
        registry.register(Box::new(lock_manual_total.clone()))?;
        registry.register(Box::new(alert_unknown_total.clone()))?;
        registry.register(Box::new(alert_door_ajar_total.clone()))?;
        registry.register(Box::new(perception_gaps_total.clone()))?;
        registry.register(Box::new(relay_errors_total.clone()))?;
        registry.register(Box::new(audit_failures_total.clone()))?;
        registry.register(Box::new(prompts_rejected_total.clone()))?;

        Ok(Self {
            registry,
            door_unlocked,
            admin_paused,
            relay_virtual,
            door_ajar,
            ticks_total,
            liveness_confirmed_total,
            unlock_face_total,
            unlock_manual_total,
            lock_auto_total,
            lock_manual_total,
            alert_unknown_total,
            alert_door_ajar_total,
            perception_gaps_total,
            relay_errors_total,
            audit_failures_total,
            prompts_rejected_total,
        })
    }

    /// Updates all metrics from a snapshot of controller state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.door_unlocked.set(i64::from(snapshot.unlocked));
        self.admin_paused.set(i64::from(snapshot.admin_paused));
        self.relay_virtual.set(i64::from(snapshot.relay_virtual));
        self.door_ajar.set(i64::from(snapshot.door_ajar));

        // Stats are cumulative; counters advance by the difference
        let stats = &snapshot.stats;
        advance(&self.ticks_total, stats.ticks);
        advance(&self.liveness_confirmed_total, stats.liveness_confirmations);
        advance(&self.unlock_face_total, stats.unlocks_face);
        advance(&self.unlock_manual_total, stats.unlocks_manual);
        advance(&self.lock_auto_total, stats.locks_auto);
        advance(&self.lock_manual_total, stats.locks_manual);
        advance(&self.alert_unknown_total, stats.unknown_alerts);
        advance(&self.alert_door_ajar_total, stats.door_ajar_alerts);
        advance(&self.perception_gaps_total, stats.perception_gaps);
        advance(&self.relay_errors_total, stats.relay_errors);
        advance(&self.audit_failures_total, stats.audit_failures);
        advance(&self.prompts_rejected_total, stats.prompts_rejected);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}
