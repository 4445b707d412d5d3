//! The access decision state machine.
//!
//! One instance owns the lock state, the liveness progress and every timer.
//! It is driven one perception event at a time and never blocks on anything
//! but a bounded relay write.

use super::state::{AccessStats, DisplayStatus, LockState};
use super::timer::IntervalTimer;
use crate::audit::{AuditSink, EventKind};
use crate::config::AccessConfig;
use crate::error::CoreError;
use crate::liveness::{EyeAspectRatioTracker, LivenessParams, LivenessState};
use crate::notify::{NotificationSink, Prompt};
use crate::perception::{Frame, PerceptionEvent};
use crate::relay::{DoorEvent, RelayChannel, RelayCommand};
use std::time::Instant;

/// Audit subject for unknown-person alerts.
pub const SUBJECT_UNKNOWN: &str = "Unknown";
/// Audit subject for timed relocks and door alerts.
pub const SUBJECT_SYSTEM: &str = "System";
/// Audit subject for operator unlocks and admin locks.
pub const SUBJECT_ADMIN: &str = "Admin";
/// Audit subject for operator locks.
pub const SUBJECT_USER: &str = "User";
/// Name shown while a manual unlock window runs.
pub const MANUAL_DISPLAY_USER: &str = "Admin Override";

/// What is left after the controller stops.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// Counters at the moment of shutdown.
    pub stats: AccessStats,
    /// Relay commands issued during the session, oldest first.
    pub relay_history: Vec<RelayCommand>,
    /// Prompts the notification worker delivered.
    pub prompts_delivered: u64,
    /// State the controller was in when it stopped.
    pub final_state: &'static str,
}

/// Decides when the door opens and makes sure it closes again.
pub struct AccessStateMachine {
    config: AccessConfig,
    tracker: EyeAspectRatioTracker,
    state: LockState,
    intent: IntervalTimer,
    loiter: IntervalTimer,
    countdown: IntervalTimer,
    /// Set once per unknown-person episode.
    alert_fired: bool,
    door_ajar: bool,
    relay: RelayChannel,
    audit: Box<dyn AuditSink>,
    notifier: NotificationSink,
    stats: AccessStats,
}

impl AccessStateMachine {
    /// Creates a machine in `Locked` with fresh liveness.
    pub fn new(
        config: AccessConfig,
        relay: RelayChannel,
        audit: Box<dyn AuditSink>,
        notifier: NotificationSink,
    ) -> Self {
        let tracker = EyeAspectRatioTracker::new(LivenessParams::from(&config));
        Self {
            config,
            tracker,
            state: LockState::default(),
            intent: IntervalTimer::new(),
            loiter: IntervalTimer::new(),
            countdown: IntervalTimer::new(),
            alert_fired: false,
            door_ajar: false,
            relay,
            audit,
            notifier,
            stats: AccessStats::default(),
        }
    }

    /// Announces that the controller is live.
    pub fn start(&mut self) {
        tracing::info!(
            relay = %self.relay.endpoint(),
            mode = ?self.relay.mode(),
            intent_sec = self.config.intent_time_sec,
            countdown_sec = self.config.countdown_seconds,
            "Access controller started"
        );
        self.prompt(Prompt::SystemActivated);
    }

    /// Processes one perception event at the current time.
    pub fn tick(&mut self, event: &PerceptionEvent) -> DisplayStatus {
        self.tick_at(event, Instant::now())
    }

    /// Processes one perception event at `now`.
    pub fn tick_at(&mut self, event: &PerceptionEvent, now: Instant) -> DisplayStatus {
        self.stats.ticks += 1;
        let status = match &self.state {
            LockState::AdminPaused => DisplayStatus::admin(),
            LockState::Unlocking { user, .. } => {
                let user = user.clone();
                self.tick_unlocking(&user, now)
            }
            LockState::Locked(liveness) => {
                let liveness = *liveness;
                self.tick_locked(liveness, event, now)
            }
        };
        self.decorate(status)
    }

    /// Handles a tick with no frame from the camera.
    ///
    /// Liveness and dwell timers are held. The unlock countdown keeps
    /// running, so a dead camera cannot hold the door open.
    pub fn perception_gap(&mut self) -> DisplayStatus {
        self.perception_gap_at(Instant::now())
    }

    /// Handles a missing frame at `now`.
    pub fn perception_gap_at(&mut self, now: Instant) -> DisplayStatus {
        self.stats.perception_gaps += 1;
        let status = match &self.state {
            LockState::AdminPaused => DisplayStatus::admin(),
            LockState::Unlocking { user, .. } => {
                let user = user.clone();
                self.tick_unlocking(&user, now)
            }
            LockState::Locked(_) => DisplayStatus::camera_lost(),
        };
        self.decorate(status)
    }

    /// Opens the door on operator request. Returns false if it was already open.
    pub fn manual_unlock(&mut self) -> bool {
        self.manual_unlock_at(Instant::now())
    }

    /// Manual unlock at `now`.
    pub fn manual_unlock_at(&mut self, now: Instant) -> bool {
        if self.state.is_unlocking() {
            tracing::debug!("Manual unlock ignored, door already unlocked");
            return false;
        }

        tracing::info!(from = self.state.name(), "Manual override, unlocking door");
        self.prompt(Prompt::ManualUnlock);
        self.send_relay(RelayCommand::Unlock);
        self.audit(EventKind::UnlockManual, SUBJECT_ADMIN, None);
        self.stats.unlocks_manual += 1;
        self.enter_unlocking(MANUAL_DISPLAY_USER, now);
        true
    }

    /// Ends the unlock window early. Returns false if the door was not unlocked.
    pub fn manual_lock(&mut self) -> bool {
        if !self.state.is_unlocking() {
            tracing::debug!(state = self.state.name(), "Manual lock ignored, door not unlocked");
            return false;
        }

        tracing::info!("Manual override, locking door");
        self.prompt(Prompt::ManualLock);
        self.send_relay(RelayCommand::Lock);
        self.audit(EventKind::LockManual, SUBJECT_USER, None);
        self.stats.locks_manual += 1;
        self.enter_locked();
        true
    }

    /// Suspends perception while the admin panel is open. Locks first if
    /// the door was unlocked. Returns false if already paused.
    pub fn admin_pause(&mut self) -> bool {
        match self.state {
            LockState::AdminPaused => {
                tracing::debug!("Admin pause ignored, already paused");
                return false;
            }
            LockState::Unlocking { .. } => {
                tracing::info!("Admin panel opened during unlock, locking door");
                self.prompt(Prompt::AdminLock);
                self.send_relay(RelayCommand::Lock);
                self.audit(EventKind::LockManual, SUBJECT_ADMIN, None);
                self.stats.locks_manual += 1;
            }
            LockState::Locked(_) => {}
        }

        self.reset_session();
        self.countdown.reset();
        self.state = LockState::AdminPaused;
        self.prompt(Prompt::AdminOpened);
        tracing::info!("Admin panel opened, perception paused");
        true
    }

    /// Resumes perception. Returns false if not paused.
    pub fn admin_resume(&mut self) -> bool {
        if self.state != LockState::AdminPaused {
            tracing::debug!(state = self.state.name(), "Admin resume ignored, not paused");
            return false;
        }
        self.enter_locked();
        self.prompt(Prompt::AdminClosed);
        tracing::info!("Admin panel closed, perception resumed");
        true
    }

    /// Reacts to a door status line. Never changes the lock state.
    pub fn record_door_event(&mut self, event: DoorEvent) {
        match event {
            DoorEvent::Ajar => {
                tracing::warn!("Door held open too long");
                self.door_ajar = true;
                self.stats.door_ajar_alerts += 1;
                self.prompt(Prompt::DoorAjar);
                self.audit(EventKind::AlertDoorAjar, SUBJECT_SYSTEM, None);
            }
            DoorEvent::Closed => {
                tracing::info!("Door closed");
                self.door_ajar = false;
                self.prompt(Prompt::DoorClosed);
            }
        }
    }

    /// Current lock state.
    pub fn lock_state(&self) -> &LockState {
        &self.state
    }

    /// Session counters so far.
    pub fn stats(&self) -> AccessStats {
        self.stats
    }

    /// Access settings in use.
    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// The relay channel.
    pub fn relay(&self) -> &RelayChannel {
        &self.relay
    }

    /// Relay access for the door sensor poll.
    pub fn relay_mut(&mut self) -> &mut RelayChannel {
        &mut self.relay
    }

    /// Whether the door is reported open past its timeout.
    pub fn door_ajar(&self) -> bool {
        self.door_ajar
    }

    /// Stops the controller: closes the relay with a final lock and drains
    /// pending prompts.
    pub fn shutdown(mut self) -> ShutdownReport {
        if self.state.is_unlocking() {
            tracing::warn!("Shutting down during unlock window, forcing lock");
        } else {
            tracing::info!(state = self.state.name(), "Shutting down access controller");
        }
        self.prompt(Prompt::ShuttingDown);
        self.relay.close();
        let prompts_delivered = self.notifier.shutdown();

        ShutdownReport {
            stats: self.stats,
            relay_history: self.relay.history(),
            prompts_delivered,
            final_state: self.state.name(),
        }
    }

    fn tick_locked(
        &mut self,
        mut liveness: LivenessState,
        event: &PerceptionEvent,
        now: Instant,
    ) -> DisplayStatus {
        if !event.face_present {
            self.reset_session();
            self.state = LockState::Locked(LivenessState::fresh());
            return DisplayStatus::look_at_camera();
        }

        if !liveness.confirmed {
            if let Some(eyes) = &event.eye_landmarks {
                let size = event.frame_size;
                if self.tracker.update(&mut liveness, eyes, size.width, size.height) {
                    self.stats.blinks += 1;
                }
                if liveness.confirmed {
                    self.intent.reset();
                    self.loiter.reset();
                    self.stats.liveness_confirmations += 1;
                    self.prompt(Prompt::LivenessConfirmed);
                    tracing::info!(blinks = liveness.blink_count, "Liveness confirmed");
                }
            }
            self.state = LockState::Locked(liveness);
            return DisplayStatus::liveness_check(
                liveness.blink_count,
                self.tracker.params().required_blinks,
            );
        }

        let threshold = self.config.confidence_threshold;
        match event.identity.as_ref().filter(|m| m.meets(threshold)) {
            Some(known) => {
                self.loiter.reset();
                self.alert_fired = false;
                self.intent.start_if_absent(now);

                if self.intent.elapsed(now) >= self.config.intent_time() {
                    tracing::info!(
                        user = %known.user_id,
                        confidence = known.confidence_pct,
                        "Face recognized, unlocking door"
                    );
                    self.prompt(Prompt::Welcome {
                        user: known.user_id.clone(),
                    });
                    self.send_relay(RelayCommand::Unlock);
                    self.audit(EventKind::UnlockFace, &known.user_id, None);
                    self.stats.unlocks_face += 1;
                    self.enter_unlocking(&known.user_id, now);
                    DisplayStatus::unlocked(&known.user_id, self.config.countdown_seconds)
                } else {
                    DisplayStatus::verifying(&known.user_id, known.confidence_pct)
                }
            }
            None => {
                self.intent.reset();
                self.loiter.start_if_absent(now);

                if !self.alert_fired && self.loiter.elapsed(now) > self.config.loiter_time() {
                    tracing::warn!(
                        loiter_sec = self.loiter.elapsed(now).as_secs_f64(),
                        "Unknown person loitering"
                    );
                    self.prompt(Prompt::UnknownPerson);
                    self.audit(EventKind::AlertUnknown, SUBJECT_UNKNOWN, event.frame.as_ref());
                    self.stats.unknown_alerts += 1;
                    self.alert_fired = true;
                }
                DisplayStatus::unknown(event.identity.as_ref().map(|m| m.confidence_pct))
            }
        }
    }

    fn tick_unlocking(&mut self, user: &str, now: Instant) -> DisplayStatus {
        let elapsed = self.countdown.elapsed(now);
        if elapsed < self.config.countdown() {
            let remaining = self.config.countdown_seconds.saturating_sub(elapsed.as_secs());
            return DisplayStatus::unlocked(user, remaining);
        }

        tracing::info!(user, "Unlock window expired, locking door");
        self.prompt(Prompt::DoorLocked);
        self.send_relay(RelayCommand::Lock);
        self.audit(EventKind::LockAuto, SUBJECT_SYSTEM, None);
        self.stats.locks_auto += 1;
        self.enter_locked();
        DisplayStatus::look_at_camera()
    }

    fn enter_unlocking(&mut self, user: &str, now: Instant) {
        self.reset_session();
        self.countdown.reset();
        self.countdown.start_if_absent(now);
        self.state = LockState::Unlocking {
            user: user.to_string(),
            started_at: now,
        };
    }

    fn enter_locked(&mut self) {
        self.reset_session();
        self.countdown.reset();
        self.state = LockState::Locked(LivenessState::fresh());
    }

    /// Clears dwell timers and the alert flag.
    fn reset_session(&mut self) {
        self.intent.reset();
        self.loiter.reset();
        self.alert_fired = false;
    }

    fn decorate(&self, status: DisplayStatus) -> DisplayStatus {
        if self.door_ajar && !self.state.is_unlocking() {
            status.with_door_ajar()
        } else {
            status
        }
    }

    fn send_relay(&mut self, cmd: RelayCommand) {
        match self.relay.send(cmd) {
            Ok(ack) => tracing::trace!(command = %cmd, ?ack, "Relay command issued"),
            Err(e) => {
                self.stats.relay_errors += 1;
                let err = CoreError::from(e);
                tracing::warn!(command = %cmd, error = %err, "Relay command failed, continuing");
            }
        }
    }

    fn audit(&mut self, kind: EventKind, subject: &str, frame: Option<&Frame>) {
        let result = match frame {
            Some(frame) => self.audit.record_with_snapshot(kind, subject, frame),
            None => self.audit.record(kind, subject),
        };
        if let Err(e) = result {
            self.stats.audit_failures += 1;
            let err = CoreError::from(e);
            tracing::warn!(kind = %kind, subject, error = %err, "Audit write failed, continuing");
        }
    }

    fn prompt(&mut self, prompt: Prompt) {
        if let Err(e) = self.notifier.send(&prompt) {
            self.stats.prompts_rejected += 1;
            tracing::debug!(prompt = %prompt, error = %e, "Prompt not queued");
        }
    }
}
