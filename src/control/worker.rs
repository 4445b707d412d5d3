//! The perception loop thread.
//!
//! The worker is the only code that touches the state machine once the
//! session starts. Other threads talk to it through a bounded command
//! queue and watch its output through a latest-value status channel.

use super::machine::{AccessStateMachine, ShutdownReport};
use super::state::{AccessStats, DisplayStatus, LockState};
use crate::config::WorkerConfig;
use crate::error::CoreError;
use crate::perception::{Frame, PerceptionEvent, PerceptionSource};
use crate::relay::{DoorEvent, DoorSensorMonitor};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Operator commands for the running controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Open the door now.
    ManualUnlock,
    /// End the unlock window.
    ManualLock,
    /// Lock and ignore perception.
    AdminPause,
    /// Resume perception.
    AdminResume,
    /// Stop the loop and lock.
    Shutdown,
}

/// Errors returned to command senders.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The queue is full; try again.
    #[error("command queue full")]
    Full,
    /// The worker is gone.
    #[error("access worker has stopped")]
    Stopped,
}

/// Cloneable sender for [`ControlCommand`]s.
#[derive(Debug, Clone)]
pub struct CommandHandle {
    sender: mpsc::Sender<ControlCommand>,
}

impl CommandHandle {
    /// Queues a command without blocking.
    pub fn send(&self, command: ControlCommand) -> Result<(), CommandError> {
        self.sender.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => CommandError::Full,
            mpsc::error::TrySendError::Closed(_) => CommandError::Stopped,
        })
    }

    /// Queues a manual unlock.
    pub fn manual_unlock(&self) -> Result<(), CommandError> {
        self.send(ControlCommand::ManualUnlock)
    }

    /// Queues a manual lock.
    pub fn manual_lock(&self) -> Result<(), CommandError> {
        self.send(ControlCommand::ManualLock)
    }

    /// Queues an admin pause.
    pub fn admin_pause(&self) -> Result<(), CommandError> {
        self.send(ControlCommand::AdminPause)
    }

    /// Queues an admin resume.
    pub fn admin_resume(&self) -> Result<(), CommandError> {
        self.send(ControlCommand::AdminResume)
    }

    /// Asks the worker to stop; it locks before exiting.
    pub fn shutdown(&self) -> Result<(), CommandError> {
        self.send(ControlCommand::Shutdown)
    }
}

/// Latest controller output for the presentation layer.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    /// What the screen should show.
    pub status: DisplayStatus,
    /// Frame with eye landmarks drawn while liveness is being checked.
    pub frame: Option<Frame>,
    /// Session counters.
    pub stats: AccessStats,
    /// Current lock state.
    pub lock_state: LockState,
    /// Most recent door report from the controller.
    pub door: Option<DoorEvent>,
    /// False once the worker has shut down.
    pub running: bool,
}

impl StatusUpdate {
    fn initial() -> Self {
        Self {
            status: DisplayStatus::look_at_camera(),
            frame: None,
            stats: AccessStats::default(),
            lock_state: LockState::default(),
            door: None,
            running: true,
        }
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A shutdown command arrived.
    Shutdown,
    /// The perception source ran out of frames.
    SourceEnded,
}

/// Result of one worker session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Why the loop ended.
    pub reason: StopReason,
    /// Perception events consumed.
    pub frames: u64,
    /// Relay history and final counters.
    pub report: ShutdownReport,
}

/// Owns the state machine and its perception source for one session.
pub struct AccessWorker<S> {
    machine: AccessStateMachine,
    source: S,
    monitor: DoorSensorMonitor,
    commands: mpsc::Receiver<ControlCommand>,
    status: watch::Sender<StatusUpdate>,
    frame_interval: Duration,
    gap_backoff: Duration,
    frames: u64,
}

impl<S: PerceptionSource> AccessWorker<S> {
    /// Wires up a worker with its command and status channels.
    pub fn new(
        machine: AccessStateMachine,
        source: S,
        config: &WorkerConfig,
    ) -> (Self, CommandHandle, watch::Receiver<StatusUpdate>) {
        let (sender, commands) = mpsc::channel(config.command_capacity.max(1));
        let (status, status_rx) = watch::channel(StatusUpdate::initial());

        let worker = Self {
            machine,
            source,
            monitor: DoorSensorMonitor::new(),
            commands,
            status,
            frame_interval: Duration::from_millis(config.frame_interval_ms),
            gap_backoff: Duration::from_millis(config.gap_backoff_ms),
            frames: 0,
        };
        (worker, CommandHandle { sender }, status_rx)
    }

    /// Runs the loop on the current thread until shutdown or end of input.
    pub fn run(mut self) -> SessionSummary {
        self.machine.start();

        let reason = loop {
            if let Some(reason) = self.drain_commands() {
                break reason;
            }

            while let Some(door) = self.monitor.poll(self.machine.relay_mut()) {
                self.machine.record_door_event(door);
            }

            match self.source.next_event() {
                Ok(Some(mut event)) => {
                    self.frames += 1;
                    let checking = event.face_present
                        && matches!(self.machine.lock_state(), LockState::Locked(l) if !l.confirmed);

                    let status = self.machine.tick(&event);
                    let frame = if checking {
                        annotate(&mut event)
                    } else {
                        event.frame.take()
                    };
                    self.publish(status, frame);
                    pause(self.frame_interval);
                }
                Ok(None) => {
                    tracing::info!(frames = self.frames, "Perception source finished");
                    break StopReason::SourceEnded;
                }
                Err(e) => {
                    let err = CoreError::from(e);
                    tracing::warn!(error = %err, "No frame from camera");
                    let status = self.machine.perception_gap();
                    self.publish(status, None);
                    pause(self.gap_backoff);
                }
            }
        };

        let report = self.machine.shutdown();
        tracing::info!(
            ?reason,
            frames = self.frames,
            unlocks = report.stats.unlocks(),
            alerts = report.stats.unknown_alerts,
            "Access worker stopped"
        );

        let summary = SessionSummary {
            reason,
            frames: self.frames,
            report,
        };
        self.status.send_modify(|update| {
            update.stats = summary.report.stats;
            let stopped = DisplayStatus::locked("System stopped");
            // The door may still be standing open after the lock engages
            update.status = if update.door == Some(DoorEvent::Ajar) {
                stopped.with_door_ajar()
            } else {
                stopped
            };
            update.lock_state = LockState::default();
            update.running = false;
        });
        summary
    }

    /// Applies every queued command. Returns a stop reason on shutdown.
    fn drain_commands(&mut self) -> Option<StopReason> {
        loop {
            match self.commands.try_recv() {
                Ok(ControlCommand::Shutdown) => {
                    tracing::info!("Shutdown requested");
                    return Some(StopReason::Shutdown);
                }
                Ok(command) => self.apply(command),
                Err(mpsc::error::TryRecvError::Empty) => return None,
                Err(mpsc::error::TryRecvError::Disconnected) => return None,
            }
        }
    }

    fn apply(&mut self, command: ControlCommand) {
        let changed = match command {
            ControlCommand::ManualUnlock => self.machine.manual_unlock(),
            ControlCommand::ManualLock => self.machine.manual_lock(),
            ControlCommand::AdminPause => self.machine.admin_pause(),
            ControlCommand::AdminResume => self.machine.admin_resume(),
            ControlCommand::Shutdown => false,
        };
        tracing::debug!(?command, changed, "Command applied");
    }

    fn publish(&self, status: DisplayStatus, frame: Option<Frame>) {
        tracing::trace!(status = %status, "Status");
        self.status.send_replace(StatusUpdate {
            status,
            frame,
            stats: self.machine.stats(),
            lock_state: self.machine.lock_state().clone(),
            door: self.monitor.last(),
            running: true,
        });
    }
}

impl<S: PerceptionSource + Send + 'static> AccessWorker<S> {
    /// Moves the worker onto its own thread.
    pub fn spawn(self) -> Result<WorkerHandle, CoreError> {
        let join = thread::Builder::new()
            .name("facegate-worker".into())
            .spawn(move || self.run())
            .map_err(|e| CoreError::Setup(format!("failed to start access worker: {e}")))?;
        Ok(WorkerHandle { join })
    }
}

/// Join handle for a spawned worker.
#[derive(Debug)]
pub struct WorkerHandle {
    join: JoinHandle<SessionSummary>,
}

impl WorkerHandle {
    /// Whether the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the worker to stop.
    pub fn join(self) -> Result<SessionSummary, CoreError> {
        self.join
            .join()
            .map_err(|_| CoreError::Setup("access worker panicked".into()))
    }
}

/// Draws the eye landmarks onto the event's frame and hands it back.
fn annotate(event: &mut PerceptionEvent) -> Option<Frame> {
    let mut frame = event.frame.take()?;
    if let Some(eyes) = &event.eye_landmarks {
        let (w, h) = (frame.width(), frame.height());
        let points: Vec<(u32, u32)> = eyes
            .left
            .pixel_points(w, h)
            .chain(eyes.right.pixel_points(w, h))
            .collect();
        frame.mark_points(points);
    }
    Some(frame)
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{EventKind, MemoryAuditSink};
    use crate::config::{AccessConfig, RelayConfig};
    use crate::liveness::fixtures::{open_eyes, FRAME};
    use crate::notify::NotificationSink;
    use crate::perception::{FrameSize, ScriptedSource};
    use crate::relay::{MockTransport, RelayChannel, RelayCommand};

    const SIZE: FrameSize = FrameSize::new(FRAME, FRAME);

    fn fast() -> WorkerConfig {
        WorkerConfig {
            frame_interval_ms: 0,
            gap_backoff_ms: 0,
            ..WorkerConfig::default()
        }
    }

    fn machine(relay: RelayChannel) -> (AccessStateMachine, MemoryAuditSink) {
        let audit = MemoryAuditSink::new();
        let machine = AccessStateMachine::new(
            AccessConfig::default(),
            relay,
            Box::new(audit.clone()),
            NotificationSink::disabled(),
        );
        (machine, audit)
    }

    fn virtual_relay() -> RelayChannel {
        RelayChannel::virtual_mode(&RelayConfig::default())
    }

    #[test]
    fn test_source_end_stops_and_locks() {
        let (m, _) = machine(virtual_relay());
        let mut source = ScriptedSource::new();
        source.repeat(PerceptionEvent::absent(SIZE), 3);
        let (worker, _commands, status) = AccessWorker::new(m, source, &fast());

        let summary = worker.run();

        assert_eq!(summary.reason, StopReason::SourceEnded);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.report.relay_history, vec![RelayCommand::Lock]);
        assert!(!status.borrow().running);
        assert_eq!(status.borrow().stats.ticks, 3);
    }

    #[test]
    fn test_shutdown_while_unlocking_sends_one_lock() {
        let mock = MockTransport::new();
        let relay = RelayChannel::with_transport(Box::new(mock.clone()), &RelayConfig::default());
        let (m, audit) = machine(relay);
        let mut source = ScriptedSource::new();
        source.repeat(PerceptionEvent::absent(SIZE), 100);
        let (worker, commands, _status) = AccessWorker::new(m, source, &fast());

        commands.manual_unlock().unwrap();
        commands.shutdown().unwrap();
        let summary = worker.run();

        assert_eq!(summary.reason, StopReason::Shutdown);
        assert_eq!(summary.frames, 0);
        assert_eq!(mock.written(), vec!["U".to_string(), "L".to_string()]);
        assert_eq!(audit.count(EventKind::UnlockManual), 1);
        assert_eq!(audit.records().len(), 1);
    }

    #[test]
    fn test_door_alert_is_logged_and_shown() {
        let mock = MockTransport::new();
        mock.push_inbound("ALERT:DOOR_AJAR");
        let relay = RelayChannel::with_transport(Box::new(mock.clone()), &RelayConfig::default());
        let (m, audit) = machine(relay);
        let source = ScriptedSource::from_events([PerceptionEvent::absent(SIZE)]);
        let (worker, _commands, status) = AccessWorker::new(m, source, &fast());

        worker.run();

        assert_eq!(audit.count(EventKind::AlertDoorAjar), 1);
        let update = status.borrow();
        assert!(!update.running);
        assert_eq!(update.status.label, "DOOR AJAR");
        assert_eq!(update.status.message, "System stopped");
        assert_eq!(update.door, Some(DoorEvent::Ajar));
    }

    #[test]
    fn test_closed_door_stops_with_plain_lock_banner() {
        let mock = MockTransport::new();
        mock.push_inbound("ALERT:DOOR_AJAR");
        mock.push_inbound("STATUS:DOOR_CLOSED");
        let relay = RelayChannel::with_transport(Box::new(mock.clone()), &RelayConfig::default());
        let (m, _) = machine(relay);
        let source = ScriptedSource::from_events([PerceptionEvent::absent(SIZE)]);
        let (worker, _commands, status) = AccessWorker::new(m, source, &fast());

        worker.run();

        let update = status.borrow();
        assert_eq!(update.door, Some(DoorEvent::Closed));
        assert_eq!(update.status, DisplayStatus::locked("System stopped"));
    }

    #[test]
    fn test_gap_is_counted_and_loop_continues() {
        let (m, _) = machine(virtual_relay());
        let mut source = ScriptedSource::new();
        source
            .push_gap()
            .push(PerceptionEvent::absent(SIZE))
            .push_gap();
        let (worker, _commands, _status) = AccessWorker::new(m, source, &fast());

        let summary = worker.run();

        assert_eq!(summary.frames, 1);
        assert_eq!(summary.report.stats.perception_gaps, 2);
    }

    #[test]
    fn test_liveness_frames_are_annotated() {
        let (m, _) = machine(virtual_relay());
        let event = PerceptionEvent::face(SIZE)
            .with_eyes(open_eyes())
            .with_frame(Frame::blank(FRAME, FRAME, 1));
        let mut source = ScriptedSource::new();
        source.push(event).push(PerceptionEvent::absent(SIZE));
        let (mut worker, _commands, status) = AccessWorker::new(m, source, &fast());
        worker.machine.start();

        // Drive a single iteration by hand so the frame is still published
        let mut event = worker.source.next_event().unwrap().unwrap();
        let status_now = worker.machine.tick(&event);
        let frame = annotate(&mut event);
        worker.publish(status_now, frame);

        let update = status.borrow();
        let frame = update.frame.as_ref().unwrap();
        assert!(frame.pixels().iter().any(|&p| p == 255));
        assert_eq!(update.status.message, "LIVENESS CHECK\nBlinks: 0 / 2");
    }

    #[test]
    fn test_spawned_worker_stops_on_command() {
        let (m, _) = machine(virtual_relay());
        let mut source = ScriptedSource::new();
        source.repeat(PerceptionEvent::absent(SIZE), 10_000);
        let config = WorkerConfig {
            frame_interval_ms: 1,
            ..fast()
        };
        let (worker, commands, _status) = AccessWorker::new(m, source, &config);

        let handle = worker.spawn().unwrap();
        commands.shutdown().unwrap();
        let summary = handle.join().unwrap();

        assert_eq!(summary.reason, StopReason::Shutdown);
        assert_eq!(commands.manual_lock(), Err(CommandError::Stopped));
    }

    #[test]
    fn test_full_command_queue_rejects() {
        let (m, _) = machine(virtual_relay());
        let config = WorkerConfig {
            command_capacity: 1,
            ..fast()
        };
        let (_worker, commands, _status) = AccessWorker::new(m, ScriptedSource::new(), &config);

        commands.admin_pause().unwrap();
        assert_eq!(commands.admin_resume(), Err(CommandError::Full));
    }
}
