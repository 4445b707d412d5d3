//! Lock state, presentation status and counters.

use crate::liveness::LivenessState;
use std::fmt;
use std::time::Instant;

/// Where the door is in its access cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// Door locked; liveness progress for the face in view.
    Locked(LivenessState),
    /// Door unlocked for `user`; relocks when the countdown runs out.
    Unlocking {
        /// Recognized user, or the override name for manual unlocks.
        user: String,
        /// When the relay was told to unlock. Informational: the machine's
        /// countdown timer, started at the same instant, drives the relock.
        started_at: Instant,
    },
    /// Operator has the admin panel open; perception is ignored.
    AdminPaused,
}

impl LockState {
    /// Short name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            LockState::Locked(_) => "locked",
            LockState::Unlocking { .. } => "unlocking",
            LockState::AdminPaused => "admin_paused",
        }
    }

    /// Whether the unlock window is running.
    pub fn is_unlocking(&self) -> bool {
        matches!(self, LockState::Unlocking { .. })
    }

    /// Liveness progress while locked.
    pub fn liveness(&self) -> Option<&LivenessState> {
        match self {
            LockState::Locked(liveness) => Some(liveness),
            _ => None,
        }
    }
}

impl Default for LockState {
    fn default() -> Self {
        LockState::Locked(LivenessState::fresh())
    }
}

/// Status colors of the live view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    /// `#FF3333`
    Red,
    /// `#00FF00`
    Green,
    /// `#007ACC`
    Blue,
    /// `#FFA500`
    Orange,
}

impl StatusColor {
    /// Hex color used by the presentation layer.
    pub fn hex(self) -> &'static str {
        match self {
            StatusColor::Red => "#FF3333",
            StatusColor::Green => "#00FF00",
            StatusColor::Blue => "#007ACC",
            StatusColor::Orange => "#FFA500",
        }
    }
}

/// What the presentation layer shows after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayStatus {
    /// Headline, e.g. `LOCKED` or `Welcome alice`.
    pub label: String,
    /// Background colour.
    pub color: StatusColor,
    /// Detail text; may span several lines.
    pub message: String,
}

impl DisplayStatus {
    /// Creates an empty instance.
    pub fn new(label: impl Into<String>, color: StatusColor, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            color,
            message: message.into(),
        }
    }

    /// Locked with a free-form hint.
    pub fn locked(message: impl Into<String>) -> Self {
        Self::new("LOCKED", StatusColor::Red, message)
    }

    /// Idle screen with nobody in view.
    pub fn look_at_camera() -> Self {
        Self::locked("Please look at the camera.")
    }

    /// Blink progress.
    pub fn liveness_check(blinks: u32, required: u32) -> Self {
        Self::locked(format!("LIVENESS CHECK\nBlinks: {blinks} / {required}"))
    }

    /// Recognized user, intent dwell still running.
    pub fn verifying(user: &str, confidence: i32) -> Self {
        Self::new(
            format!("Welcome {user}"),
            StatusColor::Green,
            format!("Liveness OK. Verifying intent...\n\nConfidence: {confidence}%"),
        )
    }

    /// Live face without a confident match.
    pub fn unknown(confidence: Option<i32>) -> Self {
        let message = match confidence {
            Some(c) => format!("Liveness OK. Confidence: {c}%"),
            None => "Liveness OK. No match.".to_string(),
        };
        Self::new("ALERT: UNKNOWN", StatusColor::Red, message)
    }

    /// Door open, with the countdown.
    pub fn unlocked(user: &str, remaining_secs: u64) -> Self {
        Self::new(
            "UNLOCKED",
            StatusColor::Green,
            format!("Welcome {user}\n\nLocking in {remaining_secs}s"),
        )
    }

    /// Perception paused for the admin panel.
    pub fn admin() -> Self {
        Self::new(
            "ADMIN",
            StatusColor::Blue,
            "Admin panel is open. Camera is paused.",
        )
    }

    /// No frame from the camera.
    pub fn camera_lost() -> Self {
        Self::locked("Camera feed lost.")
    }

    /// Replaces label and color with the door-ajar banner, keeping the message.
    pub fn with_door_ajar(self) -> Self {
        Self {
            label: "DOOR AJAR".to_string(),
            color: StatusColor::Orange,
            message: self.message,
        }
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.label, self.message.replace('\n', " "))
    }
}

/// Running counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessStats {
    /// Perception events processed.
    pub ticks: u64,
    /// Blinks detected.
    pub blinks: u64,
    /// Faces that passed the blink check.
    pub liveness_confirmations: u64,
    /// Unlocks by recognition.
    pub unlocks_face: u64,
    /// Unlocks by operator override.
    pub unlocks_manual: u64,
    /// Relocks after the countdown.
    pub locks_auto: u64,
    /// Relocks by operator or admin panel.
    pub locks_manual: u64,
    /// Unknown-person alerts raised.
    pub unknown_alerts: u64,
    /// Door-ajar reports from the controller.
    pub door_ajar_alerts: u64,
    /// Ticks without a frame.
    pub perception_gaps: u64,
    /// Relay commands that failed.
    pub relay_errors: u64,
    /// Audit writes that failed.
    pub audit_failures: u64,
    /// Prompts dropped on a full queue.
    pub prompts_rejected: u64,
}

impl AccessStats {
    /// Unlocks of any kind.
    pub fn unlocks(&self) -> u64 {
        self.unlocks_face + self.unlocks_manual
    }

    /// Relocks of any kind.
    pub fn locks(&self) -> u64 {
        self.locks_auto + self.locks_manual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_texts() {
        assert_eq!(
            DisplayStatus::liveness_check(1, 2).message,
            "LIVENESS CHECK\nBlinks: 1 / 2"
        );
        let unlocked = DisplayStatus::unlocked("alice", 7);
        assert_eq!(unlocked.label, "UNLOCKED");
        assert_eq!(unlocked.message, "Welcome alice\n\nLocking in 7s");
        assert_eq!(unlocked.color.hex(), "#00FF00");
    }

    #[test]
    fn test_door_ajar_keeps_message() {
        let status = DisplayStatus::look_at_camera().with_door_ajar();
        assert_eq!(status.label, "DOOR AJAR");
        assert_eq!(status.color.hex(), "#FFA500");
        assert_eq!(status.message, "Please look at the camera.");
    }

    #[test]
    fn test_default_state_is_fresh_lock() {
        let state = LockState::default();
        assert_eq!(state.name(), "locked");
        assert_eq!(state.liveness(), Some(&LivenessState::fresh()));
    }
}
