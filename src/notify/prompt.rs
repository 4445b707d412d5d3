//! Spoken prompts.

use std::fmt;

/// A message for the person at the door.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Startup.
    SystemActivated,
    /// Blink check passed.
    LivenessConfirmed,
    /// Face unlock.
    Welcome {
        /// Name of the recognized user.
        user: String,
    },
    /// Loitering alert.
    UnknownPerson,
    /// Timed relock.
    DoorLocked,
    /// Operator unlock.
    ManualUnlock,
    /// Operator lock.
    ManualLock,
    /// Admin panel opened during an unlock.
    AdminLock,
    /// Admin panel opened.
    AdminOpened,
    /// Admin panel closed.
    AdminClosed,
    /// Door held open.
    DoorAjar,
    /// Door closed again.
    DoorClosed,
    /// Controller stopping.
    ShuttingDown,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prompt::SystemActivated => f.write_str("System activated."),
            Prompt::LivenessConfirmed => f.write_str("Liveness confirmed. Verifying identity."),
            Prompt::Welcome { user } => write!(f, "Welcome {user}. Door unlocked."),
            Prompt::UnknownPerson => f.write_str("Alert. Unknown person detected."),
            Prompt::DoorLocked => f.write_str("Door locked."),
            Prompt::ManualUnlock => f.write_str("Manual override. Door unlocked."),
            Prompt::ManualLock => f.write_str("Door locked manually."),
            Prompt::AdminLock => f.write_str("Admin override. Door locked."),
            Prompt::AdminOpened => f.write_str("Admin panel opened."),
            Prompt::AdminClosed => f.write_str("Admin panel closed. Restarting camera."),
            Prompt::DoorAjar => f.write_str("Door Ajar Alert"),
            Prompt::DoorClosed => f.write_str("Door closed."),
            Prompt::ShuttingDown => f.write_str("System shutting down."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_names_user() {
        let prompt = Prompt::Welcome {
            user: "alice".into(),
        };
        assert_eq!(prompt.to_string(), "Welcome alice. Door unlocked.");
    }

    #[test]
    fn test_fixed_texts() {
        assert_eq!(Prompt::DoorAjar.to_string(), "Door Ajar Alert");
        assert_eq!(
            Prompt::AdminClosed.to_string(),
            "Admin panel closed. Restarting camera."
        );
    }
}
