//! Serial wire vocabulary for the lock controller.
//!
//! Lines are ASCII and `\n`-terminated. Outbound commands are `U`, `L` and
//! `T=<seconds>`; the controller emits `ALERT:DOOR_AJAR` and
//! `STATUS:DOOR_CLOSED` on its own schedule.

use std::fmt;

const DOOR_AJAR_MARKER: &str = "ALERT:DOOR_AJAR";
const DOOR_CLOSED_MARKER: &str = "STATUS:DOOR_CLOSED";

/// Commands understood by the relay controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    /// Energize the strike.
    Unlock,
    /// Release the strike.
    Lock,
    /// Seconds the door may stay open before the controller raises an alert.
    SetDoorAjarTimeout(u32),
}

impl RelayCommand {
    /// Wire form, without the line terminator.
    pub fn wire(&self) -> String {
        match self {
            RelayCommand::Unlock => "U".to_string(),
            RelayCommand::Lock => "L".to_string(),
            RelayCommand::SetDoorAjarTimeout(secs) => format!("T={secs}"),
        }
    }

    /// Whether the controller answers this command with a line.
    ///
    /// Only the startup configuration command is acknowledged.
    pub fn expects_ack(&self) -> bool {
        matches!(self, RelayCommand::SetDoorAjarTimeout(_))
    }
}

impl fmt::Display for RelayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire())
    }
}

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// No hardware attached; the command was only recorded.
    Virtual,
    /// Written and flushed; no reply expected.
    Written,
    /// The controller replied with this line.
    Acknowledged(String),
    /// A reply was expected but none arrived in time.
    NoReply,
}

/// Unsolicited door status reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorEvent {
    /// Door held open past the configured timeout.
    Ajar,
    /// Door closed again.
    Closed,
}

impl DoorEvent {
    /// Recognizes a status line. Anything else yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.contains(DOOR_AJAR_MARKER) {
            Some(DoorEvent::Ajar)
        } else if line.contains(DOOR_CLOSED_MARKER) {
            Some(DoorEvent::Closed)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_forms() {
        assert_eq!(RelayCommand::Unlock.wire(), "U");
        assert_eq!(RelayCommand::Lock.wire(), "L");
        assert_eq!(RelayCommand::SetDoorAjarTimeout(20).wire(), "T=20");
    }

    #[test]
    fn test_only_configuration_is_acknowledged() {
        assert!(!RelayCommand::Unlock.expects_ack());
        assert!(!RelayCommand::Lock.expects_ack());
        assert!(RelayCommand::SetDoorAjarTimeout(5).expects_ack());
    }

    #[test]
    fn test_door_event_parsing() {
        assert_eq!(DoorEvent::parse("ALERT:DOOR_AJAR\r"), Some(DoorEvent::Ajar));
        assert_eq!(DoorEvent::parse("STATUS:DOOR_CLOSED"), Some(DoorEvent::Closed));
        assert_eq!(DoorEvent::parse("OK"), None);
        assert_eq!(DoorEvent::parse(""), None);
    }
}
