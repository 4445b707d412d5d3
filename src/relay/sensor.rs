//! Door status lines from the relay controller.

use super::channel::RelayChannel;
use super::command::DoorEvent;

/// Turns unsolicited controller lines into door events.
///
/// The monitor only reads; it has no access to lock state.
#[derive(Debug, Default)]
pub struct DoorSensorMonitor {
    last: Option<DoorEvent>,
    ajar_count: u64,
    ignored_lines: u64,
}

impl DoorSensorMonitor {
    /// No door event seen yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next door event, or `None` when nothing is waiting.
    ///
    /// Unrecognized lines are skipped. Read errors are logged and end the
    /// poll; the next call tries again.
    pub fn poll(&mut self, channel: &mut RelayChannel) -> Option<DoorEvent> {
        loop {
            let line = match channel.read_unsolicited() {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(error = %e, "Error reading relay status");
                    return None;
                }
            };

            match DoorEvent::parse(&line) {
                Some(event) => {
                    if event == DoorEvent::Ajar {
                        self.ajar_count += 1;
                    }
                    self.last = Some(event);
                    tracing::debug!(?event, "Door status");
                    return Some(event);
                }
                None => {
                    self.ignored_lines += 1;
                    if !line.is_empty() {
                        tracing::trace!(line = %line, "Ignoring relay line");
                    }
                }
            }
        }
    }

    /// Most recent door event.
    pub fn last(&self) -> Option<DoorEvent> {
        self.last
    }

    /// Door-ajar alerts seen.
    pub fn ajar_count(&self) -> u64 {
        self.ajar_count
    }

    /// Lines that were not door status.
    pub fn ignored_lines(&self) -> u64 {
        self.ignored_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::relay::MockTransport;

    #[test]
    fn test_poll_parses_and_skips_noise() {
        let mock = MockTransport::new();
        let mut channel =
            RelayChannel::with_transport(Box::new(mock.clone()), &RelayConfig::default());
        let mut monitor = DoorSensorMonitor::new();

        mock.push_inbound("heartbeat");
        mock.push_inbound("ALERT:DOOR_AJAR");
        mock.push_inbound("STATUS:DOOR_CLOSED");

        assert_eq!(monitor.poll(&mut channel), Some(DoorEvent::Ajar));
        assert_eq!(monitor.poll(&mut channel), Some(DoorEvent::Closed));
        assert_eq!(monitor.poll(&mut channel), None);

        assert_eq!(monitor.last(), Some(DoorEvent::Closed));
        assert_eq!(monitor.ajar_count(), 1);
        assert_eq!(monitor.ignored_lines(), 1);
    }

    #[test]
    fn test_poll_virtual_is_quiet() {
        let mut channel = RelayChannel::virtual_mode(&RelayConfig::default());
        let mut monitor = DoorSensorMonitor::new();
        assert_eq!(monitor.poll(&mut channel), None);
    }

    #[test]
    fn test_read_error_does_not_panic() {
        let mock = MockTransport::new();
        let mut channel =
            RelayChannel::with_transport(Box::new(mock.clone()), &RelayConfig::default());
        let mut monitor = DoorSensorMonitor::new();

        mock.push_inbound("ALERT:DOOR_AJAR");
        mock.fail_reads(true);

        assert_eq!(monitor.poll(&mut channel), None);
        mock.fail_reads(false);
        assert_eq!(monitor.poll(&mut channel), Some(DoorEvent::Ajar));
    }
}
