//! Command channel to the lock controller.
//!
//! Opening never leaves the controller without a channel: if the port
//! cannot be reached the channel runs in virtual mode and accepts every
//! command without actuating anything. Closing always sends a final lock.

use super::command::{Ack, DoorEvent, RelayCommand};
use super::transport::Transport;
use crate::config::RelayConfig;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Commands retained for inspection.
const HISTORY_LEN: usize = 64;

/// Errors that can occur on the relay link.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The port could not be opened.
    #[error("relay hardware unavailable: {0}")]
    HardwareUnavailable(String),
    /// Another process owns the port.
    #[error("serial port {port} is held by another process")]
    Busy {
        /// Port path from the configuration.
        port: String,
    },
    /// A write, flush or read failed.
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The channel was closed.
    #[error("relay channel is closed")]
    Closed,
}

/// Current link mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Talking to a real controller.
    Hardware,
    /// No hardware; commands are only recorded.
    Virtual,
    /// Shut down; further commands fail.
    Closed,
}

enum Link {
    Hardware(Box<dyn Transport>),
    Virtual,
    Closed,
}

/// Line-oriented command channel to the relay controller.
pub struct RelayChannel {
    link: Link,
    endpoint: String,
    ack_timeout: Duration,
    read_timeout: Duration,
    /// Status lines that arrived while waiting for an acknowledgement.
    pending: VecDeque<String>,
    history: VecDeque<RelayCommand>,
    sent_total: u64,
}

impl RelayChannel {
    /// Opens the configured serial port, falling back to virtual mode.
    ///
    /// The only error is [`RelayError::Busy`]: another process owns the port.
    pub fn open(config: &RelayConfig) -> Result<Self, RelayError> {
        match open_transport(config) {
            Ok(transport) => {
                tracing::info!(
                    port = %config.port,
                    baud = config.baud,
                    "Relay port opened"
                );
                // Controllers reset when the port opens
                std::thread::sleep(Duration::from_millis(config.settle_ms));

                let mut channel = Self::with_transport(transport, config);
                let timeout = RelayCommand::SetDoorAjarTimeout(config.door_ajar_timeout_sec);
                match channel.send(timeout) {
                    Ok(ack) => tracing::info!(
                        timeout_sec = config.door_ajar_timeout_sec,
                        ack = ?ack,
                        "Door-ajar timeout configured"
                    ),
                    Err(e) => tracing::warn!(error = %e, "Failed to configure door-ajar timeout"),
                }
                Ok(channel)
            }
            Err(err @ RelayError::Busy { .. }) => Err(err),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Relay unavailable, running in virtual mode; the door will not actuate"
                );
                Ok(Self::virtual_mode(config))
            }
        }
    }

    /// Creates a channel over an already-open transport.
    pub fn with_transport(transport: Box<dyn Transport>, config: &RelayConfig) -> Self {
        let endpoint = transport.describe();
        Self {
            link: Link::Hardware(transport),
            endpoint,
            ack_timeout: Duration::from_millis(config.ack_timeout_ms),
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            pending: VecDeque::new(),
            history: VecDeque::with_capacity(HISTORY_LEN),
            sent_total: 0,
        }
    }

    /// Creates a channel with no hardware behind it.
    pub fn virtual_mode(config: &RelayConfig) -> Self {
        Self {
            link: Link::Virtual,
            endpoint: "virtual".to_string(),
            ack_timeout: Duration::from_millis(config.ack_timeout_ms),
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            pending: VecDeque::new(),
            history: VecDeque::with_capacity(HISTORY_LEN),
            sent_total: 0,
        }
    }

    /// Returns the link mode.
    pub fn mode(&self) -> RelayMode {
        match self.link {
            Link::Hardware(_) => RelayMode::Hardware,
            Link::Virtual => RelayMode::Virtual,
            Link::Closed => RelayMode::Closed,
        }
    }

    /// True when commands are not reaching hardware.
    pub fn is_virtual(&self) -> bool {
        matches!(self.link, Link::Virtual)
    }

    /// Sends one command.
    ///
    /// Write and flush failures are returned as [`RelayError::Io`]; the
    /// command still counts as issued.
    pub fn send(&mut self, cmd: RelayCommand) -> Result<Ack, RelayError> {
        if matches!(self.link, Link::Closed) {
            return Err(RelayError::Closed);
        }
        self.remember(cmd);

        let line = cmd.wire();
        match &mut self.link {
            Link::Closed => Err(RelayError::Closed),
            Link::Virtual => {
                tracing::info!(command = %line, "Virtual relay command");
                Ok(Ack::Virtual)
            }
            Link::Hardware(transport) => {
                transport.write_line(&line)?;
                tracing::debug!(command = %line, endpoint = %self.endpoint, "Sent to relay");

                if !cmd.expects_ack() {
                    return Ok(Ack::Written);
                }

                let deadline = Instant::now() + self.ack_timeout;
                loop {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        tracing::warn!(command = %line, "No acknowledgement from relay");
                        return Ok(Ack::NoReply);
                    }
                    match transport.read_line(left)? {
                        None => {
                            tracing::warn!(command = %line, "No acknowledgement from relay");
                            return Ok(Ack::NoReply);
                        }
                        Some(reply) if reply.is_empty() => continue,
                        Some(reply) if DoorEvent::parse(&reply).is_some() => {
                            self.pending.push_back(reply);
                        }
                        Some(reply) => return Ok(Ack::Acknowledged(reply)),
                    }
                }
            }
        }
    }

    /// Reads one unsolicited line without blocking when nothing is waiting.
    pub fn read_unsolicited(&mut self) -> Result<Option<String>, RelayError> {
        if let Some(line) = self.pending.pop_front() {
            return Ok(Some(line));
        }
        match &mut self.link {
            Link::Hardware(transport) => {
                if !transport.has_pending()? {
                    return Ok(None);
                }
                Ok(transport.read_line(self.read_timeout)?)
            }
            Link::Virtual | Link::Closed => Ok(None),
        }
    }

    /// Sends a final lock and releases the link.
    ///
    /// Safe to call more than once; only the first call sends anything.
    pub fn close(&mut self) {
        if matches!(self.link, Link::Closed) {
            return;
        }
        if let Err(e) = self.send(RelayCommand::Lock) {
            tracing::warn!(error = %e, "Final lock command failed");
        }
        if let Link::Hardware(_) = std::mem::replace(&mut self.link, Link::Closed) {
            tracing::info!(endpoint = %self.endpoint, "Relay port closed");
        }
    }

    /// Most recent commands, oldest first.
    pub fn history(&self) -> Vec<RelayCommand> {
        self.history.iter().copied().collect()
    }

    /// Total commands issued over the channel's life.
    pub fn sent_total(&self) -> u64 {
        self.sent_total
    }

    /// Endpoint name for logs.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn remember(&mut self, cmd: RelayCommand) {
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(cmd);
        self.sent_total += 1;
    }
}

impl Drop for RelayChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for RelayChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayChannel")
            .field("mode", &self.mode())
            .field("endpoint", &self.endpoint)
            .field("sent_total", &self.sent_total)
            .finish()
    }
}

#[cfg(feature = "hardware")]
fn open_transport(config: &RelayConfig) -> Result<Box<dyn Transport>, RelayError> {
    let transport = super::transport::SerialTransport::open(
        &config.port,
        config.baud,
        Duration::from_millis(config.read_timeout_ms),
    )?;
    Ok(Box::new(transport))
}

#[cfg(not(feature = "hardware"))]
fn open_transport(config: &RelayConfig) -> Result<Box<dyn Transport>, RelayError> {
    Err(RelayError::HardwareUnavailable(format!(
        "{}: built without the `hardware` feature",
        config.port
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::MockTransport;

    fn hardware_channel() -> (RelayChannel, MockTransport) {
        let mock = MockTransport::new();
        let channel = RelayChannel::with_transport(Box::new(mock.clone()), &RelayConfig::default());
        (channel, mock)
    }

    #[test]
    fn test_virtual_mode_accepts_everything() {
        let mut channel = RelayChannel::virtual_mode(&RelayConfig::default());

        assert_eq!(channel.send(RelayCommand::Unlock).unwrap(), Ack::Virtual);
        assert_eq!(channel.send(RelayCommand::Lock).unwrap(), Ack::Virtual);
        assert_eq!(
            channel.history(),
            vec![RelayCommand::Unlock, RelayCommand::Lock]
        );
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn test_open_without_hardware_is_virtual() {
        let channel = RelayChannel::open(&RelayConfig::default()).unwrap();
        assert_eq!(channel.mode(), RelayMode::Virtual);
    }

    #[test]
    fn test_commands_are_newline_lines() {
        let (mut channel, mock) = hardware_channel();

        assert_eq!(channel.send(RelayCommand::Unlock).unwrap(), Ack::Written);
        assert_eq!(mock.written(), vec!["U".to_string()]);
    }

    #[test]
    fn test_timeout_command_reads_ack() {
        let (mut channel, mock) = hardware_channel();
        mock.push_inbound("OK T=20");

        let ack = channel.send(RelayCommand::SetDoorAjarTimeout(20)).unwrap();

        assert_eq!(ack, Ack::Acknowledged("OK T=20".to_string()));
        assert_eq!(mock.written(), vec!["T=20".to_string()]);
    }

    #[test]
    fn test_missing_ack_is_not_an_error() {
        let (mut channel, _mock) = hardware_channel();
        let ack = channel.send(RelayCommand::SetDoorAjarTimeout(20)).unwrap();
        assert_eq!(ack, Ack::NoReply);
    }

    #[test]
    fn test_status_line_during_ack_is_kept() {
        let (mut channel, mock) = hardware_channel();
        mock.push_inbound("ALERT:DOOR_AJAR");
        mock.push_inbound("OK");

        let ack = channel.send(RelayCommand::SetDoorAjarTimeout(20)).unwrap();

        assert_eq!(ack, Ack::Acknowledged("OK".to_string()));
        assert_eq!(
            channel.read_unsolicited().unwrap(),
            Some("ALERT:DOOR_AJAR".to_string())
        );
    }

    #[test]
    fn test_write_failure_is_reported() {
        let (mut channel, mock) = hardware_channel();
        mock.fail_writes(true);

        assert!(matches!(
            channel.send(RelayCommand::Unlock),
            Err(RelayError::Io(_))
        ));
        // Recovers once the link does
        mock.fail_writes(false);
        assert!(channel.send(RelayCommand::Lock).is_ok());
    }

    #[test]
    fn test_close_sends_single_lock() {
        let (mut channel, mock) = hardware_channel();

        channel.close();
        channel.close();

        assert_eq!(mock.written(), vec!["L".to_string()]);
        assert_eq!(channel.mode(), RelayMode::Closed);
        assert!(matches!(
            channel.send(RelayCommand::Unlock),
            Err(RelayError::Closed)
        ));
    }

    #[test]
    fn test_drop_locks() {
        let (channel, mock) = hardware_channel();
        drop(channel);
        assert_eq!(mock.written(), vec!["L".to_string()]);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut channel = RelayChannel::virtual_mode(&RelayConfig::default());
        for _ in 0..(HISTORY_LEN + 10) {
            channel.send(RelayCommand::Lock).unwrap();
        }
        assert_eq!(channel.history().len(), HISTORY_LEN);
        assert_eq!(channel.sent_total(), (HISTORY_LEN + 10) as u64);
    }
}
