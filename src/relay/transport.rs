//! Byte transport under the relay protocol.
//!
//! The channel speaks lines; a transport moves them. The serial
//! implementation is compiled with the `hardware` feature, and a mock
//! implementation backs the tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Trait for relay link implementations.
pub trait Transport: Send {
    /// Writes one line plus terminator and flushes.
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Reads one line, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` on timeout. The terminator is stripped.
    fn read_line(&mut self, timeout: Duration) -> io::Result<Option<String>>;

    /// Whether inbound bytes are waiting.
    fn has_pending(&mut self) -> io::Result<bool>;

    /// Human-readable endpoint name for logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Default)]
struct MockState {
    written: Vec<String>,
    inbound: VecDeque<String>,
    fail_writes: bool,
    fail_reads: bool,
}

/// In-memory transport for testing.
///
/// Clones share state, so a test can keep one handle while the channel
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// No scripted replies, nothing written.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues a line as if the controller had sent it.
    pub fn push_inbound(&self, line: impl Into<String>) {
        self.state().inbound.push_back(line.into());
    }

    /// Lines written so far, without terminators.
    pub fn written(&self) -> Vec<String> {
        self.state().written.clone()
    }

    /// Makes subsequent writes fail with `BrokenPipe`.
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Makes subsequent reads fail with `BrokenPipe`.
    pub fn fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }
}

impl Transport for MockTransport {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        state.written.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> io::Result<Option<String>> {
        let mut state = self.state();
        if state.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock read failure"));
        }
        Ok(state.inbound.pop_front())
    }

    fn has_pending(&mut self) -> io::Result<bool> {
        Ok(!self.state().inbound.is_empty())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(feature = "hardware")]
pub use serial::SerialTransport;

#[cfg(feature = "hardware")]
mod serial {
    use super::Transport;
    use crate::relay::RelayError;
    use std::io::{self, Read, Write};
    use std::time::{Duration, Instant};

    /// Serial port link to the lock controller.
    pub struct SerialTransport {
        port: Box<dyn serialport::SerialPort>,
        name: String,
        partial: Vec<u8>,
    }

    impl SerialTransport {
        /// Opens the port. The port is opened for exclusive use.
        pub fn open(path: &str, baud: u32, read_timeout: Duration) -> Result<Self, RelayError> {
            let port = serialport::new(path, baud)
                .timeout(read_timeout)
                .open()
                .map_err(|e| {
                    if is_busy(&e) {
                        RelayError::Busy {
                            port: path.to_string(),
                        }
                    } else {
                        RelayError::HardwareUnavailable(format!("{path}: {e}"))
                    }
                })?;

            Ok(Self {
                port,
                name: path.to_string(),
                partial: Vec::with_capacity(64),
            })
        }

        fn take_line(&mut self) -> Option<String> {
            let end = self.partial.iter().position(|&b| b == b'\n')?;
            let raw: Vec<u8> = self.partial.drain(..=end).collect();
            Some(String::from_utf8_lossy(&raw).trim().to_string())
        }
    }

    fn is_busy(err: &serialport::Error) -> bool {
        matches!(err.kind(), serialport::ErrorKind::Io(io::ErrorKind::ResourceBusy))
            || err.description.to_ascii_lowercase().contains("busy")
    }

    impl Transport for SerialTransport {
        fn write_line(&mut self, line: &str) -> io::Result<()> {
            self.port.write_all(line.as_bytes())?;
            self.port.write_all(b"\n")?;
            self.port.flush()
        }

        fn read_line(&mut self, timeout: Duration) -> io::Result<Option<String>> {
            let deadline = Instant::now() + timeout;
            let mut buf = [0u8; 64];

            loop {
                if let Some(line) = self.take_line() {
                    return Ok(Some(line));
                }

                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Ok(None);
                }
                self.port.set_timeout(left).map_err(io::Error::from)?;

                match self.port.read(&mut buf) {
                    Ok(0) => return Ok(None),
                    Ok(n) => self.partial.extend_from_slice(&buf[..n]),
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                    Err(e) => return Err(e),
                }
            }
        }

        fn has_pending(&mut self) -> io::Result<bool> {
            if self.partial.contains(&b'\n') {
                return Ok(true);
            }
            let waiting = self.port.bytes_to_read().map_err(io::Error::from)?;
            Ok(waiting > 0)
        }

        fn describe(&self) -> String {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_shares_state_between_clones() {
        let handle = MockTransport::new();
        let mut link = handle.clone();

        link.write_line("U").unwrap();
        handle.push_inbound("OK");

        assert_eq!(handle.written(), vec!["U".to_string()]);
        assert!(link.has_pending().unwrap());
        assert_eq!(
            link.read_line(Duration::from_millis(10)).unwrap(),
            Some("OK".to_string())
        );
        assert!(!link.has_pending().unwrap());
    }

    #[test]
    fn test_mock_write_failure() {
        let handle = MockTransport::new();
        let mut link = handle.clone();
        handle.fail_writes(true);

        let err = link.write_line("L").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(handle.written().is_empty());
    }
}
