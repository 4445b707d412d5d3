//! Relay controller link.
//!
//! This module owns the serial protocol to the door strike: the command
//! vocabulary, the transport abstraction, the channel with its virtual
//! fallback, and the monitor for unsolicited door status lines.

mod channel;
mod command;
mod sensor;
mod transport;

pub use channel::{RelayChannel, RelayError, RelayMode};
pub use command::{Ack, DoorEvent, RelayCommand};
pub use sensor::DoorSensorMonitor;
#[cfg(feature = "hardware")]
pub use transport::SerialTransport;
pub use transport::{MockTransport, Transport};
