//! Prompts for the person at the door.
//!
//! The state machine queues prompts through a [`NotificationSink`] handle it
//! receives at construction. Delivery happens on one background thread, so
//! a slow speech backend never delays a lock decision.

mod prompt;
mod sink;

pub use prompt::Prompt;
pub use sink::{LogNotifier, NotificationSink, Notifier, NotifyError, RecordingNotifier};
