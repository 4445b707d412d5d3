//! Bounded notification queue with a single delivery thread.

use super::prompt::Prompt;
use crate::config::NotifyConfig;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from the notification path.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The prompt was rejected.
    #[error("notification queue full ({capacity} pending)")]
    QueueFull {
        /// Configured queue depth.
        capacity: usize,
    },
    /// The delivery thread is gone.
    #[error("notification worker has stopped")]
    Closed,
    /// The delivery thread could not start.
    #[error("failed to start notification worker: {0}")]
    Spawn(String),
    /// The backend failed to play a prompt.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Trait for prompt delivery backends (speech, chime, log).
pub trait Notifier: Send {
    /// Delivers one prompt. May block for as long as playback takes.
    fn deliver(&mut self, text: &str) -> Result<(), NotifyError>;
}

/// Writes prompts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&mut self, text: &str) -> Result<(), NotifyError> {
        tracing::info!(prompt = text, "Notification");
        Ok(())
    }
}

/// Keeps delivered prompts in memory. Clones share the list.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    /// A notifier with nothing recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompts delivered so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.delivered
            .lock()
            .map(|list| list.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&mut self, text: &str) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .map_err(|_| NotifyError::Delivery("recording list poisoned".into()))?
            .push(text.to_string());
        Ok(())
    }
}

/// Handle for queueing prompts.
///
/// Prompts go to one worker thread through a bounded channel. When the
/// channel is full the new prompt is rejected; the caller never waits.
#[derive(Debug)]
pub struct NotificationSink {
    sender: Option<mpsc::Sender<String>>,
    worker: Option<JoinHandle<u64>>,
    capacity: usize,
    queued: u64,
    rejected: u64,
}

impl NotificationSink {
    /// Starts the delivery thread.
    pub fn spawn<N: Notifier + 'static>(mut notifier: N, capacity: usize) -> Result<Self, NotifyError> {
        let capacity = capacity.max(1);
        let (sender, mut receiver) = mpsc::channel::<String>(capacity);

        let worker = thread::Builder::new()
            .name("facegate-notify".into())
            .spawn(move || {
                let mut delivered = 0u64;
                while let Some(text) = receiver.blocking_recv() {
                    match notifier.deliver(&text) {
                        Ok(()) => delivered += 1,
                        Err(e) => tracing::warn!(error = %e, prompt = %text, "Notification dropped"),
                    }
                }
                delivered
            })
            .map_err(|e| NotifyError::Spawn(e.to_string()))?;

        tracing::debug!(capacity, "Notification worker started");
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            capacity,
            queued: 0,
            rejected: 0,
        })
    }

    /// A sink that silently discards every prompt.
    pub fn disabled() -> Self {
        Self {
            sender: None,
            worker: None,
            capacity: 0,
            queued: 0,
            rejected: 0,
        }
    }

    /// Builds the sink described by `config`.
    pub fn from_config<N: Notifier + 'static>(
        config: &NotifyConfig,
        notifier: N,
    ) -> Result<Self, NotifyError> {
        if config.enabled {
            Self::spawn(notifier, config.queue_capacity)
        } else {
            Ok(Self::disabled())
        }
    }

    /// Whether prompts reach a worker.
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queues one prompt without blocking.
    pub fn send(&mut self, prompt: &Prompt) -> Result<(), NotifyError> {
        let Some(sender) = &self.sender else {
            tracing::trace!(prompt = %prompt, "Notifications disabled");
            return Ok(());
        };

        match sender.try_send(prompt.to_string()) {
            Ok(()) => {
                self.queued += 1;
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.rejected += 1;
                Err(NotifyError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NotifyError::Closed),
        }
    }

    /// Prompts accepted into the queue.
    pub fn queued(&self) -> u64 {
        self.queued
    }

    /// Prompts rejected because the queue was full.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Closes the queue, waits for pending prompts, and returns how many
    /// were delivered. Idempotent.
    pub fn shutdown(&mut self) -> u64 {
        // Dropping the sender ends the worker's receive loop
        self.sender.take();
        match self.worker.take() {
            Some(worker) => match worker.join() {
                Ok(delivered) => {
                    tracing::debug!(delivered, "Notification worker stopped");
                    delivered
                }
                Err(_) => {
                    tracing::warn!("Notification worker panicked");
                    0
                }
            },
            None => 0,
        }
    }
}

impl Drop for NotificationSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}
