//! Perception source abstraction.
//!
//! The face detector, landmark mesh and identity matcher run outside this
//! crate. A source hands the controller one event per captured frame.

use super::PerceptionEvent;
use std::collections::VecDeque;
use thiserror::Error;

/// Errors a perception source can report.
#[derive(Debug, Error)]
pub enum PerceptionError {
    /// The camera went away.
    #[error("camera feed lost: {0}")]
    FeedLost(String),
    /// No frame within the given milliseconds.
    #[error("no frame within {0} ms")]
    Stalled(u64),
}

/// Trait for perception pipeline implementations.
pub trait PerceptionSource {
    /// Produces the event for the next frame.
    ///
    /// `Ok(None)` means the source is finished and the session should end.
    /// An error is a perception gap: the caller holds state and retries.
    fn next_event(&mut self) -> Result<Option<PerceptionEvent>, PerceptionError>;
}

/// One scripted step.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Deliver this event.
    Event(PerceptionEvent),
    /// Report a camera stall.
    Gap,
}

/// Replays a fixed sequence of events, for tests and the demo binary.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
    delivered: u64,
}

impl ScriptedSource {
    /// An empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source from a list of events.
    pub fn from_events(events: impl IntoIterator<Item = PerceptionEvent>) -> Self {
        Self {
            steps: events.into_iter().map(ScriptStep::Event).collect(),
            delivered: 0,
        }
    }

    /// Appends one event.
    pub fn push(&mut self, event: PerceptionEvent) -> &mut Self {
        self.steps.push_back(ScriptStep::Event(event));
        self
    }

    /// Appends the same event `count` times.
    pub fn repeat(&mut self, event: PerceptionEvent, count: usize) -> &mut Self {
        for _ in 0..count {
            self.steps.push_back(ScriptStep::Event(event.clone()));
        }
        self
    }

    /// Appends a camera stall.
    pub fn push_gap(&mut self) -> &mut Self {
        self.steps.push_back(ScriptStep::Gap);
        self
    }

    /// Steps not yet delivered.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    /// Events delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl PerceptionSource for ScriptedSource {
    fn next_event(&mut self) -> Result<Option<PerceptionEvent>, PerceptionError> {
        match self.steps.pop_front() {
            Some(ScriptStep::Event(event)) => {
                self.delivered += 1;
                Ok(Some(event))
            }
            Some(ScriptStep::Gap) => Err(PerceptionError::FeedLost("scripted stall".into())),
            None => Ok(None),
        }
    }
}
