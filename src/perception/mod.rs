//! Perception events and frames.
//!
//! This module defines what the external face pipeline hands to the
//! controller each frame. Detection, landmark extraction and identity
//! matching happen outside the crate; only their results arrive here.

mod demo;
mod event;
mod frame;
mod source;

pub use demo::DemoSource;
pub use event::{
    confidence_from_distance, FrameSize, IdentityMatch, PerceptionEvent, MAX_MATCH_DISTANCE,
};
pub use frame::{Frame, PixelFormat};
pub use source::{PerceptionError, PerceptionSource, ScriptStep, ScriptedSource};
