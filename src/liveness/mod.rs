//! Liveness detection from eye landmarks.
//!
//! A photo held up to the camera does not blink. The tracker counts blinks
//! from the eye aspect ratio and confirms liveness after a configured number.

mod ear;
mod tracker;

pub use ear::{EyeLandmarks, EyePair, Landmark, DEGENERATE_EAR};
pub use tracker::{EyeAspectRatioTracker, LivenessParams, LivenessState};

#[cfg(test)]
pub(crate) use ear::fixtures;
