//! Per-frame output of the perception pipeline.

use super::Frame;
use crate::liveness::EyePair;

/// Matcher distance that maps to zero confidence.
pub const MAX_MATCH_DISTANCE: f64 = 300.0;

/// Converts a matcher distance into a confidence percentage.
///
/// `round((1 - d / 300) * 100)`. Distances outside `[0, 300]` produce
/// values above 100 or below 0; they are passed through unclamped.
pub fn confidence_from_distance(distance: f64) -> i32 {
    ((1.0 - distance / MAX_MATCH_DISTANCE) * 100.0).round() as i32
}

/// Best identity candidate for the face in view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMatch {
    /// Enrolled user name, or `Unknown` if the label is not enrolled.
    pub user_id: String,
    /// Match confidence in percent (may exceed `0..=100`).
    pub confidence_pct: i32,
}

impl IdentityMatch {
    /// Creates a match with an explicit confidence.
    pub fn new(user_id: impl Into<String>, confidence_pct: i32) -> Self {
        Self {
            user_id: user_id.into(),
            confidence_pct,
        }
    }

    /// Creates a match from a raw matcher distance.
    pub fn from_distance(user_id: impl Into<String>, distance: f64) -> Self {
        Self::new(user_id, confidence_from_distance(distance))
    }

    /// Whether the match is good enough to count as a known user.
    #[inline]
    pub fn meets(&self, threshold: i32) -> bool {
        self.confidence_pct >= threshold
    }
}

/// Pixel dimensions of the frame an event was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameSize {
    /// Creates an empty instance.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

/// Everything the controller learns from one video frame.
#[derive(Debug, Clone, Default)]
pub struct PerceptionEvent {
    /// A face was detected.
    pub face_present: bool,
    /// Eye landmarks for the liveness check, if the mesh produced them.
    pub eye_landmarks: Option<EyePair>,
    /// Identity candidate, if the matcher ran.
    pub identity: Option<IdentityMatch>,
    /// Dimensions used to project landmarks into pixels.
    pub frame_size: FrameSize,
    /// The captured frame, when the pipeline forwards it.
    pub frame: Option<Frame>,
}

impl PerceptionEvent {
    /// An empty scene.
    pub fn absent(frame_size: FrameSize) -> Self {
        Self {
            frame_size,
            ..Default::default()
        }
    }

    /// A face with nothing else known yet.
    pub fn face(frame_size: FrameSize) -> Self {
        Self {
            face_present: true,
            frame_size,
            ..Default::default()
        }
    }

    /// Attaches eye landmarks.
    pub fn with_eyes(mut self, eyes: EyePair) -> Self {
        self.eye_landmarks = Some(eyes);
        self
    }

    /// Attaches an identity candidate.
    pub fn with_identity(mut self, identity: IdentityMatch) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Attaches the captured frame and takes its dimensions.
    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frame_size = FrameSize::new(frame.width(), frame.height());
        self.frame = Some(frame);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_confidence_reference_points() {
        assert_eq!(confidence_from_distance(60.0), 80);
        assert_eq!(confidence_from_distance(0.0), 100);
        assert_eq!(confidence_from_distance(300.0), 0);
    }

    #[test]
    fn test_confidence_is_unclamped() {
        assert_eq!(confidence_from_distance(450.0), -50);
        assert_eq!(confidence_from_distance(-30.0), 110);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let at = IdentityMatch::from_distance("alice", 42.0); // 86%
        assert_eq!(at.confidence_pct, 86);
        assert!(at.meets(86));
        assert!(!at.meets(87));
    }

    #[test]
    fn test_with_frame_takes_dimensions() {
        let event = PerceptionEvent::face(FrameSize::default()).with_frame(Frame::blank(320, 240, 7));
        assert_eq!(event.frame_size, FrameSize::new(320, 240));
        assert!(event.frame.is_some());
    }

    proptest! {
        #[test]
        fn confidence_decreases_with_distance(a in 0.0f64..600.0, b in 0.0f64..600.0) {
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(confidence_from_distance(near) >= confidence_from_distance(far));
        }
    }
}
