//! Blink counting on top of the eye aspect ratio.
//!
//! A blink is a run of at least `consec_frames` frames with EAR below the
//! closed threshold, terminated by an open frame. Liveness is confirmed once
//! enough blinks accumulate and stays confirmed until the owner resets it.

use super::ear::EyePair;
use crate::config::AccessConfig;

/// Per-subject liveness progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LivenessState {
    /// Blinks registered so far.
    pub blink_count: u32,
    /// Consecutive frames with eyes closed.
    pub eye_closed_run: u32,
    /// Whether enough blinks were seen.
    pub confirmed: bool,
}

impl LivenessState {
    /// A state with no progress.
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Clears all progress.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Liveness thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivenessParams {
    /// EAR below which eyes count as closed.
    pub closed_threshold: f64,
    /// Closed frames needed for one blink.
    pub consec_frames: u32,
    /// Blinks needed to confirm liveness.
    pub required_blinks: u32,
}

impl Default for LivenessParams {
    fn default() -> Self {
        Self {
            closed_threshold: 0.2,
            consec_frames: 2,
            required_blinks: 2,
        }
    }
}

impl From<&AccessConfig> for LivenessParams {
    fn from(config: &AccessConfig) -> Self {
        Self {
            closed_threshold: config.ear_threshold,
            consec_frames: config.ear_consec_frames.max(1),
            required_blinks: config.liveness_blinks.max(1),
        }
    }
}

/// Computes blinks from eye landmarks.
///
/// The tracker holds only thresholds; progress lives in a [`LivenessState`]
/// owned by the caller, so the lock state machine stays the single owner
/// of everything it resets.
#[derive(Debug, Clone, Default)]
pub struct EyeAspectRatioTracker {
    params: LivenessParams,
}

impl EyeAspectRatioTracker {
    /// Creates a tracker with the given thresholds.
    pub fn new(params: LivenessParams) -> Self {
        Self { params }
    }

    /// Returns the thresholds in use.
    pub fn params(&self) -> &LivenessParams {
        &self.params
    }

    /// Feeds one frame of landmarks. Returns true if this frame completed a blink.
    ///
    /// Once `state.confirmed` is set further updates leave it set.
    pub fn update(
        &self,
        state: &mut LivenessState,
        eyes: &EyePair,
        frame_w: u32,
        frame_h: u32,
    ) -> bool {
        let ear = eyes.mean_aspect_ratio(frame_w, frame_h);
        let blink = self.observe(state, ear);

        if blink {
            tracing::debug!(
                blinks = state.blink_count,
                required = self.params.required_blinks,
                "Blink detected"
            );
        }
        tracing::trace!(ear, closed_run = state.eye_closed_run, "EAR sample");

        blink
    }

    /// Advances the blink counter with a precomputed EAR.
    pub fn observe(&self, state: &mut LivenessState, ear: f64) -> bool {
        let mut blink = false;

        if ear < self.params.closed_threshold {
            state.eye_closed_run = state.eye_closed_run.saturating_add(1);
        } else {
            if state.eye_closed_run >= self.params.consec_frames {
                state.blink_count = state.blink_count.saturating_add(1);
                blink = true;
            }
            state.eye_closed_run = 0;
        }

        if state.blink_count >= self.params.required_blinks {
            state.confirmed = true;
        }

        blink
    }
}

#[cfg(test)]
mod tests {
    use super::super::ear::fixtures::{closed_eyes, open_eyes, FRAME};
    use super::*;
    use proptest::prelude::*;

    fn feed(tracker: &EyeAspectRatioTracker, state: &mut LivenessState, ears: &[f64]) -> u32 {
        ears.iter()
            .filter(|&&ear| tracker.observe(state, ear))
            .count() as u32
    }

    #[test]
    fn test_two_frame_dip_is_one_blink() {
        let tracker = EyeAspectRatioTracker::default();
        let mut state = LivenessState::fresh();

        let blinks = feed(&tracker, &mut state, &[0.3, 0.15, 0.1, 0.3, 0.3]);

        assert_eq!(blinks, 1);
        assert_eq!(state.blink_count, 1);
        assert_eq!(state.eye_closed_run, 0);
    }

    #[test]
    fn test_single_frame_dip_is_ignored() {
        let tracker = EyeAspectRatioTracker::default();
        let mut state = LivenessState::fresh();

        let blinks = feed(&tracker, &mut state, &[0.3, 0.1, 0.3, 0.3]);

        assert_eq!(blinks, 0);
        assert_eq!(state.blink_count, 0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let tracker = EyeAspectRatioTracker::default();
        let mut state = LivenessState::fresh();

        // Exactly 0.2 is "open"
        feed(&tracker, &mut state, &[0.2, 0.2, 0.2]);
        assert_eq!(state.eye_closed_run, 0);
    }

    #[test]
    fn test_confirmed_after_required_blinks() {
        let tracker = EyeAspectRatioTracker::default();
        let mut state = LivenessState::fresh();

        feed(&tracker, &mut state, &[0.1, 0.1, 0.3]);
        assert!(!state.confirmed);

        feed(&tracker, &mut state, &[0.1, 0.1, 0.3]);
        assert!(state.confirmed);
    }

    #[test]
    fn test_update_uses_landmarks() {
        let tracker = EyeAspectRatioTracker::default();
        let mut state = LivenessState::fresh();

        assert!(!tracker.update(&mut state, &closed_eyes(), FRAME, FRAME));
        assert!(!tracker.update(&mut state, &closed_eyes(), FRAME, FRAME));
        assert!(tracker.update(&mut state, &open_eyes(), FRAME, FRAME));
        assert_eq!(state.blink_count, 1);
    }

    #[test]
    fn test_reset_clears_progress() {
        let mut state = LivenessState {
            blink_count: 3,
            eye_closed_run: 1,
            confirmed: true,
        };
        state.reset();
        assert_eq!(state, LivenessState::fresh());
    }

    proptest! {
        #[test]
        fn confirmation_is_sticky(ears in proptest::collection::vec(0.0f64..0.5, 0..200)) {
            let tracker = EyeAspectRatioTracker::default();
            let mut state = LivenessState::fresh();
            let mut seen_confirmed = false;

            for ear in ears {
                tracker.observe(&mut state, ear);
                if seen_confirmed {
                    prop_assert!(state.confirmed);
                }
                seen_confirmed |= state.confirmed;
            }
        }

        #[test]
        fn blinks_never_exceed_open_transitions(ears in proptest::collection::vec(0.0f64..0.5, 0..200)) {
            let tracker = EyeAspectRatioTracker::default();
            let mut state = LivenessState::fresh();
            let opens = ears.iter().filter(|&&e| e >= 0.2).count() as u32;

            for ear in ears {
                tracker.observe(&mut state, ear);
            }
            prop_assert!(state.blink_count <= opens);
        }
    }
}
