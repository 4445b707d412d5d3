//! Synthetic perception feed for running the controller without a camera.

use super::{Frame, FrameSize, IdentityMatch, PerceptionError, PerceptionEvent, PerceptionSource};
use crate::config::AccessConfig;
use crate::liveness::{EyeLandmarks, EyePair, Landmark};
use std::time::Duration;

const SIZE: FrameSize = FrameSize::new(640, 480);
const SNAPSHOT_SIZE: (u32, u32) = (160, 120);

/// Lid gaps of the synthetic eyes, in pixels.
const OPEN_GAP_PX: f64 = 19.0;
const CLOSED_GAP_PX: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Empty,
    Blinking,
    Resident,
    Away,
    Stranger,
}

/// Plays a visitor scenario on a loop: an enrolled resident blinks, is
/// let in and walks away; then a stranger blinks and lingers.
///
/// Phase lengths are counted in frames and derived from the access
/// timings, so each phase lasts at least as long as the timer it exercises.
#[derive(Debug)]
pub struct DemoSource {
    plan: Vec<(Phase, u64)>,
    resident: String,
    closed_run: u32,
    frame: u64,
    total_frames: u64,
}

impl DemoSource {
    /// Creates a feed that ends after `duration` of frames at `frame_interval`.
    pub fn new(config: &AccessConfig, frame_interval: Duration, duration: Duration) -> Self {
        let interval = frame_interval.max(Duration::from_millis(1));
        let frames_for = |d: Duration| d.as_nanos().div_ceil(interval.as_nanos()) as u64;
        let blink_frames = u64::from(config.liveness_blinks) * u64::from(config.ear_consec_frames + 1);
        let second = Duration::from_secs(1);

        let plan = vec![
            (Phase::Empty, frames_for(second)),
            (Phase::Blinking, blink_frames),
            (Phase::Resident, frames_for(config.intent_time().saturating_add(second / 2))),
            (Phase::Away, frames_for(config.countdown().saturating_add(second))),
            (Phase::Blinking, blink_frames),
            (Phase::Stranger, frames_for(config.loiter_time().saturating_add(second))),
            (Phase::Empty, frames_for(second)),
        ];

        Self {
            plan,
            resident: "resident".to_string(),
            closed_run: config.ear_consec_frames,
            frame: 0,
            total_frames: frames_for(duration),
        }
    }

    /// Name reported for the enrolled visitor.
    pub fn with_resident(mut self, name: impl Into<String>) -> Self {
        self.resident = name.into();
        self
    }

    /// Frames in one pass of the scenario.
    pub fn cycle_len(&self) -> u64 {
        self.plan.iter().map(|(_, n)| n).sum()
    }

    fn phase_at(&self, frame: u64) -> (Phase, u64) {
        let cycle = self.cycle_len().max(1);
        let mut offset = frame % cycle;
        for &(phase, len) in &self.plan {
            if offset < len {
                return (phase, offset);
            }
            offset -= len;
        }
        (Phase::Empty, 0)
    }

    fn event_for(&self, phase: Phase, offset: u64) -> PerceptionEvent {
        match phase {
            Phase::Empty | Phase::Away => PerceptionEvent::absent(SIZE),
            Phase::Blinking => {
                // `closed_run` closed frames, then one open frame
                let period = u64::from(self.closed_run) + 1;
                let closed = offset % period < u64::from(self.closed_run);
                let gap = if closed { CLOSED_GAP_PX } else { OPEN_GAP_PX };
                PerceptionEvent::face(SIZE).with_eyes(eyes(gap))
            }
            Phase::Resident => PerceptionEvent::face(SIZE)
                .with_eyes(eyes(OPEN_GAP_PX))
                .with_identity(IdentityMatch::from_distance(self.resident.clone(), 27.0)),
            Phase::Stranger => {
                let event = PerceptionEvent::face(SIZE)
                    .with_eyes(eyes(OPEN_GAP_PX))
                    .with_identity(IdentityMatch::from_distance("Unknown", 180.0));
                PerceptionEvent {
                    frame: Some(gradient(self.frame)),
                    ..event
                }
            }
        }
    }
}

impl PerceptionSource for DemoSource {
    fn next_event(&mut self) -> Result<Option<PerceptionEvent>, PerceptionError> {
        if self.frame >= self.total_frames {
            return Ok(None);
        }
        let (phase, offset) = self.phase_at(self.frame);
        let event = self.event_for(phase, offset);
        self.frame += 1;
        Ok(Some(event))
    }
}

/// Both eyes 64 px wide with lids `gap` px apart, in a 640x480 frame.
fn eyes(gap: f64) -> EyePair {
    let eye = |left_px: f64| {
        let (w, h) = (f64::from(SIZE.width), f64::from(SIZE.height));
        let y = 200.0;
        let pt = |x: f64, y: f64| Landmark::new(x / w, y / h);
        EyeLandmarks([
            pt(left_px, y),
            pt(left_px + 20.0, y - gap / 2.0),
            pt(left_px + 44.0, y - gap / 2.0),
            pt(left_px + 64.0, y),
            pt(left_px + 44.0, y + gap / 2.0),
            pt(left_px + 20.0, y + gap / 2.0),
        ])
    };
    EyePair::new(eye(352.0), eye(224.0))
}

fn gradient(sequence: u64) -> Frame {
    let (w, h) = SNAPSHOT_SIZE;
    let pixels = (0..h)
        .flat_map(|y| (0..w).map(move |x| ((x + y) % 256) as u8))
        .collect();
    Frame::new(pixels, w, h, super::PixelFormat::Gray8, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(seconds: u64) -> DemoSource {
        DemoSource::new(
            &AccessConfig::default(),
            Duration::from_millis(100),
            Duration::from_secs(seconds),
        )
    }

    #[test]
    fn test_runs_for_requested_duration() {
        let mut demo = source(2);
        let mut count = 0;
        while demo.next_event().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 20);
    }

    #[test]
    fn test_synthetic_eyes_cross_threshold() {
        let open = eyes(OPEN_GAP_PX).mean_aspect_ratio(SIZE.width, SIZE.height);
        let closed = eyes(CLOSED_GAP_PX).mean_aspect_ratio(SIZE.width, SIZE.height);
        assert!(open > 0.25, "open EAR {open}");
        assert!(closed < 0.15, "closed EAR {closed}");
    }

    #[test]
    fn test_scenario_order() {
        let demo = source(600);
        // 1 s of empty frames at 10 fps, then the first blink phase
        assert_eq!(demo.phase_at(0).0, Phase::Empty);
        assert_eq!(demo.phase_at(10).0, Phase::Blinking);
        assert_eq!(demo.phase_at(16).0, Phase::Resident);
        assert!(demo.cycle_len() > 0);
        assert_eq!(demo.phase_at(demo.cycle_len()).0, Phase::Empty);
    }

    #[test]
    fn test_stranger_frames_carry_snapshot() {
        let demo = source(600);
        let event = demo.event_for(Phase::Stranger, 0);
        assert!(event.frame.as_ref().is_some_and(Frame::is_valid));
        assert!(!event.identity.unwrap().meets(86));
    }
}
