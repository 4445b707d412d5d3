//! Eye landmark geometry and the eye aspect ratio.
//!
//! EAR = (‖p2−p6‖ + ‖p3−p5‖) / (2·‖p1−p4‖), computed on pixel
//! coordinates. p1/p4 are the eye corners, p2/p3 the upper lid and
//! p6/p5 the lower lid.

/// EAR reported when the eye corners collapse onto each other.
pub const DEGENERATE_EAR: f64 = 0.3;

/// A landmark in fractional image coordinates (0.0..=1.0 on each axis).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    /// Fraction of frame width.
    pub x: f64,
    /// Fraction of frame height.
    pub y: f64,
}

impl Landmark {
    /// Creates a landmark from fractional coordinates.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whole-pixel position in a frame of the given size.
    ///
    /// Truncates toward zero, as the capture pipeline reports integer pixels.
    #[inline]
    pub fn to_pixel(self, frame_w: u32, frame_h: u32) -> (f64, f64) {
        (
            (self.x * f64::from(frame_w)).trunc(),
            (self.y * f64::from(frame_h)).trunc(),
        )
    }
}

/// The six EAR landmarks of one eye, ordered p1..p6.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EyeLandmarks(pub [Landmark; 6]);

impl EyeLandmarks {
    /// Eye aspect ratio in pixel space.
    ///
    /// Returns [`DEGENERATE_EAR`] instead of dividing by a zero-width eye.
    pub fn aspect_ratio(&self, frame_w: u32, frame_h: u32) -> f64 {
        let [p1, p2, p3, p4, p5, p6] = self.0.map(|p| p.to_pixel(frame_w, frame_h));

        let vertical_a = distance(p2, p6);
        let vertical_b = distance(p3, p5);
        let horizontal = distance(p1, p4);

        if horizontal < f64::EPSILON {
            return DEGENERATE_EAR;
        }

        let ear = (vertical_a + vertical_b) / (2.0 * horizontal);
        if ear.is_finite() {
            ear
        } else {
            DEGENERATE_EAR
        }
    }

    /// Iterates the landmark positions in whole pixels.
    pub fn pixel_points(&self, frame_w: u32, frame_h: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.0.iter().map(move |p| {
            let (x, y) = p.to_pixel(frame_w, frame_h);
            (x.max(0.0) as u32, y.max(0.0) as u32)
        })
    }
}

/// Landmarks for both eyes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EyePair {
    /// Subject's left eye.
    pub left: EyeLandmarks,
    /// Subject's right eye.
    pub right: EyeLandmarks,
}

impl EyePair {
    /// Creates a pair from per-eye landmarks.
    pub const fn new(left: EyeLandmarks, right: EyeLandmarks) -> Self {
        Self { left, right }
    }

    /// Mean EAR of both eyes.
    pub fn mean_aspect_ratio(&self, frame_w: u32, frame_h: u32) -> f64 {
        let left = self.left.aspect_ratio(frame_w, frame_h);
        let right = self.right.aspect_ratio(frame_w, frame_h);
        (left + right) / 2.0
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Frame edge used by the fixtures; a power of two keeps
    /// fractional coordinates exact.
    pub const FRAME: u32 = 1024;

    fn px(v: f64) -> f64 {
        v / f64::from(FRAME)
    }

    /// An eye 400px wide whose lids are `gap` pixels apart.
    pub fn eye_with_gap(gap: f64) -> EyeLandmarks {
        let top = 500.0 - gap / 2.0;
        let bottom = 500.0 + gap / 2.0;
        EyeLandmarks([
            Landmark::new(px(100.0), px(500.0)),
            Landmark::new(px(200.0), px(top)),
            Landmark::new(px(400.0), px(top)),
            Landmark::new(px(500.0), px(500.0)),
            Landmark::new(px(400.0), px(bottom)),
            Landmark::new(px(200.0), px(bottom)),
        ])
    }

    /// Both eyes with (approximately) the requested EAR.
    pub fn eyes_with_ear(ear: f64) -> EyePair {
        let gap = (ear * 400.0).round();
        EyePair::new(eye_with_gap(gap), eye_with_gap(gap))
    }

    pub fn open_eyes() -> EyePair {
        eyes_with_ear(0.3)
    }

    pub fn closed_eyes() -> EyePair {
        eyes_with_ear(0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_ear_matches_geometry() {
        let eye = eye_with_gap(120.0);
        let ear = eye.aspect_ratio(FRAME, FRAME);
        assert!((ear - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_pair_averages_both_eyes() {
        let pair = EyePair::new(eye_with_gap(40.0), eye_with_gap(120.0));
        let ear = pair.mean_aspect_ratio(FRAME, FRAME);
        assert!((ear - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_collapsed_corners_use_sentinel() {
        let eye = EyeLandmarks([Landmark::new(0.5, 0.5); 6]);
        assert_eq!(eye.aspect_ratio(640, 480), DEGENERATE_EAR);
    }

    #[test]
    fn test_zero_sized_frame_uses_sentinel() {
        let eye = eye_with_gap(120.0);
        assert_eq!(eye.aspect_ratio(0, 0), DEGENERATE_EAR);
    }

    #[test]
    fn test_pixel_points_truncate() {
        let eye = EyeLandmarks([Landmark::new(0.999, 0.501); 6]);
        let points: Vec<_> = eye.pixel_points(100, 100).collect();
        assert_eq!(points[0], (99, 50));
    }
}
