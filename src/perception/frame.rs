//! Frame type carried alongside perception events.

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel.
    Gray8,
    /// Three bytes per pixel, R G B.
    Rgb8,
}

impl PixelFormat {
    /// Bytes used by one pixel.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// A single captured frame from the perception pipeline.
///
/// The controller never inspects pixels for decisions; frames are kept
/// only for alert snapshots and for the presentation feed.
#[derive(Clone)]
pub struct Frame {
    /// Raw pixel data, row-major.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    format: PixelFormat,
    /// Position in the pipeline's frame stream.
    sequence: u64,
}

impl Frame {
    /// Wraps a pixel buffer handed over by the pipeline.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
            sequence,
        }
    }

    /// Creates a black grayscale frame.
    pub fn blank(width: u32, height: u32, sequence: u64) -> Self {
        let len = (width as usize) * (height as usize);
        Self::new(vec![0u8; len], width, height, PixelFormat::Gray8, sequence)
    }

    /// Row-major pixel bytes.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Position in the frame stream.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether the buffer length agrees with the dimensions and format.
    pub fn is_valid(&self) -> bool {
        let expected = (self.width as usize) * (self.height as usize) * self.format.bytes_per_pixel();
        self.pixels.len() == expected
    }

    /// Paints single-pixel markers at the given pixel coordinates.
    ///
    /// Points outside the frame are skipped. Markers are white in grayscale
    /// and green in RGB, matching the landmark overlay of the live view.
    pub fn mark_points(&mut self, points: impl IntoIterator<Item = (u32, u32)>) {
        if !self.is_valid() {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        for (x, y) in points {
            if x >= self.width || y >= self.height {
                continue;
            }
            let offset = ((y as usize) * (self.width as usize) + x as usize) * bpp;
            match self.format {
                PixelFormat::Gray8 => self.pixels[offset] = 255,
                PixelFormat::Rgb8 => self.pixels[offset..offset + 3].copy_from_slice(&[0, 255, 0]),
            }
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_is_gray() {
        let frame = Frame::blank(640, 480, 7);

        assert_eq!(frame.format(), PixelFormat::Gray8);
        assert_eq!(frame.pixels().len(), 640 * 480);
        assert_eq!(frame.sequence(), 7);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_buffer_must_match_format() {
        let pixels = vec![0u8; 640 * 480]; // Gray-sized buffer declared as RGB
        let frame = Frame::new(pixels, 640, 480, PixelFormat::Rgb8, 1);

        assert!(!frame.is_valid());
    }

    #[test]
    fn test_mark_points_skips_out_of_bounds() {
        let mut frame = Frame::blank(4, 4, 1);
        frame.mark_points([(1, 2), (9, 9)]);

        assert_eq!(frame.pixels()[2 * 4 + 1], 255);
        assert_eq!(frame.pixels().iter().filter(|&&p| p == 255).count(), 1);
    }
}
