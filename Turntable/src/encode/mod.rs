//! Frame encoding
//!
//! [`FrameEncoder`] takes RGBA frames one at a time, in display order, and
//! produces a [`GifBlob`] when asked to render. Encoders report their own
//! progress as a fraction in `[0, 1]` and abort with an [`EncoderAbort`].

mod gif;

use image::RgbaImage;
use thiserror::Error;

use crate::config::Rgb;

pub use self::gif::GifFrameEncoder;

/// MIME type of every blob produced by [`GifFrameEncoder`].
pub const GIF_MIME_TYPE: &str = "image/gif";

/// How a frame is cleared before the next one is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposal {
    /// Leave the frame in place.
    Keep,
    /// Clear the frame's area to the background before the next frame.
    #[default]
    RestoreBackground,
}

/// Animation loop count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Repeat {
    #[default]
    Infinite,
    Finite(u16),
}

/// Per-frame timing and disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOptions {
    pub delay_ms: u16,
    pub dispose: Disposal,
}

impl FrameOptions {
    /// Delay in GIF units (hundredths of a second), rounded to nearest.
    ///
    /// A positive delay never rounds down to 0, which decoders treat as
    /// "use your own default".
    #[must_use]
    pub fn delay_centiseconds(&self) -> u16 {
        if self.delay_ms == 0 {
            return 0;
        }
        (self.delay_ms.saturating_add(5) / 10).max(1)
    }
}

/// Encoder settings fixed for the lifetime of one encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub width: u16,
    pub height: u16,
    /// Threads used for color quantization.
    pub workers: usize,
    /// Quantizer sample interval, 1 (best) to 30 (fastest).
    pub quality: i32,
    /// Color made transparent in every frame, if any.
    pub transparent: Option<Rgb>,
    pub repeat: Repeat,
}

impl EncoderConfig {
    /// Looping, opaque configuration for square frames.
    #[must_use]
    pub fn square(size: u16, workers: usize, quality: i32) -> Self {
        Self {
            width: size,
            height: size,
            workers,
            quality,
            transparent: None,
            repeat: Repeat::Infinite,
        }
    }
}

/// An encoded animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifBlob {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl GifBlob {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: GIF_MIME_TYPE,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Why an encoder gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct EncoderAbort {
    pub reason: String,
}

impl EncoderAbort {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Accepts frames in order and renders them into an animation.
pub trait FrameEncoder {
    /// Queue the next frame.
    ///
    /// # Errors
    /// Returns [`EncoderAbort`] if the frame cannot be accepted.
    fn add_frame(&mut self, frame: &RgbaImage, options: FrameOptions) -> Result<(), EncoderAbort>;

    /// Encode every queued frame. `progress` receives fractions in `[0, 1]`.
    ///
    /// # Errors
    /// Returns [`EncoderAbort`] if encoding fails.
    fn render(&mut self, progress: &mut dyn FnMut(f32)) -> Result<GifBlob, EncoderAbort>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_rounds_to_centiseconds() {
        let options = |delay_ms| FrameOptions {
            delay_ms,
            dispose: Disposal::RestoreBackground,
        };
        assert_eq!(options(80).delay_centiseconds(), 8);
        assert_eq!(options(84).delay_centiseconds(), 8);
        assert_eq!(options(85).delay_centiseconds(), 9);
        assert_eq!(options(u16::MAX).delay_centiseconds(), 6553);
    }

    #[test]
    fn test_short_delay_stays_positive() {
        let options = |delay_ms| FrameOptions {
            delay_ms,
            dispose: Disposal::RestoreBackground,
        };
        assert_eq!(options(1).delay_centiseconds(), 1);
        assert_eq!(options(4).delay_centiseconds(), 1);
        assert_eq!(options(0).delay_centiseconds(), 0);
    }

    #[test]
    fn test_blob_carries_gif_mime() {
        let blob = GifBlob::new(b"GIF89a".to_vec());
        assert_eq!(blob.mime_type, "image/gif");
        assert_eq!(blob.len(), 6);
    }
}
