//! Loop-closing GIF assembly
//!
//! A turntable of `n` frames covers angles `0..2π` exclusive. Played as-is
//! the last frame jumps straight back to the first; appending a copy of
//! frame 0 lets the animation settle on the start pose before it repeats.

use crate::encode::{Disposal, FrameEncoder, FrameOptions, GifBlob};
use crate::error::{Error, Result};
use crate::turntable::{CAPTURE_PROGRESS_SPAN, FrameSequence};

/// Overall progress once encoding finishes.
const COMPLETE: u32 = 100;

/// Feeds a captured sequence to an encoder in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopClosingAssembler {
    pub delay_ms: u16,
    pub dispose: Disposal,
}

impl Default for LoopClosingAssembler {
    fn default() -> Self {
        Self {
            delay_ms: 80,
            dispose: Disposal::RestoreBackground,
        }
    }
}

impl LoopClosingAssembler {
    #[must_use]
    pub fn new(delay_ms: u16) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    /// Close the loop and encode every frame.
    ///
    /// `progress` receives overall percentages in `[50, 100]`, never
    /// decreasing.
    ///
    /// # Errors
    /// - [`Error::EmptyFrameSequence`] if `frames` is empty.
    /// - [`Error::EncoderAborted`] if the encoder rejects a frame or fails.
    /// - [`Error::Image`] if a captured frame cannot be decoded.
    pub fn assemble(
        &self,
        frames: &mut FrameSequence,
        encoder: &mut dyn FrameEncoder,
        progress: &mut dyn FnMut(u32),
    ) -> Result<GifBlob> {
        frames.close_loop()?;
        tracing::info!("Encoding {} frames (loop closed)", frames.len());

        let options = FrameOptions {
            delay_ms: self.delay_ms,
            dispose: self.dispose,
        };
        for frame in frames.frames() {
            let image = frame.decode()?;
            encoder
                .add_frame(&image, options)
                .map_err(|abort| Error::EncoderAborted {
                    reason: abort.reason,
                })?;
        }

        let mut reported = CAPTURE_PROGRESS_SPAN;
        progress(reported);
        let blob = encoder
            .render(&mut |fraction| {
                let percent = encoding_progress(fraction).max(reported);
                if percent != reported {
                    reported = percent;
                    progress(percent);
                }
            })
            .map_err(|abort| Error::EncoderAborted {
                reason: abort.reason,
            })?;

        if reported < COMPLETE {
            progress(COMPLETE);
        }
        tracing::info!("GIF encoded: {} bytes", blob.len());
        Ok(blob)
    }
}

/// Map an encoder fraction to overall progress: `round(50 + p × 50)`, clamped.
#[must_use]
pub fn encoding_progress(fraction: f32) -> u32 {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let span = COMPLETE - CAPTURE_PROGRESS_SPAN;
    (f64::from(CAPTURE_PROGRESS_SPAN) + f64::from(fraction) * f64::from(span)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::EncoderAbort;
    use crate::render::CapturedFrame;
    use image::{Rgba, RgbaImage};

    /// Records submissions and replays scripted progress.
    #[derive(Default)]
    struct RecordingEncoder {
        submitted: Vec<(RgbaImage, FrameOptions)>,
        fractions: Vec<f32>,
        fail: Option<String>,
    }

    impl FrameEncoder for RecordingEncoder {
        fn add_frame(
            &mut self,
            frame: &RgbaImage,
            options: FrameOptions,
        ) -> std::result::Result<(), EncoderAbort> {
            self.submitted.push((frame.clone(), options));
            Ok(())
        }

        fn render(
            &mut self,
            progress: &mut dyn FnMut(f32),
        ) -> std::result::Result<GifBlob, EncoderAbort> {
            for &fraction in &self.fractions {
                progress(fraction);
            }
            match &self.fail {
                Some(reason) => Err(EncoderAbort::new(reason.clone())),
                None => Ok(GifBlob::new(b"GIF89a".to_vec())),
            }
        }
    }

    fn sequence(shades: &[u8]) -> FrameSequence {
        let mut sequence = FrameSequence::new();
        for &shade in shades {
            let image = RgbaImage::from_pixel(2, 2, Rgba([shade, shade, shade, 255]));
            sequence.push(CapturedFrame::from_image(&image).unwrap());
        }
        sequence
    }

    #[test]
    fn test_encoding_progress_bounds() {
        assert_eq!(encoding_progress(0.0), 50);
        assert_eq!(encoding_progress(0.5), 75);
        assert_eq!(encoding_progress(1.0), 100);
        assert_eq!(encoding_progress(-3.0), 50);
        assert_eq!(encoding_progress(7.0), 100);
        assert_eq!(encoding_progress(f32::NAN), 50);
    }

    #[test]
    fn test_frames_submitted_in_order_with_loop_frame() {
        let mut frames = sequence(&[10, 20, 30]);
        let mut encoder = RecordingEncoder::default();
        let blob = LoopClosingAssembler::default()
            .assemble(&mut frames, &mut encoder, &mut |_| {})
            .unwrap();

        assert_eq!(blob.mime_type, "image/gif");
        let shades: Vec<u8> = encoder
            .submitted
            .iter()
            .map(|(image, _)| image.get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(shades, vec![10, 20, 30, 10]);
        assert!(encoder.submitted.iter().all(|(_, o)| *o
            == FrameOptions {
                delay_ms: 80,
                dispose: Disposal::RestoreBackground,
            }));
    }

    #[test]
    fn test_progress_is_clamped_and_monotonic() {
        let mut frames = sequence(&[0]);
        let mut encoder = RecordingEncoder {
            fractions: vec![0.2, 0.1, 1.5, 0.9],
            ..RecordingEncoder::default()
        };
        let mut reported = Vec::new();
        LoopClosingAssembler::default()
            .assemble(&mut frames, &mut encoder, &mut |p| reported.push(p))
            .unwrap();

        assert_eq!(reported, vec![50, 60, 100]);
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let mut encoder = RecordingEncoder::default();
        let err = LoopClosingAssembler::default()
            .assemble(&mut FrameSequence::new(), &mut encoder, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, Error::EmptyFrameSequence));
        assert!(encoder.submitted.is_empty());
    }

    #[test]
    fn test_encoder_abort_is_classified() {
        let mut frames = sequence(&[0, 1]);
        let mut encoder = RecordingEncoder {
            fail: Some("out of workers".to_string()),
            ..RecordingEncoder::default()
        };
        let err = LoopClosingAssembler::new(40)
            .assemble(&mut frames, &mut encoder, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, Error::EncoderAborted { reason } if reason == "out of workers"));
    }
}
