//! Animated GIF encoding with NeuQuant quantization on a worker pool.

use ::gif::{DisposalMethod, Encoder, Frame};
use image::RgbaImage;
use rayon::prelude::*;

use super::{
    Disposal, EncoderAbort, EncoderConfig, FrameEncoder, FrameOptions, GifBlob, Repeat,
};

/// NeuQuant speed range accepted by the `gif` crate.
const SPEED_RANGE: std::ops::RangeInclusive<i32> = 1..=30;

struct PendingFrame {
    pixels: Vec<u8>,
    options: FrameOptions,
}

/// Buffers frames and encodes them into a looping GIF.
pub struct GifFrameEncoder {
    config: EncoderConfig,
    frames: Vec<PendingFrame>,
}

impl GifFrameEncoder {
    #[must_use]
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            frames: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn quantize(&self, pending: &mut PendingFrame) -> Frame<'static> {
        let speed = self.config.quality.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end());
        let mut frame = Frame::from_rgba_speed(
            self.config.width,
            self.config.height,
            &mut pending.pixels,
            speed,
        );
        frame.delay = pending.options.delay_centiseconds();
        frame.dispose = match pending.options.dispose {
            Disposal::Keep => DisposalMethod::Keep,
            Disposal::RestoreBackground => DisposalMethod::Background,
        };
        frame.transparent = self
            .config
            .transparent
            .and_then(|color| palette_index(&frame, color.0));
        frame
    }
}

/// Exact palette entry for `color`, if the quantizer kept one.
fn palette_index(frame: &Frame<'_>, color: [u8; 3]) -> Option<u8> {
    frame
        .palette
        .as_ref()?
        .chunks_exact(3)
        .position(|entry| entry == color)
        .and_then(|i| u8::try_from(i).ok())
}

impl FrameEncoder for GifFrameEncoder {
    fn add_frame(&mut self, frame: &RgbaImage, options: FrameOptions) -> Result<(), EncoderAbort> {
        let expected = (u32::from(self.config.width), u32::from(self.config.height));
        if frame.dimensions() != expected {
            return Err(EncoderAbort::new(format!(
                "frame {} is {}x{}, expected {}x{}",
                self.frames.len(),
                frame.width(),
                frame.height(),
                expected.0,
                expected.1
            )));
        }
        self.frames.push(PendingFrame {
            pixels: frame.as_raw().clone(),
            options,
        });
        Ok(())
    }

    fn render(&mut self, progress: &mut dyn FnMut(f32)) -> Result<GifBlob, EncoderAbort> {
        if self.frames.is_empty() {
            return Err(EncoderAbort::new("no frames to encode"));
        }
        if self.config.width == 0 || self.config.height == 0 {
            return Err(EncoderAbort::new("frame size must be non-zero"));
        }

        let workers = self.config.workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| EncoderAbort::new(format!("failed to start encoder workers: {e}")))?;

        let mut pending = std::mem::take(&mut self.frames);
        let total = pending.len();
        tracing::debug!(
            "Quantizing {} frame(s) on {} worker(s), quality {}",
            total,
            workers,
            self.config.quality
        );

        let mut quantized: Vec<Frame<'static>> = Vec::with_capacity(total);
        for batch in pending.chunks_mut(workers) {
            let frames: Vec<Frame<'static>> = pool.install(|| {
                batch
                    .par_iter_mut()
                    .map(|frame| self.quantize(frame))
                    .collect()
            });
            quantized.extend(frames);
            progress(quantized.len() as f32 / total as f32);
        }

        let mut bytes = Vec::new();
        let mut encoder = Encoder::new(&mut bytes, self.config.width, self.config.height, &[])
            .map_err(|e| EncoderAbort::new(format!("failed to start GIF stream: {e}")))?;
        let repeat = match self.config.repeat {
            Repeat::Infinite => ::gif::Repeat::Infinite,
            Repeat::Finite(count) => ::gif::Repeat::Finite(count),
        };
        encoder
            .set_repeat(repeat)
            .map_err(|e| EncoderAbort::new(format!("failed to set loop count: {e}")))?;
        for (index, frame) in quantized.iter().enumerate() {
            encoder
                .write_frame(frame)
                .map_err(|e| EncoderAbort::new(format!("failed to write frame {index}: {e}")))?;
        }
        encoder
            .into_inner()
            .map_err(|e| EncoderAbort::new(format!("failed to finish GIF stream: {e}")))?;

        progress(1.0);
        tracing::debug!("Encoded GIF: {} bytes", bytes.len());
        Ok(GifBlob::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn options() -> FrameOptions {
        FrameOptions {
            delay_ms: 80,
            dispose: Disposal::RestoreBackground,
        }
    }

    fn solid(color: [u8; 3]) -> RgbaImage {
        let [r, g, b] = color;
        RgbaImage::from_pixel(8, 8, Rgba([r, g, b, 255]))
    }

    #[test]
    fn test_encodes_looping_gif() {
        let mut encoder = GifFrameEncoder::new(EncoderConfig::square(8, 2, 10));
        for color in [[255, 0, 0], [0, 255, 0], [0, 0, 255]] {
            encoder.add_frame(&solid(color), options()).unwrap();
        }

        let mut reported = Vec::new();
        let blob = encoder.render(&mut |p| reported.push(p)).unwrap();
        assert!(blob.bytes.starts_with(b"GIF89a"));
        assert_eq!(blob.mime_type, "image/gif");
        assert!(reported.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(reported.last(), Some(&1.0));

        let mut decoder = ::gif::DecodeOptions::new()
            .read_info(blob.bytes.as_slice())
            .unwrap();
        let mut delays = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            delays.push((frame.delay, frame.dispose));
        }
        assert_eq!(delays, vec![(8, DisposalMethod::Background); 3]);
        assert!(blob.bytes.windows(11).any(|w| w == b"NETSCAPE2.0"));
    }

    #[test]
    fn test_wrong_frame_size_aborts() {
        let mut encoder = GifFrameEncoder::new(EncoderConfig::square(4, 1, 10));
        let err = encoder.add_frame(&solid([0, 0, 0]), options()).unwrap_err();
        assert!(err.reason.contains("expected 4x4"));
    }

    #[test]
    fn test_empty_render_aborts() {
        let mut encoder = GifFrameEncoder::new(EncoderConfig::square(4, 1, 10));
        assert!(encoder.render(&mut |_| {}).is_err());
    }
}
