//! Render-to-bitmap
//!
//! [`Renderer`] is the seam between the pipeline and whatever draws the
//! scene. [`SoftwareRenderer`] is the CPU implementation used by the CLI and
//! the tests; it needs no GPU or window.

mod color;
mod raster;

use image::RgbaImage;

use crate::camera::Camera;
use crate::config::Rgb;
use crate::error::{Error, Result};
use crate::scene::Scene;

pub use raster::SoftwareRenderer;

/// A rendered frame encoded as PNG.
///
/// Equality is byte equality of the encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl CapturedFrame {
    /// Encode an RGBA image as a PNG frame.
    ///
    /// # Errors
    /// Returns an error if PNG encoding fails.
    pub fn from_image(image: &RgbaImage) -> Result<Self> {
        let mut png = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut png);
        image.write_with_encoder(encoder)?;
        Ok(Self {
            width: image.width(),
            height: image.height(),
            png,
        })
    }

    /// Decode back to RGBA pixels.
    ///
    /// # Errors
    /// Returns an error if the PNG data is corrupt or has unexpected dimensions.
    pub fn decode(&self) -> Result<RgbaImage> {
        let image =
            image::load_from_memory_with_format(&self.png, image::ImageFormat::Png)?.to_rgba8();
        if image.dimensions() != (self.width, self.height) {
            return Err(Error::Render(format!(
                "captured frame is {}x{}, expected {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            )));
        }
        Ok(image)
    }
}

/// Draws a [`Scene`] into an offscreen surface.
pub trait Renderer {
    /// Output size in pixels.
    fn size(&self) -> (u32, u32);

    fn set_clear_color(&mut self, color: Rgb);

    /// Reset the surface to the clear color and discard depth.
    fn clear(&mut self);

    /// Draw `scene` as seen from `camera` over the current surface contents.
    ///
    /// # Errors
    /// Returns an error if the scene cannot be drawn.
    fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<()>;

    /// Copy the surface out as a PNG frame.
    ///
    /// # Errors
    /// Returns an error if the surface cannot be encoded.
    fn capture_bitmap(&self) -> Result<CapturedFrame>;
}
