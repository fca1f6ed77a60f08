//! Generation options and the TOML option file
//!
//! [`GenerationOptions`] is the snapshot of user controls taken when a job
//! starts. It is never polled again while the job runs.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest width/height a GIF logical screen can describe.
pub const MAX_IMAGE_SIZE: u32 = u16::MAX as u32;

fn default_frame_count() -> u32 {
    36
}

fn default_image_size() -> u32 {
    400
}

fn default_delay_ms() -> u16 {
    80
}

fn default_quality() -> i32 {
    10
}

fn default_workers() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_scale() -> f32 {
    1.0
}

/// An opaque 8-bit sRGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([0xff, 0xff, 0xff]);
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    /// The color as an RGBA pixel with full alpha.
    #[must_use]
    pub fn to_rgba(self) -> [u8; 4] {
        let [r, g, b] = self.0;
        [r, g, b, 255]
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || Error::InvalidColor(s.to_string());

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());

        match hex.len() {
            6 => Ok(Rgb([
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            ])),
            // #abc is shorthand for #aabbcc
            3 => Ok(Rgb([
                channel(&hex[0..1])? * 0x11,
                channel(&hex[1..2])? * 0x11,
                channel(&hex[2..3])? * 0x11,
            ])),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Rgb {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// Options for one generate-to-GIF run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Number of evenly spaced rotation frames (before loop closing).
    #[serde(default = "default_frame_count")]
    pub frame_count: u32,
    /// Width and height of the square output image in pixels.
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    #[serde(default)]
    pub background: Rgb,
    /// Per-frame delay. 80ms gives 12.5 fps.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u16,
    /// NeuQuant sampling factor, 1 (best) to 30 (fastest).
    #[serde(default = "default_quality")]
    pub quality: i32,
    /// Quantization worker threads inside the encoder.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_true")]
    pub antialias: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            frame_count: default_frame_count(),
            image_size: default_image_size(),
            background: Rgb::WHITE,
            delay_ms: default_delay_ms(),
            quality: default_quality(),
            workers: default_workers(),
            antialias: true,
        }
    }
}

impl GenerationOptions {
    /// Reject options that would produce a degenerate GIF.
    ///
    /// # Errors
    /// Returns [`Error::InvalidOptions`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.frame_count == 0 {
            return Err(Error::InvalidOptions(
                "frame count must be at least 1".to_string(),
            ));
        }
        if self.image_size == 0 || self.image_size > MAX_IMAGE_SIZE {
            return Err(Error::InvalidOptions(format!(
                "image size must be between 1 and {MAX_IMAGE_SIZE}, got {}",
                self.image_size
            )));
        }
        if self.delay_ms == 0 {
            return Err(Error::InvalidOptions(
                "frame delay must be positive".to_string(),
            ));
        }
        if !(1..=30).contains(&self.quality) {
            return Err(Error::InvalidOptions(format!(
                "quality must be between 1 and 30, got {}",
                self.quality
            )));
        }
        if self.workers == 0 {
            return Err(Error::InvalidOptions(
                "at least one encoder worker is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reject a user scale multiplier that is not a positive, finite number.
///
/// # Errors
/// Returns [`Error::InvalidOptions`] for zero, negative or non-finite scales.
pub fn validate_scale(scale: f32) -> Result<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidOptions(format!(
            "scale must be a positive number, got {scale}"
        )))
    }
}

/// On-disk option file.
///
/// ```toml
/// scale = 1.5
///
/// [generation]
/// frame_count = 24
/// background = "#202020"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurntableConfig {
    /// User multiplier applied on top of the normalized display scale.
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub generation: GenerationOptions,
}

impl Default for TurntableConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            generation: GenerationOptions::default(),
        }
    }
}

impl TurntableConfig {
    /// Parse a config from TOML text.
    ///
    /// # Errors
    /// Returns an error if the TOML is malformed or a field has the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loaded config from {}", path.as_ref().display());
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_colors() {
        assert_eq!("#ffffff".parse::<Rgb>().unwrap(), Rgb::WHITE);
        assert_eq!("000000".parse::<Rgb>().unwrap(), Rgb::BLACK);
        assert_eq!("#1a2B3c".parse::<Rgb>().unwrap(), Rgb([0x1a, 0x2b, 0x3c]));
        assert_eq!("#f80".parse::<Rgb>().unwrap(), Rgb([0xff, 0x88, 0x00]));
        assert!("#ff00".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
        assert!("red".parse::<Rgb>().is_err());
        assert_eq!(Rgb([0x1a, 0x2b, 0x3c]).to_string(), "#1a2b3c");
    }

    #[test]
    fn test_scale_must_be_positive() {
        assert!(validate_scale(1.5).is_ok());
        assert!(matches!(validate_scale(0.0), Err(Error::InvalidOptions(_))));
        assert!(validate_scale(-2.0).is_err());
        assert!(validate_scale(f32::INFINITY).is_err());
    }

    #[test]
    fn test_default_options_are_valid() {
        let options = GenerationOptions::default();
        assert_eq!(options.frame_count, 36);
        assert_eq!(options.image_size, 400);
        assert_eq!(options.background, Rgb::WHITE);
        assert_eq!(options.delay_ms, 80);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_invalid_options_rejected() {
        let zero_frames = GenerationOptions {
            frame_count: 0,
            ..GenerationOptions::default()
        };
        assert!(matches!(zero_frames.validate(), Err(Error::InvalidOptions(_))));

        let zero_size = GenerationOptions {
            image_size: 0,
            ..GenerationOptions::default()
        };
        assert!(matches!(zero_size.validate(), Err(Error::InvalidOptions(_))));

        let too_big = GenerationOptions {
            image_size: MAX_IMAGE_SIZE + 1,
            ..GenerationOptions::default()
        };
        assert!(too_big.validate().is_err());

        let bad_quality = GenerationOptions {
            quality: 31,
            ..GenerationOptions::default()
        };
        assert!(bad_quality.validate().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config = TurntableConfig::from_toml_str(
            r##"
            scale = 1.5

            [generation]
            frame_count = 24
            background = "#202020"
            antialias = false
            "##,
        )
        .unwrap();

        assert_eq!(config.scale, 1.5);
        assert_eq!(config.generation.frame_count, 24);
        assert_eq!(config.generation.background, Rgb([0x20, 0x20, 0x20]));
        assert!(!config.generation.antialias);
        // Unspecified fields keep their defaults
        assert_eq!(config.generation.image_size, 400);
        assert_eq!(config.generation.delay_ms, 80);
    }

    #[test]
    fn test_config_rejects_bad_color() {
        let result = TurntableConfig::from_toml_str("[generation]\nbackground = \"blue\"\n");
        assert!(result.is_err());
    }
}
