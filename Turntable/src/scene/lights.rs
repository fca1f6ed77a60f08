//! Scenes and light rigs

use glam::Vec3;

use crate::config::Rgb;

use super::Model;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    /// Uniform light from every direction.
    Ambient { color: Vec3, intensity: f32 },
    /// Parallel light shining from `position` toward the origin.
    Directional {
        color: Vec3,
        intensity: f32,
        position: Vec3,
    },
}

impl Light {
    #[must_use]
    pub fn ambient(intensity: f32) -> Self {
        Light::Ambient {
            color: Vec3::ONE,
            intensity,
        }
    }

    #[must_use]
    pub fn directional(intensity: f32, position: Vec3) -> Self {
        Light::Directional {
            color: Vec3::ONE,
            intensity,
            position,
        }
    }
}

/// Preset light setups.
pub struct LightRig;

impl LightRig {
    /// Interactive preview: ambient, key and fill.
    #[must_use]
    pub fn preview() -> Vec<Light> {
        vec![
            Light::ambient(0.5),
            Light::directional(0.8, Vec3::new(5.0, 10.0, 7.5)),
            Light::directional(0.4, Vec3::new(-5.0, 2.0, -7.5)),
        ]
    }

    /// GIF capture: brighter ambient, all lights biased toward the front.
    #[must_use]
    pub fn capture() -> Vec<Light> {
        vec![
            Light::ambient(0.6),
            Light::directional(0.8, Vec3::new(1.0, 1.0, 2.0)),
            Light::directional(0.4, Vec3::new(-1.5, 0.5, 1.0)),
            Light::directional(0.3, Vec3::new(0.0, 2.0, 0.0)),
        ]
    }
}

/// What a renderer draws: one optional model, its lights and a background.
#[derive(Debug, Clone)]
pub struct Scene {
    /// Painted behind the model on every render.
    pub background: Option<Rgb>,
    pub lights: Vec<Light>,
    pub model: Option<Model>,
}

impl Scene {
    #[must_use]
    pub fn new(background: Option<Rgb>, lights: Vec<Light>) -> Self {
        Self {
            background,
            lights,
            model: None,
        }
    }
}
