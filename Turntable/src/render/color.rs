//! sRGB transfer functions

use std::sync::OnceLock;

use glam::Vec3;

fn srgb_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0; 256];
        for (i, value) in table.iter_mut().enumerate() {
            let c = i as f32 / 255.0;
            *value = if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
        }
        table
    })
}

/// Decode an 8-bit sRGB channel to linear.
pub fn srgb_to_linear(channel: u8) -> f32 {
    srgb_table()[channel as usize]
}

/// Encode a linear channel to 8-bit sRGB, clamping out-of-range values.
pub fn linear_to_srgb(channel: f32) -> u8 {
    let c = channel.clamp(0.0, 1.0);
    let encoded = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0 + 0.5) as u8
}

pub fn linear_to_srgb_rgb(color: Vec3) -> [u8; 3] {
    [
        linear_to_srgb(color.x),
        linear_to_srgb(color.y),
        linear_to_srgb(color.z),
    ]
}
