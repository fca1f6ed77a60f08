//! Camera placement
//!
//! Both planners place the camera far enough back that a sphere of diameter
//! `max_dim` fits the vertical field of view:
//! `distance = (max_dim / 2) / tan(fov / 2)`.
//!
//! The capture position is computed once from the unrotated model and reused
//! for every turntable frame. Re-planning per frame would make the model
//! appear to zoom as its rotated bounds change.

use glam::Vec3;

use crate::scene::BoundingVolume;

/// Extra distance applied to the capture camera.
pub const CAPTURE_PADDING: f32 = 1.25;

/// Per-axis share of the distance for the three-quarter preview view.
pub const PREVIEW_OFFSET: Vec3 = Vec3::new(0.8, 0.6, 0.9);

/// Fallback distance for models with no extent.
pub const DEFAULT_DISTANCE: f32 = 5.0;

/// Distance at which `bbox` fills a vertical field of view of `fov` degrees.
#[must_use]
pub fn fit_distance(bbox: &BoundingVolume, fov: f32) -> f32 {
    let half_fov = fov.to_radians() / 2.0;
    let distance = (bbox.max_dim() / 2.0) / half_fov.tan();
    if distance.is_finite() && distance > 0.0 {
        distance
    } else {
        DEFAULT_DISTANCE
    }
}

/// Three-quarter view position for the interactive preview.
#[must_use]
pub fn plan_preview_camera(bbox: &BoundingVolume, fov: f32) -> Vec3 {
    fit_distance(bbox, fov) * PREVIEW_OFFSET
}

/// Straight-on +Z position for frame capture.
#[must_use]
pub fn plan_capture_camera(bbox: &BoundingVolume, fov: f32, padding: f32) -> Vec3 {
    Vec3::new(0.0, 0.0, fit_distance(bbox, fov) * padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(extent: f32) -> BoundingVolume {
        BoundingVolume::from_min_max(Vec3::splat(-extent / 2.0), Vec3::splat(extent / 2.0))
    }

    #[test]
    fn test_fit_distance_at_ninety_degrees() {
        // tan(45°) = 1, so the distance is half the extent
        let distance = fit_distance(&cube(4.0), 90.0);
        assert!((distance - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_capture_camera_on_z_axis_with_padding() {
        let position = plan_capture_camera(&cube(4.0), 90.0, CAPTURE_PADDING);
        assert_eq!(position.x, 0.0);
        assert_eq!(position.y, 0.0);
        assert!((position.z - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_preview_camera_three_quarter_offsets() {
        let position = plan_preview_camera(&cube(4.0), 90.0);
        assert!((position - Vec3::new(1.6, 1.2, 1.8)).abs().max_element() < 1e-5);
    }

    #[test]
    fn test_degenerate_volume_uses_default_distance() {
        let point = BoundingVolume::from_points([Vec3::ZERO]);
        assert_eq!(fit_distance(&point, 40.0), DEFAULT_DISTANCE);
        assert_eq!(fit_distance(&BoundingVolume::empty(), 40.0), DEFAULT_DISTANCE);
    }

    #[test]
    fn test_center_plane_fits_capture_frustum() {
        // The model's extent through the origin projects inside the vertical half-angle
        let bbox = cube(4.0);
        let fov = 40.0_f32;
        let position = plan_capture_camera(&bbox, fov, CAPTURE_PADDING);
        let half_tan = (fov.to_radians() / 2.0).tan();
        assert!((bbox.max_dim() / 2.0) / position.z < half_tan);
    }
}
