//! Perspective camera

use glam::{Mat4, Vec3};

use crate::framing;
use crate::scene::BoundingVolume;

/// A right-handed perspective camera with an OpenGL-style clip volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    projection: Mat4,
}

impl Camera {
    #[must_use]
    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Vec3::new(0.0, 0.0, framing::DEFAULT_DISTANCE),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov,
            aspect,
            near,
            far,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    /// Recompute the projection after changing `fov`, `aspect`, `near` or `far`.
    pub fn update_projection_matrix(&mut self) {
        self.projection =
            Mat4::perspective_rh_gl(self.fov.to_radians(), self.aspect, self.near, self.far);
    }

    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Three-quarter view of a model centered at the origin.
    pub fn frame_preview(&mut self, bbox: &BoundingVolume) {
        self.position = framing::plan_preview_camera(bbox, self.fov);
        self.look_at(Vec3::ZERO);
        self.update_projection_matrix();
    }

    /// Straight-on padded view for GIF capture. Returns the camera distance.
    pub fn frame_capture(&mut self, bbox: &BoundingVolume, padding: f32) -> f32 {
        self.position = framing::plan_capture_camera(bbox, self.fov, padding);
        self.look_at(Vec3::ZERO);
        self.update_projection_matrix();
        self.position.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_keeps_up_vector() {
        let bbox = BoundingVolume::from_min_max(Vec3::splat(-2.0), Vec3::splat(2.0));
        let mut camera = Camera::perspective(45.0, 1.0, 0.1, 1000.0);
        camera.up = Vec3::Z;

        camera.frame_preview(&bbox);
        assert_eq!(camera.up, Vec3::Z);
        assert_eq!(camera.target, Vec3::ZERO);

        let distance = camera.frame_capture(&bbox, framing::CAPTURE_PADDING);
        assert_eq!(camera.up, Vec3::Z);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, distance));
    }

    #[test]
    fn test_projection_refreshes_with_aspect() {
        let mut camera = Camera::perspective(40.0, 1.0, 0.1, 1000.0);
        let before = camera.projection_matrix();
        camera.aspect = 2.0;
        camera.update_projection_matrix();
        assert_ne!(before, camera.projection_matrix());
    }
}
