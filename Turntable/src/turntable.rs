//! Turntable frame capture
//!
//! One [`TurntableRenderer::step`] renders and captures one frame of a full
//! rotation about the vertical axis. The caller decides when to take the next
//! step, which keeps the loop cooperative: a UI can step once per paint, the
//! CLI steps in a plain loop.
//!
//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT

use std::f64::consts::TAU;

use glam::Quat;

use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::render::{CapturedFrame, Renderer};
use crate::scene::Scene;

/// Share of overall generation progress covered by frame capture.
pub const CAPTURE_PROGRESS_SPAN: u32 = 50;

/// Rotation of frame `index` out of `frame_count`, in radians.
///
/// Frame 0 is always at angle zero; frames are evenly spaced over one turn.
#[must_use]
pub fn frame_angle(index: u32, frame_count: u32) -> f32 {
    if frame_count == 0 {
        return 0.0;
    }
    (f64::from(index) / f64::from(frame_count) * TAU) as f32
}

/// Progress after capturing frame `index`: `round(index / frame_count × 50)`.
#[must_use]
pub fn capture_progress(index: u32, frame_count: u32) -> u32 {
    if frame_count == 0 {
        return 0;
    }
    (f64::from(index) / f64::from(frame_count) * f64::from(CAPTURE_PROGRESS_SPAN)).round() as u32
}

// ============================================================================
// Frame Sequence
// ============================================================================

/// Captured frames in rotation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSequence {
    frames: Vec<CapturedFrame>,
    closed: bool,
}

impl FrameSequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: CapturedFrame) {
        self.frames.push(frame);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn frames(&self) -> &[CapturedFrame] {
        &self.frames
    }

    /// Whether [`close_loop`](Self::close_loop) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append a copy of the first frame so the animation wraps without a jump.
    ///
    /// Closing an already closed sequence does nothing.
    ///
    /// # Errors
    /// Returns [`Error::EmptyFrameSequence`] if no frame was captured.
    pub fn close_loop(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let first = self.frames.first().ok_or(Error::EmptyFrameSequence)?.clone();
        self.frames.push(first);
        self.closed = true;
        Ok(())
    }
}

// ============================================================================
// Capture Loop
// ============================================================================

/// The isolated scene and fixed camera frames are captured from.
#[derive(Debug, Clone)]
pub struct CaptureStage {
    pub scene: Scene,
    pub camera: Camera,
}

/// Result of one [`TurntableRenderer::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameStep {
    Captured { index: u32, angle: f32 },
    /// Every frame has been captured.
    Complete,
}

/// Step-wise renderer of one full rotation.
#[derive(Debug)]
pub struct TurntableRenderer {
    frame_count: u32,
    next: u32,
    frames: FrameSequence,
}

impl TurntableRenderer {
    /// # Errors
    /// Returns [`Error::InvalidOptions`] if `frame_count` is zero.
    pub fn new(frame_count: u32) -> Result<Self> {
        if frame_count == 0 {
            return Err(Error::InvalidOptions(
                "frame count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            frame_count,
            next: 0,
            frames: FrameSequence::new(),
        })
    }

    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Index of the frame the next step captures.
    #[must_use]
    pub fn next_index(&self) -> u32 {
        self.next
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.next >= self.frame_count
    }

    #[must_use]
    pub fn frames(&self) -> &FrameSequence {
        &self.frames
    }

    #[must_use]
    pub fn into_frames(self) -> FrameSequence {
        self.frames
    }

    /// Rotate the model to the next angle, render it and capture the frame.
    ///
    /// The rotation is set absolutely from the frame index, so no error
    /// accumulates across frames. After rotating, the model is shifted back
    /// so its bounding volume stays centered on the origin.
    ///
    /// # Errors
    /// Returns [`Error::NoModelLoaded`] if the stage has no model, or the
    /// renderer's error if drawing or capture fails.
    pub fn step(
        &mut self,
        stage: &mut CaptureStage,
        renderer: &mut dyn Renderer,
        progress: &mut dyn FnMut(u32),
    ) -> Result<FrameStep> {
        if self.is_complete() {
            return Ok(FrameStep::Complete);
        }
        let index = self.next;
        let angle = frame_angle(index, self.frame_count);

        let model = stage.scene.model.as_mut().ok_or(Error::NoModelLoaded)?;
        let root = model.root().ok_or(Error::NoModelLoaded)?;
        if let Some(node) = model.node_mut(root) {
            node.transform.rotation = Quat::from_rotation_y(angle);
        }
        let center = model.bounding_volume().center();
        if let Some(node) = model.node_mut(root) {
            node.transform.translation -= center;
        }

        renderer.clear();
        renderer.render(&stage.scene, &stage.camera)?;
        self.frames.push(renderer.capture_bitmap()?);
        self.next += 1;

        tracing::debug!(
            "Captured frame {}/{} at {:.1}°",
            index + 1,
            self.frame_count,
            angle.to_degrees()
        );
        progress(capture_progress(index, self.frame_count));

        Ok(FrameStep::Captured { index, angle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rgb;
    use crate::render::SoftwareRenderer;
    use crate::scene::test_util::cube_model;
    use crate::scene::LightRig;
    use glam::Vec3;
    use std::f32::consts::PI;

    fn stage(center: Vec3) -> CaptureStage {
        let mut scene = Scene::new(Some(Rgb::BLACK), LightRig::capture());
        scene.model = Some(cube_model(center, 2.0));
        let mut camera = Camera::perspective(40.0, 1.0, 0.1, 1000.0);
        camera.position = Vec3::new(0.0, 0.0, 10.0);
        CaptureStage { scene, camera }
    }

    #[test]
    fn test_frame_angles() {
        assert_eq!(frame_angle(0, 4), 0.0);
        assert_eq!(frame_angle(0, 1), 0.0);
        assert_eq!(frame_angle(1, 4), PI / 2.0);
        assert_eq!(frame_angle(2, 4), PI);
        assert!((frame_angle(35, 36) - 35.0 * 10.0_f32.to_radians()).abs() < 1e-5);
    }

    #[test]
    fn test_capture_progress_range() {
        assert_eq!(capture_progress(0, 36), 0);
        assert_eq!(capture_progress(18, 36), 25);
        assert_eq!(capture_progress(35, 36), 49);
        assert_eq!(capture_progress(0, 1), 0);
    }

    #[test]
    fn test_zero_frames_fail_fast() {
        assert!(matches!(
            TurntableRenderer::new(0),
            Err(Error::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_close_loop() {
        let mut sequence = FrameSequence::new();
        assert!(matches!(
            sequence.close_loop(),
            Err(Error::EmptyFrameSequence)
        ));

        for i in 0..3u8 {
            sequence.push(CapturedFrame {
                width: 1,
                height: 1,
                png: vec![i],
            });
        }
        sequence.close_loop().unwrap();
        sequence.close_loop().unwrap();
        assert_eq!(sequence.len(), 4);
        assert_eq!(sequence.frames()[0], sequence.frames()[3]);
    }

    #[test]
    fn test_steps_until_complete() {
        let mut stage = stage(Vec3::new(3.0, 0.0, 0.0));
        let mut renderer = SoftwareRenderer::new(16, 16, false).unwrap();
        let mut turntable = TurntableRenderer::new(4).unwrap();
        let mut reported = Vec::new();

        let mut steps = Vec::new();
        loop {
            match turntable
                .step(&mut stage, &mut renderer, &mut |p| reported.push(p))
                .unwrap()
            {
                FrameStep::Captured { index, .. } => steps.push(index),
                FrameStep::Complete => break,
            }
        }

        assert_eq!(steps, vec![0, 1, 2, 3]);
        assert_eq!(reported, vec![0, 13, 25, 38]);
        assert_eq!(turntable.frames().len(), 4);

        // The rotated model stays centered
        let model = stage.scene.model.as_ref().unwrap();
        assert!(model.bounding_volume().center().length() < 1e-4);
    }

    #[test]
    fn test_rotation_is_absolute() {
        let mut stage = stage(Vec3::ZERO);
        let mut renderer = SoftwareRenderer::new(8, 8, false).unwrap();
        let mut turntable = TurntableRenderer::new(4).unwrap();
        for _ in 0..3 {
            turntable.step(&mut stage, &mut renderer, &mut |_| {}).unwrap();
        }
        let model = stage.scene.model.as_ref().unwrap();
        let rotation = model.node(model.root().unwrap()).unwrap().transform.rotation;
        assert!(rotation.angle_between(Quat::from_rotation_y(PI)) < 1e-5);
    }
}
