//! Pipeline orchestration
//!
//! [`PreviewContext`] holds the one live model and the interactive view of
//! it. [`Pipeline`] owns the preview and hands out [`GenerationJob`]s, each of
//! which works on its own clone of the model with its own scene, camera,
//! renderer and encoder. A job is advanced one [`GenerationJob::step`] at a
//! time and drops everything it owns as soon as it finishes or fails.
//!
//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::{Quat, Vec3};

use crate::assemble::LoopClosingAssembler;
use crate::camera::Camera;
use crate::config::{GenerationOptions, Rgb, validate_scale};
use crate::encode::{EncoderConfig, FrameEncoder, GifBlob, GifFrameEncoder};
use crate::error::{Error, Result};
use crate::framing::CAPTURE_PADDING;
use crate::loader::{FileSelection, ModelFormat, ResourceWarning, load_model};
use crate::normalize::{NormalizedModel, normalize};
use crate::render::{CapturedFrame, Renderer, SoftwareRenderer};
use crate::scene::{
    ClonedModel, CloneStrategy, LightRig, MeshInventory, Scene, clone_model,
};
use crate::turntable::{CaptureStage, FrameSequence, FrameStep, TurntableRenderer};

/// Vertical field of view of the interactive preview, in degrees.
pub const PREVIEW_FOV: f32 = 45.0;
/// Vertical field of view used for GIF capture, in degrees.
pub const CAPTURE_FOV: f32 = 40.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 1000.0;

// ============================================================================
// Preview Context
// ============================================================================

/// The live preview: at most one normalized model, its lights and camera.
#[derive(Debug, Clone)]
pub struct PreviewContext {
    background: Rgb,
    camera: Camera,
    model: Option<NormalizedModel>,
    user_scale: f32,
    format: Option<ModelFormat>,
    inventory: MeshInventory,
    warnings: Vec<ResourceWarning>,
}

impl Default for PreviewContext {
    fn default() -> Self {
        Self::new(Rgb::WHITE, 1.0)
    }
}

impl PreviewContext {
    /// Empty preview for a viewport of the given aspect ratio.
    #[must_use]
    pub fn new(background: Rgb, aspect: f32) -> Self {
        Self {
            background,
            camera: Camera::perspective(PREVIEW_FOV, aspect, NEAR_PLANE, FAR_PLANE),
            model: None,
            user_scale: 1.0,
            format: None,
            inventory: MeshInventory::default(),
            warnings: Vec::new(),
        }
    }

    /// Replace the current model with the primary file of `selection`.
    ///
    /// The previous model is removed first, so a failed load leaves the
    /// preview empty.
    ///
    /// # Errors
    /// Returns the loader's error; see [`load_model`].
    pub fn load(&mut self, selection: &FileSelection) -> Result<()> {
        self.unload();
        let report = load_model(selection)?;

        let mut normalized = normalize(report.model);
        normalized.set_user_scale(self.user_scale);
        self.camera.frame_preview(&normalized.bounding_volume());

        self.format = Some(report.format);
        self.inventory = report.inventory;
        self.warnings = report.warnings;
        self.model = Some(normalized);
        Ok(())
    }

    /// Remove the current model, if any.
    pub fn unload(&mut self) {
        if let Some(model) = self.model.take() {
            tracing::debug!("Removed model '{}' from preview", model.model().name);
        }
        self.format = None;
        self.inventory = MeshInventory::default();
        self.warnings.clear();
    }

    #[must_use]
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    #[must_use]
    pub fn model(&self) -> Option<&NormalizedModel> {
        self.model.as_ref()
    }

    #[must_use]
    pub fn format(&self) -> Option<ModelFormat> {
        self.format
    }

    #[must_use]
    pub fn inventory(&self) -> &MeshInventory {
        &self.inventory
    }

    /// Missing non-critical resources from the last load.
    #[must_use]
    pub fn warnings(&self) -> &[ResourceWarning] {
        &self.warnings
    }

    pub fn dismiss_warnings(&mut self) {
        self.warnings.clear();
    }

    #[must_use]
    pub fn user_scale(&self) -> f32 {
        self.user_scale
    }

    /// Scale the model by `multiplier` on top of its display scale.
    ///
    /// # Errors
    /// Returns [`Error::InvalidOptions`] unless `multiplier` is positive and finite.
    pub fn set_user_scale(&mut self, multiplier: f32) -> Result<()> {
        validate_scale(multiplier)?;
        self.user_scale = multiplier;
        if let Some(model) = &mut self.model {
            model.set_user_scale(multiplier);
        }
        Ok(())
    }

    #[must_use]
    pub fn background(&self) -> Rgb {
        self.background
    }

    pub fn set_background(&mut self, color: Rgb) {
        self.background = color;
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Independent copy of the live model for a generation job.
    ///
    /// # Errors
    /// Returns [`Error::NoModelLoaded`] if the preview is empty.
    pub fn clone_model(&self) -> Result<ClonedModel> {
        let model = self.model.as_ref().ok_or(Error::NoModelLoaded)?;
        Ok(clone_model(model.model()))
    }

    /// The scene the preview draws.
    #[must_use]
    pub fn scene(&self) -> Scene {
        let mut scene = Scene::new(Some(self.background), LightRig::preview());
        scene.model = self.model.as_ref().map(|m| m.model().clone());
        scene
    }

    /// Draw the three-quarter preview.
    ///
    /// # Errors
    /// Returns the renderer's error if drawing or capture fails.
    pub fn render_preview(&self, renderer: &mut dyn Renderer) -> Result<CapturedFrame> {
        renderer.set_clear_color(self.background);
        renderer.clear();
        renderer.render(&self.scene(), &self.camera)?;
        renderer.capture_bitmap()
    }
}

// ============================================================================
// Generation Jobs
// ============================================================================

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    /// Capturing; holds the index of the next frame.
    Rendering(u32),
    Encoding,
    Done,
    Failed(String),
}

impl JobPhase {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Done | JobPhase::Failed(_))
    }
}

/// Which half of generation a progress update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    /// Percent runs 0 to 50.
    Rendering,
    /// Percent runs 50 to 100.
    Encoding,
}

/// Progress information during generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationProgress {
    pub phase: GenerationPhase,
    /// Overall percentage, 0 to 100.
    pub percent: u32,
    /// Frames captured so far.
    pub frame: u32,
    pub frame_count: u32,
}

impl GenerationProgress {
    /// Overall progress as a fraction (0.0 - 1.0).
    #[must_use]
    pub fn fraction(&self) -> f32 {
        self.percent.min(100) as f32 / 100.0
    }
}

/// The finished animation and the frames it was built from.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub blob: GifBlob,
    /// Loop-closed: one more frame than was captured.
    pub frames: FrameSequence,
}

/// Marks a pipeline as busy for as long as it lives.
#[derive(Debug)]
struct ActiveJobGuard(Arc<AtomicBool>);

impl ActiveJobGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::JobInProgress)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything a job creates for itself and drops on a terminal phase.
struct JobResources {
    stage: CaptureStage,
    renderer: Box<dyn Renderer>,
    turntable: TurntableRenderer,
    encoder: Box<dyn FrameEncoder>,
    assembler: LoopClosingAssembler,
}

/// One GIF generation over an isolated copy of the preview model.
pub struct GenerationJob {
    options: GenerationOptions,
    strategy: CloneStrategy,
    phase: JobPhase,
    percent: u32,
    resources: Option<JobResources>,
    output: Option<GenerationOutput>,
    guard: Option<ActiveJobGuard>,
}

impl GenerationJob {
    #[must_use]
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    #[must_use]
    pub fn phase(&self) -> &JobPhase {
        &self.phase
    }

    /// Last reported overall percentage.
    #[must_use]
    pub fn percent(&self) -> u32 {
        self.percent
    }

    /// How the model clone was made.
    #[must_use]
    pub fn clone_strategy(&self) -> CloneStrategy {
        self.strategy
    }

    /// Whether the job still holds its scene, renderer and encoder.
    #[must_use]
    pub fn holds_resources(&self) -> bool {
        self.resources.is_some()
    }

    /// Advance by one frame, or by the whole encoding phase.
    ///
    /// Calling `step` on a finished job returns its terminal phase again.
    ///
    /// # Errors
    /// Returns the error that moved the job to [`JobPhase::Failed`].
    pub fn step(&mut self, progress: &mut dyn FnMut(&GenerationProgress)) -> Result<JobPhase> {
        let result = match self.phase {
            JobPhase::Rendering(_) => self.render_next(progress),
            JobPhase::Encoding => self.encode(progress),
            JobPhase::Done | JobPhase::Failed(_) => return Ok(self.phase.clone()),
        };
        match result {
            Ok(phase) => {
                self.phase = phase;
                if self.phase.is_terminal() {
                    self.release();
                }
                Ok(self.phase.clone())
            }
            Err(error) => {
                tracing::error!("GIF generation failed: {}", error);
                self.phase = JobPhase::Failed(error.to_string());
                self.release();
                Err(error)
            }
        }
    }

    /// Step until done.
    ///
    /// # Errors
    /// Returns the error of the step that failed.
    pub fn run(mut self, progress: &mut dyn FnMut(&GenerationProgress)) -> Result<GenerationOutput> {
        while !self.step(progress)?.is_terminal() {}
        self.into_output()
    }

    /// The output of a finished job.
    ///
    /// # Errors
    /// Returns [`Error::Render`] if the job has not completed.
    pub fn into_output(mut self) -> Result<GenerationOutput> {
        self.output
            .take()
            .ok_or_else(|| Error::Render(format!("generation not complete ({:?})", self.phase)))
    }

    fn render_next(&mut self, progress: &mut dyn FnMut(&GenerationProgress)) -> Result<JobPhase> {
        let resources = self
            .resources
            .as_mut()
            .ok_or_else(|| Error::Render("job resources already released".to_string()))?;

        let mut percent = self.percent;
        let step = resources.turntable.step(
            &mut resources.stage,
            resources.renderer.as_mut(),
            &mut |p| percent = p,
        )?;
        self.percent = self.percent.max(percent);

        let frame_count = resources.turntable.frame_count();
        if let FrameStep::Captured { index, .. } = step {
            progress(&GenerationProgress {
                phase: GenerationPhase::Rendering,
                percent: self.percent,
                frame: index + 1,
                frame_count,
            });
        }

        if resources.turntable.is_complete() {
            Ok(JobPhase::Encoding)
        } else {
            Ok(JobPhase::Rendering(resources.turntable.next_index()))
        }
    }

    fn encode(&mut self, progress: &mut dyn FnMut(&GenerationProgress)) -> Result<JobPhase> {
        let JobResources {
            stage,
            renderer,
            turntable,
            mut encoder,
            assembler,
        } = self
            .resources
            .take()
            .ok_or_else(|| Error::Render("job resources already released".to_string()))?;
        drop((stage, renderer));

        let frame_count = turntable.frame_count();
        let mut frames = turntable.into_frames();
        let mut percent = self.percent;
        let blob = assembler.assemble(&mut frames, encoder.as_mut(), &mut |p| {
            percent = percent.max(p);
            progress(&GenerationProgress {
                phase: GenerationPhase::Encoding,
                percent,
                frame: frame_count,
                frame_count,
            });
        })?;
        self.percent = percent;

        self.output = Some(GenerationOutput { blob, frames });
        Ok(JobPhase::Done)
    }

    fn release(&mut self) {
        self.resources = None;
        self.guard = None;
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Observable state of a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Loading,
    Ready,
    Rendering(u32),
    Encoding,
    Done,
    Failed(String),
}

/// Owns the preview and runs at most one generation job at a time.
#[derive(Debug, Default)]
pub struct Pipeline {
    preview: PreviewContext,
    active: Arc<AtomicBool>,
    state: PipelineState,
}

impl Pipeline {
    #[must_use]
    pub fn new(preview: PreviewContext) -> Self {
        Self {
            preview,
            active: Arc::new(AtomicBool::new(false)),
            state: PipelineState::Idle,
        }
    }

    #[must_use]
    pub fn preview(&self) -> &PreviewContext {
        &self.preview
    }

    pub fn preview_mut(&mut self) -> &mut PreviewContext {
        &mut self.preview
    }

    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Whether a job started from this pipeline is still alive and unfinished.
    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Load a model into the preview.
    ///
    /// # Errors
    /// Returns the loader's error; the preview is left empty.
    pub fn load(&mut self, selection: &FileSelection) -> Result<()> {
        self.state = PipelineState::Loading;
        match self.preview.load(selection) {
            Ok(()) => {
                self.state = PipelineState::Ready;
                Ok(())
            }
            Err(error) => {
                tracing::error!("Error loading model: {}", error);
                self.state = PipelineState::Failed(error.to_string());
                Err(error)
            }
        }
    }

    /// Start a job with the software renderer and GIF encoder.
    ///
    /// # Errors
    /// - [`Error::NoModelLoaded`] if the preview is empty.
    /// - [`Error::InvalidOptions`] if `options` fail validation.
    /// - [`Error::JobInProgress`] if another job is active.
    pub fn start_generation(&self, options: &GenerationOptions) -> Result<GenerationJob> {
        self.check_ready(options)?;
        let size = options.image_size;
        let renderer = SoftwareRenderer::new(size, size, options.antialias)?;
        let encoder = GifFrameEncoder::new(EncoderConfig::square(
            u16::try_from(size).map_err(|_| {
                Error::InvalidOptions(format!("image size {size} exceeds GIF limits"))
            })?,
            options.workers,
            options.quality,
        ));
        self.start_generation_with(options, Box::new(renderer), Box::new(encoder))
    }

    /// Start a job with the software renderer and a caller-supplied encoder.
    ///
    /// # Errors
    /// As [`start_generation`](Self::start_generation).
    pub fn start_generation_with_encoder(
        &self,
        options: &GenerationOptions,
        encoder: Box<dyn FrameEncoder>,
    ) -> Result<GenerationJob> {
        self.check_ready(options)?;
        let size = options.image_size;
        let renderer = SoftwareRenderer::new(size, size, options.antialias)?;
        self.start_generation_with(options, Box::new(renderer), encoder)
    }

    /// Start a job with caller-supplied collaborators.
    ///
    /// # Errors
    /// As [`start_generation`](Self::start_generation), plus
    /// [`Error::InvalidOptions`] if the renderer is not `image_size` square.
    pub fn start_generation_with(
        &self,
        options: &GenerationOptions,
        mut renderer: Box<dyn Renderer>,
        encoder: Box<dyn FrameEncoder>,
    ) -> Result<GenerationJob> {
        self.check_ready(options)?;
        let size = options.image_size;
        if renderer.size() != (size, size) {
            let (width, height) = renderer.size();
            return Err(Error::InvalidOptions(format!(
                "renderer is {width}x{height}, expected {size}x{size}"
            )));
        }
        let guard = ActiveJobGuard::acquire(&self.active)?;

        let ClonedModel {
            strategy,
            mut model,
        } = self.preview.clone_model()?;
        if let Some(root) = model.root().and_then(|id| model.node_mut(id)) {
            root.transform.translation = Vec3::ZERO;
            root.transform.rotation = Quat::IDENTITY;
        }

        let mut camera = Camera::perspective(CAPTURE_FOV, 1.0, NEAR_PLANE, FAR_PLANE);
        let distance = camera.frame_capture(&model.bounding_volume(), CAPTURE_PADDING);

        renderer.set_clear_color(options.background);
        let mut scene = Scene::new(Some(options.background), LightRig::capture());
        scene.model = Some(model);

        tracing::info!(
            "Starting GIF generation: {} frames at {}x{}, camera distance {:.2}",
            options.frame_count,
            size,
            size,
            distance
        );

        Ok(GenerationJob {
            options: options.clone(),
            strategy,
            phase: JobPhase::Rendering(0),
            percent: 0,
            resources: Some(JobResources {
                stage: CaptureStage { scene, camera },
                renderer,
                turntable: TurntableRenderer::new(options.frame_count)?,
                encoder,
                assembler: LoopClosingAssembler::new(options.delay_ms),
            }),
            output: None,
            guard: Some(guard),
        })
    }

    /// Run a whole job, mirroring its phase into [`state`](Self::state).
    ///
    /// # Errors
    /// Returns the rejection or failure of the job.
    pub fn generate(
        &mut self,
        options: &GenerationOptions,
        progress: &mut dyn FnMut(&GenerationProgress),
    ) -> Result<GenerationOutput> {
        let job = self.start_generation(options)?;
        self.drive(job, progress)
    }

    /// Run a whole job with a caller-supplied encoder.
    ///
    /// # Errors
    /// Returns the rejection or failure of the job.
    pub fn generate_with_encoder(
        &mut self,
        options: &GenerationOptions,
        encoder: Box<dyn FrameEncoder>,
        progress: &mut dyn FnMut(&GenerationProgress),
    ) -> Result<GenerationOutput> {
        let job = self.start_generation_with_encoder(options, encoder)?;
        self.drive(job, progress)
    }

    fn drive(
        &mut self,
        mut job: GenerationJob,
        progress: &mut dyn FnMut(&GenerationProgress),
    ) -> Result<GenerationOutput> {
        self.state = PipelineState::Rendering(0);
        loop {
            match job.step(progress) {
                Ok(JobPhase::Rendering(index)) => self.state = PipelineState::Rendering(index),
                Ok(JobPhase::Encoding) => self.state = PipelineState::Encoding,
                Ok(JobPhase::Done) => break,
                Ok(JobPhase::Failed(reason)) => {
                    self.state = PipelineState::Failed(reason.clone());
                    return Err(Error::Render(reason));
                }
                Err(error) => {
                    self.state = PipelineState::Failed(error.to_string());
                    return Err(error);
                }
            }
        }
        self.state = PipelineState::Done;
        job.into_output()
    }

    fn check_ready(&self, options: &GenerationOptions) -> Result<()> {
        if !self.preview.has_model() {
            return Err(Error::NoModelLoaded);
        }
        options.validate()?;
        if self.is_generating() {
            return Err(Error::JobInProgress);
        }
        Ok(())
    }
}
