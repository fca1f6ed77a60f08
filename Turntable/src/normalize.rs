//! Model normalization
//!
//! Loaded models come in any size and at any offset. Normalization centers a
//! model on the origin and scales it so its largest dimension spans
//! [`TARGET_EXTENT`] scene units, which is what the camera planner expects.

use glam::Vec3;

use crate::scene::{BoundingVolume, Model, NodeId};

/// Largest dimension of a normalized model, in scene units.
pub const TARGET_EXTENT: f32 = 4.0;

/// A centered model wrapped in a scale group.
///
/// The group's scale is always `display_scale × user_scale`.
#[derive(Debug, Clone)]
pub struct NormalizedModel {
    model: Model,
    display_scale: f32,
    user_scale: f32,
}

impl NormalizedModel {
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Factor that fit the raw model into [`TARGET_EXTENT`].
    #[must_use]
    pub fn display_scale(&self) -> f32 {
        self.display_scale
    }

    #[must_use]
    pub fn user_scale(&self) -> f32 {
        self.user_scale
    }

    #[must_use]
    pub fn effective_scale(&self) -> f32 {
        self.display_scale * self.user_scale
    }

    /// The outer scale group (the model's only root).
    #[must_use]
    pub fn group(&self) -> NodeId {
        self.model.root().unwrap_or_default()
    }

    /// Scale the group by `display_scale × multiplier`.
    pub fn set_user_scale(&mut self, multiplier: f32) {
        self.user_scale = multiplier;
        let scale = self.effective_scale();
        let group = self.group();
        if let Some(node) = self.model.node_mut(group) {
            node.transform.scale = Vec3::splat(scale);
        }
    }

    /// World-space bounds of the model as currently scaled.
    #[must_use]
    pub fn bounding_volume(&self) -> BoundingVolume {
        self.model.bounding_volume()
    }
}

/// Scale that maps a volume's largest dimension to [`TARGET_EXTENT`].
///
/// Degenerate (zero-size) volumes keep unit scale.
#[must_use]
pub fn display_scale_for(bbox: &BoundingVolume) -> f32 {
    let max_dim = bbox.max_dim();
    if max_dim > 0.0 {
        TARGET_EXTENT / max_dim
    } else {
        1.0
    }
}

/// Center `model` at the origin and wrap it in a scale group.
///
/// Only node transforms change; geometry is untouched.
#[must_use]
pub fn normalize(mut model: Model) -> NormalizedModel {
    let bbox = model.bounding_volume();
    let center = bbox.center();

    let inner = model.wrap_in_group("model");
    if let Some(node) = model.node_mut(inner) {
        node.transform.translation = -center;
    }

    let display_scale = display_scale_for(&bbox);
    let group = model.wrap_in_group("group");
    if let Some(node) = model.node_mut(group) {
        node.transform.scale = Vec3::splat(display_scale);
    }

    tracing::debug!(
        "Normalized '{}': center {:?}, size {:?}, display scale {}",
        model.name,
        center,
        bbox.size(),
        display_scale
    );

    NormalizedModel {
        model,
        display_scale,
        user_scale: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_util::cube_model;
    use crate::scene::{Mesh, Node, Primitive};

    fn assert_vec_close(actual: Vec3, expected: Vec3) {
        assert!(
            (actual - expected).abs().max_element() < 1e-5,
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn test_scale_for_max_dim_eight() {
        let bbox = BoundingVolume::from_min_max(Vec3::ZERO, Vec3::new(8.0, 2.0, 1.0));
        assert_eq!(display_scale_for(&bbox), 0.5);
    }

    #[test]
    fn test_degenerate_model_keeps_unit_scale() {
        let mut model = Model::new("point");
        let mesh = model.add_mesh(Mesh {
            name: "point".to_string(),
            primitives: vec![Primitive {
                positions: vec![Vec3::new(3.0, 3.0, 3.0); 3],
                ..Primitive::default()
            }],
        });
        let node = model.add_node(Node {
            mesh: Some(mesh),
            ..Node::named("point")
        });
        model.add_root(node);

        let normalized = normalize(model);
        assert_eq!(normalized.display_scale(), 1.0);
        assert_vec_close(normalized.bounding_volume().center(), Vec3::ZERO);
    }

    #[test]
    fn test_empty_model_keeps_unit_scale() {
        let normalized = normalize(Model::new("empty"));
        assert_eq!(normalized.display_scale(), 1.0);
        assert!(normalized.bounding_volume().is_empty());
    }

    #[test]
    fn test_offset_cube_is_centered_and_scaled() {
        let normalized = normalize(cube_model(Vec3::new(5.0, 5.0, 5.0), 2.0));
        assert_eq!(normalized.display_scale(), 2.0);

        let bbox = normalized.bounding_volume();
        assert_vec_close(bbox.center(), Vec3::ZERO);
        assert_vec_close(bbox.size(), Vec3::splat(TARGET_EXTENT));
    }

    #[test]
    fn test_user_scale_multiplies_display_scale() {
        let mut normalized = normalize(cube_model(Vec3::ZERO, 8.0));
        assert_eq!(normalized.display_scale(), 0.5);
        assert_eq!(normalized.user_scale(), 1.0);

        normalized.set_user_scale(1.5);
        assert_eq!(normalized.effective_scale(), 0.75);
        normalized.set_user_scale(2.0);
        assert_eq!(normalized.effective_scale(), 1.0);
        assert_eq!(normalized.display_scale(), 0.5);
        assert_vec_close(normalized.bounding_volume().size(), Vec3::splat(8.0));
    }
}
