//! Model cloning for generation jobs
//!
//! Generation must never mutate the live preview model, so every job works on
//! a clone whose materials are independent copies. The strategy is picked up
//! front by probing the model instead of attempting one and recovering.

use std::sync::Arc;

use super::{Model, Skin};

/// How a [`ClonedModel`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneStrategy {
    /// Hierarchy and skin bindings preserved.
    Skeletal,
    /// Hierarchy preserved, skins whose bindings could not be kept are dropped.
    Structural,
}

#[derive(Debug, Clone)]
pub struct ClonedModel {
    pub strategy: CloneStrategy,
    pub model: Model,
}

/// Whether every skin of `model` binds only to nodes that exist.
#[must_use]
pub fn supports_skeletal_clone(model: &Model) -> bool {
    !model.skins.is_empty()
        && model
            .skins
            .iter()
            .all(|skin| skin.joints.iter().all(|&joint| joint < model.nodes().len()))
}

/// Clone `model` with independent materials.
///
/// Geometry stays shared; it is never written after load.
#[must_use]
pub fn clone_model(model: &Model) -> ClonedModel {
    let strategy = if supports_skeletal_clone(model) {
        CloneStrategy::Skeletal
    } else {
        CloneStrategy::Structural
    };

    let mut clone = model.clone();
    clone.materials = model
        .materials
        .iter()
        .map(|material| Arc::new(material.as_ref().clone()))
        .collect();

    if strategy == CloneStrategy::Structural && !model.skins.is_empty() {
        tracing::warn!(
            "Skeletal clone unsupported for '{}', using structural clone",
            model.name
        );
        drop_dangling_skins(&mut clone);
    }

    tracing::debug!("Cloned model '{}' ({:?})", model.name, strategy);
    ClonedModel {
        strategy,
        model: clone,
    }
}

/// Remove skins bound to missing nodes and re-point node skin indices.
fn drop_dangling_skins(clone: &mut Model) {
    let node_count = clone.nodes().len();
    let mut remap = Vec::with_capacity(clone.skins.len());
    let mut kept: Vec<Skin> = Vec::new();

    for skin in std::mem::take(&mut clone.skins) {
        if skin.joints.iter().all(|&joint| joint < node_count) {
            remap.push(Some(kept.len()));
            kept.push(skin);
        } else {
            remap.push(None);
        }
    }
    clone.skins = kept;

    for id in 0..node_count {
        if let Some(node) = clone.node_mut(id) {
            node.skin = node.skin.and_then(|s| remap.get(s).copied().flatten());
        }
    }
}
