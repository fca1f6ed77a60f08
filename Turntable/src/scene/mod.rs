//! Scene graph
//!
//! A [`Model`] is an arena of [`Node`]s with shared, read-only geometry and
//! per-model materials. Loaders build it, the normalizer wraps it, the
//! turntable renderer rotates a clone of it.
//!
//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT

mod bounds;
mod clone;
mod lights;
mod visitor;

use std::sync::Arc;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use image::RgbaImage;

pub use bounds::BoundingVolume;
pub use clone::{ClonedModel, CloneStrategy, clone_model, supports_skeletal_clone};
pub use lights::{Light, LightRig, Scene};
pub use visitor::{MeshInventory, SceneVisitor};

/// Index of a node inside its [`Model`].
pub type NodeId = usize;

// ============================================================================
// Transforms
// ============================================================================

/// Local translation/rotation/scale of a node, applied scale first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

// ============================================================================
// Geometry & Materials
// ============================================================================

/// A triangle list with optional per-vertex attributes.
///
/// Attribute vectors are either empty or the same length as `positions`.
#[derive(Debug, Clone, Default)]
pub struct Primitive {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub colors: Vec<Vec4>,
    /// Triangle indices; empty means the positions are already a triangle list.
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

impl Primitive {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        if self.indices.is_empty() {
            self.positions.len() / 3
        } else {
            self.indices.len() / 3
        }
    }

    /// Vertex indices of each triangle, skipping any that point past the vertex list.
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        let count = self.triangle_count();
        let vertex_count = self.positions.len();
        (0..count).filter_map(move |t| {
            let tri = if self.indices.is_empty() {
                [t * 3, t * 3 + 1, t * 3 + 2]
            } else {
                [
                    self.indices[t * 3] as usize,
                    self.indices[t * 3 + 1] as usize,
                    self.indices[t * 3 + 2] as usize,
                ]
            };
            tri.iter().all(|&i| i < vertex_count).then_some(tri)
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

/// An sRGB color texture.
#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    pub image: RgbaImage,
    /// Set for formats whose UV origin is the bottom-left corner (OBJ).
    pub flip_y: bool,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    /// Linear RGBA multiplier.
    pub base_color: Vec4,
    pub texture: Option<Arc<Texture>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: Vec4::ONE,
            texture: None,
        }
    }
}

/// Joint bindings of a skinned mesh.
#[derive(Debug, Clone, Default)]
pub struct Skin {
    pub name: String,
    pub joints: Vec<NodeId>,
}

// ============================================================================
// Nodes & Models
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
    pub children: Vec<NodeId>,
}

impl Node {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A loaded scene-graph model.
///
/// Meshes are shared between clones through `Arc`; materials are duplicated
/// by [`clone_model`] so a clone can be mutated freely.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub name: String,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    pub meshes: Vec<Arc<Mesh>>,
    pub materials: Vec<Arc<Material>>,
    pub skins: Vec<Skin>,
}

impl Model {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a detached node and return its id.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_root(&mut self, id: NodeId) {
        self.roots.push(id);
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.push(child);
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(Arc::new(mesh));
        self.meshes.len() - 1
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(Arc::new(material));
        self.materials.len() - 1
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// First root node, the one a normalized model is transformed through.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.roots.first().copied()
    }

    #[must_use]
    pub fn material(&self, index: Option<usize>) -> Option<&Material> {
        index
            .and_then(|i| self.materials.get(i))
            .map(AsRef::as_ref)
    }

    /// Move every current root under a new group node, which becomes the only root.
    pub fn wrap_in_group(&mut self, name: impl Into<String>) -> NodeId {
        let group = Node {
            name: name.into(),
            children: std::mem::take(&mut self.roots),
            ..Node::default()
        };
        let id = self.add_node(group);
        self.roots.push(id);
        id
    }

    /// World-space volume of every vertex reachable from the roots.
    #[must_use]
    pub fn bounding_volume(&self) -> BoundingVolume {
        struct Bounds(BoundingVolume);

        impl SceneVisitor for Bounds {
            fn visit_mesh(&mut self, _node: &Node, mesh: &Mesh, world: &Mat4) {
                for primitive in &mesh.primitives {
                    for position in &primitive.positions {
                        self.0.expand_by_point(world.transform_point3(*position));
                    }
                }
            }
        }

        let mut bounds = Bounds(BoundingVolume::empty());
        self.traverse(&mut bounds);
        bounds.0
    }

    /// Depth-first walk from the roots, parents before children.
    ///
    /// Each node is visited at most once even if the graph is malformed.
    pub fn traverse<V: SceneVisitor + ?Sized>(&self, visitor: &mut V) {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<(NodeId, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|&id| (id, Mat4::IDENTITY))
            .collect();

        while let Some((id, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if std::mem::replace(&mut visited[id], true) {
                continue;
            }

            let world = parent * node.transform.matrix();
            visitor.visit_node(id, node, &world);
            if let Some(mesh) = node.mesh.and_then(|m| self.meshes.get(m)) {
                visitor.visit_mesh(node, mesh, &world);
            }

            for &child in node.children.iter().rev() {
                stack.push((child, world));
            }
        }
    }
}
