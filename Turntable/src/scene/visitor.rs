//! Scene traversal

use glam::Mat4;

use super::{Mesh, Model, Node, NodeId};

/// Callbacks for [`Model::traverse`].
pub trait SceneVisitor {
    fn visit_node(&mut self, _id: NodeId, _node: &Node, _world: &Mat4) {}

    /// Called after `visit_node` for nodes that carry a mesh.
    fn visit_mesh(&mut self, _node: &Node, _mesh: &Mesh, _world: &Mat4) {}
}

/// Mesh and texture counts of a model, for load diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshInventory {
    pub nodes: usize,
    pub meshes: usize,
    pub triangles: usize,
    /// Primitives whose material carries a color texture.
    pub textured_primitives: usize,
    pub untextured_primitives: usize,
}

impl MeshInventory {
    /// Walk `model` and log each mesh at debug level.
    #[must_use]
    pub fn collect(model: &Model) -> Self {
        struct Walk<'a> {
            model: &'a Model,
            inventory: MeshInventory,
        }

        impl SceneVisitor for Walk<'_> {
            fn visit_node(&mut self, _id: NodeId, _node: &Node, _world: &Mat4) {
                self.inventory.nodes += 1;
            }

            fn visit_mesh(&mut self, node: &Node, mesh: &Mesh, _world: &Mat4) {
                self.inventory.meshes += 1;
                tracing::debug!("Mesh: {} (node {})", mesh.name, node.name);

                for primitive in &mesh.primitives {
                    self.inventory.triangles += primitive.triangle_count();
                    let material = self.model.material(primitive.material);
                    let textured = material.is_some_and(|m| m.texture.is_some());
                    if textured {
                        self.inventory.textured_primitives += 1;
                    } else {
                        self.inventory.untextured_primitives += 1;
                    }
                    tracing::debug!(
                        " - Material: {} (texture: {})",
                        material.map_or("Unnamed", |m| m.name.as_str()),
                        if textured { "yes" } else { "no" }
                    );
                }
            }
        }

        let mut walk = Walk {
            model,
            inventory: MeshInventory::default(),
        };
        model.traverse(&mut walk);
        walk.inventory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_util::cube_model;
    use glam::Vec3;

    #[test]
    fn test_inventory_counts_cube() {
        let model = cube_model(Vec3::ZERO, 1.0);
        let inventory = MeshInventory::collect(&model);
        assert_eq!(
            inventory,
            MeshInventory {
                nodes: 1,
                meshes: 1,
                triangles: 12,
                textured_primitives: 0,
                untextured_primitives: 1,
            }
        );
    }

    #[test]
    fn test_visit_order_parents_first() {
        struct Order(Vec<String>);
        impl SceneVisitor for Order {
            fn visit_node(&mut self, _id: NodeId, node: &Node, _world: &Mat4) {
                self.0.push(node.name.clone());
            }
        }

        let mut model = Model::new("tree");
        let root = model.add_node(Node::named("root"));
        let left = model.add_node(Node::named("left"));
        let right = model.add_node(Node::named("right"));
        let leaf = model.add_node(Node::named("leaf"));
        model.add_child(root, left);
        model.add_child(root, right);
        model.add_child(left, leaf);
        model.add_root(root);

        let mut order = Order(Vec::new());
        model.traverse(&mut order);
        assert_eq!(order.0, vec!["root", "left", "leaf", "right"]);
    }
}
