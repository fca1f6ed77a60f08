//! glTF / GLB loader.
//!
//! Parses the document with the `gltf` crate, then fetches every buffer and
//! image through the [`ResourceResolver`] so side files are matched against
//! the selection instead of the file system. Node, mesh and material indices
//! are kept identical to the document's.

use std::sync::Arc;

use glam::{Quat, Vec2, Vec3, Vec4};

use super::{ModelFormat, ResourceResolver, SelectedFile, model_name};
use crate::error::{Error, Result};
use crate::scene::{Material, Mesh, Model, Node, Primitive, Skin, Texture, Transform};

pub(super) fn load(
    file: &SelectedFile,
    format: ModelFormat,
    resolver: &mut ResourceResolver<'_>,
) -> Result<Model> {
    let load_error = |message: String| Error::ModelLoad { format, message };

    let gltf::Gltf { document, blob } =
        gltf::Gltf::from_slice(&file.bytes).map_err(|e| load_error(e.to_string()))?;

    let buffers = load_buffers(&document, blob, resolver, format)?;
    let textures = load_textures(&document, &buffers, resolver);

    let mut model = Model::new(model_name(file));

    for material in document.materials() {
        let pbr = material.pbr_metallic_roughness();
        let texture = pbr
            .base_color_texture()
            .and_then(|info| textures.get(info.texture().source().index()).cloned())
            .flatten();
        model.add_material(Material {
            name: material.name().unwrap_or_default().to_string(),
            base_color: Vec4::from_array(pbr.base_color_factor()),
            texture,
        });
    }

    for mesh in document.meshes() {
        let mut primitives = Vec::new();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                tracing::debug!(
                    "Skipping {:?} primitive in mesh {}",
                    primitive.mode(),
                    mesh.index()
                );
                continue;
            }
            primitives.push(read_primitive(&primitive, &buffers));
        }
        model.add_mesh(Mesh {
            name: mesh
                .name()
                .map_or_else(|| format!("Mesh_{}", mesh.index()), str::to_string),
            primitives,
        });
    }

    for node in document.nodes() {
        let (translation, rotation, scale) = node.transform().decomposed();
        model.add_node(Node {
            name: node.name().unwrap_or_default().to_string(),
            transform: Transform {
                translation: Vec3::from_array(translation),
                rotation: Quat::from_array(rotation),
                scale: Vec3::from_array(scale),
            },
            mesh: node.mesh().map(|m| m.index()),
            skin: node.skin().map(|s| s.index()),
            children: node.children().map(|c| c.index()).collect(),
        });
    }

    for skin in document.skins() {
        model.skins.push(Skin {
            name: skin.name().unwrap_or("Skeleton").to_string(),
            joints: skin.joints().map(|j| j.index()).collect(),
        });
    }

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next());
    match scene {
        Some(scene) => {
            for root in scene.nodes() {
                model.add_root(root.index());
            }
        }
        None => {
            // No scene: every node without a parent is a root
            let mut has_parent = vec![false; model.nodes().len()];
            for node in model.nodes() {
                for &child in &node.children {
                    if let Some(flag) = has_parent.get_mut(child) {
                        *flag = true;
                    }
                }
            }
            for (id, _) in has_parent.iter().enumerate().filter(|(_, p)| !**p) {
                model.add_root(id);
            }
        }
    }

    Ok(model)
}

fn load_buffers(
    document: &gltf::Document,
    mut blob: Option<Vec<u8>>,
    resolver: &mut ResourceResolver<'_>,
    format: ModelFormat,
) -> Result<Vec<Arc<[u8]>>> {
    let mut buffers = Vec::with_capacity(document.buffers().len());
    for buffer in document.buffers() {
        let data: Arc<[u8]> = match buffer.source() {
            gltf::buffer::Source::Bin => blob.take().map(Into::into).ok_or_else(|| {
                Error::ModelLoad {
                    format,
                    message: "binary chunk missing".to_string(),
                }
            })?,
            gltf::buffer::Source::Uri(uri) => {
                resolver
                    .fetch(uri)?
                    .ok_or_else(|| Error::CriticalResourceMissing {
                        name: super::resolver::basename(uri),
                    })?
            }
        };
        if data.len() < buffer.length() {
            return Err(Error::ModelLoad {
                format,
                message: format!(
                    "buffer {} is {} bytes, expected {}",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                ),
            });
        }
        buffers.push(data);
    }
    Ok(buffers)
}

/// Decode every image. Failures leave a hole and a warning.
fn load_textures(
    document: &gltf::Document,
    buffers: &[Arc<[u8]>],
    resolver: &mut ResourceResolver<'_>,
) -> Vec<Option<Arc<Texture>>> {
    document
        .images()
        .map(|source| {
            let name = source
                .name()
                .map_or_else(|| format!("Image_{}", source.index()), str::to_string);
            let (bytes, label) = match source.source() {
                gltf::image::Source::View { view, .. } => {
                    let start = view.offset();
                    let end = start + view.length();
                    let bytes = buffers
                        .get(view.buffer().index())
                        .and_then(|b| b.get(start..end))
                        .map(<[u8]>::to_vec);
                    (bytes, name.clone())
                }
                gltf::image::Source::Uri { uri, .. } => {
                    // Missing images are never critical, so this cannot fail
                    let bytes = resolver.fetch(uri).ok().flatten().map(|b| b.to_vec());
                    (bytes, uri.to_string())
                }
            };

            let bytes = bytes?;
            match image::load_from_memory(&bytes) {
                Ok(decoded) => Some(Arc::new(Texture {
                    name,
                    image: decoded.to_rgba8(),
                    flip_y: false,
                })),
                Err(e) => {
                    tracing::warn!("Failed to decode texture {}: {}", label, e);
                    resolver.warn(&label);
                    None
                }
            }
        })
        .collect()
}

fn read_primitive(primitive: &gltf::Primitive<'_>, buffers: &[Arc<[u8]>]) -> Primitive {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .map(|iter| iter.map(Vec3::from_array).collect())
        .unwrap_or_default();
    let normals = reader
        .read_normals()
        .map(|iter| iter.map(Vec3::from_array).collect())
        .unwrap_or_default();
    let uvs = reader
        .read_tex_coords(0)
        .map(|tc| tc.into_f32().map(Vec2::from_array).collect())
        .unwrap_or_default();
    let colors = reader
        .read_colors(0)
        .map(|c| c.into_rgba_f32().map(Vec4::from_array).collect())
        .unwrap_or_default();
    let indices = reader
        .read_indices()
        .map(|i| i.into_u32().collect())
        .unwrap_or_default();

    Primitive {
        positions,
        normals,
        uvs,
        colors,
        indices,
        material: primitive.material().index(),
    }
}
