//! Wavefront OBJ loader.
//!
//! Geometry is parsed with `tobj` (triangulated, single index). The material
//! library is looked up in the selection by the `mtllib` basename, falling
//! back to any `.mtl` file that was selected with the model.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};

use super::{ModelFormat, ResourceResolver, SelectedFile, model_name};
use crate::error::{Error, Result};
use crate::scene::{Material, Mesh, Model, Node, Primitive, Texture};

/// How the material library request was satisfied.
#[derive(Debug, Default)]
struct MtlLookup {
    requested: Option<String>,
    used: Option<String>,
}

pub(super) fn load(file: &SelectedFile, resolver: &mut ResourceResolver<'_>) -> Result<Model> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };

    let selection = resolver.selection();
    let lookup = RefCell::new(MtlLookup::default());
    let (objects, materials) = tobj::load_obj_buf(&mut &file.bytes[..], &options, |path| {
        let requested = path.to_string_lossy().into_owned();
        let name = super::resolver::basename(&requested);
        let library = selection
            .find_by_basename(&name)
            .or_else(|| selection.find_by_extension("mtl"));

        let mut record = lookup.borrow_mut();
        record.requested = Some(requested);
        let Some(library) = library else {
            return Err(tobj::LoadError::OpenFileFailed);
        };
        record.used = Some(library.name.clone());
        tobj::load_mtl_buf(&mut &library.bytes[..])
    })
    .map_err(|e| Error::ModelLoad {
        format: ModelFormat::Obj,
        message: e.to_string(),
    })?;

    let lookup = lookup.into_inner();
    if let Some(requested) = &lookup.requested {
        match &lookup.used {
            Some(used) if *used == super::resolver::basename(requested) => {
                resolver.fetch(requested)?;
            }
            Some(used) => {
                tracing::debug!("Using {} for material library {}", used, requested);
                resolver.fetch(used)?;
            }
            None => {
                resolver.fetch(requested)?;
            }
        }
    }

    let materials = match materials {
        Ok(materials) => materials,
        Err(e) => {
            if lookup.used.is_some() {
                tracing::warn!("Failed to parse material library: {}", e);
            }
            Vec::new()
        }
    };

    let mut model = Model::new(model_name(file));
    let mut textures: HashMap<String, Option<Arc<Texture>>> = HashMap::new();
    for material in &materials {
        let texture = material.diffuse_texture.as_deref().and_then(|map| {
            textures
                .entry(map.to_string())
                .or_insert_with(|| load_texture(map, resolver))
                .clone()
        });
        let [r, g, b] = material.diffuse.unwrap_or([1.0; 3]);
        model.add_material(Material {
            name: material.name.clone(),
            base_color: Vec4::new(r, g, b, material.dissolve.unwrap_or(1.0)),
            texture,
        });
    }

    let group = model.add_node(Node::named(model.name.clone()));
    model.add_root(group);
    for object in objects {
        let mesh = model.add_mesh(Mesh {
            name: object.name.clone(),
            primitives: vec![convert_mesh(&object.mesh, materials.len())],
        });
        let node = model.add_node(Node {
            mesh: Some(mesh),
            ..Node::named(object.name)
        });
        model.add_child(group, node);
    }

    Ok(model)
}

fn load_texture(map: &str, resolver: &mut ResourceResolver<'_>) -> Option<Arc<Texture>> {
    // Texture maps are never critical
    let bytes = resolver.fetch(map).ok().flatten()?;
    match image::load_from_memory(&bytes) {
        Ok(decoded) => Some(Arc::new(Texture {
            name: super::resolver::basename(map),
            image: decoded.to_rgba8(),
            flip_y: true,
        })),
        Err(e) => {
            tracing::warn!("Failed to decode texture {}: {}", map, e);
            resolver.warn(map);
            None
        }
    }
}

fn convert_mesh(mesh: &tobj::Mesh, material_count: usize) -> Primitive {
    let positions = mesh
        .positions
        .chunks_exact(3)
        .map(|p| Vec3::new(p[0], p[1], p[2]))
        .collect();
    let normals = mesh
        .normals
        .chunks_exact(3)
        .map(|n| Vec3::new(n[0], n[1], n[2]))
        .collect();
    let uvs = mesh
        .texcoords
        .chunks_exact(2)
        .map(|t| Vec2::new(t[0], t[1]))
        .collect();
    let colors = mesh
        .vertex_color
        .chunks_exact(3)
        .map(|c| Vec4::new(c[0], c[1], c[2], 1.0))
        .collect();

    Primitive {
        positions,
        normals,
        uvs,
        colors,
        indices: mesh.indices.clone(),
        material: mesh.material_id.filter(|&id| id < material_count),
    }
}
