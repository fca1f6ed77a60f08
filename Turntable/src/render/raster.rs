//! CPU rasterizer
//!
//! Triangles are transformed to clip space, culled when any vertex sits
//! behind the eye, and filled with edge functions over their screen bounds.
//! Attributes are interpolated perspective-correct and shaded with two-sided
//! Lambert lighting in linear space. With antialiasing on, the surface is
//! rendered at twice the output size and box-filtered on capture.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use image::{Rgba, RgbaImage};

use super::color::{linear_to_srgb_rgb, srgb_to_linear};
use super::{CapturedFrame, Renderer};
use crate::camera::Camera;
use crate::config::Rgb;
use crate::error::{Error, Result};
use crate::scene::{Light, Material, Mesh, Model, Node, NodeId, Primitive, SceneVisitor, Texture};

/// Smallest clip-space `w` a vertex may have to be rasterized.
const MIN_CLIP_W: f32 = 1e-5;

/// Output surface multiplier when antialiasing.
const SUPERSAMPLE: u32 = 2;

/// Offscreen renderer that needs neither a GPU nor a window.
#[derive(Debug, Clone)]
pub struct SoftwareRenderer {
    width: u32,
    height: u32,
    supersample: u32,
    clear_color: Rgb,
    color: RgbaImage,
    depth: Vec<f32>,
}

impl SoftwareRenderer {
    /// Create a renderer producing `width × height` frames.
    ///
    /// # Errors
    /// Returns [`Error::Render`] if either dimension is zero.
    pub fn new(width: u32, height: u32, antialias: bool) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Render(format!(
                "surface size must be non-zero, got {width}x{height}"
            )));
        }
        let supersample = if antialias { SUPERSAMPLE } else { 1 };
        let (w, h) = (width * supersample, height * supersample);
        let mut renderer = Self {
            width,
            height,
            supersample,
            clear_color: Rgb::BLACK,
            color: RgbaImage::new(w, h),
            depth: vec![f32::INFINITY; (w as usize) * (h as usize)],
        };
        renderer.clear();
        Ok(renderer)
    }

    /// The surface downsampled to output size.
    #[must_use]
    pub fn snapshot(&self) -> RgbaImage {
        if self.supersample == 1 {
            return self.color.clone();
        }
        let s = self.supersample;
        let samples = s * s;
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let mut sum = [0u32; 4];
            for dy in 0..s {
                for dx in 0..s {
                    let pixel = self.color.get_pixel(x * s + dx, y * s + dy);
                    for (acc, channel) in sum.iter_mut().zip(pixel.0) {
                        *acc += u32::from(channel);
                    }
                }
            }
            Rgba(sum.map(|c| ((c + samples / 2) / samples) as u8))
        })
    }

    fn fill(&mut self, color: Rgb) {
        let pixel = Rgba(color.to_rgba());
        for p in self.color.pixels_mut() {
            *p = pixel;
        }
    }

    fn reset_depth(&mut self) {
        self.depth.fill(f32::INFINITY);
    }
}

impl Renderer for SoftwareRenderer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_clear_color(&mut self, color: Rgb) {
        self.clear_color = color;
    }

    fn clear(&mut self) {
        self.fill(self.clear_color);
        self.reset_depth();
    }

    fn render(&mut self, scene: &crate::scene::Scene, camera: &Camera) -> Result<()> {
        if let Some(background) = scene.background {
            self.fill(background);
        }
        self.reset_depth();

        let Some(model) = &scene.model else {
            return Ok(());
        };

        let lighting = Lighting::from_lights(&scene.lights);
        let view_projection = camera.projection_matrix() * camera.view_matrix();

        let mut draws = DrawList::default();
        model.traverse(&mut draws);

        for (node_id, world) in draws.0 {
            let Some(mesh) = mesh_of(model, node_id) else {
                continue;
            };
            let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
            for primitive in &mesh.primitives {
                let material = model.material(primitive.material);
                let pass = DrawPass {
                    world,
                    normal_matrix,
                    view_projection,
                    eye: camera.position,
                    lighting: &lighting,
                    material,
                };
                self.draw_primitive(primitive, &pass);
            }
        }
        Ok(())
    }

    fn capture_bitmap(&self) -> Result<CapturedFrame> {
        CapturedFrame::from_image(&self.snapshot())
    }
}

fn mesh_of(model: &Model, node_id: NodeId) -> Option<&Mesh> {
    let index = model.node(node_id)?.mesh?;
    model.meshes.get(index).map(AsRef::as_ref)
}

/// Mesh-carrying nodes in traversal order with their world matrices.
#[derive(Default)]
struct DrawList(Vec<(NodeId, Mat4)>);

impl SceneVisitor for DrawList {
    fn visit_node(&mut self, id: NodeId, node: &Node, world: &Mat4) {
        if node.mesh.is_some() {
            self.0.push((id, *world));
        }
    }
}

// ============================================================================
// Lighting
// ============================================================================

struct Lighting {
    ambient: Vec3,
    /// Unit direction toward each light, with its premultiplied color.
    directional: Vec<(Vec3, Vec3)>,
}

impl Lighting {
    fn from_lights(lights: &[Light]) -> Self {
        let mut ambient = Vec3::ZERO;
        let mut directional = Vec::new();
        for light in lights {
            match *light {
                Light::Ambient { color, intensity } => ambient += color * intensity,
                Light::Directional {
                    color,
                    intensity,
                    position,
                } => {
                    if let Some(direction) = position.try_normalize() {
                        directional.push((direction, color * intensity));
                    }
                }
            }
        }
        Self {
            ambient,
            directional,
        }
    }

    fn irradiance(&self, normal: Vec3) -> Vec3 {
        self.directional
            .iter()
            .fold(self.ambient, |acc, (direction, color)| {
                acc + *color * normal.dot(*direction).max(0.0)
            })
    }
}

// ============================================================================
// Rasterization
// ============================================================================

struct DrawPass<'a> {
    world: Mat4,
    normal_matrix: Mat3,
    view_projection: Mat4,
    eye: Vec3,
    lighting: &'a Lighting,
    material: Option<&'a Material>,
}

/// A vertex after projection, carrying what the fragment stage needs.
#[derive(Clone, Copy)]
struct ScreenVertex {
    screen: Vec2,
    depth: f32,
    inv_w: f32,
    world: Vec3,
    normal: Vec3,
    uv: Vec2,
    color: Vec4,
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl SoftwareRenderer {
    fn draw_primitive(&mut self, primitive: &Primitive, pass: &DrawPass<'_>) {
        let surface = Vec2::new(self.color.width() as f32, self.color.height() as f32);

        for [i0, i1, i2] in primitive.triangles() {
            let world = [i0, i1, i2].map(|i| pass.world.transform_point3(primitive.positions[i]));
            let face_normal = (world[1] - world[0])
                .cross(world[2] - world[0])
                .try_normalize()
                .unwrap_or(Vec3::Z);

            let mut vertices = [None; 3];
            for (slot, (&index, &world_pos)) in
                vertices.iter_mut().zip([i0, i1, i2].iter().zip(&world))
            {
                let clip = pass.view_projection * world_pos.extend(1.0);
                if clip.w <= MIN_CLIP_W {
                    break;
                }
                let ndc = clip.truncate() / clip.w;
                let normal = primitive
                    .normals
                    .get(index)
                    .and_then(|n| (pass.normal_matrix * *n).try_normalize())
                    .unwrap_or(face_normal);
                *slot = Some(ScreenVertex {
                    screen: Vec2::new(
                        (ndc.x * 0.5 + 0.5) * surface.x,
                        (0.5 - ndc.y * 0.5) * surface.y,
                    ),
                    depth: ndc.z,
                    inv_w: 1.0 / clip.w,
                    world: world_pos,
                    normal,
                    uv: primitive.uvs.get(index).copied().unwrap_or(Vec2::ZERO),
                    color: primitive.colors.get(index).copied().unwrap_or(Vec4::ONE),
                });
            }

            if let [Some(a), Some(b), Some(c)] = vertices {
                self.fill_triangle([a, b, c], pass);
            }
        }
    }

    fn fill_triangle(&mut self, v: [ScreenVertex; 3], pass: &DrawPass<'_>) {
        let area = edge(v[0].screen, v[1].screen, v[2].screen);
        if area.abs() < f32::EPSILON {
            return;
        }

        let width = self.color.width();
        let height = self.color.height();
        let min = v[0].screen.min(v[1].screen).min(v[2].screen).floor().max(Vec2::ZERO);
        let max = v[0]
            .screen
            .max(v[1].screen)
            .max(v[2].screen)
            .ceil()
            .min(Vec2::new(width as f32, height as f32));
        if min.x >= max.x || min.y >= max.y {
            return;
        }

        for y in (min.y as u32)..(max.y as u32) {
            for x in (min.x as u32)..(max.x as u32) {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let b0 = edge(v[1].screen, v[2].screen, p) / area;
                let b1 = edge(v[2].screen, v[0].screen, p) / area;
                let b2 = edge(v[0].screen, v[1].screen, p) / area;
                if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                    continue;
                }

                let depth = b0 * v[0].depth + b1 * v[1].depth + b2 * v[2].depth;
                if !(-1.0..=1.0).contains(&depth) {
                    continue;
                }
                let index = (y * width + x) as usize;
                if depth >= self.depth[index] {
                    continue;
                }

                let w = Vec3::new(b0 * v[0].inv_w, b1 * v[1].inv_w, b2 * v[2].inv_w);
                let w = w / (w.x + w.y + w.z);
                let rgb = shade(&v, w, pass);

                self.depth[index] = depth;
                let [r, g, b] = linear_to_srgb_rgb(rgb);
                self.color.put_pixel(x, y, Rgba([r, g, b, 255]));
            }
        }
    }
}

fn shade(v: &[ScreenVertex; 3], w: Vec3, pass: &DrawPass<'_>) -> Vec3 {
    let world = v[0].world * w.x + v[1].world * w.y + v[2].world * w.z;
    let uv = v[0].uv * w.x + v[1].uv * w.y + v[2].uv * w.z;
    let vertex_color = v[0].color * w.x + v[1].color * w.y + v[2].color * w.z;
    let mut normal = (v[0].normal * w.x + v[1].normal * w.y + v[2].normal * w.z)
        .try_normalize()
        .unwrap_or(Vec3::Z);

    // Back faces are lit as if facing the viewer
    if normal.dot(pass.eye - world) < 0.0 {
        normal = -normal;
    }

    let mut base = vertex_color.truncate();
    if let Some(material) = pass.material {
        base *= material.base_color.truncate();
        if let Some(texture) = &material.texture {
            base *= sample(texture, uv);
        }
    }

    base * pass.lighting.irradiance(normal)
}

/// Bilinear, repeat-wrapped sample returning linear RGB.
fn sample(texture: &Texture, uv: Vec2) -> Vec3 {
    let (width, height) = texture.image.dimensions();
    if width == 0 || height == 0 {
        return Vec3::ONE;
    }
    let v = if texture.flip_y { 1.0 - uv.y } else { uv.y };
    let x = uv.x * width as f32 - 0.5;
    let y = v * height as f32 - 0.5;
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);

    let texel = |tx: f32, ty: f32| {
        let px = (tx as i64).rem_euclid(i64::from(width)) as u32;
        let py = (ty as i64).rem_euclid(i64::from(height)) as u32;
        let [r, g, b, _] = texture.image.get_pixel(px, py).0;
        Vec3::new(srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b))
    };

    let top = texel(x0, y0).lerp(texel(x0 + 1.0, y0), fx);
    let bottom = texel(x0, y0 + 1.0).lerp(texel(x0 + 1.0, y0 + 1.0), fx);
    top.lerp(bottom, fy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_util::cube_model;
    use crate::scene::{LightRig, Scene};

    fn capture_camera() -> Camera {
        let mut camera = Camera::perspective(40.0, 1.0, 0.1, 1000.0);
        camera.position = Vec3::new(0.0, 0.0, 8.0);
        camera
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(SoftwareRenderer::new(0, 10, false).is_err());
    }

    #[test]
    fn test_empty_scene_paints_background() {
        let mut renderer = SoftwareRenderer::new(8, 8, true).unwrap();
        let scene = Scene::new(Some(Rgb([10, 20, 30])), LightRig::capture());
        renderer.render(&scene, &capture_camera()).unwrap();

        let image = renderer.snapshot();
        assert_eq!(image.dimensions(), (8, 8));
        assert!(image.pixels().all(|p| p.0 == [10, 20, 30, 255]));
    }

    #[test]
    fn test_cube_covers_center_not_corners() {
        let mut renderer = SoftwareRenderer::new(32, 32, false).unwrap();
        let mut scene = Scene::new(Some(Rgb::BLACK), LightRig::capture());
        scene.model = Some(cube_model(Vec3::ZERO, 2.0));
        renderer.render(&scene, &capture_camera()).unwrap();

        let image = renderer.snapshot();
        let center = image.get_pixel(16, 16).0;
        assert!(center[0] > 0, "cube should be lit red, got {center:?}");
        assert_eq!(center[1], 0);
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut scene = Scene::new(Some(Rgb::WHITE), LightRig::capture());
        scene.model = Some(cube_model(Vec3::ZERO, 2.0));

        let mut renderer = SoftwareRenderer::new(24, 24, true).unwrap();
        renderer.render(&scene, &capture_camera()).unwrap();
        let first = renderer.capture_bitmap().unwrap();
        renderer.render(&scene, &capture_camera()).unwrap();
        let second = renderer.capture_bitmap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.decode().unwrap().dimensions(), (24, 24));
    }

    #[test]
    fn test_geometry_behind_camera_is_skipped() {
        let mut renderer = SoftwareRenderer::new(16, 16, false).unwrap();
        let mut scene = Scene::new(Some(Rgb::BLACK), LightRig::capture());
        scene.model = Some(cube_model(Vec3::new(0.0, 0.0, 20.0), 2.0));
        renderer.render(&scene, &capture_camera()).unwrap();
        assert!(renderer.snapshot().pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }
}
