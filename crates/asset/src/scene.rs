//! Scene importer adapter for glTF 2.0 (`.gltf` / `.glb`).
//!
//! The node tree of the default scene is walked depth-first; every primitive of
//! every mesh a node references becomes one [`Mesh`]. Node transforms are not
//! applied, matching a plain (non pre-transformed) import.

use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use corelib::{LoadError, LoadResult};
use glam::{Vec2, Vec3};
use gltf::{buffer, mesh::Mode};

use crate::{
    mesh::{Mesh, Model, Vertex},
    texture::{EmbeddedPayload, Texture, TextureKind, TextureResolver, TextureSource},
};

/// Post-processing applied to every imported primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostProcess {
    /// Turn strips and fans into triangle lists.
    pub triangulate: bool,
    /// Area-weighted vertex normals for primitives that have none.
    pub gen_smooth_normals: bool,
    /// `v -> 1 - v` on texture coordinates.
    pub flip_uvs: bool,
    /// Tangents and bitangents for primitives with texture coordinates.
    pub calc_tangent_space: bool,
    /// Flip decoded images vertically.
    pub flip_images: bool,
}

impl Default for PostProcess {
    fn default() -> Self {
        Self {
            triangulate: true,
            gen_smooth_normals: true,
            flip_uvs: true,
            calc_tangent_space: true,
            flip_images: true,
        }
    }
}

/// Imports structured scene files into a [`Model`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SceneImporter {
    post: PostProcess,
    textures: TextureResolver,
}

impl SceneImporter {
    pub fn new(post: PostProcess) -> Self {
        Self {
            post,
            textures: TextureResolver::new(post.flip_images),
        }
    }

    /// Import `path`. `label` is the cache key, used in errors and logs.
    pub fn import(&self, path: &Path, label: &str) -> LoadResult<Model> {
        let gltf::Gltf { document, blob } = gltf::Gltf::open(path).map_err(|e| match e {
            gltf::Error::Io(io) => {
                LoadError::invalid_path(label, format!("failed to open scene file: {io}"))
            }
            other => LoadError::import(label, other),
        })?;

        let model_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let buffers = gltf::import_buffers(&document, Some(model_dir), blob)
            .map_err(|e| LoadError::import(label, format!("failed to load buffers: {e}")))?;

        if document.meshes().next().is_none() {
            return Err(LoadError::import(label, "incomplete scene: no meshes"));
        }
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| LoadError::import(label, "missing root node"))?;

        let mut stack: Vec<gltf::Node<'_>> = scene.nodes().collect();
        if stack.is_empty() {
            return Err(LoadError::import(label, "missing root node"));
        }
        stack.reverse();

        let ctx = ImportContext {
            label,
            model_dir,
            buffers: &buffers,
        };
        let mut meshes = Vec::new();
        while let Some(node) = stack.pop() {
            if let Some(mesh) = node.mesh() {
                for primitive in mesh.primitives() {
                    meshes.push(self.process_primitive(&ctx, &primitive)?);
                }
            }
            let mut children: Vec<gltf::Node<'_>> = node.children().collect();
            children.reverse();
            stack.extend(children);
        }

        let model = Model::new(meshes);
        log::debug!(
            "{}: imported {} meshes, {} vertices, {} textures",
            label,
            model.meshes.len(),
            model.vertex_count(),
            model.texture_count()
        );
        Ok(model)
    }

    fn process_primitive(
        &self,
        ctx: &ImportContext<'_>,
        primitive: &gltf::Primitive<'_>,
    ) -> LoadResult<Mesh> {
        let reader = primitive.reader(|b| ctx.buffers.get(b.index()).map(|d| d.0.as_slice()));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| ctx.structural("primitive has no positions"))?
            .collect();
        let vertex_count = positions.len();

        let raw_indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..vertex_count as u32).collect(),
        };
        let indices = triangulate(primitive.mode(), raw_indices, self.post.triangulate)
            .map_err(|msg| ctx.structural(msg))?;
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(ctx.structural(format!(
                "index {bad} out of range ({vertex_count} vertices)"
            )));
        }

        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|it| it.collect());
        let tex_coords: Option<Vec<[f32; 2]>> =
            reader.read_tex_coords(0).map(|it| it.into_f32().collect());
        let tangents: Option<Vec<[f32; 4]>> = reader.read_tangents().map(|it| it.collect());

        let mut vertices: Vec<Vertex> = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| {
                let normal = normals
                    .as_ref()
                    .and_then(|n| n.get(i).copied())
                    .unwrap_or_default();
                Vertex::new(position, normal, [0.0, 0.0])
            })
            .collect();

        if normals.is_none() && self.post.gen_smooth_normals {
            smooth_normals(&mut vertices, &indices);
        }

        if let Some(uvs) = tex_coords {
            for (v, uv) in vertices.iter_mut().zip(uvs) {
                v.tex_coords = if self.post.flip_uvs {
                    [uv[0], 1.0 - uv[1]]
                } else {
                    uv
                };
            }
            if self.post.calc_tangent_space {
                match tangents {
                    Some(t) => apply_tangents(&mut vertices, &t),
                    None => compute_tangents(&mut vertices, &indices),
                }
            }
        }

        let textures = self.load_material_textures(ctx, &primitive.material());
        Ok(Mesh::new(vertices, indices, textures))
    }

    fn load_material_textures(
        &self,
        ctx: &ImportContext<'_>,
        material: &gltf::Material<'_>,
    ) -> Vec<Texture> {
        let pbr = material.pbr_metallic_roughness();
        let slots = [
            (TextureKind::Diffuse, pbr.base_color_texture().map(|i| i.texture())),
            (
                TextureKind::Specular,
                pbr.metallic_roughness_texture().map(|i| i.texture()),
            ),
            (TextureKind::Normal, material.normal_texture().map(|i| i.texture())),
            (TextureKind::Height, material.occlusion_texture().map(|i| i.texture())),
        ];

        let mut textures = Vec::new();
        for (kind, texture) in slots {
            let Some(texture) = texture else {
                continue;
            };
            let resolved = match ctx.texture_source(&texture.source()) {
                Ok(source) => self.textures.resolve(kind, &source),
                Err(msg) => {
                    log::error!("{}: {} texture unavailable: {}", ctx.label, kind.uniform_name(), msg);
                    Texture::failed(kind)
                }
            };
            textures.push(resolved);
        }
        textures
    }
}

struct ImportContext<'a> {
    label: &'a str,
    model_dir: &'a Path,
    buffers: &'a [buffer::Data],
}

impl<'a> ImportContext<'a> {
    fn structural(&self, message: impl std::fmt::Display) -> LoadError {
        LoadError::import(self.label, format!("malformed primitive: {message}"))
    }

    /// Embedded payload (buffer view or `data:` URI) or sibling file of the model.
    fn texture_source(&self, image: &gltf::Image<'_>) -> Result<TextureSource<'a>, String> {
        match image.source() {
            gltf::image::Source::View { view, .. } => {
                let data = self
                    .buffers
                    .get(view.buffer().index())
                    .ok_or_else(|| format!("buffer {} missing", view.buffer().index()))?;
                let bytes = data
                    .0
                    .get(view.offset()..view.offset() + view.length())
                    .ok_or_else(|| format!("buffer view {} out of bounds", view.index()))?;
                Ok(TextureSource::Embedded(EmbeddedPayload::compressed(bytes)))
            }
            gltf::image::Source::Uri { uri, .. } => match uri.strip_prefix("data:") {
                Some(rest) => {
                    let (_, encoded) = rest
                        .split_once(";base64,")
                        .ok_or_else(|| "only base64 data URIs are supported".to_string())?;
                    let bytes = BASE64
                        .decode(encoded.as_bytes())
                        .map_err(|e| format!("bad base64 image: {e}"))?;
                    Ok(TextureSource::Embedded(EmbeddedPayload::compressed(bytes)))
                }
                None => Ok(TextureSource::sibling(self.model_dir, uri)),
            },
        }
    }
}

/// Convert the primitive's index stream into a triangle list.
fn triangulate(mode: Mode, indices: Vec<u32>, allow_conversion: bool) -> Result<Vec<u32>, String> {
    match mode {
        Mode::Triangles => {
            if indices.len() % 3 != 0 {
                return Err(format!(
                    "{} indices do not form whole triangles",
                    indices.len()
                ));
            }
            Ok(indices)
        }
        Mode::TriangleStrip | Mode::TriangleFan if allow_conversion => {
            if indices.len() < 3 {
                return Err(format!("{mode:?} with only {} indices", indices.len()));
            }
            let mut out = Vec::with_capacity((indices.len() - 2) * 3);
            for i in 0..indices.len() - 2 {
                let tri = match mode {
                    Mode::TriangleFan => [indices[0], indices[i + 1], indices[i + 2]],
                    _ if i % 2 == 0 => [indices[i], indices[i + 1], indices[i + 2]],
                    _ => [indices[i + 1], indices[i], indices[i + 2]],
                };
                out.extend_from_slice(&tri);
            }
            Ok(out)
        }
        other => Err(format!("{other:?} primitives do not resolve to triangles")),
    }
}

fn triangles(indices: &[u32]) -> impl Iterator<Item = [usize; 3]> + '_ {
    indices
        .chunks_exact(3)
        .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
}

fn smooth_normals(vertices: &mut [Vertex], indices: &[u32]) {
    let mut acc = vec![Vec3::ZERO; vertices.len()];
    for [a, b, c] in triangles(indices) {
        let pa = Vec3::from_array(vertices[a].position);
        let pb = Vec3::from_array(vertices[b].position);
        let pc = Vec3::from_array(vertices[c].position);
        // Unnormalised cross product weights by triangle area.
        let n = (pb - pa).cross(pc - pa);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }
    for (v, n) in vertices.iter_mut().zip(acc) {
        v.normal = n.normalize_or_zero().to_array();
    }
}

fn apply_tangents(vertices: &mut [Vertex], tangents: &[[f32; 4]]) {
    for (v, t) in vertices.iter_mut().zip(tangents) {
        let n = Vec3::from_array(v.normal);
        let tangent = Vec3::new(t[0], t[1], t[2]);
        v.tangent = tangent.to_array();
        v.bitangent = (n.cross(tangent) * t[3]).to_array();
    }
}

fn compute_tangents(vertices: &mut [Vertex], indices: &[u32]) {
    let mut tan = vec![Vec3::ZERO; vertices.len()];
    let mut bitan = vec![Vec3::ZERO; vertices.len()];
    for [a, b, c] in triangles(indices) {
        let (pa, pb, pc) = (
            Vec3::from_array(vertices[a].position),
            Vec3::from_array(vertices[b].position),
            Vec3::from_array(vertices[c].position),
        );
        let (ta, tb, tc) = (
            Vec2::from_array(vertices[a].tex_coords),
            Vec2::from_array(vertices[b].tex_coords),
            Vec2::from_array(vertices[c].tex_coords),
        );
        let (e1, e2) = (pb - pa, pc - pa);
        let (d1, d2) = (tb - ta, tc - ta);
        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let t = (e1 * d2.y - e2 * d1.y) * r;
        let bt = (e2 * d1.x - e1 * d2.x) * r;
        for i in [a, b, c] {
            tan[i] += t;
            bitan[i] += bt;
        }
    }
    for ((v, t), b) in vertices.iter_mut().zip(tan).zip(bitan) {
        let n = Vec3::from_array(v.normal);
        // Gram-Schmidt against the normal.
        let t = (t - n * n.dot(t)).normalize_or_zero();
        v.tangent = t.to_array();
        v.bitangent = b.normalize_or_zero().to_array();
    }
}
