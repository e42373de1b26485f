//! Face-indexed OBJ parser.
//!
//! The file is read in full first; face indices are resolved afterwards, so a
//! face may reference a vertex declared further down. Every face vertex becomes
//! its own output vertex, in file order. An unresolvable position or normal
//! index fails the whole file; a missing texture coordinate becomes `(0, 0)`.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use corelib::{LoadError, LoadResult};

use crate::{
    mesh::{Mesh, Model, Vertex},
    pack::{PackedGeometry, PackedVertex},
};

const DEFAULT_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];

/// Load an OBJ model from a file path.
pub fn load_obj_from_path(path: impl AsRef<Path>) -> LoadResult<Model> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let source = read_source(path, &label)?;
    source.into_model(&label)
}

/// Parse an OBJ file straight into packed geometry, skipping the [`Model`].
pub fn parse_obj_packed(path: impl AsRef<Path>) -> LoadResult<PackedGeometry> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let source = read_source(path, &label)?;
    source.into_packed(&label)
}

/// Load an OBJ model from a [`BufRead`] implementation. `label` names the
/// source in errors.
pub fn load_obj_from_reader<R: BufRead>(reader: R, label: &str) -> LoadResult<Model> {
    ObjSource::read(reader, label)?.into_model(label)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str) -> LoadResult<Model> {
    load_obj_from_reader(io::Cursor::new(contents), "<memory>")
}

fn read_source(path: &Path, label: &str) -> LoadResult<ObjSource> {
    let file = File::open(path)
        .map_err(|e| LoadError::invalid_path(label, format!("failed to open OBJ file: {e}")))?;
    ObjSource::read(BufReader::new(file), label)
}

/// Index into one of the attribute arrays, already shifted to 0-based.
/// Out-of-range values are kept as-is and rejected during resolution.
#[derive(Clone, Copy, Debug)]
struct IndexRef {
    raw: i64,
    zero_based: i64,
}

#[derive(Clone, Copy, Debug)]
struct FaceVertex {
    position: IndexRef,
    tex_coord: Option<IndexRef>,
    normal: Option<IndexRef>,
}

#[derive(Debug)]
struct Face {
    line: usize,
    vertices: Vec<FaceVertex>,
}

#[derive(Debug, Default)]
struct ObjSource {
    positions: Vec<[f32; 3]>,
    tex_coords: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
    faces: Vec<Face>,
}

impl ObjSource {
    fn read<R: BufRead>(reader: R, label: &str) -> LoadResult<Self> {
        let mut src = ObjSource::default();

        for (line_no, line) in reader.lines().enumerate() {
            let line_no = line_no + 1;
            let line = line.map_err(|e| parse_error(label, line_no, format!("read failed: {e}")))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut parts = trimmed.split_whitespace();
            let Some(tag) = parts.next() else {
                continue;
            };

            match tag {
                "v" => {
                    let x = parse_f32(parts.next(), label, line_no, "x coordinate")?;
                    let y = parse_f32(parts.next(), label, line_no, "y coordinate")?;
                    let z = parse_f32(parts.next(), label, line_no, "z coordinate")?;
                    src.positions.push([x, y, z]);
                }
                "vt" => {
                    let u = parse_f32(parts.next(), label, line_no, "u coordinate")?;
                    let v = match parts.next() {
                        Some(token) => parse_f32(Some(token), label, line_no, "v coordinate")?,
                        None => 0.0,
                    };
                    src.tex_coords.push([u, v]);
                }
                "vn" => {
                    let nx = parse_f32(parts.next(), label, line_no, "nx coordinate")?;
                    let ny = parse_f32(parts.next(), label, line_no, "ny coordinate")?;
                    let nz = parse_f32(parts.next(), label, line_no, "nz coordinate")?;
                    src.normals.push([nx, ny, nz]);
                }
                "f" => {
                    let vertices = parts
                        .map(|token| src.parse_face_vertex(token, label, line_no))
                        .collect::<LoadResult<Vec<_>>>()?;
                    if vertices.len() < 3 {
                        log::warn!(
                            "{}: skipping degenerate face with {} vertices on line {}",
                            label,
                            vertices.len(),
                            line_no
                        );
                        continue;
                    }
                    src.faces.push(Face {
                        line: line_no,
                        vertices,
                    });
                }
                _ => {
                    // Ignore other directives (o/g/s/usemtl/etc.)
                }
            }
        }

        Ok(src)
    }

    fn parse_face_vertex(&self, token: &str, label: &str, line_no: usize) -> LoadResult<FaceVertex> {
        let mut split = token.split('/');
        let position = match split.next() {
            Some(value) if !value.is_empty() => {
                parse_index(value, self.positions.len(), label, line_no)?
            }
            _ => {
                return Err(parse_error(
                    label,
                    line_no,
                    format!("malformed face element '{token}'"),
                ));
            }
        };

        let tex_coord = match split.next() {
            Some(value) if !value.is_empty() => {
                Some(parse_index(value, self.tex_coords.len(), label, line_no)?)
            }
            _ => None,
        };

        let normal = match split.next() {
            Some(value) if !value.is_empty() => {
                Some(parse_index(value, self.normals.len(), label, line_no)?)
            }
            _ => None,
        };

        Ok(FaceVertex {
            position,
            tex_coord,
            normal,
        })
    }

    fn resolve(&self, fv: &FaceVertex, label: &str, line: usize) -> LoadResult<Vertex> {
        let position = lookup(&self.positions, fv.position)
            .ok_or_else(|| out_of_range(label, line, "position", fv.position, self.positions.len()))?;

        let tex_coords = fv
            .tex_coord
            .and_then(|i| lookup(&self.tex_coords, i))
            .unwrap_or([0.0, 0.0]);

        let normal = match fv.normal {
            Some(i) => lookup(&self.normals, i)
                .ok_or_else(|| out_of_range(label, line, "normal", i, self.normals.len()))?,
            None => DEFAULT_NORMAL,
        };

        Ok(Vertex::new(position, normal, tex_coords))
    }

    /// Resolve each face and hand its vertices to `emit`.
    fn for_each_face(
        &self,
        label: &str,
        mut emit: impl FnMut(&[Vertex]) -> LoadResult<()>,
    ) -> LoadResult<()> {
        let mut scratch = Vec::new();
        for face in &self.faces {
            scratch.clear();
            for fv in &face.vertices {
                scratch.push(self.resolve(fv, label, face.line)?);
            }
            emit(&scratch)?;
        }
        Ok(())
    }

    fn into_model(self, label: &str) -> LoadResult<Model> {
        let mut vertices: Vec<Vertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();

        self.for_each_face(label, |face| {
            let base = u32::try_from(vertices.len() + face.len()).map_err(|_| {
                parse_error(label, 0, format!("too many vertices (>{})", u32::MAX))
            })? - face.len() as u32;
            vertices.extend_from_slice(face);
            // Triangulate fan
            for tri in 1..(face.len() as u32 - 1) {
                indices.push(base);
                indices.push(base + tri);
                indices.push(base + tri + 1);
            }
            Ok(())
        })?;

        if indices.is_empty() {
            log::warn!("{}: OBJ contained no faces", label);
        }
        log::debug!(
            "{}: parsed {} positions, {} faces -> {} vertices",
            label,
            self.positions.len(),
            self.faces.len(),
            vertices.len()
        );

        Ok(Model::new(vec![Mesh::new(vertices, indices, Vec::new())]))
    }

    fn into_packed(self, label: &str) -> LoadResult<PackedGeometry> {
        let total: usize = self.faces.iter().map(|f| f.vertices.len()).sum();
        let mut packed = PackedGeometry::with_capacity(total);
        self.for_each_face(label, |face| {
            for v in face {
                packed.push(PackedVertex::from(v));
            }
            Ok(())
        })?;
        Ok(packed)
    }
}

fn lookup<T: Copy>(values: &[T], index: IndexRef) -> Option<T> {
    usize::try_from(index.zero_based)
        .ok()
        .and_then(|i| values.get(i).copied())
}

fn parse_error(label: &str, line: usize, message: impl Into<String>) -> LoadError {
    LoadError::Parse {
        path: label.to_string(),
        line,
        message: message.into(),
    }
}

fn out_of_range(label: &str, line: usize, what: &str, index: IndexRef, len: usize) -> LoadError {
    parse_error(
        label,
        line,
        format!("{what} index {} out of range ({len} available)", index.raw),
    )
}

fn parse_f32(value: Option<&str>, label: &str, line_no: usize, what: &str) -> LoadResult<f32> {
    let token = value.ok_or_else(|| parse_error(label, line_no, format!("missing {what}")))?;
    token
        .parse::<f32>()
        .map_err(|_| parse_error(label, line_no, format!("invalid {what} '{token}'")))
}

/// 1-based indices become 0-based; negative ones count back from the current
/// end of the array. Zero maps below range on purpose.
fn parse_index(token: &str, len: usize, label: &str, line_no: usize) -> LoadResult<IndexRef> {
    let raw = token
        .parse::<i64>()
        .map_err(|_| parse_error(label, line_no, format!("invalid index '{token}'")))?;
    let zero_based = if raw > 0 {
        raw - 1
    } else if raw < 0 {
        len as i64 + raw
    } else {
        -1
    };
    Ok(IndexRef { raw, zero_based })
}
