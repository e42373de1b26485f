//! Fixture helpers shared by the unit tests.

use std::{
    io::Cursor,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// Fresh directory under the system temp dir.
pub fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "meshcache-{}-{}-{}",
        std::process::id(),
        NEXT_DIR.fetch_add(1, Ordering::Relaxed),
        name
    ));
    std::fs::create_dir_all(&dir).expect("create fixture dir");
    dir
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

pub fn png_bytes(img: &image::DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}

pub fn checker_png() -> Vec<u8> {
    let img = image::RgbaImage::from_fn(4, 4, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([128, 128, 128, 255])
        }
    });
    png_bytes(&image::DynamicImage::ImageRgba8(img))
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Knobs for the two-node glTF fixture.
///
/// Node 0 holds an indexed triangle (4 positions, UVs, no normals); its child,
/// node 1, holds a 4-vertex primitive drawn with `second_mode`.
pub struct GltfFixture<'a> {
    pub image_uri: Option<&'a str>,
    pub root_nodes: &'a str,
    pub second_mode: u32,
}

impl Default for GltfFixture<'_> {
    fn default() -> Self {
        Self {
            image_uri: None,
            root_nodes: "[0]",
            second_mode: 5,
        }
    }
}

const GLTF_TEMPLATE: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [ { "nodes": @ROOTS@ } ],
  "nodes": [ { "mesh": 0, "children": [1] }, { "mesh": 1 } ],
  "meshes": [
    { "primitives": [ { "attributes": { "POSITION": 0, "TEXCOORD_0": 1 }, "indices": 2, "material": 0 } ] },
    { "primitives": [ { "attributes": { "POSITION": 0 }, "mode": @MODE@ } ] }
  ],
  @MATERIALS@
  "buffers": [ @BUFFER@ ],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 48 },
    { "buffer": 0, "byteOffset": 48, "byteLength": 32 },
    { "buffer": 0, "byteOffset": 80, "byteLength": 12 }@IMAGE_VIEW@
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3", "min": [0, 0, 0], "max": [2, 3, 0] },
    { "bufferView": 1, "componentType": 5126, "count": 4, "type": "VEC2" },
    { "bufferView": 2, "componentType": 5125, "count": 3, "type": "SCALAR" }
  ]
}"#;

fn fixture_buffer() -> Vec<u8> {
    let positions: [f32; 12] = [0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0, 0.0, 2.0, 3.0, 0.0];
    let uvs: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
    let indices: [u32; 3] = [0, 1, 2];

    let mut bytes = Vec::with_capacity(92);
    for f in positions.iter().chain(uvs.iter()) {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    for i in indices {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes
}

fn scene_json(fixture: &GltfFixture<'_>, buffer: &str, image: Option<&str>, image_view: &str) -> String {
    let materials = match image {
        Some(image) => format!(
            r#""materials": [ {{ "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }} }}, "normalTexture": {{ "index": 0 }} }} ],
  "textures": [ {{ "source": 0 }} ],
  "images": [ {image} ],"#
        ),
        None => r#""materials": [ {} ],"#.to_string(),
    };
    GLTF_TEMPLATE
        .replace("@ROOTS@", fixture.root_nodes)
        .replace("@MODE@", &fixture.second_mode.to_string())
        .replace("@MATERIALS@", &materials)
        .replace("@BUFFER@", buffer)
        .replace("@IMAGE_VIEW@", image_view)
}

/// Write the fixture as `dir/name` and return its path.
pub fn write_gltf(dir: &Path, name: &str, fixture: &GltfFixture<'_>) -> PathBuf {
    let buffer = format!(
        r#"{{ "byteLength": 92, "uri": "{}" }}"#,
        data_uri("application/octet-stream", &fixture_buffer())
    );
    let image = fixture.image_uri.map(|uri| format!(r#"{{ "uri": "{uri}" }}"#));
    let json = scene_json(fixture, &buffer, image.as_deref(), "");
    write_file(dir, name, json.as_bytes())
}

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;
const GLB_CHUNK_BIN: u32 = 0x004E_4942;

/// Write the fixture as a binary container: geometry and `image` (PNG bytes,
/// referenced through a buffer view) live in the BIN chunk. `image_uri` is
/// ignored.
pub fn write_glb(dir: &Path, name: &str, fixture: &GltfFixture<'_>, image: Option<&[u8]>) -> PathBuf {
    let mut bin = fixture_buffer();
    let geometry_len = bin.len();
    let (image_json, image_view) = match image {
        Some(png) => {
            bin.extend_from_slice(png);
            (
                Some(r#"{ "bufferView": 3, "mimeType": "image/png" }"#),
                format!(
                    ",\n    {{ \"buffer\": 0, \"byteOffset\": {geometry_len}, \"byteLength\": {} }}",
                    png.len()
                ),
            )
        }
        None => (None, String::new()),
    };
    let buffer = format!(r#"{{ "byteLength": {} }}"#, bin.len());
    let mut json = scene_json(fixture, &buffer, image_json, &image_view).into_bytes();

    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    for (kind, chunk) in [(GLB_CHUNK_JSON, &json), (GLB_CHUNK_BIN, &bin)] {
        out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(chunk);
    }
    write_file(dir, name, &out)
}
