//! Texture data and the resolver that decodes embedded or on-disk images.
//!
//! A failed decode never fails the model load: the texture is still produced,
//! with no pixel buffer, and the renderer skips that slot.

use std::{
    borrow::Cow,
    fmt,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU32, AtomicUsize, Ordering},
    },
};

use anyhow::{Context, Result, anyhow, bail};
use image::DynamicImage;
use parking_lot::Mutex;

/// Material slot a texture is bound to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureKind {
    pub const ALL: [TextureKind; 4] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Normal,
        TextureKind::Height,
    ];

    /// Sampler name conventionally used by shaders for this slot.
    pub fn uniform_name(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "texture_diffuse",
            TextureKind::Specular => "texture_specular",
            TextureKind::Normal => "texture_normal",
            TextureKind::Height => "texture_height",
        }
    }
}

/// Decoded image of a model material.
///
/// The pixel buffer is owned here until the renderer takes it for upload and
/// hands it back through `ModelLoadManager::release_texture`, or until the
/// texture itself is dropped with the last reference to its model. The GPU
/// handle slot is written by the renderer only.
pub struct Texture {
    kind: TextureKind,
    width: u32,
    height: u32,
    channels: u8,
    pixels: Mutex<Option<Vec<u8>>>,
    handle: AtomicU32,
    release_counter: Option<Arc<AtomicUsize>>,
}

impl Texture {
    pub fn new(kind: TextureKind, width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Self {
        Self {
            kind,
            width,
            height,
            channels,
            pixels: Mutex::new(Some(pixels)),
            handle: AtomicU32::new(0),
            release_counter: None,
        }
    }

    /// Texture whose payload could not be decoded.
    pub fn failed(kind: TextureKind) -> Self {
        Self {
            kind,
            width: 0,
            height: 0,
            channels: 0,
            pixels: Mutex::new(None),
            handle: AtomicU32::new(0),
            release_counter: None,
        }
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// `false` after a failed decode or once the buffer has been taken.
    pub fn has_pixels(&self) -> bool {
        self.pixels.lock().is_some()
    }

    /// Run `f` over the pixel buffer, if still present.
    pub fn with_pixels<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        self.pixels.lock().as_deref().map(f)
    }

    /// Move the pixel buffer out; subsequent calls return `None`.
    pub fn take_pixels(&self) -> Option<Vec<u8>> {
        self.pixels.lock().take()
    }

    pub fn handle(&self) -> u32 {
        self.handle.load(Ordering::Acquire)
    }

    pub fn set_handle(&self, handle: u32) {
        self.handle.store(handle, Ordering::Release);
    }

    /// Check that the buffer (if any) matches the declared dimensions.
    pub fn is_valid(&self) -> bool {
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        self.with_pixels(|p| expected > 0 && p.len() == expected)
            .unwrap_or(false)
    }

    /// Count the buffer into `counter` if it is still owned when the texture drops.
    pub fn track_release(&mut self, counter: Arc<AtomicUsize>) {
        self.release_counter = Some(counter);
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if self.pixels.get_mut().take().is_some() {
            if let Some(counter) = &self.release_counter {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("kind", &self.kind)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("has_pixels", &self.has_pixels())
            .field("handle", &self.handle())
            .finish()
    }
}

/// Image bytes stored inside the model file.
#[derive(Clone, Debug)]
pub struct EmbeddedPayload<'a> {
    pub bytes: Cow<'a, [u8]>,
    /// Compressed payloads are encoded images (PNG, JPEG); uncompressed ones
    /// are raw RGBA8 texels of `width * height`.
    pub compressed: bool,
    pub width: u32,
    pub height: u32,
}

impl<'a> EmbeddedPayload<'a> {
    pub fn compressed(bytes: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            compressed: true,
            width: 0,
            height: 0,
        }
    }

    pub fn rgba8(bytes: impl Into<Cow<'a, [u8]>>, width: u32, height: u32) -> Self {
        Self {
            bytes: bytes.into(),
            compressed: false,
            width,
            height,
        }
    }
}

/// Where the image of a texture slot comes from.
#[derive(Clone, Debug)]
pub enum TextureSource<'a> {
    Embedded(EmbeddedPayload<'a>),
    File(PathBuf),
}

impl TextureSource<'_> {
    /// Image file declared by a model, resolved against the model's own directory.
    pub fn sibling(model_dir: &Path, declared: &str) -> Self {
        TextureSource::File(model_dir.join(declared))
    }
}

struct DecodedImage {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

/// Decodes texture sources into pixel buffers, keeping the native channel count.
#[derive(Clone, Copy, Debug)]
pub struct TextureResolver {
    flip_vertically: bool,
}

impl Default for TextureResolver {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TextureResolver {
    pub fn new(flip_vertically: bool) -> Self {
        Self { flip_vertically }
    }

    /// Decode `source` into a texture of `kind`. Failures are logged and yield a
    /// texture without pixels.
    pub fn resolve(&self, kind: TextureKind, source: &TextureSource<'_>) -> Texture {
        match self.decode(source) {
            Ok(img) => {
                log::debug!(
                    "Decoded {} texture {}x{}x{}",
                    kind.uniform_name(),
                    img.width,
                    img.height,
                    img.channels
                );
                Texture::new(kind, img.width, img.height, img.channels, img.data)
            }
            Err(e) => {
                log::error!("Texture decode failed ({}): {:#}", kind.uniform_name(), e);
                Texture::failed(kind)
            }
        }
    }

    fn decode(&self, source: &TextureSource<'_>) -> Result<DecodedImage> {
        let img = match source {
            TextureSource::File(path) => image::open(path)
                .with_context(|| format!("Failed to open image {}", path.display()))?,
            TextureSource::Embedded(payload) if payload.compressed => {
                image::load_from_memory(&payload.bytes).with_context(|| {
                    format!(
                        "Failed to decode embedded image ({} bytes)",
                        payload.bytes.len()
                    )
                })?
            }
            TextureSource::Embedded(payload) => raw_rgba8(payload)?,
        };

        let img = if self.flip_vertically { img.flipv() } else { img };
        Ok(into_native_layout(img))
    }
}

fn raw_rgba8(payload: &EmbeddedPayload<'_>) -> Result<DynamicImage> {
    let expected = payload.width as usize * payload.height as usize * 4;
    if expected == 0 {
        bail!("Embedded texture has zero size");
    }
    if payload.bytes.len() != expected {
        bail!(
            "Embedded RGBA8 texture is {} bytes, expected {} for {}x{}",
            payload.bytes.len(),
            expected,
            payload.width,
            payload.height
        );
    }
    image::RgbaImage::from_raw(payload.width, payload.height, payload.bytes.to_vec())
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| anyhow!("Embedded RGBA8 texture has an invalid layout"))
}

/// 8-bit pixels with the source's own channel count (1 to 4).
fn into_native_layout(img: DynamicImage) -> DecodedImage {
    let (width, height) = (img.width(), img.height());
    let channels = img.color().channel_count().clamp(1, 4);
    let data = match channels {
        1 => img.into_luma8().into_raw(),
        2 => img.into_luma_alpha8().into_raw(),
        3 => img.into_rgb8().into_raw(),
        _ => img.into_rgba8().into_raw(),
    };
    DecodedImage {
        width,
        height,
        channels,
        data,
    }
}
