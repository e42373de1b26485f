//! Model loading and caching: parsers, texture decoding, GPU-ready packing and
//! the [`ModelLoadManager`] façade renderers call into.

pub mod format;
pub mod manager;
pub mod mesh;
pub mod obj;
pub mod pack;
pub mod scene;
pub mod texture;

#[cfg(test)]
mod test_support;

pub use corelib::{LoadError, LoadResult};
pub use format::ModelFormat;
pub use manager::{LoadStats, ManagerConfig, ModelLoadManager};
pub use mesh::{Mesh, Model, Vertex};
pub use pack::{PackedGeometry, PackedVertex};
pub use scene::{PostProcess, SceneImporter};
pub use texture::{Texture, TextureKind};
