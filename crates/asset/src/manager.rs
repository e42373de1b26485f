//! Model load manager: the façade renderers call into.
//!
//! Parsed models and their packed geometry are memoised in two LRU caches keyed
//! by normalised path; extents are memoised without bound. All cache state sits
//! behind one mutex, held for the whole load, so concurrent callers asking for
//! the same path parse it once.
//!
//! Evicting a model only drops the cache's reference. Its texture buffers are
//! released when the last holder lets go of the model.

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use corelib::{LoadResult, LruCache};
use parking_lot::Mutex;

use crate::{
    format::{ModelFormat, normalize_path},
    mesh::{MIN_EXTENT, Model},
    obj,
    pack::{PackedGeometry, pack_model},
    scene::{PostProcess, SceneImporter},
};

/// Construction-time settings. Nothing here can change afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManagerConfig {
    pub model_capacity: usize,
    pub packed_capacity: usize,
    pub post_process: PostProcess,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            model_capacity: 20,
            packed_capacity: 20,
            post_process: PostProcess::default(),
        }
    }
}

/// Counters for observing cache behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Parser or importer invocations, successful or not.
    pub parses: usize,
    pub model_hits: usize,
    pub packed_hits: usize,
    pub model_evictions: usize,
    pub packed_evictions: usize,
    /// Pixel buffers released, through `release_texture` or when the last
    /// reference to their model is dropped.
    pub textures_released: usize,
}

struct CacheState {
    models: LruCache<String, Arc<Model>>,
    packed: LruCache<String, Arc<PackedGeometry>>,
    extents: HashMap<String, f32>,
    stats: LoadStats,
}

impl CacheState {
    fn evict_model(&mut self, key: &str, model: Arc<Model>) {
        self.stats.model_evictions += 1;
        log::debug!(
            "Evicted model {} ({} other holders)",
            key,
            Arc::strong_count(&model) - 1
        );
    }
}

pub struct ModelLoadManager {
    importer: SceneImporter,
    released: Arc<AtomicUsize>,
    state: Mutex<CacheState>,
}

impl Default for ModelLoadManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl ModelLoadManager {
    pub fn new(config: ManagerConfig) -> Self {
        log::info!(
            "Model cache capacity {}, packed geometry cache capacity {}",
            config.model_capacity.max(1),
            config.packed_capacity.max(1)
        );
        Self {
            importer: SceneImporter::new(config.post_process),
            released: Arc::new(AtomicUsize::new(0)),
            state: Mutex::new(CacheState {
                models: LruCache::new(config.model_capacity),
                packed: LruCache::new(config.packed_capacity),
                extents: HashMap::new(),
                stats: LoadStats::default(),
            }),
        }
    }

    /// Return the cached model for `path`, parsing and caching it on a miss.
    ///
    /// A failed load caches nothing.
    pub fn load_model(&self, path: &str) -> LoadResult<Arc<Model>> {
        let key = normalize_path(path)?;
        let mut state = self.state.lock();
        self.load_model_locked(&mut state, &key)
    }

    /// Return the packed geometry for `path`, loading the model first if needed.
    pub fn load_packed_geometry(&self, path: &str) -> LoadResult<Arc<PackedGeometry>> {
        let key = normalize_path(path)?;
        let mut state = self.state.lock();

        if let Some(packed) = state.packed.get(&key) {
            let packed = Arc::clone(packed);
            state.stats.packed_hits += 1;
            log::debug!("Packed geometry cache hit: {}", key);
            return Ok(packed);
        }

        let model = self.load_model_locked(&mut state, &key)?;
        let packed = Arc::new(pack_model(&model));
        if let Some((evicted, _)) = state.packed.insert(key.clone(), Arc::clone(&packed)) {
            state.stats.packed_evictions += 1;
            log::debug!("Evicted packed geometry {}", evicted);
        }
        Ok(packed)
    }

    /// Maximum absolute vertex coordinate of the model at `path` (at least 1.0),
    /// memoised per path. Loads the model if it is not cached.
    pub fn try_max_extent(&self, path: &str) -> LoadResult<f32> {
        let key = normalize_path(path)?;
        let mut state = self.state.lock();

        if let Some(&extent) = state.extents.get(&key) {
            return Ok(extent);
        }

        let model = self.load_model_locked(&mut state, &key)?;
        let extent = model.max_extent();
        log::info!("Model {}: max extent {}", key, extent);
        state.extents.insert(key, extent);
        Ok(extent)
    }

    /// Like [`try_max_extent`](Self::try_max_extent), falling back to 1.0 when
    /// the model cannot be loaded. The fallback is not memoised.
    pub fn max_extent(&self, path: &str) -> f32 {
        self.try_max_extent(path).unwrap_or_else(|e| {
            log::warn!("Using default extent for {}: {}", path, e);
            MIN_EXTENT
        })
    }

    /// Hand back a pixel buffer previously taken from a [`crate::Texture`].
    pub fn release_texture(&self, buffer: Vec<u8>) {
        drop(buffer);
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn contains_model(&self, path: &str) -> bool {
        normalize_path(path).is_ok_and(|key| self.state.lock().models.contains(&key))
    }

    pub fn contains_packed(&self, path: &str) -> bool {
        normalize_path(path).is_ok_and(|key| self.state.lock().packed.contains(&key))
    }

    pub fn contains_extent(&self, path: &str) -> bool {
        normalize_path(path).is_ok_and(|key| self.state.lock().extents.contains_key(&key))
    }

    pub fn stats(&self) -> LoadStats {
        LoadStats {
            textures_released: self.released.load(Ordering::Relaxed),
            ..self.state.lock().stats
        }
    }

    /// Drop every cached entry. Models nobody else holds release their
    /// texture buffers right away.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.models.drain();
        state.packed.drain();
        state.extents.clear();
    }

    fn load_model_locked(&self, state: &mut CacheState, key: &str) -> LoadResult<Arc<Model>> {
        if let Some(model) = state.models.get(key) {
            let model = Arc::clone(model);
            state.stats.model_hits += 1;
            log::debug!("Model cache hit: {}", key);
            return Ok(model);
        }

        let format = ModelFormat::detect(key)?;
        state.stats.parses += 1;
        let mut model = match format {
            ModelFormat::Obj => obj::load_obj_from_path(key),
            ModelFormat::Scene => self.importer.import(Path::new(key), key),
        }
        .inspect_err(|e| log::error!("Model load failed: {}", e))?;

        for texture in model.meshes.iter_mut().flat_map(|m| m.textures.iter_mut()) {
            texture.track_release(Arc::clone(&self.released));
        }

        log::info!(
            "Loaded {}: {} meshes, {} vertices, {} indices, {} textures",
            key,
            model.meshes.len(),
            model.vertex_count(),
            model.index_count(),
            model.texture_count()
        );

        let model = Arc::new(model);
        if let Some((evicted_key, evicted)) = state.models.insert(key.to_string(), Arc::clone(&model)) {
            state.evict_model(&evicted_key, evicted);
        }
        Ok(model)
    }
}

impl Drop for ModelLoadManager {
    fn drop(&mut self) {
        self.clear();
    }
}
