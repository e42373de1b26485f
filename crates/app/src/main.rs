//! Command-line model inspector: loads each path through the model load manager
//! and reports what a renderer would receive.

use anyhow::{Result, bail};
use asset::{ManagerConfig, Mesh, ModelLoadManager, TextureKind};

fn parse_capacity_arg(flag: &str, default: usize) -> usize {
    // Accept: --model-cache=N / --packed-cache=N
    for arg in std::env::args() {
        if let Some(val) = arg.strip_prefix(flag) {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => return n,
                _ => {
                    log::warn!("Invalid value '{}' for {}, using {}.", val, flag, default);
                }
            }
        }
    }
    default
}

fn model_paths() -> Vec<String> {
    std::env::args()
        .skip(1)
        .filter(|arg| !arg.starts_with("--"))
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let defaults = ManagerConfig::default();
    let config = ManagerConfig {
        model_capacity: parse_capacity_arg("--model-cache=", defaults.model_capacity),
        packed_capacity: parse_capacity_arg("--packed-cache=", defaults.packed_capacity),
        ..defaults
    };

    let paths = model_paths();
    if paths.is_empty() {
        bail!("usage: model-inspect [--model-cache=N] [--packed-cache=N] <model>...");
    }

    let manager = ModelLoadManager::new(config);
    let mut failures = 0usize;

    for path in &paths {
        let model = match manager.load_model(path) {
            Ok(model) => model,
            Err(e) => {
                log::error!("{}", e);
                failures += 1;
                continue;
            }
        };
        let packed = manager.load_packed_geometry(path)?;
        let extent = manager.max_extent(path);

        log::info!(
            "{}: {} meshes, {} vertices, {} triangles, packed {} bytes, extent {:.3}",
            path,
            model.meshes.len(),
            model.vertex_count(),
            model.meshes.iter().map(Mesh::triangle_count).sum::<usize>(),
            packed.bytes().len(),
            extent
        );
        for kind in TextureKind::ALL {
            let total = model.textures().filter(|t| t.kind() == kind).count();
            let decoded = model
                .textures()
                .filter(|t| t.kind() == kind && t.has_pixels())
                .count();
            if total > 0 {
                log::info!("  {}: {}/{} decoded", kind.uniform_name(), decoded, total);
            }
        }
    }

    let stats = manager.stats();
    log::info!(
        "Done: {} parses, {} model hits, {} evictions, {} failed.",
        stats.parses,
        stats.model_hits,
        stats.model_evictions,
        failures
    );
    Ok(())
}
