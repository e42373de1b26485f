//! Cache keys and loader dispatch by file suffix.

use std::path::{Component, Path, PathBuf};

use corelib::{LoadError, LoadResult};

/// Loader family a model file is routed to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ModelFormat {
    /// Face-indexed text mesh (`.obj`).
    Obj,
    /// Structured scene (`.gltf`, `.glb`).
    Scene,
}

impl ModelFormat {
    /// Detect the format from the file suffix, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "obj" => Some(ModelFormat::Obj),
            "gltf" | "glb" => Some(ModelFormat::Scene),
            _ => None,
        }
    }

    /// Like [`ModelFormat::from_path`], reporting unknown suffixes as errors.
    pub fn detect(path: &str) -> LoadResult<Self> {
        Self::from_path(Path::new(path)).ok_or_else(|| LoadError::UnsupportedFormat {
            path: path.to_string(),
            extension: Path::new(path)
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }
}

/// Lexically normalised path used as the cache key.
///
/// `.` components are dropped and `..` folds into its parent where possible; the
/// filesystem is not consulted, so missing files still get a stable key.
pub fn normalize_path(path: &str) -> LoadResult<String> {
    if path.trim().is_empty() {
        return Err(LoadError::invalid_path(path, "path is empty"));
    }

    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let parent_is_normal =
                    matches!(out.components().next_back(), Some(Component::Normal(_)));
                if parent_is_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }

    if out.as_os_str().is_empty() {
        return Err(LoadError::invalid_path(path, "path has no file name"));
    }
    Ok(out.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_dispatch_is_case_insensitive() {
        assert_eq!(ModelFormat::from_path(Path::new("a/cube.OBJ")), Some(ModelFormat::Obj));
        assert_eq!(ModelFormat::from_path(Path::new("scene.glb")), Some(ModelFormat::Scene));
        assert_eq!(ModelFormat::from_path(Path::new("scene.GlTf")), Some(ModelFormat::Scene));
        assert_eq!(ModelFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn unknown_suffix_is_unsupported() {
        let err = ModelFormat::detect("models/ship.fbx").unwrap_err();
        assert_eq!(
            err,
            LoadError::UnsupportedFormat {
                path: "models/ship.fbx".into(),
                extension: "fbx".into()
            }
        );
    }

    #[test]
    fn normalisation_folds_dots() {
        assert_eq!(normalize_path("./models/../models/cube.obj").unwrap(), "models/cube.obj");
        assert_eq!(normalize_path("/data/./a/../b.obj").unwrap(), "/data/b.obj");
        assert_eq!(normalize_path("../up.obj").unwrap(), "../up.obj");
        assert_eq!(normalize_path("/../root.obj").unwrap(), "/root.obj");
    }

    #[test]
    fn empty_path_is_invalid() {
        assert!(matches!(normalize_path(""), Err(LoadError::InvalidPath { .. })));
        assert!(matches!(normalize_path("   "), Err(LoadError::InvalidPath { .. })));
        assert!(matches!(normalize_path("."), Err(LoadError::InvalidPath { .. })));
    }

    #[test]
    fn surrounding_whitespace_is_part_of_the_name() {
        assert_eq!(normalize_path(" a.obj ").unwrap(), " a.obj ");
        assert_eq!(normalize_path("dir/ b.obj").unwrap(), "dir/ b.obj");
        assert_ne!(normalize_path(" a.obj ").unwrap(), normalize_path("a.obj").unwrap());
    }
}
