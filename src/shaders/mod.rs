//! WGSL shader sources
//!
//! The offaxis and spherize programs can be loaded from disk so they can be
//! tuned without rebuilding. Every program also has an embedded copy used
//! when the file is missing.

use std::path::{Path, PathBuf};

use crate::render::ShaderKind;

/// Per-object placement onto the canvas
pub const OFFAXIS_SHADER: &str = include_str!("offaxis.wgsl");

/// Canvas to fisheye warp
pub const SPHERIZE_SHADER: &str = include_str!("spherize.wgsl");

/// Flat canvas blit for the preview
pub const FLAT_SHADER: &str = include_str!("flat.wgsl");

/// Canvas on the preview sphere mesh
pub const SPHERE_MESH_SHADER: &str = include_str!("sphere_mesh.wgsl");

/// Get the path to the shaders directory
pub fn shaders_dir() -> PathBuf {
    // In development, this is relative to the cargo manifest directory
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir).join("src").join("shaders")
}

/// The embedded source for a program
pub fn embedded_source(kind: ShaderKind) -> &'static str {
    match kind {
        ShaderKind::Offaxis => OFFAXIS_SHADER,
        ShaderKind::Spherize => SPHERIZE_SHADER,
    }
}

/// Candidate files for a source location.
///
/// A location without an extension gets `.wgsl`. Relative locations are
/// tried as given, then inside [`shaders_dir`].
fn candidates(location: &Path) -> Vec<PathBuf> {
    let file = if location.extension().is_none() {
        location.with_extension("wgsl")
    } else {
        location.to_path_buf()
    };

    let mut paths = vec![file.clone()];
    if file.is_relative() {
        paths.push(shaders_dir().join(file));
    }
    paths
}

/// Load shader source from a location on disk
pub fn load_source(location: &Path) -> Result<String, std::io::Error> {
    let mut last_error = None;
    for path in candidates(location) {
        match std::fs::read_to_string(&path) {
            Ok(source) => {
                tracing::debug!("Loaded shader {}", path.display());
                return Ok(source);
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shaders_dir_exists() {
        assert!(shaders_dir().exists());
    }

    #[test]
    fn test_embedded_sources_have_entry_points() {
        for source in [OFFAXIS_SHADER, SPHERIZE_SHADER, FLAT_SHADER, SPHERE_MESH_SHADER] {
            assert!(source.contains("fn vs_main"));
            assert!(source.contains("fn fs_main"));
        }
    }

    #[test]
    fn test_named_location_resolves_in_shaders_dir() {
        let source = load_source(Path::new("offaxis")).unwrap();
        assert_eq!(source, OFFAXIS_SHADER);
    }

    #[test]
    fn test_explicit_extension() {
        let source = load_source(&shaders_dir().join("spherize.wgsl")).unwrap();
        assert_eq!(source, SPHERIZE_SHADER);
    }

    #[test]
    fn test_missing_location() {
        assert!(load_source(Path::new("/no/such/shader")).is_err());
    }

    #[test]
    fn test_embedded_by_kind() {
        assert_eq!(embedded_source(ShaderKind::Offaxis), OFFAXIS_SHADER);
        assert_eq!(embedded_source(ShaderKind::Spherize), SPHERIZE_SHADER);
    }
}
