//! Render recording
//!
//! Everything the scene draws is recorded here as a [`RenderList`]:
//!
//! - `ShaderProgram`: offaxis/spherize WGSL programs with named uniforms
//! - `RenderList`/`RenderOp`: the recorded operations for one frame
//! - `SphereMesh`: the latitude triangle-strip sphere used for preview
//! - `SphereWarp`: the second stage that presents the composited canvas

pub mod list;
pub mod mesh;
pub mod shader;
pub mod warp;

pub use list::{Color, Quad, RenderList, RenderOp, TextureBinding, TRANSPARENT_BLACK, WHITE};
pub use mesh::{MeshVertex, SphereMesh, SPHERE_SEGMENTS};
pub use shader::{ShaderKind, ShaderProgram, UniformKind, UniformLayout, UniformValue};
pub use warp::{SphereWarp, PREVIEW_SCALE};
