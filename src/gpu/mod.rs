//! wgpu backend
//!
//! - `GpuContext`/`WindowSurface`: device, queue and the output surface
//! - `FramePlanner`: lowers a `RenderList` into passes (no GPU needed)
//! - `SphereRenderer`: uploads content and executes the passes

pub mod context;
pub mod plan;
pub mod renderer;
pub mod texture;

pub use context::{GpuContext, GpuError, WindowSurface};
pub use plan::{FramePlan, FramePlanner, Pipe, Target, TextureRef};
pub use renderer::SphereRenderer;
pub use texture::GpuTexture;
