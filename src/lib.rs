//! Immersive Sphere Library
//!
//! A compositor for spherical displays. Flat images and video are placed on a
//! sphere by rotation, composited into one equirectangular canvas, and the
//! canvas is warped into the fisheye projection the display's optics expect.
//!
//! Drawing is recorded into a [`RenderList`] by the [`Scene`] and executed on
//! the GPU by [`gpu::SphereRenderer`].

pub mod content;
pub mod gpu;
pub mod render;
pub mod scene;
pub mod settings;
pub mod shaders;
pub mod telemetry;

pub use content::{Content, ContentError, ContentId, ContentTexture, DecodedFrame, ImageContent, VideoContent};
pub use render::{RenderList, RenderOp, ShaderKind, ShaderProgram, SphereMesh, SphereWarp};
pub use scene::{Canvas, FadeState, FadeTransition, ObjectId, Scene, SphereObject};
pub use settings::{LensCorrection, SettingsError, SphereSettings};
