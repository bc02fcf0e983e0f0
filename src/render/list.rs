//! Recorded frame operations
//!
//! The scene does not talk to the GPU directly. Objects, the canvas
//! compositor and the sphere warp record [`RenderOp`]s into a [`RenderList`]
//! in the order an immediate-mode renderer would issue them; a backend
//! (see `gpu::SphereRenderer`) executes the list.

use std::sync::Arc;

use super::mesh::MeshVertex;
use super::shader::{ShaderProgram, UniformValue};
use crate::content::ContentTexture;

/// RGBA color, linear, 0..1
pub type Color = [f32; 4];

pub const WHITE: Color = [1.0, 1.0, 1.0, 1.0];
pub const TRANSPARENT_BLACK: Color = [0.0, 0.0, 0.0, 0.0];

/// The texture a draw samples
#[derive(Debug, Clone)]
pub enum TextureBinding {
    /// The shared off-screen canvas
    Canvas,
    /// Object content
    Content(ContentTexture),
}

/// A quad in canvas pixel space with per-corner texture coordinates and color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub positions: [[f32; 2]; 4],
    pub tex_coords: [[f32; 2]; 4],
    pub colors: [Color; 4],
}

/// One recorded operation
#[derive(Debug, Clone)]
pub enum RenderOp {
    /// Redirect drawing into the off-screen canvas
    BeginCanvas,
    /// Restore the previous draw target
    EndCanvas,
    /// Clear the current target
    Clear(Color),
    SetDepthTest(bool),
    SetAlphaBlending(bool),
    /// Current draw color for untextured/unshaded draws
    SetColor(Color),
    BeginShader(Arc<ShaderProgram>),
    SetUniform {
        name: &'static str,
        value: UniformValue,
    },
    EndShader,
    BindTexture(TextureBinding),
    UnbindTexture,
    /// Draw a quad with the bound shader and texture
    DrawQuad(Quad),
    /// Draw the canvas texture with its top-left at (x, y), scaled
    DrawCanvas { x: f32, y: f32, scale: f32 },
    /// Draw a triangle strip with the bound texture
    DrawTriangleStrip(Vec<MeshVertex>),
}

impl RenderOp {
    /// Whether this op produces geometry
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            RenderOp::DrawQuad(_) | RenderOp::DrawCanvas { .. } | RenderOp::DrawTriangleStrip(_)
        )
    }
}

/// The operations for one frame, in issue order
#[derive(Debug, Default, Clone)]
pub struct RenderList {
    ops: Vec<RenderOp>,
}

impl RenderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: RenderOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[RenderOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drop all ops, keeping the allocation for the next frame
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Number of geometry-producing ops
    pub fn draw_count(&self) -> usize {
        self.ops.iter().filter(|op| op.is_draw()).count()
    }

    /// Number of texture binds
    pub fn texture_bind_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, RenderOp::BindTexture(_)))
            .count()
    }

    /// Vertex counts of every triangle strip, in order
    pub fn strip_vertex_counts(&self) -> Vec<usize> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                RenderOp::DrawTriangleStrip(vertices) => Some(vertices.len()),
                _ => None,
            })
            .collect()
    }

    /// Uniform values set by name, in order
    pub fn uniforms_named(&self, name: &str) -> Vec<UniformValue> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                RenderOp::SetUniform { name: n, value } if *n == name => Some(*value),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut list = RenderList::new();
        list.push(RenderOp::BeginCanvas);
        list.push(RenderOp::BindTexture(TextureBinding::Canvas));
        list.push(RenderOp::DrawCanvas {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        });
        list.push(RenderOp::DrawTriangleStrip(vec![MeshVertex::default(); 4]));
        list.push(RenderOp::EndCanvas);

        assert_eq!(list.len(), 5);
        assert_eq!(list.draw_count(), 2);
        assert_eq!(list.texture_bind_count(), 1);
        assert_eq!(list.strip_vertex_counts(), vec![4]);

        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_uniforms_named() {
        let mut list = RenderList::new();
        list.push(RenderOp::SetUniform {
            name: "fov",
            value: UniformValue::Float(90.0),
        });
        list.push(RenderOp::SetUniform {
            name: "Z",
            value: UniformValue::Float(1.0),
        });
        assert_eq!(list.uniforms_named("fov"), vec![UniformValue::Float(90.0)]);
        assert!(list.uniforms_named("quat").is_empty());
    }
}
