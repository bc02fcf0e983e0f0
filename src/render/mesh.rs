//! Sphere mesh generation for the preview path
//!
//! Builds the UV-mapped sphere as a sequence of latitude triangle strips.
//! Texture coordinates are in canvas pixels, like a rectangle texture.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Longitude vertex count and latitude band divisor
pub const SPHERE_SEGMENTS: usize = 100;

/// The pi approximation the strip layout was tuned with. Keeps the seam where
/// content authored for the physical sphere expects it.
const PI_APPROX: f32 = 3.14159;

/// Texture v for the first band row sits just inside the canvas edge
const V_EDGE: f32 = 0.999;

/// Vertex for the sphere preview mesh
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// Position in screen/world space
    pub position: [f32; 3],
    /// Unit normal
    pub normal: [f32; 3],
    /// Texture coordinates in canvas pixels
    pub tex_coord: [f32; 2],
}

impl MeshVertex {
    /// Size of vertex in bytes
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Vertex buffer layout for wgpu
    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // normal
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // tex_coord
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Generated sphere: one triangle strip per latitude band
pub struct SphereMesh {
    pub bands: Vec<Vec<MeshVertex>>,
}

impl SphereMesh {
    /// Generate the sphere centered at `position`.
    ///
    /// `segments / 2` bands are emitted. Each band spans `2π / segments` of
    /// latitude, so together they cover -90°..+90°. Each band holds
    /// `(segments + 1) * 2` vertices, alternating the lower and upper row.
    pub fn generate(
        position: Vec3,
        radius: f32,
        segments: usize,
        canvas_width: f32,
        canvas_height: f32,
    ) -> Self {
        let segs = segments as f32;
        let mut bands = Vec::with_capacity(segments / 2);

        for j in 0..segments / 2 {
            let theta1 = j as f32 * 2.0 * PI_APPROX / segs - (PI_APPROX / 2.0);
            let theta2 = (j + 1) as f32 * 2.0 * PI_APPROX / segs - (PI_APPROX / 2.0);

            let v1 = (V_EDGE - 2.0 * j as f32 / segs) * canvas_height;
            let v2 = (V_EDGE - 2.0 * (j + 1) as f32 / segs) * canvas_height;

            let mut strip = Vec::with_capacity((segments + 1) * 2);
            for i in 0..=segments {
                let theta3 = i as f32 * 2.0 * PI_APPROX / segs;
                let u = (1.0 - (i as f32 / segs)) * canvas_width;

                for (theta, v) in [(theta1, v1), (theta2, v2)] {
                    let e = Vec3::new(theta.cos() * theta3.cos(), theta.sin(), theta.cos() * theta3.sin());
                    let p = e * radius + position;
                    strip.push(MeshVertex {
                        position: p.to_array(),
                        normal: e.to_array(),
                        tex_coord: [u, v],
                    });
                }
            }
            bands.push(strip);
        }

        Self { bands }
    }

    /// Number of strip draws
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Total vertex count across all bands
    pub fn vertex_count(&self) -> usize {
        self.bands.iter().map(Vec::len).sum()
    }
}
