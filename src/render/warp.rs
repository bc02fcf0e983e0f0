//! Second-stage output: spherize warp, flat preview and sphere mesh
//!
//! Samples the composited canvas and records the final output for the
//! window: warped for the physical sphere, flattened for editing, or wrapped
//! around a sphere mesh for an on-screen preview.

use std::sync::Arc;

use glam::Vec3;

use super::list::{RenderList, RenderOp, TextureBinding, WHITE};
use super::mesh::{SphereMesh, SPHERE_SEGMENTS};
use super::shader::{ShaderProgram, UniformValue};
use crate::settings::SphereSettings;

/// Scale of the flat editor preview
pub const PREVIEW_SCALE: f32 = 0.5;

/// Records the final canvas presentation
pub struct SphereWarp {
    spherize: Arc<ShaderProgram>,
    canvas_width: f32,
    canvas_height: f32,
}

impl SphereWarp {
    pub fn new(spherize: Arc<ShaderProgram>, canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            spherize,
            canvas_width: canvas_width as f32,
            canvas_height: canvas_height as f32,
        }
    }

    /// The spherize program
    pub fn program(&self) -> &ShaderProgram {
        &self.spherize
    }

    /// Present the canvas in the viewport.
    ///
    /// With `render_for_sphere` the spherize program warps the canvas drawn
    /// centered in the viewport; otherwise the canvas is drawn flat at half
    /// size from the top-left corner.
    pub fn draw(&self, settings: &SphereSettings, viewport_width: u32, viewport_height: u32, list: &mut RenderList) {
        list.push(RenderOp::SetColor(WHITE));
        list.push(RenderOp::BindTexture(TextureBinding::Canvas));

        if settings.render_for_sphere {
            let lens = &settings.lens_correction;
            list.push(RenderOp::BeginShader(Arc::clone(&self.spherize)));
            list.push(RenderOp::SetUniform {
                name: ShaderProgram::IMAGE_SIZE,
                value: UniformValue::Vec2([self.canvas_width, self.canvas_height]),
            });
            list.push(RenderOp::SetUniform {
                name: ShaderProgram::FOV,
                value: UniformValue::Float(settings.fov),
            });
            list.push(RenderOp::SetUniform {
                name: ShaderProgram::Z,
                value: UniformValue::Float(settings.z),
            });
            list.push(RenderOp::SetUniform {
                name: ShaderProgram::LENS_CORRECTION,
                value: UniformValue::Vec3([lens.a, lens.b, lens.c]),
            });

            let (x, y) = self.centered_origin(viewport_width, viewport_height);
            list.push(RenderOp::DrawCanvas { x, y, scale: 1.0 });
            list.push(RenderOp::EndShader);
        } else {
            list.push(RenderOp::DrawCanvas {
                x: 0.0,
                y: 0.0,
                scale: PREVIEW_SCALE,
            });
        }

        list.push(RenderOp::UnbindTexture);
    }

    /// Draw the canvas wrapped around a sphere mesh with depth testing.
    pub fn draw_sphere(&self, position: Vec3, radius: f32, list: &mut RenderList) {
        let mesh = SphereMesh::generate(
            position,
            radius,
            SPHERE_SEGMENTS,
            self.canvas_width,
            self.canvas_height,
        );

        list.push(RenderOp::BindTexture(TextureBinding::Canvas));
        list.push(RenderOp::SetDepthTest(true));
        list.push(RenderOp::SetAlphaBlending(false));

        for band in mesh.bands {
            list.push(RenderOp::DrawTriangleStrip(band));
        }

        list.push(RenderOp::UnbindTexture);
        list.push(RenderOp::SetAlphaBlending(true));
        list.push(RenderOp::SetDepthTest(false));
    }

    /// Top-left corner that centers the canvas in the viewport
    pub fn centered_origin(&self, viewport_width: u32, viewport_height: u32) -> (f32, f32) {
        (
            viewport_width as f32 / 2.0 - self.canvas_width / 2.0,
            viewport_height as f32 / 2.0 - self.canvas_height / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warp() -> SphereWarp {
        SphereWarp::new(Arc::new(ShaderProgram::spherize()), 2100, 1050)
    }

    #[test]
    fn test_draw_sphere_emits_fifty_strips() {
        let mut list = RenderList::new();
        warp().draw_sphere(Vec3::new(640.0, 360.0, 10.0), 300.0, &mut list);

        let strips = list.strip_vertex_counts();
        assert_eq!(strips.len(), 50);
        assert!(strips.iter().all(|&n| n == 202));
        assert_eq!(list.texture_bind_count(), 1);
    }

    #[test]
    fn test_draw_sphere_brackets_depth_test() {
        let mut list = RenderList::new();
        warp().draw_sphere(Vec3::ZERO, 1.0, &mut list);

        let ops = list.ops();
        assert!(matches!(ops[1], RenderOp::SetDepthTest(true)));
        assert!(matches!(ops[ops.len() - 1], RenderOp::SetDepthTest(false)));
    }

    #[test]
    fn test_sphere_mode_uploads_uniforms_and_centers() {
        let mut settings = SphereSettings::default();
        settings.render_for_sphere = true;
        settings.fov = 180.0;
        settings.z = 12.0;

        let mut list = RenderList::new();
        warp().draw(&settings, 2500, 1250, &mut list);

        assert_eq!(list.uniforms_named("imageSize"), vec![UniformValue::Vec2([2100.0, 1050.0])]);
        assert_eq!(list.uniforms_named("fov"), vec![UniformValue::Float(180.0)]);
        assert_eq!(list.uniforms_named("Z"), vec![UniformValue::Float(12.0)]);
        let lens = settings.lens_correction;
        assert_eq!(
            list.uniforms_named("lensCorr"),
            vec![UniformValue::Vec3([lens.a, lens.b, lens.c])]
        );

        let canvas_draw = list
            .ops()
            .iter()
            .find_map(|op| match op {
                RenderOp::DrawCanvas { x, y, scale } => Some((*x, *y, *scale)),
                _ => None,
            })
            .unwrap();
        assert_eq!(canvas_draw, (200.0, 100.0, 1.0));
        assert!(list.ops().iter().any(|op| matches!(op, RenderOp::BeginShader(_))));
    }

    #[test]
    fn test_preview_mode_is_flat_and_half_size() {
        let settings = SphereSettings::default();
        assert!(!settings.render_for_sphere);

        let mut list = RenderList::new();
        warp().draw(&settings, 1280, 720, &mut list);

        assert!(!list.ops().iter().any(|op| matches!(op, RenderOp::BeginShader(_))));
        assert!(list.uniforms_named("fov").is_empty());
        assert!(list
            .ops()
            .iter()
            .any(|op| matches!(op, RenderOp::DrawCanvas { x, y, scale } if *x == 0.0 && *y == 0.0 && *scale == 0.5)));
    }
}
