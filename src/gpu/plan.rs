//! Lowering a `RenderList` into render passes
//!
//! Walks the recorded ops with the same state an immediate-mode renderer
//! keeps (target, bound program, uniforms, texture, color, depth test) and
//! produces passes of draw calls plus the vertex and uniform data they
//! reference. No GPU access happens here.

use std::ops::Range;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::content::{ContentId, ContentTexture};
use crate::render::{Color, MeshVertex, Quad, RenderList, RenderOp, ShaderKind, ShaderProgram, TextureBinding, WHITE};

/// Bytes reserved per draw in the uniform buffer (dynamic offset alignment)
pub const UNIFORM_CHUNK: usize = 256;

/// Depth range of the mesh projection, in screen units either side of z = 0
pub const MESH_DEPTH_RANGE: f32 = 10_000.0;

/// Vertex for 2D quads, already in clip space
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    /// Source texture coordinates in pixels
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl QuadVertex {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: 8,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Uniform block of the sphere mesh program
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub canvas_size: [f32; 2],
    pub _padding: [f32; 2],
}

/// Where a pass draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Canvas,
    Surface,
}

/// Which pipeline a draw uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pipe {
    /// Object onto the canvas
    Offaxis,
    /// Canvas warped onto the surface
    Spherize,
    /// Canvas copied onto the surface
    Flat,
    /// Canvas on the sphere mesh
    Mesh { depth_test: bool },
}

impl Pipe {
    /// The only target this pipeline's color format matches
    pub fn target(self) -> Target {
        match self {
            Pipe::Offaxis => Target::Canvas,
            Pipe::Spherize | Pipe::Flat | Pipe::Mesh { .. } => Target::Surface,
        }
    }
}

/// Texture sampled by a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureRef {
    Canvas,
    Content(ContentId),
    /// 1x1 transparent stand-in for missing content
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub pipe: Pipe,
    /// Range in the quad or mesh vertex buffer, by pipe
    pub vertices: Range<u32>,
    /// Dynamic offset into the uniform buffer
    pub uniform_offset: Option<u32>,
    pub texture: TextureRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassPlan {
    pub target: Target,
    /// Clear color, or load the previous contents
    pub clear: Option<Color>,
    pub draws: Vec<DrawCall>,
}

impl PassPlan {
    fn new(target: Target) -> Self {
        Self {
            target,
            clear: None,
            draws: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.clear.is_none() && self.draws.is_empty()
    }
}

/// Everything needed to encode one frame
#[derive(Debug, Default)]
pub struct FramePlan {
    pub passes: Vec<PassPlan>,
    pub quad_vertices: Vec<QuadVertex>,
    pub mesh_vertices: Vec<MeshVertex>,
    pub uniforms: Vec<u8>,
    /// Content to upload before drawing, one entry per id
    pub textures: Vec<ContentTexture>,
}

struct PlanState {
    target: Target,
    shader: Option<Arc<ShaderProgram>>,
    block: Vec<u8>,
    texture: Option<TextureRef>,
    color: Color,
    depth_test: bool,
    saved_depth_test: bool,
}

/// Lowers render lists for a canvas and surface of fixed sizes
pub struct FramePlanner {
    canvas_size: [f32; 2],
    surface_size: [f32; 2],
}

impl FramePlanner {
    pub fn new(canvas_size: (u32, u32), surface_size: (u32, u32)) -> Self {
        Self {
            canvas_size: [canvas_size.0 as f32, canvas_size.1 as f32],
            surface_size: [surface_size.0.max(1) as f32, surface_size.1.max(1) as f32],
        }
    }

    pub fn plan(&self, list: &RenderList) -> FramePlan {
        let mut plan = FramePlan::default();
        let mut pass = PassPlan::new(Target::Surface);
        let mut state = PlanState {
            target: Target::Surface,
            shader: None,
            block: Vec::new(),
            texture: None,
            color: WHITE,
            depth_test: false,
            saved_depth_test: false,
        };

        for op in list.ops() {
            match op {
                RenderOp::BeginCanvas => {
                    Self::switch_target(&mut plan, &mut pass, Target::Canvas);
                    state.target = Target::Canvas;
                    state.saved_depth_test = state.depth_test;
                }
                RenderOp::EndCanvas => {
                    Self::switch_target(&mut plan, &mut pass, Target::Surface);
                    state.target = Target::Surface;
                    state.depth_test = state.saved_depth_test;
                }
                RenderOp::Clear(color) => {
                    // Everything drawn so far in this pass is overwritten
                    pass.draws.clear();
                    pass.clear = Some(*color);
                }
                RenderOp::SetDepthTest(enabled) => state.depth_test = *enabled,
                // Blend state is fixed per pipeline: offaxis blends, mesh replaces
                RenderOp::SetAlphaBlending(_) => {}
                RenderOp::SetColor(color) => state.color = *color,
                RenderOp::BeginShader(program) => {
                    state.block = program.uniforms().new_block();
                    state.shader = Some(Arc::clone(program));
                }
                RenderOp::SetUniform { name, value } => match &state.shader {
                    Some(program) => {
                        if !program.uniforms().write(&mut state.block, name, *value) {
                            tracing::debug!("Shader {} has no uniform {} of that type", program.name(), name);
                        }
                    }
                    None => tracing::debug!("Uniform {} set with no shader bound", name),
                },
                RenderOp::EndShader => {
                    state.shader = None;
                    state.block.clear();
                }
                RenderOp::BindTexture(binding) => {
                    state.texture = Some(match binding {
                        TextureBinding::Canvas => TextureRef::Canvas,
                        TextureBinding::Content(texture) => {
                            Self::note_texture(&mut plan, texture);
                            TextureRef::Content(texture.id)
                        }
                    });
                }
                RenderOp::UnbindTexture => state.texture = None,
                RenderOp::DrawQuad(quad) => {
                    let pipe = Self::shaded_pipe(&state);
                    self.push_quad(&mut plan, &mut pass, &state, pipe, quad);
                }
                RenderOp::DrawCanvas { x, y, scale } => {
                    let pipe = Self::shaded_pipe(&state);
                    let [cw, ch] = self.canvas_size;
                    let (w, h) = (cw * scale, ch * scale);
                    let quad = Quad {
                        positions: [[*x, *y], [x + w, *y], [x + w, y + h], [*x, y + h]],
                        tex_coords: [[0.0, 0.0], [cw, 0.0], [cw, ch], [0.0, ch]],
                        colors: [state.color; 4],
                    };
                    self.push_quad(&mut plan, &mut pass, &state, pipe, &quad);
                }
                RenderOp::DrawTriangleStrip(vertices) => {
                    self.push_strip(&mut plan, &mut pass, &state, vertices);
                }
            }
        }

        if !pass.is_empty() {
            plan.passes.push(pass);
        }
        plan
    }

    fn switch_target(plan: &mut FramePlan, pass: &mut PassPlan, target: Target) {
        if pass.target == target {
            return;
        }
        let finished = std::mem::replace(pass, PassPlan::new(target));
        if !finished.is_empty() {
            plan.passes.push(finished);
        }
    }

    fn note_texture(plan: &mut FramePlan, texture: &ContentTexture) {
        match plan.textures.iter_mut().find(|t| t.id == texture.id) {
            Some(existing) => *existing = texture.clone(),
            None => plan.textures.push(texture.clone()),
        }
    }

    fn shaded_pipe(state: &PlanState) -> Pipe {
        match state.shader.as_ref().map(|p| p.kind()) {
            Some(ShaderKind::Offaxis) => Pipe::Offaxis,
            Some(ShaderKind::Spherize) => Pipe::Spherize,
            None => Pipe::Flat,
        }
    }

    fn target_size(&self, target: Target) -> [f32; 2] {
        match target {
            Target::Canvas => self.canvas_size,
            Target::Surface => self.surface_size,
        }
    }

    fn accepts(state: &PlanState, pipe: Pipe) -> bool {
        if pipe.target() != state.target {
            tracing::warn!("Skipping {:?} draw into {:?}", pipe, state.target);
            return false;
        }
        if state.target == Target::Canvas && state.texture == Some(TextureRef::Canvas) {
            tracing::warn!("Skipping draw that samples the canvas into itself");
            return false;
        }
        true
    }

    fn push_uniforms(plan: &mut FramePlan, bytes: &[u8]) -> u32 {
        let offset = plan.uniforms.len();
        plan.uniforms.resize(offset + UNIFORM_CHUNK, 0);
        let len = bytes.len().min(UNIFORM_CHUNK);
        plan.uniforms[offset..offset + len].copy_from_slice(&bytes[..len]);
        offset as u32
    }

    fn push_quad(&self, plan: &mut FramePlan, pass: &mut PassPlan, state: &PlanState, pipe: Pipe, quad: &Quad) {
        if !Self::accepts(state, pipe) {
            return;
        }

        let [w, h] = self.target_size(state.target);
        let first = plan.quad_vertices.len() as u32;
        for corner in [0, 1, 2, 0, 2, 3] {
            let [px, py] = quad.positions[corner];
            plan.quad_vertices.push(QuadVertex {
                position: [px / w * 2.0 - 1.0, 1.0 - py / h * 2.0],
                uv: quad.tex_coords[corner],
                color: quad.colors[corner],
            });
        }

        let uniform_offset = state
            .shader
            .as_ref()
            .map(|_| Self::push_uniforms(plan, &state.block));

        pass.draws.push(DrawCall {
            pipe,
            vertices: first..first + 6,
            uniform_offset,
            texture: state.texture.unwrap_or(TextureRef::Fallback),
        });
    }

    fn push_strip(&self, plan: &mut FramePlan, pass: &mut PassPlan, state: &PlanState, vertices: &[MeshVertex]) {
        let pipe = Pipe::Mesh {
            depth_test: state.depth_test,
        };
        if !Self::accepts(state, pipe) || vertices.is_empty() {
            return;
        }

        let first = plan.mesh_vertices.len() as u32;
        plan.mesh_vertices.extend_from_slice(vertices);

        // Strips of one sphere share a uniform chunk
        let uniform_offset = match pass.draws.last() {
            Some(DrawCall {
                pipe: Pipe::Mesh { .. },
                uniform_offset: Some(offset),
                ..
            }) => *offset,
            _ => {
                let uniforms = self.mesh_uniforms();
                Self::push_uniforms(plan, bytemuck::bytes_of(&uniforms))
            }
        };

        pass.draws.push(DrawCall {
            pipe,
            vertices: first..first + vertices.len() as u32,
            uniform_offset: Some(uniform_offset),
            texture: state.texture.unwrap_or(TextureRef::Fallback),
        });
    }

    /// Screen-space projection with y up, matching the mesh's +y north pole
    fn mesh_uniforms(&self) -> MeshUniforms {
        let [w, h] = self.surface_size;
        let view_proj = Mat4::orthographic_rh(0.0, w, 0.0, h, -MESH_DEPTH_RANGE, MESH_DEPTH_RANGE);
        MeshUniforms {
            view_proj: view_proj.to_cols_array_2d(),
            canvas_size: self.canvas_size,
            _padding: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Content, ImageContent};
    use crate::render::SphereWarp;
    use crate::scene::Scene;
    use crate::settings::SphereSettings;
    use glam::Vec3;
    use std::rc::Rc;

    fn scene() -> Scene {
        let settings = SphereSettings {
            sphere_resolution: 100,
            ..SphereSettings::default()
        };
        Scene::with_shaders(
            settings,
            Arc::new(ShaderProgram::offaxis()),
            Arc::new(ShaderProgram::spherize()),
        )
    }

    #[test]
    fn test_render_then_draw_makes_two_passes() {
        let mut scene = scene();
        let image: Rc<dyn Content> = Rc::new(ImageContent::solid(10, 10, [255; 4]));
        let id = scene.create_object();
        scene.object_mut(id).unwrap().set_texture(&image);

        let mut list = RenderList::new();
        scene.render(&mut list);
        list.push(RenderOp::Clear([0.0, 0.0, 0.0, 1.0]));
        scene.draw(400, 200, &mut list);

        let plan = FramePlanner::new((200, 100), (400, 200)).plan(&list);
        assert_eq!(plan.passes.len(), 2);

        let canvas = &plan.passes[0];
        assert_eq!(canvas.target, Target::Canvas);
        assert_eq!(canvas.clear, Some([0.0, 0.0, 0.0, 0.0]));
        assert_eq!(canvas.draws.len(), 1);
        assert_eq!(canvas.draws[0].pipe, Pipe::Offaxis);
        assert_eq!(canvas.draws[0].texture, TextureRef::Content(image.texture().id));
        assert_eq!(canvas.draws[0].uniform_offset, Some(0));

        let surface = &plan.passes[1];
        assert_eq!(surface.target, Target::Surface);
        assert_eq!(surface.draws[0].pipe, Pipe::Flat);
        assert_eq!(surface.draws[0].texture, TextureRef::Canvas);
        assert_eq!(surface.draws[0].uniform_offset, None);

        assert_eq!(plan.textures.len(), 1);
        assert_eq!(plan.quad_vertices.len(), 12);
    }

    #[test]
    fn test_quad_is_converted_to_clip_space() {
        let mut scene = scene();
        scene.create_object_from_image("/missing.png");
        let mut list = RenderList::new();
        scene.render(&mut list);

        let plan = FramePlanner::new((200, 100), (1, 1)).plan(&list);
        let first = plan.quad_vertices[0];
        let third = plan.quad_vertices[2];
        assert_eq!(first.position, [-1.0, 1.0]);
        assert_eq!(third.position, [1.0, -1.0]);
        assert_eq!(third.uv, [200.0, 100.0]);
        assert_eq!(plan.passes[0].draws[0].texture, TextureRef::Fallback);
    }

    #[test]
    fn test_uniforms_packed_per_draw() {
        let mut scene = scene();
        let image: Rc<dyn Content> = Rc::new(ImageContent::solid(4, 2, [255; 4]));
        for _ in 0..2 {
            let id = scene.create_object();
            scene.object_mut(id).unwrap().set_texture(&image);
        }
        let mut list = RenderList::new();
        scene.render(&mut list);

        let plan = FramePlanner::new((200, 100), (1, 1)).plan(&list);
        let offsets: Vec<_> = plan.passes[0].draws.iter().map(|d| d.uniform_offset).collect();
        assert_eq!(offsets, vec![Some(0), Some(UNIFORM_CHUNK as u32)]);
        assert_eq!(plan.uniforms.len(), 2 * UNIFORM_CHUNK);
        assert_eq!(plan.textures.len(), 1);

        // canvasDimensions then textureDimensions
        let dims: [f32; 4] = bytemuck::pod_read_unaligned(&plan.uniforms[0..16]);
        assert_eq!(dims, [200.0, 100.0, 4.0, 2.0]);
    }

    #[test]
    fn test_sphere_mode_uses_spherize_pipe() {
        let mut scene = scene();
        scene.settings_mut().render_for_sphere = true;
        let mut list = RenderList::new();
        scene.draw(400, 200, &mut list);

        let plan = FramePlanner::new((200, 100), (400, 200)).plan(&list);
        let draw = &plan.passes[0].draws[0];
        assert_eq!(draw.pipe, Pipe::Spherize);
        let fov: f32 = bytemuck::pod_read_unaligned(&plan.uniforms[8..12]);
        assert_eq!(fov, scene.settings().fov);
        // Centered: x = 400/2 - 200/2 = 100 -> clip -0.5
        assert_eq!(plan.quad_vertices[0].position, [-0.5, 0.5]);
    }

    #[test]
    fn test_sphere_strips_share_uniforms() {
        let warp = SphereWarp::new(Arc::new(ShaderProgram::spherize()), 200, 100);
        let mut list = RenderList::new();
        warp.draw_sphere(Vec3::new(200.0, 100.0, 0.0), 80.0, &mut list);

        let plan = FramePlanner::new((200, 100), (400, 200)).plan(&list);
        let draws = &plan.passes[0].draws;
        assert_eq!(draws.len(), 50);
        assert!(draws.iter().all(|d| d.pipe == Pipe::Mesh { depth_test: true }));
        assert!(draws.iter().all(|d| d.uniform_offset == Some(0)));
        assert_eq!(draws[1].vertices, 202..404);
        assert_eq!(plan.mesh_vertices.len(), 50 * 202);
        assert_eq!(plan.uniforms.len(), UNIFORM_CHUNK);
    }

    #[test]
    fn test_clear_discards_earlier_draws() {
        let mut list = RenderList::new();
        list.push(RenderOp::BindTexture(TextureBinding::Canvas));
        list.push(RenderOp::DrawCanvas {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        });
        list.push(RenderOp::Clear(WHITE));

        let plan = FramePlanner::new((2, 1), (2, 1)).plan(&list);
        assert_eq!(plan.passes.len(), 1);
        assert!(plan.passes[0].draws.is_empty());
        assert_eq!(plan.passes[0].clear, Some(WHITE));
    }

    #[test]
    fn test_mismatched_target_is_skipped() {
        let mut list = RenderList::new();
        list.push(RenderOp::BeginCanvas);
        list.push(RenderOp::BindTexture(TextureBinding::Canvas));
        list.push(RenderOp::DrawCanvas {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        });
        list.push(RenderOp::EndCanvas);

        let plan = FramePlanner::new((2, 1), (2, 1)).plan(&list);
        assert!(plan.passes.is_empty());
    }

    #[test]
    fn test_empty_list() {
        let plan = FramePlanner::new((2, 1), (2, 1)).plan(&RenderList::new());
        assert!(plan.passes.is_empty());
        assert!(plan.uniforms.is_empty());
    }
}
