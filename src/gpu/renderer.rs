//! wgpu backend that executes recorded frames
//!
//! Owns the canvas texture, the pipelines for the four programs and a cache
//! of content textures keyed by content id. Content is re-uploaded only when
//! its revision changes.

use std::collections::HashMap;
use std::num::NonZeroU64;

use super::context::{GpuContext, WindowSurface};
use super::plan::{FramePlanner, Pipe, QuadVertex, Target, TextureRef, UNIFORM_CHUNK};
use super::texture::{GpuTexture, TEXTURE_FORMAT};
use crate::content::{ContentId, ContentTexture, DecodedFrame};
use crate::render::{Color, MeshVertex, RenderList, ShaderProgram, SPHERE_SEGMENTS};
use crate::scene::Scene;
use crate::shaders;

/// Frames a content texture may go unused before it is dropped
pub const CONTENT_TTL_FRAMES: u64 = 120;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Frame buffers grow in steps of this many bytes
const BUFFER_GRANULARITY: u64 = 256;

/// Vertices in one preview sphere
const SPHERE_VERTICES: u64 = ((SPHERE_SEGMENTS / 2) * (SPHERE_SEGMENTS + 1) * 2) as u64;

/// Capacity for `needed` bytes, at least doubling the current one
fn grown_capacity(current: u64, needed: u64) -> u64 {
    needed
        .max(current.saturating_mul(2))
        .max(BUFFER_GRANULARITY)
        .next_multiple_of(BUFFER_GRANULARITY)
}

/// A buffer rewritten every frame and reallocated only when a frame
/// outgrows it
struct FrameBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    label: &'static str,
    usage: wgpu::BufferUsages,
}

impl FrameBuffer {
    fn new(device: &wgpu::Device, label: &'static str, usage: wgpu::BufferUsages, capacity: u64) -> Self {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let capacity = grown_capacity(0, capacity);
        Self {
            buffer: Self::allocate(device, label, usage, capacity),
            capacity,
            label,
            usage,
        }
    }

    fn allocate(device: &wgpu::Device, label: &str, usage: wgpu::BufferUsages, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Write `bytes` at offset 0. Returns true if the buffer was reallocated.
    fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return false;
        }

        let needed = bytes.len() as u64;
        let reallocated = needed > self.capacity;
        if reallocated {
            self.capacity = grown_capacity(self.capacity, needed);
            self.buffer = Self::allocate(device, self.label, self.usage, self.capacity);
            tracing::debug!("Grew {} to {} bytes", self.label, self.capacity);
        }

        queue.write_buffer(&self.buffer, 0, bytes);
        reallocated
    }
}

struct CachedContent {
    texture: GpuTexture,
    bind_group: wgpu::BindGroup,
    revision: u64,
    last_used: u64,
}

struct Pipelines {
    offaxis: wgpu::RenderPipeline,
    spherize: wgpu::RenderPipeline,
    flat: wgpu::RenderPipeline,
    mesh_depth: wgpu::RenderPipeline,
    mesh_no_depth: wgpu::RenderPipeline,
}

impl Pipelines {
    fn get(&self, pipe: Pipe) -> &wgpu::RenderPipeline {
        match pipe {
            Pipe::Offaxis => &self.offaxis,
            Pipe::Spherize => &self.spherize,
            Pipe::Flat => &self.flat,
            Pipe::Mesh { depth_test: true } => &self.mesh_depth,
            Pipe::Mesh { depth_test: false } => &self.mesh_no_depth,
        }
    }
}

struct DepthTarget {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// Executes `RenderList`s on the GPU
pub struct SphereRenderer {
    pipelines: Pipelines,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,

    canvas: GpuTexture,
    canvas_bind_group: wgpu::BindGroup,
    fallback_bind_group: wgpu::BindGroup,
    depth: Option<DepthTarget>,

    quad_vertices: FrameBuffer,
    mesh_vertices: FrameBuffer,
    uniforms: FrameBuffer,
    uniform_group: wgpu::BindGroup,

    content: HashMap<ContentId, CachedContent>,
    frame: u64,
}

impl SphereRenderer {
    /// Renderer for a scene's canvas size and programs
    pub fn for_scene(gpu: &GpuContext, scene: &Scene) -> Self {
        let canvas = scene.canvas();
        Self::new(
            gpu,
            &scene.shader_reference(),
            scene.spherize_program(),
            (canvas.width(), canvas.height()),
        )
    }

    pub fn new(
        gpu: &GpuContext,
        offaxis: &ShaderProgram,
        spherize: &ShaderProgram,
        canvas_size: (u32, u32),
    ) -> Self {
        let device = &gpu.device;

        // [0] per-draw uniforms at a dynamic offset
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sphere Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        // [0] texture, [1] sampler
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sphere Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sphere Sampler"),
            // Longitude wraps, latitude clamps
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipelines = Self::create_pipelines(gpu, offaxis, spherize, &uniform_layout, &texture_layout);

        let canvas = GpuTexture::render_target(device, "Sphere Canvas", canvas_size.0, canvas_size.1);
        let canvas_bind_group = Self::texture_bind_group(device, &texture_layout, &sampler, canvas.view());

        let mut fallback = GpuTexture::content(device, 1, 1);
        fallback.upload(device, &gpu.queue, &DecodedFrame::empty());
        let fallback_bind_group = Self::texture_bind_group(device, &texture_layout, &sampler, fallback.view());

        let quad_vertices = FrameBuffer::new(
            device,
            "Sphere Quad Vertices",
            wgpu::BufferUsages::VERTEX,
            64 * QuadVertex::SIZE,
        );
        let mesh_vertices = FrameBuffer::new(
            device,
            "Sphere Mesh Vertices",
            wgpu::BufferUsages::VERTEX,
            SPHERE_VERTICES * MeshVertex::SIZE,
        );
        let uniforms = FrameBuffer::new(
            device,
            "Sphere Uniforms",
            wgpu::BufferUsages::UNIFORM,
            64 * UNIFORM_CHUNK as u64,
        );
        let uniform_group = Self::uniform_bind_group(device, &uniform_layout, &uniforms.buffer);

        tracing::info!(
            "Sphere renderer ready: canvas {}x{}",
            canvas.width(),
            canvas.height()
        );

        Self {
            pipelines,
            uniform_layout,
            texture_layout,
            sampler,
            canvas,
            canvas_bind_group,
            fallback_bind_group,
            depth: None,
            quad_vertices,
            mesh_vertices,
            uniforms,
            uniform_group,
            content: HashMap::new(),
            frame: 0,
        }
    }

    fn create_pipelines(
        gpu: &GpuContext,
        offaxis: &ShaderProgram,
        spherize: &ShaderProgram,
        uniform_layout: &wgpu::BindGroupLayout,
        texture_layout: &wgpu::BindGroupLayout,
    ) -> Pipelines {
        let device = &gpu.device;
        let module = |label: &str, source: &str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        let offaxis_module = module("Offaxis Shader", offaxis.source());
        let spherize_module = module("Spherize Shader", spherize.source());
        let flat_module = module("Flat Shader", shaders::FLAT_SHADER);
        let mesh_module = module("Sphere Mesh Shader", shaders::SPHERE_MESH_SHADER);

        let shaded_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sphere Shaded Pipeline Layout"),
            bind_group_layouts: &[uniform_layout, texture_layout],
            push_constant_ranges: &[],
        });
        let flat_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sphere Flat Pipeline Layout"),
            bind_group_layouts: &[texture_layout],
            push_constant_ranges: &[],
        });

        let no_depth = Some(Self::depth_state(false));
        let quad = PipelineSpec {
            buffer: QuadVertex::buffer_layout(),
            topology: wgpu::PrimitiveTopology::TriangleList,
        };
        let strip = PipelineSpec {
            buffer: MeshVertex::buffer_layout(),
            topology: wgpu::PrimitiveTopology::TriangleStrip,
        };

        Pipelines {
            offaxis: Self::create_pipeline(
                device,
                "Offaxis Pipeline",
                &offaxis_module,
                &shaded_layout,
                &quad,
                TEXTURE_FORMAT,
                wgpu::BlendState::ALPHA_BLENDING,
                None,
            ),
            spherize: Self::create_pipeline(
                device,
                "Spherize Pipeline",
                &spherize_module,
                &shaded_layout,
                &quad,
                gpu.surface_format,
                wgpu::BlendState::REPLACE,
                no_depth.clone(),
            ),
            flat: Self::create_pipeline(
                device,
                "Flat Pipeline",
                &flat_module,
                &flat_layout,
                &quad,
                gpu.surface_format,
                wgpu::BlendState::ALPHA_BLENDING,
                no_depth.clone(),
            ),
            mesh_depth: Self::create_pipeline(
                device,
                "Sphere Mesh Pipeline",
                &mesh_module,
                &shaded_layout,
                &strip,
                gpu.surface_format,
                wgpu::BlendState::REPLACE,
                Some(Self::depth_state(true)),
            ),
            mesh_no_depth: Self::create_pipeline(
                device,
                "Sphere Mesh Pipeline (no depth)",
                &mesh_module,
                &shaded_layout,
                &strip,
                gpu.surface_format,
                wgpu::BlendState::REPLACE,
                no_depth,
            ),
        }
    }

    fn depth_state(test: bool) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: test,
            depth_compare: if test {
                wgpu::CompareFunction::Less
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn create_pipeline(
        device: &wgpu::Device,
        label: &str,
        module: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        spec: &PipelineSpec,
        format: wgpu::TextureFormat,
        blend: wgpu::BlendState,
        depth_stencil: Option<wgpu::DepthStencilState>,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: std::slice::from_ref(&spec.buffer),
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: spec.topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    fn texture_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sphere Texture Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn uniform_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sphere Uniform Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: NonZeroU64::new(UNIFORM_CHUNK as u64),
                }),
            }],
        })
    }

    /// Canvas size in pixels
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    /// Number of content textures resident on the GPU
    pub fn cached_content_count(&self) -> usize {
        self.content.len()
    }

    fn ensure_depth(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if matches!(&self.depth, Some(d) if d.width == width && d.height == height) {
            return;
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Sphere Depth Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        self.depth = Some(DepthTarget {
            view: texture.create_view(&Default::default()),
            width,
            height,
        });
    }

    fn upload_content(&mut self, gpu: &GpuContext, texture: &ContentTexture) {
        let frame = self.frame;
        match self.content.get_mut(&texture.id) {
            Some(cached) => {
                cached.last_used = frame;
                if cached.revision == texture.revision {
                    return;
                }
                cached.revision = texture.revision;
                if cached.texture.upload(&gpu.device, &gpu.queue, &texture.frame) {
                    cached.bind_group = Self::texture_bind_group(
                        &gpu.device,
                        &self.texture_layout,
                        &self.sampler,
                        cached.texture.view(),
                    );
                }
            }
            None => {
                let mut gpu_texture = GpuTexture::content(&gpu.device, texture.width(), texture.height());
                gpu_texture.upload(&gpu.device, &gpu.queue, &texture.frame);
                let bind_group =
                    Self::texture_bind_group(&gpu.device, &self.texture_layout, &self.sampler, gpu_texture.view());
                tracing::debug!(
                    "Uploaded content {} ({}x{})",
                    texture.id.value(),
                    texture.width(),
                    texture.height()
                );
                self.content.insert(
                    texture.id,
                    CachedContent {
                        texture: gpu_texture,
                        bind_group,
                        revision: texture.revision,
                        last_used: frame,
                    },
                );
            }
        }
    }

    fn evict_stale(&mut self) {
        let frame = self.frame;
        self.content
            .retain(|_, cached| frame.saturating_sub(cached.last_used) <= CONTENT_TTL_FRAMES);
    }

    fn texture_group(&self, texture: TextureRef) -> &wgpu::BindGroup {
        match texture {
            TextureRef::Canvas => &self.canvas_bind_group,
            TextureRef::Content(id) => self
                .content
                .get(&id)
                .map(|cached| &cached.bind_group)
                .unwrap_or(&self.fallback_bind_group),
            TextureRef::Fallback => &self.fallback_bind_group,
        }
    }

    /// Execute one frame into `target` (a surface or any texture of the
    /// surface format).
    pub fn render(&mut self, gpu: &GpuContext, list: &RenderList, target: &wgpu::TextureView, target_size: (u32, u32)) {
        self.frame += 1;
        let plan = FramePlanner::new(self.canvas_size(), target_size).plan(list);

        self.ensure_depth(&gpu.device, target_size.0, target_size.1);
        for texture in &plan.textures {
            self.upload_content(gpu, texture);
        }

        let device = &gpu.device;
        self.quad_vertices
            .write(device, &gpu.queue, bytemuck::cast_slice(&plan.quad_vertices));
        self.mesh_vertices
            .write(device, &gpu.queue, bytemuck::cast_slice(&plan.mesh_vertices));
        if self.uniforms.write(device, &gpu.queue, &plan.uniforms) {
            self.uniform_group = Self::uniform_bind_group(device, &self.uniform_layout, &self.uniforms.buffer);
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Sphere Frame Encoder"),
        });

        let mut depth_cleared = false;
        for pass in &plan.passes {
            let load = match pass.clear {
                Some(color) => wgpu::LoadOp::Clear(to_wgpu_color(color)),
                None => wgpu::LoadOp::Load,
            };
            let (view, depth_view) = match pass.target {
                Target::Canvas => (self.canvas.view(), None),
                Target::Surface => (target, self.depth.as_ref().map(|d| &d.view)),
            };
            let depth_attachment = depth_view.map(|view| {
                let load = if depth_cleared {
                    wgpu::LoadOp::Load
                } else {
                    wgpu::LoadOp::Clear(1.0)
                };
                depth_cleared = true;
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            });

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Sphere Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &pass.draws {
                let buffer = match draw.pipe {
                    Pipe::Mesh { .. } => &self.mesh_vertices.buffer,
                    _ => &self.quad_vertices.buffer,
                };

                render_pass.set_pipeline(self.pipelines.get(draw.pipe));
                let textures = self.texture_group(draw.texture);
                match (draw.pipe, draw.uniform_offset) {
                    (Pipe::Flat, _) => render_pass.set_bind_group(0, textures, &[]),
                    (_, Some(offset)) => {
                        render_pass.set_bind_group(0, &self.uniform_group, &[offset]);
                        render_pass.set_bind_group(1, textures, &[]);
                    }
                    _ => {
                        tracing::warn!("Skipping {:?} draw without uniforms", draw.pipe);
                        continue;
                    }
                }
                render_pass.set_vertex_buffer(0, buffer.slice(..));
                render_pass.draw(draw.vertices.clone(), 0..1);
            }
        }

        gpu.queue.submit(Some(encoder.finish()));
        self.evict_stale();
    }

    /// Execute one frame into the window and present it
    pub fn render_to_surface(
        &mut self,
        gpu: &GpuContext,
        surface: &WindowSurface,
        list: &RenderList,
    ) -> Result<(), wgpu::SurfaceError> {
        let output = surface.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.render(gpu, list, &view, surface.size());
        output.present();
        Ok(())
    }
}

struct PipelineSpec {
    buffer: wgpu::VertexBufferLayout<'static>,
    topology: wgpu::PrimitiveTopology,
}

fn to_wgpu_color(color: Color) -> wgpu::Color {
    wgpu::Color {
        r: color[0] as f64,
        g: color[1] as f64,
        b: color[2] as f64,
        a: color[3] as f64,
    }
}
