//! GPU textures for content and the canvas

use crate::content::DecodedFrame;

/// Color format of content and canvas textures
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// A 2D RGBA texture with its view
pub struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    usage: wgpu::TextureUsages,
    label: &'static str,
}

impl GpuTexture {
    /// Sampled texture that receives decoded frames
    pub fn content(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self::new(
            device,
            "Content Texture",
            width,
            height,
            wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    /// Texture that is both rendered into and sampled
    pub fn render_target(device: &wgpu::Device, label: &'static str, width: u32, height: u32) -> Self {
        Self::new(
            device,
            label,
            width,
            height,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    fn new(device: &wgpu::Device, label: &'static str, width: u32, height: u32, usage: wgpu::TextureUsages) -> Self {
        let (texture, view) = Self::create_texture(device, label, width, height, usage);
        Self {
            texture,
            view,
            width,
            height,
            usage,
            label,
        }
    }

    fn create_texture(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Upload a decoded frame, resizing first if its size changed.
    ///
    /// Returns true if the texture was recreated (bind groups must be rebuilt).
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, frame: &DecodedFrame) -> bool {
        if !frame.is_valid() {
            tracing::error!(
                "Frame {} has {} bytes, expected {}x{} RGBA",
                frame.frame_index,
                frame.data.len(),
                frame.width,
                frame.height
            );
            return false;
        }

        let resized = self.resize(device, frame.width, frame.height);

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.stride() as u32),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
        resized
    }

    /// Recreate at a new size. Returns false if the size is unchanged.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }

        let (texture, view) = Self::create_texture(device, self.label, width, height, self.usage);
        self.texture = texture;
        self.view = view;
        self.width = width;
        self.height = height;

        tracing::debug!("Resized {} to {}x{}", self.label, width, height);
        true
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
