//! Shader programs with named uniforms
//!
//! A `ShaderProgram` pairs WGSL source with a uniform layout so callers can
//! set uniforms by name (`"quat"`, `"fov"`, ...) the way the GLSL programs
//! did. Values are packed into a single uniform block using WGSL alignment
//! rules; the GPU backend uploads the packed bytes per draw.

use std::path::Path;

use crate::shaders;

/// Uniform value types supported by the programs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl UniformKind {
    fn size(self) -> usize {
        match self {
            UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
        }
    }

    fn align(self) -> usize {
        match self {
            UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 | UniformKind::Vec4 => 16,
        }
    }
}

/// A uniform value as uploaded from the CPU
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
        }
    }

    fn components(&self) -> &[f32] {
        match self {
            UniformValue::Float(v) => std::slice::from_ref(v),
            UniformValue::Vec2(v) => v,
            UniformValue::Vec3(v) => v,
            UniformValue::Vec4(v) => v,
        }
    }
}

#[derive(Debug, Clone)]
struct UniformSlot {
    name: &'static str,
    kind: UniformKind,
    offset: usize,
}

/// Byte layout of a program's uniform block
#[derive(Debug, Clone)]
pub struct UniformLayout {
    slots: Vec<UniformSlot>,
    size: usize,
}

impl UniformLayout {
    /// Lay out fields in declaration order, matching a WGSL struct
    pub fn new(fields: &[(&'static str, UniformKind)]) -> Self {
        let mut offset: usize = 0;
        let mut slots = Vec::with_capacity(fields.len());
        for &(name, kind) in fields {
            offset = offset.next_multiple_of(kind.align());
            slots.push(UniformSlot { name, kind, offset });
            offset += kind.size();
        }
        Self {
            slots,
            size: offset.next_multiple_of(16).max(16),
        }
    }

    /// Size of the packed block in bytes (multiple of 16)
    pub fn size(&self) -> usize {
        self.size
    }

    /// Byte offset of a named uniform
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().find(|s| s.name == name).map(|s| s.offset)
    }

    /// Write a value into a packed block.
    ///
    /// Returns false for unknown names or mismatched types.
    pub fn write(&self, block: &mut [u8], name: &str, value: UniformValue) -> bool {
        let Some(slot) = self.slots.iter().find(|s| s.name == name) else {
            return false;
        };
        if slot.kind != value.kind() || block.len() < self.size {
            return false;
        }
        let bytes: &[u8] = bytemuck::cast_slice(value.components());
        block[slot.offset..slot.offset + bytes.len()].copy_from_slice(bytes);
        true
    }

    /// A zeroed block of the right size
    pub fn new_block(&self) -> Vec<u8> {
        vec![0; self.size]
    }
}

/// Which of the built-in programs this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    /// Per-object rotation onto the canvas
    Offaxis,
    /// Canvas to fisheye warp for the physical sphere
    Spherize,
}

/// A loaded shader program. Immutable after load and shared via `Arc`.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    kind: ShaderKind,
    name: String,
    source: String,
    uniforms: UniformLayout,
}

impl ShaderProgram {
    /// Offaxis uniform names
    pub const CANVAS_DIMENSIONS: &'static str = "canvasDimensions";
    pub const TEXTURE_DIMENSIONS: &'static str = "textureDimensions";
    pub const TEXTURE_SCALE: &'static str = "textureScale";
    pub const QUAT: &'static str = "quat";

    /// Spherize uniform names
    pub const IMAGE_SIZE: &'static str = "imageSize";
    pub const FOV: &'static str = "fov";
    pub const Z: &'static str = "Z";
    pub const LENS_CORRECTION: &'static str = "lensCorr";

    /// Build a program from WGSL source
    pub fn from_source(kind: ShaderKind, name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            source: source.into(),
            uniforms: Self::layout_for(kind),
        }
    }

    /// Load a program from a source location.
    ///
    /// `location` is a path without extension (`shaders/offaxis`) or with
    /// `.wgsl`. Falls back to the embedded source if the file can't be read.
    pub fn load(kind: ShaderKind, location: &str) -> Self {
        let source = shaders::load_source(Path::new(location)).unwrap_or_else(|e| {
            tracing::debug!(
                "Shader {} not readable ({}), using embedded source",
                location,
                e
            );
            shaders::embedded_source(kind).to_string()
        });
        Self::from_source(kind, location, source)
    }

    /// The embedded offaxis program
    pub fn offaxis() -> Self {
        Self::from_source(ShaderKind::Offaxis, "offaxis", shaders::OFFAXIS_SHADER)
    }

    /// The embedded spherize program
    pub fn spherize() -> Self {
        Self::from_source(ShaderKind::Spherize, "spherize", shaders::SPHERIZE_SHADER)
    }

    fn layout_for(kind: ShaderKind) -> UniformLayout {
        match kind {
            ShaderKind::Offaxis => UniformLayout::new(&[
                (Self::CANVAS_DIMENSIONS, UniformKind::Vec2),
                (Self::TEXTURE_DIMENSIONS, UniformKind::Vec2),
                (Self::TEXTURE_SCALE, UniformKind::Vec2),
                (Self::QUAT, UniformKind::Vec4),
            ]),
            ShaderKind::Spherize => UniformLayout::new(&[
                (Self::IMAGE_SIZE, UniformKind::Vec2),
                (Self::FOV, UniformKind::Float),
                (Self::Z, UniformKind::Float),
                (Self::LENS_CORRECTION, UniformKind::Vec3),
            ]),
        }
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn uniforms(&self) -> &UniformLayout {
        &self.uniforms
    }
}
