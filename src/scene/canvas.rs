//! The off-screen panorama every object composites into

use crate::render::{RenderList, RenderOp, WHITE};

/// Off-screen `2S x S` render target with an idempotent begin/end bracket
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    begun: bool,
}

impl Canvas {
    /// Canvas for sphere resolution `size`
    pub fn new(size: u32) -> Self {
        Self {
            width: size.saturating_mul(2),
            height: size,
            begun: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_begun(&self) -> bool {
        self.begun
    }

    /// Start drawing into the canvas. No-op if already begun.
    pub fn begin(&mut self, list: &mut RenderList) {
        if self.begun {
            return;
        }
        self.begun = true;
        list.push(RenderOp::BeginCanvas);
        list.push(RenderOp::Clear(WHITE));
        list.push(RenderOp::SetDepthTest(false));
        list.push(RenderOp::SetColor(WHITE));
    }

    /// Stop drawing into the canvas. No-op if not begun.
    pub fn end(&mut self, list: &mut RenderList) {
        if !self.begun {
            return;
        }
        self.begun = false;
        list.push(RenderOp::EndCanvas);
    }
}
