//! Decoded content frame representation
//!
//! Contains the raw RGBA pixel data for one still image or one video frame.

/// A decoded RGBA frame ready for GPU upload
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Raw RGBA pixel data (4 bytes per pixel, tightly packed rows)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame index (0-based, always 0 for still images)
    pub frame_index: u64,
}

impl DecodedFrame {
    /// Create a new RGBA decoded frame
    pub fn new(data: Vec<u8>, width: u32, height: u32, frame_index: u64) -> Self {
        Self {
            data,
            width,
            height,
            frame_index,
        }
    }

    /// A 1x1 transparent frame, used before a stream delivers its first picture
    pub fn empty() -> Self {
        Self::new(vec![0; 4], 1, 1, 0)
    }

    /// Get the expected data size for RGBA frame dimensions (width * height * 4)
    pub fn expected_size(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 4
    }

    /// Check if the frame data has the correct size
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::expected_size(self.width, self.height)
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        (self.width as usize) * 4
    }
}
