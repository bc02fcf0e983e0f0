//! Still image content decoded with the `image` crate

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Content, ContentError, ContentId, ContentTexture, DecodedFrame};

/// A decoded still image
pub struct ImageContent {
    id: ContentId,
    frame: Arc<DecodedFrame>,
    path: Option<PathBuf>,
}

impl ImageContent {
    /// Decode an image file into RGBA
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ContentError> {
        let path = path.into();
        if !path.exists() {
            return Err(ContentError::NotFound(path));
        }

        let decoded = ::image::open(&path).map_err(|source| ContentError::ImageDecode {
            path: path.clone(),
            source,
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        tracing::debug!("Decoded image {} ({}x{})", path.display(), width, height);

        Ok(Self {
            id: ContentId::next(),
            frame: Arc::new(DecodedFrame::new(rgba.into_raw(), width, height, 0)),
            path: Some(path),
        })
    }

    /// Wrap pixels the caller already has in memory.
    ///
    /// Returns `None` if `data` is not `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let frame = DecodedFrame::new(data, width, height, 0);
        if !frame.is_valid() {
            return None;
        }
        Some(Self {
            id: ContentId::next(),
            frame: Arc::new(frame),
            path: None,
        })
    }

    /// A solid color image, handy for placeholders
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(DecodedFrame::expected_size(width, height))
            .collect();
        Self {
            id: ContentId::next(),
            frame: Arc::new(DecodedFrame::new(data, width, height, 0)),
            path: None,
        }
    }

    /// Source path, if the image was loaded from disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn id(&self) -> ContentId {
        self.id
    }
}

impl Content for ImageContent {
    fn width(&self) -> u32 {
        self.frame.width
    }

    fn height(&self) -> u32 {
        self.frame.height
    }

    fn texture(&self) -> ContentTexture {
        ContentTexture {
            id: self.id,
            revision: 0,
            frame: Arc::clone(&self.frame),
        }
    }
}
