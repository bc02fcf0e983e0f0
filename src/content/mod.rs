//! Object content: still images and video streams
//!
//! Every object on the sphere samples one piece of content. Content exposes
//! its pixel dimensions and a bindable texture; video content additionally
//! advances one decoded frame per `advance()` call.
//!
//! Decoding is synchronous. Failures are returned as [`ContentError`] and the
//! caller decides whether to keep the previous content.

mod frame;
mod image;
mod video;

#[cfg(feature = "ffmpeg")]
mod ffmpeg;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use self::frame::DecodedFrame;
pub use self::image::ImageContent;
pub use self::video::{FrameSource, GifFrames, VideoContent};

#[cfg(feature = "ffmpeg")]
pub use self::ffmpeg::FfmpegFrames;

/// Errors that can occur while loading or decoding content
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// The path does not exist
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    /// Image decoding failed
    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },
    /// The video could not be opened
    #[error("Failed to open video {path}: {reason}")]
    VideoOpen { path: PathBuf, reason: String },
    /// A frame could not be decoded
    #[error("Video decoding failed: {0}")]
    VideoDecode(String),
    /// No video backend can read this container
    #[error("Unsupported video format: {0}")]
    UnsupportedVideo(PathBuf),
    /// The stream has no frames
    #[error("Video has no frames: {0}")]
    NoFrames(PathBuf),
}

/// Process-unique identity of a piece of content.
///
/// The GPU backend keys its texture cache on this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(u64);

impl ContentId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// A bindable texture snapshot.
///
/// `revision` increases whenever the pixels change, so the backend only
/// re-uploads when a video has advanced.
#[derive(Debug, Clone)]
pub struct ContentTexture {
    pub id: ContentId,
    pub revision: u64,
    pub frame: Arc<DecodedFrame>,
}

impl ContentTexture {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }
}

/// Something an object can draw: a still image, a video stream, or
/// caller-managed pixels.
pub trait Content {
    /// Width in pixels
    fn width(&self) -> u32;

    /// Height in pixels
    fn height(&self) -> u32;

    /// The texture to bind when drawing
    fn texture(&self) -> ContentTexture;

    /// Decode the next frame. No-op for still content.
    fn advance(&mut self) {}

    /// Whether this content advances per frame
    fn is_video(&self) -> bool {
        false
    }
}

/// Decode a still image from disk
pub fn load_image(path: impl Into<PathBuf>) -> Result<ImageContent, ContentError> {
    ImageContent::open(path)
}

/// Open a video stream and start playback
pub fn open_video(path: impl Into<PathBuf>) -> Result<VideoContent, ContentError> {
    let mut video = VideoContent::open(path)?;
    video.play();
    Ok(video)
}
