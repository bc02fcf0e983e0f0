//! Video content
//!
//! A `VideoContent` wraps a [`FrameSource`] and advances it one frame per
//! `advance()` call, looping at end of stream. Animated GIFs are always
//! supported; other containers need the `ffmpeg` feature.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ::image::codecs::gif::GifDecoder;
use ::image::AnimationDecoder;

use super::{Content, ContentError, ContentId, ContentTexture, DecodedFrame};

/// A synchronous supplier of decoded video frames
pub trait FrameSource {
    /// Frame width in pixels
    fn width(&self) -> u32;

    /// Frame height in pixels
    fn height(&self) -> u32;

    /// Decode the next frame. `Ok(None)` means end of stream.
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, ContentError>;

    /// Seek back to the first frame
    fn rewind(&mut self) -> Result<(), ContentError>;
}

/// Animated GIF frames, decoded up front
pub struct GifFrames {
    frames: Vec<DecodedFrame>,
    cursor: usize,
}

impl GifFrames {
    pub fn open(path: &Path) -> Result<Self, ContentError> {
        let file = File::open(path).map_err(|e| ContentError::VideoOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let decoder = GifDecoder::new(BufReader::new(file)).map_err(|e| ContentError::VideoOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| ContentError::VideoDecode(e.to_string()))?;

        let frames: Vec<DecodedFrame> = frames
            .into_iter()
            .enumerate()
            .map(|(index, frame)| {
                let buffer = frame.into_buffer();
                let (width, height) = buffer.dimensions();
                DecodedFrame::new(buffer.into_raw(), width, height, index as u64)
            })
            .collect();

        if frames.is_empty() {
            return Err(ContentError::NoFrames(path.to_path_buf()));
        }

        Ok(Self { frames, cursor: 0 })
    }

    /// Number of frames in the animation
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for GifFrames {
    fn width(&self) -> u32 {
        self.frames[0].width
    }

    fn height(&self) -> u32 {
        self.frames[0].height
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, ContentError> {
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<(), ContentError> {
        self.cursor = 0;
        Ok(())
    }
}

/// Video content bound to a file, advanced once per frame by its owner
pub struct VideoContent {
    id: ContentId,
    source: Box<dyn FrameSource>,
    current: Arc<DecodedFrame>,
    revision: u64,
    playing: bool,
    looping: bool,
    path: PathBuf,
}

impl VideoContent {
    /// Open a video file, picking a backend from the file extension.
    ///
    /// Playback is stopped until `play()` is called.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ContentError> {
        let path = path.into();
        if !path.exists() {
            return Err(ContentError::NotFound(path));
        }

        let is_gif = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));

        let source: Box<dyn FrameSource> = if is_gif {
            Box::new(GifFrames::open(&path)?)
        } else {
            Self::open_stream(&path)?
        };

        Self::from_source(path, source)
    }

    #[cfg(feature = "ffmpeg")]
    fn open_stream(path: &Path) -> Result<Box<dyn FrameSource>, ContentError> {
        Ok(Box::new(super::FfmpegFrames::open(path)?))
    }

    #[cfg(not(feature = "ffmpeg"))]
    fn open_stream(path: &Path) -> Result<Box<dyn FrameSource>, ContentError> {
        Err(ContentError::UnsupportedVideo(path.to_path_buf()))
    }

    /// Wrap an already opened frame source.
    ///
    /// The first frame is decoded immediately so dimensions are known.
    pub fn from_source(
        path: impl Into<PathBuf>,
        mut source: Box<dyn FrameSource>,
    ) -> Result<Self, ContentError> {
        let path = path.into();
        let first = source
            .next_frame()?
            .ok_or_else(|| ContentError::NoFrames(path.clone()))?;

        tracing::debug!(
            "Opened video {} ({}x{})",
            path.display(),
            source.width(),
            source.height()
        );

        Ok(Self {
            id: ContentId::next(),
            source,
            current: Arc::new(first),
            revision: 0,
            playing: false,
            looping: true,
            path,
        })
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index of the frame currently bound
    pub fn current_frame_index(&self) -> u64 {
        self.current.frame_index
    }

    fn present(&mut self, frame: DecodedFrame) {
        self.current = Arc::new(frame);
        self.revision += 1;
    }
}

impl Content for VideoContent {
    fn width(&self) -> u32 {
        self.current.width
    }

    fn height(&self) -> u32 {
        self.current.height
    }

    fn texture(&self) -> ContentTexture {
        ContentTexture {
            id: self.id,
            revision: self.revision,
            frame: Arc::clone(&self.current),
        }
    }

    fn advance(&mut self) {
        if !self.playing {
            return;
        }

        match self.source.next_frame() {
            Ok(Some(frame)) => self.present(frame),
            Ok(None) if self.looping => {
                if let Err(e) = self.source.rewind() {
                    tracing::warn!("Failed to loop video {}: {}", self.path.display(), e);
                    self.playing = false;
                    return;
                }
                match self.source.next_frame() {
                    Ok(Some(frame)) => self.present(frame),
                    Ok(None) => self.playing = false,
                    Err(e) => tracing::warn!("Decode error in {}: {}", self.path.display(), e),
                }
            }
            Ok(None) => {
                tracing::debug!("Video reached end: {}", self.path.display());
                self.playing = false;
            }
            Err(e) => tracing::warn!("Decode error in {}: {}", self.path.display(), e),
        }
    }

    fn is_video(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts frames 0..len, each 1x1 with the index in the red channel
    struct CountingSource {
        len: u64,
        next: u64,
    }

    impl FrameSource for CountingSource {
        fn width(&self) -> u32 {
            1
        }

        fn height(&self) -> u32 {
            1
        }

        fn next_frame(&mut self) -> Result<Option<DecodedFrame>, ContentError> {
            if self.next >= self.len {
                return Ok(None);
            }
            let frame = DecodedFrame::new(vec![self.next as u8, 0, 0, 255], 1, 1, self.next);
            self.next += 1;
            Ok(Some(frame))
        }

        fn rewind(&mut self) -> Result<(), ContentError> {
            self.next = 0;
            Ok(())
        }
    }

    fn counting(len: u64) -> VideoContent {
        VideoContent::from_source("counting", Box::new(CountingSource { len, next: 0 })).unwrap()
    }

    #[test]
    fn test_first_frame_decoded_on_open() {
        let video = counting(3);
        assert_eq!(video.current_frame_index(), 0);
        assert!(!video.is_playing());
        assert!(video.is_video());
    }

    #[test]
    fn test_advance_requires_play() {
        let mut video = counting(3);
        video.advance();
        assert_eq!(video.current_frame_index(), 0);

        video.play();
        video.advance();
        assert_eq!(video.current_frame_index(), 1);
        assert_eq!(video.texture().revision, 1);
    }

    #[test]
    fn test_loops_at_end() {
        let mut video = counting(2);
        video.play();
        video.advance(); // frame 1
        video.advance(); // end -> rewind -> frame 0
        assert_eq!(video.current_frame_index(), 0);
        assert!(video.is_playing());
    }

    #[test]
    fn test_stops_at_end_without_looping() {
        let mut video = counting(2);
        video.set_looping(false);
        video.play();
        video.advance();
        video.advance();
        assert_eq!(video.current_frame_index(), 1);
        assert!(!video.is_playing());
    }

    #[test]
    fn test_empty_source_fails() {
        let result = VideoContent::from_source("empty", Box::new(CountingSource { len: 0, next: 0 }));
        assert!(matches!(result, Err(ContentError::NoFrames(_))));
    }

    #[test]
    fn test_gif_round_trip() {
        use ::image::codecs::gif::GifEncoder;
        use ::image::{Frame, Rgba, RgbaImage};

        let path = std::env::temp_dir().join(format!("immersive_sphere_anim_{}.gif", std::process::id()));
        {
            let file = File::create(&path).unwrap();
            let mut encoder = GifEncoder::new(file);
            let frames = [[255u8, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]]
                .into_iter()
                .map(|px| Frame::new(RgbaImage::from_pixel(4, 2, Rgba(px))));
            encoder.encode_frames(frames).unwrap();
        }

        let mut video = VideoContent::open(&path).unwrap();
        assert_eq!((video.width(), video.height()), (4, 2));
        video.play();
        video.advance();
        video.advance();
        assert_eq!(video.current_frame_index(), 2);
        video.advance();
        assert_eq!(video.current_frame_index(), 0);

        let _ = std::fs::remove_file(path);
    }

    #[cfg(not(feature = "ffmpeg"))]
    #[test]
    fn test_unsupported_container_without_ffmpeg() {
        let path = std::env::temp_dir().join(format!("immersive_sphere_clip_{}.mp4", std::process::id()));
        std::fs::write(&path, b"fake").unwrap();
        let result = VideoContent::open(&path);
        assert!(matches!(result, Err(ContentError::UnsupportedVideo(_))));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_video() {
        let result = VideoContent::open("/no/such/clip.gif");
        assert!(matches!(result, Err(ContentError::NotFound(_))));
    }
}
