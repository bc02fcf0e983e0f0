//! FFmpeg-backed frame source (enabled with the `ffmpeg` feature)
//!
//! Software decode to tightly packed RGBA, one frame per call.

use std::path::Path;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context as Scaler, Flags};

use super::{ContentError, DecodedFrame, FrameSource};

impl From<ffmpeg_next::Error> for ContentError {
    fn from(e: ffmpeg_next::Error) -> Self {
        ContentError::VideoDecode(e.to_string())
    }
}

/// Frames decoded from any container FFmpeg understands
pub struct FfmpegFrames {
    input: ffmpeg_next::format::context::Input,
    video_stream_index: usize,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Scaler,
    width: u32,
    height: u32,
    frame_index: u64,
    eof: bool,
}

impl FfmpegFrames {
    pub fn open(path: &Path) -> Result<Self, ContentError> {
        // Safe to call multiple times
        ffmpeg_next::init()?;

        let open_failed = |reason: String| ContentError::VideoOpen {
            path: path.to_path_buf(),
            reason,
        };

        let input = ffmpeg_next::format::input(&path).map_err(|e| open_failed(e.to_string()))?;
        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| open_failed("no video stream".to_string()))?;
        let video_stream_index = stream.index();

        let context = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| open_failed(format!("failed to create decoder: {}", e)))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = Scaler::get(
            decoder.format(),
            width,
            height,
            Pixel::RGBA,
            width,
            height,
            Flags::BILINEAR,
        )
        .map_err(|e| open_failed(format!("failed to create scaler: {}", e)))?;

        tracing::debug!(
            "FFmpeg stream {}: {}x{}, stream #{}",
            path.display(),
            width,
            height,
            video_stream_index
        );

        Ok(Self {
            input,
            video_stream_index,
            decoder,
            scaler,
            width,
            height,
            frame_index: 0,
            eof: false,
        })
    }

    fn to_rgba(&mut self, decoded: &ffmpeg_next::frame::Video) -> Result<DecodedFrame, ContentError> {
        if decoded.format() != self.scaler.input().format {
            self.scaler = Scaler::get(
                decoded.format(),
                self.width,
                self.height,
                Pixel::RGBA,
                self.width,
                self.height,
                Flags::BILINEAR,
            )?;
        }

        let mut rgba_frame = ffmpeg_next::frame::Video::empty();
        self.scaler.run(decoded, &mut rgba_frame)?;

        let data = rgba_frame.data(0);
        let stride = rgba_frame.stride(0);
        let row_bytes = (self.width as usize) * 4;
        let size = DecodedFrame::expected_size(self.width, self.height);

        let rgba = if stride == row_bytes {
            data[..size].to_vec()
        } else {
            let mut output = Vec::with_capacity(size);
            for y in 0..self.height as usize {
                let start = y * stride;
                output.extend_from_slice(&data[start..start + row_bytes]);
            }
            output
        };

        let frame = DecodedFrame::new(rgba, self.width, self.height, self.frame_index);
        self.frame_index += 1;
        Ok(frame)
    }
}

impl FrameSource for FfmpegFrames {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, ContentError> {
        let mut decoded = ffmpeg_next::frame::Video::empty();

        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return self.to_rgba(&decoded).map(Some),
                Err(ffmpeg_next::Error::Other {
                    errno: ffmpeg_next::error::EAGAIN,
                }) => {}
                Err(ffmpeg_next::Error::Eof) => return Ok(None),
                Err(e) => return Err(ContentError::VideoDecode(e.to_string())),
            }

            if self.eof {
                return Ok(None);
            }

            // Feed the next packet belonging to our stream
            loop {
                let next = self
                    .input
                    .packets()
                    .next()
                    .map(|(stream, packet)| (stream.index(), packet));
                match next {
                    Some((index, packet)) if index == self.video_stream_index => {
                        self.decoder.send_packet(&packet)?;
                        break;
                    }
                    Some(_) => {}
                    None => {
                        self.decoder.send_eof()?;
                        self.eof = true;
                        break;
                    }
                }
            }
        }
    }

    fn rewind(&mut self) -> Result<(), ContentError> {
        self.input.seek(0, ..)?;
        self.decoder.flush();
        self.frame_index = 0;
        self.eof = false;
        Ok(())
    }
}
