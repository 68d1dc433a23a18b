use std::fmt::{Display, Formatter};
use std::time::Duration;

use bytes::Bytes;

/// Pixel layout of frames delivered by the external source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Rgba32,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba32 => 4,
        }
    }
}

/// Raw frame as delivered by the external source transport.
#[derive(Clone, Debug)]
pub struct SourceFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Bytes,
}

impl SourceFrame {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data: Bytes::from(data),
        }
    }

    /// Payload size a well-formed frame must have.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

impl Display for SourceFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "SourceFrame {{ {}x{} {:?}, {} bytes }}",
            self.width,
            self.height,
            self.format,
            self.data.len()
        )
    }
}

/// Decoded, ready-to-serve frame held by a [`crate::media::buffer::FrameBuffer`].
///
/// `rgb` is always RGB24 (`len == width * height * 3`); `jpeg` is encoded
/// once at ingest so every passthrough consumer reuses the same bytes.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Bytes,
    pub jpeg: Bytes,
}

/// Output container for the transcoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderProfile {
    /// MPEG transport stream, continuous low-latency viewing.
    Mpegts,
    /// Fragmented MP4, seek-capable playback.
    Fmp4,
}

impl EncoderProfile {
    pub fn content_type(&self) -> &'static str {
        match self {
            EncoderProfile::Mpegts => "video/mp2t",
            EncoderProfile::Fmp4 => "video/mp4",
        }
    }
}

/// Arguments for one encoder subprocess.
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub framerate: f64,
    pub profile: EncoderProfile,
}

impl EncoderConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.framerate)
    }
}
