use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use jpeg_encoder::{ColorType, Encoder as JpegEncoder};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::media::{
    buffer::FrameBuffer,
    types::{CameraFrame, PixelFormat, SourceFrame},
};

const JPEG_QUALITY: u8 = 80;

/// Ingest end of one source: the external transport owns the sender side
/// and pushes raw frames; the adapter task drains the receiver into the
/// source's [`FrameBuffer`].
pub struct FrameSink {
    writer: mpsc::Sender<SourceFrame>,
    receiver: Option<mpsc::Receiver<SourceFrame>>,
}

impl FrameSink {
    pub fn new() -> Self {
        Self::with_capacity(8)
    }

    pub fn with_capacity(buffer_size: usize) -> Self {
        let (writer, receiver) = mpsc::channel(buffer_size);
        Self {
            writer,
            receiver: Some(receiver),
        }
    }

    /// Handle given to the transport that produces frames for this source.
    pub fn sender(&self) -> mpsc::Sender<SourceFrame> {
        self.writer.clone()
    }

    /// Take the receiver side; the adapter task owns it. Returns `None`
    /// after the first call.
    pub fn take_receiver(&mut self) -> Option<mpsc::Receiver<SourceFrame>> {
        self.receiver.take()
    }
}

impl Default for FrameSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the adapter task for one source.
///
/// Each received frame is validated, converted to RGB24 and JPEG-encoded
/// once, then written into the buffer. A malformed frame is logged and
/// dropped; the previously buffered frame stays in place. The task ends
/// when the channel closes or the token is cancelled.
pub fn spawn_adapter(
    buffer: Arc<FrameBuffer>,
    mut rx: mpsc::Receiver<SourceFrame>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    match decode_frame(&frame) {
                        Ok(decoded) => buffer.set(decoded),
                        Err(e) => {
                            log::warn!("{}: dropping bad frame ({}): {:#}", buffer.name(), frame, e);
                        }
                    }
                },
            }
        }
        log::info!("{}: frame adapter stopped", buffer.name());
    })
}

/// Validate a raw source frame and produce the buffered representation.
pub fn decode_frame(frame: &SourceFrame) -> anyhow::Result<CameraFrame> {
    let expected = frame.expected_len();
    if frame.data.len() != expected {
        anyhow::bail!(
            "payload length {} does not match expected {}",
            frame.data.len(),
            expected
        );
    }

    let rgb = match frame.format {
        PixelFormat::Rgb24 => frame.data.clone(),
        PixelFormat::Rgba32 => {
            let mut rgb = Vec::with_capacity(frame.width as usize * frame.height as usize * 3);
            for px in frame.data.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
            }
            Bytes::from(rgb)
        }
    };

    let width = u16::try_from(frame.width).context("frame width out of range")?;
    let height = u16::try_from(frame.height).context("frame height out of range")?;

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new(&mut jpeg, JPEG_QUALITY);
    encoder
        .encode(&rgb, width, height, ColorType::Rgb)
        .context("jpeg encode failed")?;

    Ok(CameraFrame {
        width: frame.width,
        height: frame.height,
        rgb,
        jpeg: Bytes::from(jpeg),
    })
}

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;
