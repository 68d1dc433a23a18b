use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::media::buffer::FrameBuffer;

pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Infinite passthrough stream: one complete JPEG per chunk, framed as a
/// `multipart/x-mixed-replace` part.
///
/// Each tick reads the latest buffered frame; if none has arrived yet the
/// tick is skipped, so the stream paces on time, never on frame
/// availability. Ends only when the body is dropped by the client or the
/// token is cancelled.
pub fn mjpeg_stream(
    buffer: Arc<FrameBuffer>,
    interval: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    futures::stream::unfold(
        (buffer, ticker, cancel),
        |(buffer, mut ticker, cancel)| async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    _ = ticker.tick() => {},
                }
                if let Some(frame) = buffer.get() {
                    return Some((Ok(mjpeg_part(&frame.jpeg)), (buffer, ticker, cancel)));
                }
                // no frame yet, wait for the next tick
            }
        },
    )
}

fn mjpeg_part(jpeg: &Bytes) -> Bytes {
    let mut part = BytesMut::with_capacity(jpeg.len() + 64);
    part.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part.freeze()
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;
