use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{decode_frame, spawn_adapter, FrameSink};
use crate::media::buffer::FrameBuffer;
use crate::media::types::{CameraFrame, PixelFormat, SourceFrame};

fn rgb_frame(width: u32, height: u32, fill: u8) -> SourceFrame {
    SourceFrame::new(
        width,
        height,
        PixelFormat::Rgb24,
        vec![fill; (width * height * 3) as usize],
    )
}

async fn wait_for_frame(buffer: &FrameBuffer) -> Arc<CameraFrame> {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(frame) = buffer.get() {
                return frame;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("no frame arrived in buffer")
}

#[test]
fn test_decode_rgb24() {
    let decoded = decode_frame(&rgb_frame(64, 48, 7)).unwrap();
    assert_eq!(decoded.width, 64);
    assert_eq!(decoded.height, 48);
    assert_eq!(decoded.rgb.len(), 64 * 48 * 3);
    assert!(decoded.rgb.iter().all(|b| *b == 7));
    // JPEG SOI marker
    assert_eq!(&decoded.jpeg[..2], &[0xFF, 0xD8]);
}

#[test]
fn test_decode_rgba32_drops_alpha() {
    let data = vec![
        10, 20, 30, 255, // pixel 0
        40, 50, 60, 128, // pixel 1
    ];
    let frame = SourceFrame::new(2, 1, PixelFormat::Rgba32, data);
    let decoded = decode_frame(&frame).unwrap();
    assert_eq!(&decoded.rgb[..], &[10, 20, 30, 40, 50, 60]);
}

#[test]
fn test_decode_rejects_length_mismatch() {
    let frame = SourceFrame::new(64, 48, PixelFormat::Rgb24, vec![0; 100]);
    assert!(decode_frame(&frame).is_err());

    // RGBA payload declared as RGB is also a mismatch
    let frame = SourceFrame::new(2, 2, PixelFormat::Rgb24, vec![0; 2 * 2 * 4]);
    assert!(decode_frame(&frame).is_err());
}

#[test]
fn test_sink_receiver_taken_once() {
    let mut sink = FrameSink::new();
    assert!(sink.take_receiver().is_some());
    assert!(sink.take_receiver().is_none());
}

#[tokio::test]
async fn test_adapter_fills_buffer() {
    let buffer = Arc::new(FrameBuffer::new("overview"));
    let mut sink = FrameSink::new();
    let sender = sink.sender();
    spawn_adapter(
        Arc::clone(&buffer),
        sink.take_receiver().unwrap(),
        CancellationToken::new(),
    );

    sender.send(rgb_frame(64, 48, 7)).await.unwrap();

    let frame = wait_for_frame(&buffer).await;
    assert_eq!((frame.width, frame.height), (64, 48));
    assert!(!frame.jpeg.is_empty());
}

#[tokio::test]
async fn test_adapter_keeps_previous_frame_on_bad_input() {
    let buffer = Arc::new(FrameBuffer::new("overview"));
    let mut sink = FrameSink::new();
    let sender = sink.sender();
    spawn_adapter(
        Arc::clone(&buffer),
        sink.take_receiver().unwrap(),
        CancellationToken::new(),
    );

    sender.send(rgb_frame(8, 8, 1)).await.unwrap();
    wait_for_frame(&buffer).await;

    // truncated payload must be discarded without touching the buffer
    let bad = SourceFrame::new(8, 8, PixelFormat::Rgb24, vec![9; 10]);
    sender.send(bad).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let frame = buffer.get().unwrap();
    assert!(frame.rgb.iter().all(|b| *b == 1));
}

#[tokio::test]
async fn test_adapter_stops_when_channel_closes() {
    let buffer = Arc::new(FrameBuffer::new("overview"));
    let mut sink = FrameSink::new();
    let handle = spawn_adapter(
        Arc::clone(&buffer),
        sink.take_receiver().unwrap(),
        CancellationToken::new(),
    );

    drop(sink);
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("adapter did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_adapter_stops_on_cancel() {
    let buffer = Arc::new(FrameBuffer::new("overview"));
    let mut sink = FrameSink::new();
    let cancel = CancellationToken::new();
    let handle = spawn_adapter(
        Arc::clone(&buffer),
        sink.take_receiver().unwrap(),
        cancel.clone(),
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("adapter did not stop")
        .unwrap();
}
