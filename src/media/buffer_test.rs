use std::sync::Arc;
use std::thread;

use bytes::Bytes;

use super::FrameBuffer;
use crate::media::types::CameraFrame;

fn frame(width: u32, height: u32, fill: u8) -> CameraFrame {
    CameraFrame {
        width,
        height,
        rgb: Bytes::from(vec![fill; (width * height * 3) as usize]),
        jpeg: Bytes::from(vec![fill; 16]),
    }
}

#[test]
fn test_get_none_before_set() {
    let buffer = FrameBuffer::new("overview");
    assert!(buffer.get().is_none());
    assert_eq!(buffer.name(), "overview");
}

#[test]
fn test_latest_write_wins() {
    let buffer = FrameBuffer::new("overview");

    buffer.set(frame(4, 2, 1));
    let first = buffer.get().unwrap();
    assert_eq!(first.rgb[0], 1);

    // repeated reads see the same frame until the next set
    assert_eq!(buffer.get().unwrap().rgb[0], 1);

    buffer.set(frame(4, 2, 2));
    assert_eq!(buffer.get().unwrap().rgb[0], 2);
}

#[test]
fn test_reader_handle_outlives_overwrite() {
    let buffer = FrameBuffer::new("overview");
    buffer.set(frame(4, 2, 1));

    let held = buffer.get().unwrap();
    buffer.set(frame(4, 2, 2));

    // the consumer's copy is unaffected by later writes
    assert_eq!(held.rgb[0], 1);
    assert_eq!(buffer.get().unwrap().rgb[0], 2);
}

#[test]
fn test_concurrent_get_never_observes_torn_frame() {
    let buffer = Arc::new(FrameBuffer::new("overview"));
    buffer.set(frame(8, 8, 0));

    // writers alternate between two internally uniform frames; a torn read
    // would show mixed fill bytes or a wrong length
    let writer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || {
            for i in 0..2_000u32 {
                let fill = if i % 2 == 0 { 0 } else { 255 };
                buffer.set(frame(8, 8, fill));
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let f = buffer.get().unwrap();
                    assert_eq!(f.rgb.len(), 8 * 8 * 3);
                    let first = f.rgb[0];
                    assert!(f.rgb.iter().all(|b| *b == first));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}
