use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::CameraConfig;
use crate::media::{
    buffer::FrameBuffer,
    source::{spawn_adapter, FrameSink},
    types::SourceFrame,
};

/// One registered camera source: its buffer plus the sender handle the
/// external frame transport publishes into.
pub struct Source {
    pub camera: CameraConfig,
    pub buffer: Arc<FrameBuffer>,
    frames: mpsc::Sender<SourceFrame>,
}

impl Source {
    /// Handle for the transport that delivers raw frames for this source.
    #[allow(dead_code)]
    pub fn frame_sender(&self) -> mpsc::Sender<SourceFrame> {
        self.frames.clone()
    }
}

static SOURCES: LazyLock<RwLock<HashMap<String, Arc<Source>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Create the buffer and adapter task for a configured camera. Called once
/// per source at startup; buffers live for the process lifetime.
pub(crate) async fn register_source(camera: CameraConfig, cancel: CancellationToken) -> Arc<Source> {
    let buffer = Arc::new(FrameBuffer::new(camera.name.clone()));

    let mut sink = FrameSink::new();
    let frames = sink.sender();
    if let Some(rx) = sink.take_receiver() {
        spawn_adapter(Arc::clone(&buffer), rx, cancel);
    }

    let source = Arc::new(Source {
        camera: camera.clone(),
        buffer,
        frames,
    });
    SOURCES
        .write()
        .await
        .insert(camera.name, Arc::clone(&source));
    source
}

pub(crate) async fn get_source(name: &str) -> Option<Arc<Source>> {
    SOURCES.read().await.get(name).cloned()
}

pub(crate) async fn list_cameras() -> Vec<CameraConfig> {
    let mut cameras: Vec<_> = SOURCES
        .read()
        .await
        .values()
        .map(|s| s.camera.clone())
        .collect();
    cameras.sort_by(|a, b| a.name.cmp(&b.name));
    cameras
}
