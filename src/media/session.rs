use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::media::{
    buffer::FrameBuffer,
    encoder::{Encoder, EncoderProcess, RunningEncoder},
    types::{CameraFrame, EncoderConfig, EncoderProfile},
};

pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);
const DISCOVERY_POLL: Duration = Duration::from_millis(100);
const EXIT_POLL: Duration = Duration::from_millis(50);
// reap window after a force-kill, on top of the teardown timeout
const KILL_GRACE: Duration = Duration::from_millis(250);
const DRAIN_CHUNK: usize = 4096;

/// Session state, observable across tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Closing,
    Closed,
}

#[derive(Clone)]
pub struct SessionStatus(Arc<AtomicU8>);

impl SessionStatus {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(SessionState::Active as u8)))
    }

    fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Relaxed);
    }

    pub fn state(&self) -> SessionState {
        match self.0.load(Ordering::Relaxed) {
            0 => SessionState::Active,
            1 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TranscodeOptions {
    pub framerate: f64,
    pub profile: EncoderProfile,
    pub startup_timeout: Duration,
    pub teardown_timeout: Duration,
}

impl TranscodeOptions {
    pub fn new(framerate: f64, profile: EncoderProfile) -> Self {
        Self {
            framerate,
            profile,
            startup_timeout: STARTUP_TIMEOUT,
            teardown_timeout: TEARDOWN_TIMEOUT,
        }
    }
}

/// One client's transcoded stream. Dropping the stream (client disconnect)
/// unwinds the feeder, the drain loop and the encoder process.
pub struct TranscodeSession {
    stream: ReceiverStream<Result<Bytes, io::Error>>,
    status: SessionStatus,
    profile: EncoderProfile,
}

impl TranscodeSession {
    pub fn content_type(&self) -> &'static str {
        self.profile.content_type()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.clone()
    }

    pub fn into_stream(self) -> ReceiverStream<Result<Bytes, io::Error>> {
        self.stream
    }
}

/// Start a transcoding session against a source buffer.
///
/// Blocks until the first frame yields the encoder dimensions (bounded by
/// the startup timeout; on timeout no subprocess is spawned), starts the
/// encoder, then spawns the session task: a feeder pacing raw frames into
/// the encoder input plus a drain loop forwarding encoder output to the
/// returned stream.
pub async fn start_transcode(
    buffer: Arc<FrameBuffer>,
    encoder: &dyn Encoder,
    options: TranscodeOptions,
    cancel: CancellationToken,
) -> anyhow::Result<TranscodeSession> {
    let first = first_frame(&buffer, options.startup_timeout).await?;
    let config = EncoderConfig {
        width: first.width,
        height: first.height,
        framerate: options.framerate,
        profile: options.profile,
    };

    let running = encoder
        .start(&config)
        .with_context(|| format!("failed to start encoder for {}", buffer.name()))?;

    let status = SessionStatus::new();
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(run_session(
        running,
        buffer,
        config.frame_interval(),
        options.teardown_timeout,
        tx,
        cancel,
        status.clone(),
    ));

    Ok(TranscodeSession {
        stream: ReceiverStream::new(rx),
        status,
        profile: options.profile,
    })
}

/// Poll the buffer until a first frame arrives, bounded by `timeout`.
async fn first_frame(buffer: &FrameBuffer, timeout: Duration) -> anyhow::Result<Arc<CameraFrame>> {
    let poll = async {
        loop {
            if let Some(frame) = buffer.get() {
                return frame;
            }
            tokio::time::sleep(DISCOVERY_POLL).await;
        }
    };
    match tokio::time::timeout(timeout, poll).await {
        Ok(frame) => Ok(frame),
        Err(_) => anyhow::bail!("no frame from {} within {:?}", buffer.name(), timeout),
    }
}

async fn run_session(
    encoder: RunningEncoder,
    buffer: Arc<FrameBuffer>,
    interval: Duration,
    teardown_timeout: Duration,
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
    cancel: CancellationToken,
    status: SessionStatus,
) {
    let RunningEncoder {
        input,
        mut output,
        mut process,
    } = encoder;

    let name = buffer.name().to_string();
    let feeder = tokio::spawn(feed_frames(input, buffer, interval, cancel.clone()));

    let mut chunk = vec![0u8; DRAIN_CHUNK];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("{}: session cancelled", name);
                break;
            },
            // the receiver is the client body; its drop must tear the
            // session down even when the encoder emits nothing
            _ = tx.closed() => {
                log::info!("{}: client disconnected", name);
                break;
            },
            read = output.read(&mut chunk) => match read {
                Ok(0) => {
                    log::info!("{}: encoder output closed", name);
                    break;
                }
                Ok(n) => {
                    if tx.send(Ok(Bytes::copy_from_slice(&chunk[..n]))).await.is_err() {
                        // client went away; normal shutdown, not an error
                        log::info!("{}: client disconnected", name);
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("{}: encoder read failed: {}", name, e);
                    break;
                }
            },
        }
    }

    status.set(SessionState::Closing);
    cancel.cancel();

    // Joining the feeder drops the encoder input; EOF is the graceful
    // termination request.
    if feeder.await.is_err() {
        log::warn!("{}: feeder task panicked", name);
    }

    shutdown_process(&name, process.as_mut(), teardown_timeout).await;
    status.set(SessionState::Closed);
}

/// Pace raw frames into the encoder input at the target interval.
///
/// Tracks the wall-clock instant of the last tick and sleeps the remainder
/// of the interval, so the encoder is throttled to the target rate no
/// matter how fast the buffer updates. A tick with no frame yet is skipped.
/// A failed write means the input pipe closed during teardown; the feeder
/// ends silently.
async fn feed_frames(
    mut input: Box<dyn AsyncWrite + Send + Unpin>,
    buffer: Arc<FrameBuffer>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut last_tick = Instant::now();
    loop {
        let elapsed = last_tick.elapsed();
        if elapsed < interval {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval - elapsed) => {},
            }
        }
        if cancel.is_cancelled() {
            break;
        }
        if let Some(frame) = buffer.get() {
            if input.write_all(&frame.rgb).await.is_err() {
                break;
            }
            if input.flush().await.is_err() {
                break;
            }
        }
        last_tick = Instant::now();
    }
}

/// Wait for the encoder process to exit, escalating to a kill after the
/// bounded timeout. Runs on every session exit path. One deadline covers
/// both phases: the post-kill reap only gets a short fixed grace, so the
/// whole teardown stays close to `timeout`.
async fn shutdown_process(name: &str, process: &mut dyn EncoderProcess, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    if wait_exit(name, process, deadline).await {
        log::debug!("{}: encoder exited", name);
        return;
    }
    log::warn!("{}: encoder did not exit within {:?}, killing", name, timeout);
    if let Err(e) = process.kill() {
        log::warn!("{}: encoder kill failed: {:#}", name, e);
        return;
    }
    if !wait_exit(name, process, Instant::now() + KILL_GRACE).await {
        log::warn!("{}: encoder still running after kill", name);
    }
}

async fn wait_exit(name: &str, process: &mut dyn EncoderProcess, deadline: Instant) -> bool {
    loop {
        match process.try_wait() {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                log::warn!("{}: encoder status check failed: {:#}", name, e);
                return true;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(EXIT_POLL).await;
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
