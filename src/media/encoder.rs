use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

use crate::media::types::{EncoderConfig, EncoderProfile};

/// External video encoder, invoked once per streaming session.
///
/// Abstracted so the feeder/drain logic can run against a fake encoder in
/// tests without spawning a real process.
pub trait Encoder: Send + Sync {
    fn start(&self, config: &EncoderConfig) -> anyhow::Result<RunningEncoder>;
}

/// Control handle for a started encoder process.
pub trait EncoderProcess: Send {
    /// Poll for exit without blocking. `Ok(true)` once the process is gone.
    fn try_wait(&mut self) -> anyhow::Result<bool>;
    /// Force-kill the process.
    fn kill(&mut self) -> anyhow::Result<()>;
}

/// The byte-stream ends of a running encoder: raw frames go into `input`,
/// encoded container output comes out of `output`.
pub struct RunningEncoder {
    pub input: Box<dyn AsyncWrite + Send + Unpin>,
    pub output: Box<dyn AsyncRead + Send + Unpin>,
    pub process: Box<dyn EncoderProcess>,
}

/// ffmpeg invoked as a subprocess: raw RGB24 on stdin, encoded H.264
/// (baseline profile, zero-latency tuning) on stdout.
pub struct FfmpegEncoder {
    program: String,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            program: "ffmpeg".to_string(),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for FfmpegEncoder {
    fn start(&self, config: &EncoderConfig) -> anyhow::Result<RunningEncoder> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s")
            .arg(format!("{}x{}", config.width, config.height))
            .arg("-r")
            .arg(format!("{}", config.framerate))
            .args(["-i", "-"])
            .args(["-c:v", "libx264"])
            .args(["-preset", "ultrafast", "-tune", "zerolatency"])
            .args(["-profile:v", "baseline", "-level", "3.0"])
            .args(["-pix_fmt", "yuv420p"])
            // keyframe every second
            .arg("-g")
            .arg(format!("{}", config.framerate.round() as i64));

        match config.profile {
            EncoderProfile::Mpegts => {
                cmd.args(["-f", "mpegts", "-"]);
            }
            EncoderProfile::Fmp4 => {
                cmd.args([
                    "-f",
                    "mp4",
                    "-movflags",
                    "frag_keyframe+empty_moov+default_base_moof",
                    "-",
                ]);
            }
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {}. Is it installed?", self.program))?;

        let stdin = child.stdin.take().context("no ffmpeg stdin")?;
        let stdout = child.stdout.take().context("no ffmpeg stdout")?;

        log::info!(
            "encoder started: {}x{} @ {} fps, {:?}",
            config.width,
            config.height,
            config.framerate,
            config.profile
        );

        Ok(RunningEncoder {
            input: Box::new(stdin),
            output: Box::new(stdout),
            process: Box::new(FfmpegProcess { child }),
        })
    }
}

struct FfmpegProcess {
    child: Child,
}

impl EncoderProcess for FfmpegProcess {
    fn try_wait(&mut self) -> anyhow::Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    fn kill(&mut self) -> anyhow::Result<()> {
        self.child.start_kill()?;
        Ok(())
    }
}
