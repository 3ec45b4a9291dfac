//! Video decoding through an `ffmpeg` child process emitting raw RGB frames.

use super::video::{StreamOpener, VideoStream};
use super::BackgroundError;
use crate::frame::{ChannelOrder, Frame};
use image::RgbImage;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Spawns `ffmpeg` decoders for background videos
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    ffmpeg_path: PathBuf,
}

impl FfmpegOpener {
    /// Locate `ffmpeg` on the PATH
    pub fn new() -> Result<Self, BackgroundError> {
        let ffmpeg_path = which::which("ffmpeg")?;
        tracing::info!("Decoding background video with {}", ffmpeg_path.display());
        Ok(Self { ffmpeg_path })
    }
}

impl StreamOpener for FfmpegOpener {
    type Stream = FfmpegStream;

    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
    ) -> Result<FfmpegStream, BackgroundError> {
        FfmpegStream::spawn(&self.ffmpeg_path, path, width, height)
    }
}

/// One running decoder; killed and reaped on drop
pub struct FfmpegStream {
    ffmpeg_path: PathBuf,
    path: PathBuf,
    width: u32,
    height: u32,
    child: Child,
    stdout: ChildStdout,
}

impl FfmpegStream {
    fn spawn(
        ffmpeg_path: &Path,
        path: &Path,
        width: u32,
        height: u32,
    ) -> Result<Self, BackgroundError> {
        let mut child = Command::new(ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-an", "-vf"])
            .arg(format!("scale={width}:{height}"))
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| BackgroundError::Spawn {
                program: ffmpeg_path.to_path_buf(),
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BackgroundError::Spawn {
                program: ffmpeg_path.to_path_buf(),
                source: std::io::Error::other("stdout not captured"),
            });
        };

        tracing::debug!("Spawned ffmpeg (pid {}) for {}", child.id(), path.display());

        Ok(Self {
            ffmpeg_path: ffmpeg_path.to_path_buf(),
            path: path.to_path_buf(),
            width,
            height,
            child,
            stdout,
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    fn stop(&mut self) {
        // Already exited is fine
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl VideoStream for FfmpegStream {
    fn read_frame(&mut self) -> Result<Option<Frame>, BackgroundError> {
        let mut buffer = vec![0u8; self.frame_len()];
        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(BackgroundError::io(&self.path, e)),
        }

        // The buffer is exactly one frame long, so this is always `Some`
        Ok(RgbImage::from_raw(self.width, self.height, buffer)
            .map(|image| Frame::new(image, ChannelOrder::Rgb)))
    }

    fn rewind(&mut self) -> Result<(), BackgroundError> {
        self.stop();
        let restarted = Self::spawn(&self.ffmpeg_path, &self.path, self.width, self.height)?;
        *self = restarted;
        // Loops resume at frame index 1
        self.read_frame()?;
        Ok(())
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        self.stop();
    }
}
