//! Substitute backgrounds, cached at the output resolution and hot-reloaded
//! when the file behind them changes.

mod ffmpeg;
mod image_file;
mod video;

pub use ffmpeg::FfmpegOpener;
pub use image_file::StaticBackground;
pub use video::VideoBackground;

use crate::frame::Frame;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Seconds between checks of the background file's signature
pub const REFRESH_PERIOD_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum BackgroundError {
    #[error("cannot access background {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode background image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("ffmpeg not found on PATH: {0}")]
    DecoderNotFound(#[from] which::Error),

    #[error("failed to start video decoder {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("background video yielded no frame after {rewinds} rewinds")]
    StreamUnreadable { rewinds: u32 },
}

impl BackgroundError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Something that can produce a background frame of an exact size
pub trait BackgroundSource {
    /// Return a frame of exactly `width` x `height`
    fn background(&mut self, width: u32, height: u32) -> Result<Frame, BackgroundError>;
}

/// Wall-clock seconds, behind a trait so refresh timing can be driven in tests
pub trait Clock {
    fn now_secs(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Decides when a background must be reloaded
///
/// The file's size is its signature. A loaded background is only checked
/// again on seconds divisible by the refresh period, once per such second.
pub struct RefreshGate<C = SystemClock> {
    path: PathBuf,
    period: u64,
    clock: C,
    signature: Option<u64>,
    last_check: Option<u64>,
}

impl<C: Clock> RefreshGate<C> {
    pub fn with_clock(path: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            path: path.into(),
            period: REFRESH_PERIOD_SECS,
            clock,
            signature: None,
            last_check: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the signature now, regardless of the clock
    pub fn current_signature(&mut self) -> Result<u64, BackgroundError> {
        self.last_check = Some(self.clock.now_secs());
        let size = std::fs::metadata(&self.path)
            .map_err(|e| BackgroundError::io(&self.path, e))?
            .len();
        Ok(size)
    }

    /// Returns the new signature when a reload is due
    ///
    /// Call [`RefreshGate::commit`] with it once the reload succeeded.
    pub fn poll(&mut self) -> Result<Option<u64>, BackgroundError> {
        let now = self.clock.now_secs();
        if now % self.period != 0 || self.last_check == Some(now) {
            return Ok(None);
        }

        let size = self.current_signature()?;
        if self.signature == Some(size) {
            return Ok(None);
        }
        tracing::debug!(
            "Background {} signature {:?} -> {}",
            self.path.display(),
            self.signature,
            size
        );
        Ok(Some(size))
    }

    pub fn commit(&mut self, signature: u64) {
        self.signature = Some(signature);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Clock;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Clock whose time the test sets by hand
    #[derive(Clone, Default)]
    pub struct ManualClock(Rc<Cell<u64>>);

    impl ManualClock {
        pub fn at(secs: u64) -> Self {
            Self(Rc::new(Cell::new(secs)))
        }

        pub fn set(&self, secs: u64) {
            self.0.set(secs);
        }
    }

    impl Clock for ManualClock {
        fn now_secs(&self) -> u64 {
            self.0.get()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;
    use std::fs;

    #[test]
    fn current_signature_is_the_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.bin");
        fs::write(&path, [0u8; 12]).unwrap();

        let mut gate = RefreshGate::with_clock(&path, ManualClock::at(13));
        assert_eq!(gate.current_signature().unwrap(), 12);
    }

    #[test]
    fn unchanged_signature_is_not_due() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.bin");
        fs::write(&path, [0u8; 12]).unwrap();

        let clock = ManualClock::at(13);
        let mut gate = RefreshGate::with_clock(&path, clock.clone());
        let sig = gate.current_signature().unwrap();
        gate.commit(sig);

        clock.set(20);
        assert_eq!(gate.poll().unwrap(), None);
    }

    #[test]
    fn changed_signature_is_only_seen_on_a_tick() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.bin");
        fs::write(&path, [0u8; 12]).unwrap();

        let clock = ManualClock::at(13);
        let mut gate = RefreshGate::with_clock(&path, clock.clone());
        let sig = gate.current_signature().unwrap();
        gate.commit(sig);

        fs::write(&path, [0u8; 40]).unwrap();
        clock.set(17);
        assert_eq!(gate.poll().unwrap(), None);
        clock.set(30);
        assert_eq!(gate.poll().unwrap(), Some(40));
    }

    #[test]
    fn checks_once_per_tick_second() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.bin");
        fs::write(&path, [0u8; 12]).unwrap();

        let clock = ManualClock::at(40);
        let mut gate = RefreshGate::with_clock(&path, clock.clone());
        gate.current_signature().unwrap();

        // Not committed, so a second check in the same second would report it again
        fs::remove_file(&path).unwrap();
        assert_eq!(gate.poll().unwrap(), None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = RefreshGate::with_clock(dir.path().join("nope.jpg"), ManualClock::at(1));
        assert!(matches!(
            gate.current_signature(),
            Err(BackgroundError::Io { .. })
        ));
    }
}
