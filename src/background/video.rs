use super::{BackgroundError, BackgroundSource, Clock, RefreshGate, SystemClock};
use crate::frame::Frame;
use std::path::{Path, PathBuf};

/// Rewinds attempted per request before a stream is declared unreadable
pub const MAX_REWIND_ATTEMPTS: u32 = 3;

/// An open, exclusively owned video decoding handle
pub trait VideoStream {
    /// Next frame, or `None` at end of stream
    fn read_frame(&mut self) -> Result<Option<Frame>, BackgroundError>;

    /// Seek back so the next read returns frame index 1
    fn rewind(&mut self) -> Result<(), BackgroundError>;
}

/// Opens [`VideoStream`]s; dropping a stream releases it
pub trait StreamOpener {
    type Stream: VideoStream;

    fn open(&mut self, path: &Path, width: u32, height: u32)
        -> Result<Self::Stream, BackgroundError>;
}

/// Background from a video file, played in a loop
pub struct VideoBackground<O: StreamOpener, C = SystemClock> {
    gate: RefreshGate<C>,
    opener: O,
    stream: Option<O::Stream>,
}

impl<O: StreamOpener> VideoBackground<O> {
    pub fn new(path: impl Into<PathBuf>, opener: O) -> Self {
        Self::with_clock(path, opener, SystemClock)
    }
}

impl<O: StreamOpener, C: Clock> VideoBackground<O, C> {
    pub fn with_clock(path: impl Into<PathBuf>, opener: O, clock: C) -> Self {
        let gate = RefreshGate::with_clock(path, clock);
        tracing::info!("Using background video {}", gate.path().display());
        Self {
            gate,
            opener,
            stream: None,
        }
    }

    fn first_open(&mut self, width: u32, height: u32) -> Result<O::Stream, BackgroundError> {
        let signature = self.gate.current_signature()?;
        let stream = self.opener.open(self.gate.path(), width, height)?;
        self.gate.commit(signature);
        tracing::info!("Opened background video {}", self.gate.path().display());
        Ok(stream)
    }

    /// A new stream when the file changed since it was last opened
    fn reopen(&mut self, width: u32, height: u32) -> Result<Option<O::Stream>, BackgroundError> {
        let Some(signature) = self.gate.poll()? else {
            return Ok(None);
        };
        let stream = self.opener.open(self.gate.path(), width, height)?;
        self.gate.commit(signature);
        tracing::info!("Background video changed, reopened {}", self.gate.path().display());
        Ok(Some(stream))
    }
}

impl<O: StreamOpener, C: Clock> BackgroundSource for VideoBackground<O, C> {
    fn background(&mut self, width: u32, height: u32) -> Result<Frame, BackgroundError> {
        let stream = match self.stream.take() {
            None => self.first_open(width, height)?,
            // Dropping the replaced handle releases it
            Some(current) => match self.reopen(width, height) {
                Ok(Some(fresh)) => fresh,
                Ok(None) => current,
                Err(err) => {
                    tracing::warn!("Keeping current background video, reload failed: {}", err);
                    current
                }
            },
        };
        let stream = self.stream.insert(stream);

        let mut rewinds = 0;
        loop {
            if let Some(frame) = stream.read_frame()? {
                return Ok(frame.resized(width, height));
            }
            if rewinds == MAX_REWIND_ATTEMPTS {
                return Err(BackgroundError::StreamUnreadable { rewinds });
            }
            rewinds += 1;
            tracing::debug!("Background video ended, looping");
            stream.rewind()?;
        }
    }
}
