use super::{BackgroundError, BackgroundSource, Clock, RefreshGate, SystemClock};
use crate::frame::{ChannelOrder, Frame};
use std::path::PathBuf;

/// Background from a still image, reloaded when the file changes
pub struct StaticBackground<C = SystemClock> {
    gate: RefreshGate<C>,
    /// Decoded file at its native size
    source: Option<Frame>,
    /// `source` resized to the last requested size
    scaled: Option<Frame>,
}

impl StaticBackground {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, SystemClock)
    }
}

impl<C: Clock> StaticBackground<C> {
    pub fn with_clock(path: impl Into<PathBuf>, clock: C) -> Self {
        let gate = RefreshGate::with_clock(path, clock);
        tracing::info!("Using background image {}", gate.path().display());
        Self {
            gate,
            source: None,
            scaled: None,
        }
    }

    fn load(&self) -> Result<Frame, BackgroundError> {
        let _span = tracing::debug_span!("load_background_image").entered();

        let image = image::open(self.gate.path())?.to_rgb8();
        Ok(Frame::new(image, ChannelOrder::Rgb))
    }

    fn first_load(&mut self) -> Result<Frame, BackgroundError> {
        let signature = self.gate.current_signature()?;
        let frame = self.load()?;
        self.gate.commit(signature);
        self.log_loaded(&frame);
        Ok(frame)
    }

    /// A freshly decoded frame when the file changed since the last load
    fn reload(&mut self) -> Result<Option<Frame>, BackgroundError> {
        let Some(signature) = self.gate.poll()? else {
            return Ok(None);
        };
        let frame = self.load()?;
        self.gate.commit(signature);
        self.log_loaded(&frame);
        Ok(Some(frame))
    }

    fn log_loaded(&self, frame: &Frame) {
        let (width, height) = frame.dimensions();
        tracing::info!(
            "Loaded background image {} ({}x{})",
            self.gate.path().display(),
            width,
            height
        );
    }
}

impl<C: Clock> BackgroundSource for StaticBackground<C> {
    fn background(&mut self, width: u32, height: u32) -> Result<Frame, BackgroundError> {
        let source = match self.source.take() {
            None => {
                self.scaled = None;
                self.first_load()?
            }
            Some(current) => match self.reload() {
                Ok(Some(fresh)) => {
                    self.scaled = None;
                    fresh
                }
                Ok(None) => current,
                Err(err) => {
                    tracing::warn!("Keeping previous background, reload failed: {}", err);
                    current
                }
            },
        };
        let source = self.source.insert(source);

        if let Some(scaled) = &self.scaled {
            if scaled.dimensions() == (width, height) {
                return Ok(scaled.clone());
            }
        }

        let scaled = source.clone().resized(width, height);
        self.scaled = Some(scaled.clone());
        Ok(scaled)
    }
}
