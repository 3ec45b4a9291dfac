use super::preprocess::Preprocessor;
use super::retry::{RetryPolicy, Sleep, ThreadSleep};
use super::types::{MaskSource, SegmentationError};
use crate::frame::{Frame, Mask};
use std::borrow::Cow;

/// Fetches full-resolution masks, retrying while the service warms up
pub struct SegmentationClient<S, Z = ThreadSleep> {
    source: S,
    policy: RetryPolicy,
    sleeper: Z,
}

impl<S: MaskSource> SegmentationClient<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self::with_sleeper(source, policy, ThreadSleep)
    }
}

impl<S: MaskSource, Z: Sleep> SegmentationClient<S, Z> {
    pub fn with_sleeper(source: S, policy: RetryPolicy, sleeper: Z) -> Self {
        Self {
            source,
            policy,
            sleeper,
        }
    }

    /// Get a mask matching `frame`'s dimensions
    ///
    /// With `downscale`, a half-size copy is segmented and the mask is
    /// scaled back up, trading edge fidelity for throughput.
    pub fn get_mask(&mut self, frame: &Frame, downscale: bool) -> Result<Mask, SegmentationError> {
        let _span = tracing::debug_span!("get_mask", downscale).entered();

        let (width, height) = frame.dimensions();
        let request = if downscale {
            Cow::Owned(Preprocessor::shrink(frame))
        } else {
            Cow::Borrowed(frame)
        };

        let source = &mut self.source;
        let mask = self
            .policy
            .run(&mut self.sleeper, || source.request_mask(&request))?;

        Ok(Preprocessor::upscale_mask(mask, width, height))
    }
}
