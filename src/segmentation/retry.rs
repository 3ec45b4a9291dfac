use super::types::SegmentationError;
use std::time::Duration;

/// Where the retry loop waits between attempts
pub trait Sleep {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Fixed-delay retry for transient segmentation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` keeps trying forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: Some(120),
        }
    }
}

impl RetryPolicy {
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }

    /// Run `attempt` until it succeeds, fails permanently, or runs out of attempts
    pub fn run<T, S, F>(&self, sleeper: &mut S, mut attempt: F) -> Result<T, SegmentationError>
    where
        S: Sleep + ?Sized,
        F: FnMut() -> Result<T, SegmentationError>,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let err = match attempt() {
                Ok(value) => {
                    if attempts > 1 {
                        tracing::info!("Mask request succeeded after {} attempts", attempts);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() => err,
                Err(err) => return Err(err),
            };

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                tracing::error!("Mask request failed {} times, giving up: {}", attempts, err);
                return Err(SegmentationError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                });
            }

            tracing::warn!(
                "Mask request failed (attempt {}), retrying in {:?}: {}",
                attempts,
                self.delay,
                err
            );
            sleeper.sleep(self.delay);
        }
    }
}
