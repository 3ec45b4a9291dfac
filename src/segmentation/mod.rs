mod client;
mod http;
mod preprocess;
mod retry;
pub mod types;

pub use client::SegmentationClient;
pub use http::HttpSegmenter;
pub use retry::{RetryPolicy, Sleep, ThreadSleep};
pub use types::MaskSource;
