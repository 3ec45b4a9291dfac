mod background;
mod capture;
mod compositor;
mod effects;
mod frame;
mod output;
mod pipeline;
mod postprocess;
mod segmentation;

use anyhow::{Context, Result};
use background::{BackgroundSource, FfmpegOpener, StaticBackground, VideoBackground};
use capture::{CaptureSource, WebcamCapture};
use clap::Parser;
use effects::{EffectKind, EffectPass};
use output::{OutputSink, PixelFormat, V4L2Output};
use pipeline::Pipeline;
use postprocess::{MaskPostProcessor, DEFAULT_BLUR_SIZE, DEFAULT_DILATE_SIZE};
use segmentation::{HttpSegmenter, RetryPolicy, SegmentationClient};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Physical camera device
    #[arg(long, env = "ACTUAL_CAMERA", default_value = "/dev/video0")]
    camera_device: String,

    /// Output v4l2loopback device path
    #[arg(long, env = "FAKE_CAMERA", default_value = "/dev/video20")]
    output_device: PathBuf,

    /// Pixel format announced on the output device
    #[arg(long, env = "FAKE_CAMERA_FORMAT", value_enum, default_value_t = PixelFormat::Yuyv)]
    output_format: PixelFormat,

    /// Frame width, for capture and output alike
    #[arg(long, env = "CAMERA_WIDTH", default_value_t = 640)]
    width: u32,

    /// Frame height, for capture and output alike
    #[arg(long, env = "CAMERA_HEIGHT", default_value_t = 360)]
    height: u32,

    /// Target frames per second
    #[arg(long, env = "CAMERA_FPS", default_value_t = 24)]
    fps: u32,

    /// Treat the background file as a looping video
    #[arg(long, env = "IS_VID_BACKGROUND")]
    video_background: bool,

    /// Background image or video
    #[arg(long, env = "BACKGROUND_FILE", default_value = "/data/background.jpg")]
    background: PathBuf,

    /// Effect applied to the subject
    #[arg(long, env = "EFFECT", value_enum, default_value_t = EffectKind::None)]
    effect: EffectKind,

    /// Segmentation service endpoint
    #[arg(long, env = "BODYPIX_URL", default_value = "http://bodypix:9000")]
    segmentation_url: String,

    /// Segment full-resolution frames instead of half-size ones
    #[arg(long, env = "FULL_RESOLUTION_MASK")]
    full_resolution_mask: bool,

    /// Mask value the service uses for "fully foreground" (1 for binary masks)
    #[arg(long, env = "MASK_MAX_VALUE", default_value_t = 255)]
    mask_max_value: u8,

    /// Seconds to wait before retrying a failed mask request
    #[arg(long, env = "MASK_RETRY_DELAY", default_value_t = 5)]
    retry_delay_secs: u64,

    /// Give up after this many failed mask requests in a row (0 = never)
    #[arg(long, env = "MASK_MAX_ATTEMPTS", default_value_t = 120)]
    max_mask_attempts: u32,

    /// Timeout for a single mask request, in seconds
    #[arg(long, env = "MASK_REQUEST_TIMEOUT", default_value_t = 10)]
    request_timeout_secs: u64,

    /// Edge length of the mask dilation element
    #[arg(long, default_value_t = DEFAULT_DILATE_SIZE)]
    dilate_size: u32,

    /// Edge length of the mask blur kernel
    #[arg(long, default_value_t = DEFAULT_BLUR_SIZE)]
    blur_size: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("fakecam starting");
    tracing::info!("Resolution: {}x{}", args.width, args.height);
    tracing::info!("Target FPS: {}", args.fps);
    tracing::info!("Effect: {:?}", args.effect);

    let capture = WebcamCapture::new(&args.camera_device, args.width, args.height, args.fps)
        .context("Failed to initialize webcam capture")?;

    let output = V4L2Output::new(
        &args.output_device,
        args.width,
        args.height,
        args.output_format,
    )
    .context("Failed to initialize v4l2loopback output")?;

    let segmenter = HttpSegmenter::new(
        &args.segmentation_url,
        Duration::from_secs(args.request_timeout_secs),
        args.mask_max_value,
    )
    .context("Failed to set up segmentation client")?;
    let max_attempts = (args.max_mask_attempts > 0).then_some(args.max_mask_attempts);
    let policy = RetryPolicy::new(Duration::from_secs(args.retry_delay_secs), max_attempts);
    let segmentation = SegmentationClient::new(segmenter, policy);

    let postprocess = MaskPostProcessor::new(args.dilate_size, args.blur_size);
    let effect = EffectPass::new(args.effect);
    let downscale = !args.full_resolution_mask;

    if args.video_background {
        let opener = FfmpegOpener::new().context("Video backgrounds need ffmpeg")?;
        let background = VideoBackground::new(&args.background, opener);
        run(capture, background, segmentation, postprocess, effect, output, downscale, args.fps)
    } else {
        let background = StaticBackground::new(&args.background);
        run(capture, background, segmentation, postprocess, effect, output, downscale, args.fps)
    }
}

#[allow(clippy::too_many_arguments)]
fn run<C, B, O>(
    capture: C,
    background: B,
    segmentation: SegmentationClient<HttpSegmenter>,
    postprocess: MaskPostProcessor,
    effect: EffectPass,
    output: O,
    downscale: bool,
    fps: u32,
) -> Result<()>
where
    C: CaptureSource,
    B: BackgroundSource,
    O: OutputSink,
{
    Pipeline::new(
        capture,
        background,
        segmentation,
        postprocess,
        effect,
        output,
        downscale,
    )
    .run(fps)
}
