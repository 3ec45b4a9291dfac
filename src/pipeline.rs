use crate::background::BackgroundSource;
use crate::capture::CaptureSource;
use crate::compositor::composite;
use crate::effects::EffectPass;
use crate::output::OutputSink;
use crate::postprocess::MaskPostProcessor;
use crate::segmentation::{MaskSource, SegmentationClient, Sleep, ThreadSleep};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};

/// How often averaged stage timings are logged
const STATS_INTERVAL: u64 = 30;

/// Time spent in each stage of one frame
#[derive(Debug, Default, Clone, Copy)]
pub struct StageTimings {
    pub capture: Duration,
    pub background: Duration,
    pub segment: Duration,
    pub composite: Duration,
    pub output: Duration,
}

impl StageTimings {
    fn total(&self) -> Duration {
        self.capture + self.background + self.segment + self.composite + self.output
    }
}

#[derive(Debug, Default)]
struct FrameStats {
    frames: u64,
    totals: StageTimings,
}

impl FrameStats {
    fn record(&mut self, timings: &StageTimings) {
        self.frames += 1;
        self.totals.capture += timings.capture;
        self.totals.background += timings.background;
        self.totals.segment += timings.segment;
        self.totals.composite += timings.composite;
        self.totals.output += timings.output;
    }

    fn avg_ms(&self, total: Duration) -> f64 {
        total.as_secs_f64() * 1000.0 / self.frames.max(1) as f64
    }

    fn log(&self) {
        let total_ms = self.avg_ms(self.totals.total());
        tracing::info!(
            "Frame {}: capture={:.1}ms, background={:.1}ms, segment={:.1}ms, composite={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}",
            self.frames,
            self.avg_ms(self.totals.capture),
            self.avg_ms(self.totals.background),
            self.avg_ms(self.totals.segment),
            self.avg_ms(self.totals.composite),
            self.avg_ms(self.totals.output),
            total_ms,
            1000.0 / total_ms.max(f64::EPSILON)
        );
    }
}

/// The per-frame loop: capture, background, mask, effect, composite, emit
pub struct Pipeline<C, B, M, O, Z = ThreadSleep> {
    capture: C,
    background: B,
    segmentation: SegmentationClient<M, Z>,
    postprocess: MaskPostProcessor,
    effect: EffectPass,
    output: O,
    downscale_mask: bool,
    stats: FrameStats,
}

impl<C, B, M, O, Z> Pipeline<C, B, M, O, Z>
where
    C: CaptureSource,
    B: BackgroundSource,
    M: MaskSource,
    O: OutputSink,
    Z: Sleep,
{
    pub fn new(
        capture: C,
        background: B,
        segmentation: SegmentationClient<M, Z>,
        postprocess: MaskPostProcessor,
        effect: EffectPass,
        output: O,
        downscale_mask: bool,
    ) -> Self {
        Self {
            capture,
            background,
            segmentation,
            postprocess,
            effect,
            output,
            downscale_mask,
            stats: FrameStats::default(),
        }
    }

    /// Process exactly one frame, start to finish
    pub fn tick(&mut self) -> Result<StageTimings> {
        let mut timings = StageTimings::default();

        let start = Instant::now();
        let frame = self
            .capture
            .capture_frame()
            .context("Failed to capture frame")?;
        timings.capture = start.elapsed();

        let start = Instant::now();
        let (width, height) = frame.dimensions();
        let background = self
            .background
            .background(width, height)
            .context("Failed to get background frame")?;
        timings.background = start.elapsed();

        let start = Instant::now();
        let mask = self
            .segmentation
            .get_mask(&frame, self.downscale_mask)
            .context("Failed to segment frame")?;
        let alpha = self.postprocess.refine(&mask);
        timings.segment = start.elapsed();

        let start = Instant::now();
        let subject = self.effect.apply(frame);
        let composited =
            composite(subject, &alpha, &background).context("Failed to composite frame")?;
        timings.composite = start.elapsed();

        let start = Instant::now();
        let outgoing = composited.into_order(self.output.channel_order());
        self.output
            .write_frame(&outgoing)
            .context("Failed to write frame")?;
        timings.output = start.elapsed();

        Ok(timings)
    }

    /// Run until an error occurs; there is no other way out
    pub fn run(&mut self, target_fps: u32) -> Result<()> {
        let frame_duration = Duration::from_secs_f32(1.0 / target_fps.max(1) as f32);

        tracing::info!(
            "Starting main pipeline loop (effect={:?}, downscale_mask={})",
            self.effect.kind(),
            self.downscale_mask
        );
        tracing::info!("Press Ctrl+C to stop");

        loop {
            let loop_start = Instant::now();

            let timings = self.tick()?;
            self.stats.record(&timings);
            if self.stats.frames % STATS_INTERVAL == 0 {
                self.stats.log();
            }

            // Frame rate limiting
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::BackgroundError;
    use crate::effects::EffectKind;
    use crate::frame::{ChannelOrder, Frame, Mask};
    use crate::segmentation::types::SegmentationError;
    use crate::segmentation::RetryPolicy;
    use image::Luma;
    use std::cell::RefCell;
    use std::rc::Rc;

    const A: [u8; 3] = [220, 40, 90];
    const B: [u8; 3] = [15, 180, 250];
    const WIDTH: u32 = 64;
    const HEIGHT: u32 = 48;

    struct UniformCamera(ChannelOrder);

    impl CaptureSource for UniformCamera {
        fn capture_frame(&mut self) -> Result<Frame> {
            Ok(Frame::uniform(WIDTH, HEIGHT, A, self.0))
        }
    }

    struct UniformBackground;

    impl BackgroundSource for UniformBackground {
        fn background(&mut self, width: u32, height: u32) -> Result<Frame, BackgroundError> {
            Ok(Frame::uniform(width, height, B, ChannelOrder::Rgb))
        }
    }

    /// Foreground on the left half, background on the right
    struct SplitSegmenter {
        failures: u32,
    }

    impl MaskSource for SplitSegmenter {
        fn request_mask(&mut self, frame: &Frame) -> Result<Mask, SegmentationError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(SegmentationError::Transient("warming up".into()));
            }
            let (w, h) = frame.dimensions();
            Ok(Mask::from_fn(w, h, |x, _| {
                Luma([if x < w / 2 { 255 } else { 0 }])
            }))
        }
    }

    #[derive(Default)]
    struct NoSleep(Rc<RefCell<u32>>);

    impl Sleep for NoSleep {
        fn sleep(&mut self, _duration: Duration) {
            *self.0.borrow_mut() += 1;
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Rc<RefCell<Vec<Frame>>>);

    impl OutputSink for RecordingSink {
        fn write_frame(&mut self, frame: &Frame) -> Result<()> {
            self.0.borrow_mut().push(frame.clone());
            Ok(())
        }
    }

    fn pipeline(
        camera_order: ChannelOrder,
        postprocess: MaskPostProcessor,
        effect: EffectKind,
        failures: u32,
    ) -> (
        Pipeline<UniformCamera, UniformBackground, SplitSegmenter, RecordingSink, NoSleep>,
        RecordingSink,
        Rc<RefCell<u32>>,
    ) {
        let sink = RecordingSink::default();
        let sleeps = Rc::new(RefCell::new(0));
        let segmentation = SegmentationClient::with_sleeper(
            SplitSegmenter { failures },
            RetryPolicy::default(),
            NoSleep(Rc::clone(&sleeps)),
        );
        let pipeline = Pipeline::new(
            UniformCamera(camera_order),
            UniformBackground,
            segmentation,
            postprocess,
            EffectPass::seeded(effect, 0),
            sink.clone(),
            false,
        );
        (pipeline, sink, sleeps)
    }

    #[test]
    fn left_half_subject_right_half_background() {
        let (mut pipeline, sink, _) = pipeline(
            ChannelOrder::Bgr,
            MaskPostProcessor::new(1, 1),
            EffectKind::None,
            0,
        );
        pipeline.tick().unwrap();

        let frames = sink.0.borrow();
        let out = &frames[0];
        assert_eq!(out.dimensions(), (WIDTH, HEIGHT));
        assert_eq!(out.order(), ChannelOrder::Rgb);
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let expected = if x < WIDTH / 2 { A } else { B };
                assert_eq!(out.rgb_at(x, y), expected, "pixel ({x},{y})");
                assert_eq!(out.pixels().get_pixel(x, y).0, expected);
            }
        }
    }

    #[test]
    fn refined_edges_only_blend_near_the_boundary() {
        let (mut pipeline, sink, _) = pipeline(
            ChannelOrder::Rgb,
            MaskPostProcessor::default(),
            EffectKind::None,
            0,
        );
        pipeline.tick().unwrap();

        let frames = sink.0.borrow();
        let out = &frames[0];
        assert_eq!(out.rgb_at(2, 20), A);
        assert_eq!(out.rgb_at(WIDTH - 3, 20), B);
    }

    #[test]
    fn waits_out_a_warming_service() {
        let (mut pipeline, sink, sleeps) = pipeline(
            ChannelOrder::Rgb,
            MaskPostProcessor::new(1, 1),
            EffectKind::None,
            2,
        );
        pipeline.tick().unwrap();
        assert_eq!(*sleeps.borrow(), 2);
        assert_eq!(sink.0.borrow().len(), 1);
    }

    #[test]
    fn hologram_keeps_background_untouched() {
        let (mut pipeline, sink, _) = pipeline(
            ChannelOrder::Rgb,
            MaskPostProcessor::new(1, 1),
            EffectKind::Hologram,
            0,
        );
        pipeline.tick().unwrap();

        let frames = sink.0.borrow();
        let out = &frames[0];
        assert_eq!(out.dimensions(), (WIDTH, HEIGHT));
        assert_eq!(out.rgb_at(WIDTH - 1, 10), B);
        assert_ne!(out.rgb_at(10, 10), A);
    }

    #[test]
    fn each_tick_emits_one_frame() {
        let (mut pipeline, sink, _) = pipeline(
            ChannelOrder::Rgb,
            MaskPostProcessor::default(),
            EffectKind::None,
            0,
        );
        for _ in 0..3 {
            pipeline.tick().unwrap();
        }
        assert_eq!(sink.0.borrow().len(), 3);
    }

    #[test]
    fn stats_average_per_frame() {
        let mut stats = FrameStats::default();
        let timings = StageTimings {
            capture: Duration::from_millis(4),
            ..StageTimings::default()
        };
        stats.record(&timings);
        stats.record(&timings);
        assert_eq!(stats.frames, 2);
        assert!((stats.avg_ms(stats.totals.capture) - 4.0).abs() < 1e-9);
    }
}
