// SPDX-License-Identifier: GPL-3.0-only

//! Consumer idle loop
//!
//! Blocks until the channel has something new, claims the freshest frames,
//! hands both displayed buffers to a [`FrameSink`] and keeps an approximate
//! frame rate. The channel mutex is released before the sink runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::backends::LoopAction;
use crate::channel::{DisplayFrames, FrameConsumer, StreamKind};
use crate::constants::CONSUMER_WAIT_TIMEOUT;
use crate::errors::AppResult;

/// Anything that can show or otherwise consume a pair of displayed frames
pub trait FrameSink {
    /// Called once per render pass with the displayed depth and color frames
    fn present(
        &mut self,
        frames: &DisplayFrames<'_>,
        report: &PassReport,
    ) -> AppResult<LoopAction>;
}

/// What a render pass saw on one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamUpdate {
    /// A new frame was claimed
    Fresh {
        sequence: u64,
        /// Frames published since the previous claim that were never seen
        skipped: u64,
    },
    /// No new frame; the previous one is shown again
    Stale,
}

impl StreamUpdate {
    pub fn is_fresh(&self) -> bool {
        matches!(self, StreamUpdate::Fresh { .. })
    }
}

/// Summary of one render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassReport {
    /// 1-based render pass counter
    pub pass: u64,
    pub depth: StreamUpdate,
    pub color: StreamUpdate,
    /// Latest frame rate estimate, once one interval has elapsed
    pub fps: Option<f64>,
}

impl PassReport {
    pub fn stream(&self, stream: StreamKind) -> StreamUpdate {
        match stream {
            StreamKind::Depth => self.depth,
            StreamKind::Color => self.color,
        }
    }
}

/// Result of a single [`ConsumerLoop::poll`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassOutcome {
    /// Woke without anything to show (spurious wake or timeout)
    Idle,
    /// A render pass ran
    Presented(PassReport),
    /// The sink asked to stop
    Stopped(PassReport),
    /// The channel is shut down
    Closed,
}

/// Totals over a consumer run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConsumerSummary {
    pub passes: u64,
    pub depth_frames: u64,
    pub color_frames: u64,
    pub depth_skipped: u64,
    pub color_skipped: u64,
    pub fps: Option<f64>,
}

/// Rolling frame rate over fixed batches of render passes
#[derive(Debug, Clone)]
pub struct FpsCounter {
    interval: u32,
    frames: u32,
    window_start: Instant,
    fps: Option<f64>,
}

impl FpsCounter {
    pub fn new(interval: u32) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: u32, start: Instant) -> Self {
        Self {
            interval: interval.max(1),
            frames: 0,
            window_start: start,
            fps: None,
        }
    }

    /// Count one render pass
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    /// Count one render pass at `now`; returns a new estimate every
    /// `interval` passes
    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        if self.frames < self.interval {
            return None;
        }
        let elapsed = now.duration_since(self.window_start).as_secs_f64();
        self.frames = 0;
        self.window_start = now;
        if elapsed <= 0.0 {
            return None;
        }
        let fps = self.interval as f64 / elapsed;
        self.fps = Some(fps);
        Some(fps)
    }

    /// Most recent estimate
    pub fn fps(&self) -> Option<f64> {
        self.fps
    }
}

/// Drives a [`FrameConsumer`] and a [`FrameSink`]
pub struct ConsumerLoop {
    consumer: FrameConsumer,
    fps: FpsCounter,
    last_sequence: [u64; 2],
    summary: ConsumerSummary,
}

impl ConsumerLoop {
    pub fn new(consumer: FrameConsumer, fps_interval: u32) -> Self {
        Self {
            consumer,
            fps: FpsCounter::new(fps_interval),
            last_sequence: [0; 2],
            summary: ConsumerSummary::default(),
        }
    }

    /// Totals so far
    pub fn summary(&self) -> ConsumerSummary {
        ConsumerSummary {
            fps: self.fps.fps(),
            ..self.summary
        }
    }

    /// One idle step
    ///
    /// With `timeout == None` blocks until the channel wakes the consumer;
    /// otherwise returns [`PassOutcome::Idle`] once the timeout elapses.
    pub fn poll(
        &mut self,
        sink: &mut dyn FrameSink,
        timeout: Option<Duration>,
    ) -> AppResult<PassOutcome> {
        let ready = match timeout {
            Some(t) => self.consumer.wait_for_frames_timeout(t),
            None => self.consumer.wait_for_frames(),
        };
        let Some(ready) = ready else {
            return Ok(PassOutcome::Closed);
        };
        if !ready.any() {
            return Ok(PassOutcome::Idle);
        }

        let frames = self.consumer.acquire_frames();
        let depth = observe(
            &mut self.last_sequence[0],
            frames.depth.fresh,
            frames.depth.sequence,
        );
        let color = observe(
            &mut self.last_sequence[1],
            frames.color.fresh,
            frames.color.sequence,
        );
        // Both claims can come up empty if the flags were consumed between
        // the wait and the claim; treat it like a spurious wake.
        if !depth.is_fresh() && !color.is_fresh() {
            return Ok(PassOutcome::Idle);
        }

        record(&mut self.summary, depth, color);
        self.summary.passes += 1;

        let fps = self.fps.tick();
        if let Some(fps) = fps {
            info!(fps = %format_args!("{:.1}", fps), "Render rate");
        }
        let report = PassReport {
            pass: self.summary.passes,
            depth,
            color,
            fps: self.fps.fps(),
        };

        match sink.present(&frames, &report)? {
            LoopAction::Continue => Ok(PassOutcome::Presented(report)),
            LoopAction::Stop => Ok(PassOutcome::Stopped(report)),
        }
    }

    /// Poll until `stop` is set, the sink stops or the channel closes
    pub fn run(
        &mut self,
        sink: &mut dyn FrameSink,
        stop: &AtomicBool,
    ) -> AppResult<ConsumerSummary> {
        debug!("Consumer loop started");
        while !stop.load(Ordering::SeqCst) {
            match self.poll(sink, Some(CONSUMER_WAIT_TIMEOUT))? {
                PassOutcome::Idle | PassOutcome::Presented(_) => {}
                PassOutcome::Stopped(_) => {
                    debug!("Sink requested stop");
                    break;
                }
                PassOutcome::Closed => {
                    debug!("Channel closed");
                    break;
                }
            }
        }
        let summary = self.summary();
        info!(
            passes = summary.passes,
            depth_skipped = summary.depth_skipped,
            color_skipped = summary.color_skipped,
            "Consumer loop finished"
        );
        Ok(summary)
    }
}

fn observe(last: &mut u64, fresh: bool, sequence: u64) -> StreamUpdate {
    if !fresh {
        return StreamUpdate::Stale;
    }
    let skipped = sequence.saturating_sub(*last + 1);
    *last = sequence;
    StreamUpdate::Fresh { sequence, skipped }
}

fn record(summary: &mut ConsumerSummary, depth: StreamUpdate, color: StreamUpdate) {
    if let StreamUpdate::Fresh { skipped, .. } = depth {
        summary.depth_frames += 1;
        summary.depth_skipped += skipped;
    }
    if let StreamUpdate::Fresh { skipped, .. } = color {
        summary.color_frames += 1;
        summary.color_skipped += skipped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelConfig, FrameChannel};

    struct Recorder {
        reports: Vec<PassReport>,
        stop_after: usize,
    }

    impl FrameSink for Recorder {
        fn present(
            &mut self,
            _frames: &DisplayFrames<'_>,
            report: &PassReport,
        ) -> AppResult<LoopAction> {
            self.reports.push(*report);
            if self.reports.len() >= self.stop_after {
                Ok(LoopAction::Stop)
            } else {
                Ok(LoopAction::Continue)
            }
        }
    }

    fn tiny() -> ChannelConfig {
        ChannelConfig {
            width: 2,
            height: 2,
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn test_fps_counter_reports_every_interval() {
        let start = Instant::now();
        let mut fps = FpsCounter::starting_at(30, start);
        for i in 1..30 {
            assert_eq!(fps.tick_at(start + Duration::from_millis(i * 10)), None);
        }
        let estimate = fps.tick_at(start + Duration::from_secs(1)).unwrap();
        assert!((estimate - 30.0).abs() < 1e-9);
        assert_eq!(fps.fps(), Some(estimate));
    }

    #[test]
    fn test_poll_idle_on_timeout() {
        let (_channel, _lease, consumer) = FrameChannel::new(&tiny());
        let mut consumer_loop = ConsumerLoop::new(consumer, 30);
        let mut sink = Recorder {
            reports: Vec::new(),
            stop_after: 1,
        };
        let outcome = consumer_loop
            .poll(&mut sink, Some(Duration::from_millis(5)))
            .unwrap();
        assert_eq!(outcome, PassOutcome::Idle);
        assert!(sink.reports.is_empty());
    }

    #[test]
    fn test_stale_stream_reported() {
        let (channel, _lease, consumer) = FrameChannel::new(&tiny());
        let mut consumer_loop = ConsumerLoop::new(consumer, 30);
        let mut sink = Recorder {
            reports: Vec::new(),
            stop_after: 10,
        };

        channel.publish_depth(&[400; 4], 1).unwrap();
        let outcome = consumer_loop.poll(&mut sink, None).unwrap();
        let PassOutcome::Presented(report) = outcome else {
            panic!("expected a render pass, got {:?}", outcome);
        };
        assert_eq!(
            report.depth,
            StreamUpdate::Fresh {
                sequence: 1,
                skipped: 0
            }
        );
        assert_eq!(report.color, StreamUpdate::Stale);
    }

    #[test]
    fn test_skipped_frames_counted() {
        let (channel, _lease, consumer) = FrameChannel::new(&tiny());
        let mut consumer_loop = ConsumerLoop::new(consumer, 30);
        let mut sink = Recorder {
            reports: Vec::new(),
            stop_after: 10,
        };

        for ts in 0..5 {
            channel.publish_depth(&[400; 4], ts).unwrap();
        }
        consumer_loop.poll(&mut sink, None).unwrap();
        assert_eq!(
            sink.reports[0].depth,
            StreamUpdate::Fresh {
                sequence: 5,
                skipped: 4
            }
        );
        assert_eq!(consumer_loop.summary().depth_skipped, 4);
    }

    #[test]
    fn test_run_stops_on_close() {
        let (channel, _lease, consumer) = FrameChannel::new(&tiny());
        let mut consumer_loop = ConsumerLoop::new(consumer, 30);
        let mut sink = Recorder {
            reports: Vec::new(),
            stop_after: 100,
        };
        channel.publish_depth(&[400; 4], 1).unwrap();
        channel.shutdown();

        let stop = AtomicBool::new(false);
        let summary = consumer_loop.run(&mut sink, &stop).unwrap();
        // Closing wins over pending frames
        assert_eq!(summary.passes, 0);
    }

    #[test]
    fn test_run_stops_when_sink_asks() {
        let (channel, lease, consumer) = FrameChannel::new(&tiny());
        let mut consumer_loop = ConsumerLoop::new(consumer, 30);
        let mut sink = Recorder {
            reports: Vec::new(),
            stop_after: 1,
        };
        channel.publish_color(lease, 9).unwrap();

        let stop = AtomicBool::new(false);
        let summary = consumer_loop.run(&mut sink, &stop).unwrap();
        assert_eq!(summary.passes, 1);
        assert_eq!(summary.color_frames, 1);
        assert_eq!(summary.depth_frames, 0);
    }
}
