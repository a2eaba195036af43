// SPDX-License-Identifier: GPL-3.0-only

//! Viewer session
//!
//! Owns the frame channel, the producer thread and the consumer loop, and
//! tears them down in a fixed order: the producer is stopped and joined
//! before the channel is closed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::backends::{CaptureBridge, CaptureLoopController, SensorSource};
use crate::channel::{ChannelStats, FrameChannel};
use crate::config::Config;
use crate::constants::PRODUCER_POLL_INTERVAL;
use crate::consumer::{ConsumerLoop, ConsumerSummary, FrameSink};
use crate::errors::AppResult;

/// Name of the producer thread in logs
const PRODUCER_NAME: &str = "depthcam-producer";

/// A running producer plus the consumer side of its channel
pub struct Session {
    channel: Arc<FrameChannel>,
    consumer: ConsumerLoop,
    producer: Option<CaptureLoopController>,
    stop: Arc<AtomicBool>,
}

impl Session {
    /// Create the channel and start capturing from `source`
    ///
    /// `stop` is shared by both loops; setting it ends the consumer loop and
    /// the producer thread at their next iteration.
    pub fn start<S>(config: &Config, source: S, stop: Arc<AtomicBool>) -> AppResult<Self>
    where
        S: SensorSource + 'static,
    {
        config.validate()?;
        let (channel, lease, consumer) = FrameChannel::new(&config.channel_config());

        let init_channel = Arc::clone(&channel);
        let loop_channel = Arc::clone(&channel);
        let producer = CaptureLoopController::start_with_init(
            PRODUCER_NAME,
            Arc::clone(&stop),
            move || {
                CaptureBridge::new(source, Arc::clone(&init_channel), lease)
                    .inspect_err(|_| init_channel.shutdown())
            },
            move |bridge| {
                let result = bridge.process_events(PRODUCER_POLL_INTERVAL);
                if result.is_err() {
                    // Wake the consumer so it does not wait on a dead producer
                    loop_channel.shutdown();
                }
                result
            },
        );

        info!(
            width = config.width,
            height = config.height,
            policy = ?config.redraw_policy,
            "Session started"
        );
        Ok(Self {
            channel,
            consumer: ConsumerLoop::new(consumer, config.fps_report_interval),
            producer: Some(producer),
            stop,
        })
    }

    pub fn channel(&self) -> &Arc<FrameChannel> {
        &self.channel
    }

    /// The flag shared by both loops, for signal handlers and timers
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Direct access for callers that drive passes themselves
    pub fn consumer_loop(&mut self) -> &mut ConsumerLoop {
        &mut self.consumer
    }

    /// Run the consumer loop on the calling thread until stopped
    pub fn run_consumer(&mut self, sink: &mut dyn FrameSink) -> AppResult<ConsumerSummary> {
        self.consumer.run(sink, &self.stop)
    }

    /// Stop the producer, close the channel and return the final counters
    ///
    /// Reports the error that ended the producer, if any. Only the first
    /// call does any work.
    pub fn shutdown(&mut self) -> AppResult<ChannelStats> {
        let Some(mut producer) = self.producer.take() else {
            return Ok(self.channel.stats());
        };

        self.stop.store(true, Ordering::SeqCst);
        let result = producer.stop();
        self.channel.shutdown();

        let stats = self.channel.stats();
        info!(
            depth_published = stats.depth.published,
            color_published = stats.color.published,
            depth_overwritten = stats.depth.overwritten,
            color_overwritten = stats.color.overwritten,
            "Session stopped"
        );
        result.map(|()| stats)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Session ended with error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{SyntheticSensor, SyntheticSettings};

    fn small_config() -> Config {
        Config {
            width: 32,
            height: 24,
            depth_fps: 120,
            color_fps: 60,
            ..Config::default()
        }
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let config = small_config();
        let sensor = SyntheticSensor::new(config.synthetic_settings()).unwrap();
        let mut session =
            Session::start(&config, sensor, Arc::new(AtomicBool::new(false))).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(50));
        let first = session.shutdown().unwrap();
        assert!(session.channel().is_closed());
        let second = session.shutdown().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bad_sensor_geometry_is_reported() {
        let config = small_config();
        let sensor = SyntheticSensor::new(SyntheticSettings {
            width: 16,
            ..config.synthetic_settings()
        })
        .unwrap();
        let mut session =
            Session::start(&config, sensor, Arc::new(AtomicBool::new(false))).unwrap();

        assert!(session.shutdown().is_err());
    }
}
