// SPDX-License-Identifier: GPL-3.0-only

//! Producer side of the frame handoff
//!
//! Turns sensor events into channel publishes. Depth frames are copied out
//! of the sensor into a scratch buffer and colorized by the channel; color
//! frames are written by the sensor straight into the leased channel buffer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use super::frame_loop::LoopAction;
use super::sensor::{SensorEvent, SensorSource};
use crate::channel::{ColorLease, FrameChannel, PublishOutcome};
use crate::errors::{AppError, AppResult};

/// Bridges a [`SensorSource`] to a [`FrameChannel`]
pub struct CaptureBridge<S: SensorSource> {
    source: S,
    channel: Arc<FrameChannel>,
    /// The color buffer the sensor may fill next
    lease: Option<ColorLease>,
    /// Raw depth samples of the last depth event
    raw_depth: Vec<u16>,
    depth_frames: u64,
    color_frames: u64,
}

impl<S: SensorSource> CaptureBridge<S> {
    /// Create a bridge; the sensor geometry must match the channel's
    pub fn new(source: S, channel: Arc<FrameChannel>, lease: ColorLease) -> AppResult<Self> {
        let config = channel.config();
        let (width, height) = source.resolution();
        if (width, height) != (config.width, config.height) {
            return Err(AppError::Sensor(format!(
                "{} delivers {}x{} frames but the channel expects {}x{}",
                source.name(),
                width,
                height,
                config.width,
                config.height
            )));
        }

        info!(sensor = %source.name(), "Capture bridge ready");
        let raw_depth = vec![0u16; config.pixel_count()];
        Ok(Self {
            source,
            channel,
            lease: Some(lease),
            raw_depth,
            depth_frames: 0,
            color_frames: 0,
        })
    }

    /// Frames published so far as (depth, color)
    pub fn frames_published(&self) -> (u64, u64) {
        (self.depth_frames, self.color_frames)
    }

    /// Handle at most one sensor event, waiting up to `max_wait` for it
    ///
    /// Returns `Stop` once the channel refuses frames because it was closed.
    /// A protocol violation closes the channel and is returned as an error.
    pub fn process_events(&mut self, max_wait: Duration) -> AppResult<LoopAction> {
        match self.source.next_event(max_wait)? {
            SensorEvent::Idle => Ok(LoopAction::Continue),
            SensorEvent::Depth { timestamp } => {
                self.source.read_depth(&mut self.raw_depth);
                let outcome = self.channel.publish_depth(&self.raw_depth, timestamp)?;
                self.depth_frames += 1;
                Ok(self.after_publish(outcome))
            }
            SensorEvent::Color { timestamp } => {
                let lease = self.lease.take().ok_or_else(|| {
                    AppError::Other("color lease lost after a failed publish".to_string())
                })?;
                {
                    let mut frame = self.channel.color_target(&lease);
                    self.source.read_color(&mut frame.pixels);
                }
                match self.channel.publish_color(lease, timestamp) {
                    Ok((next, outcome)) => {
                        self.lease = Some(next);
                        self.color_frames += 1;
                        Ok(self.after_publish(outcome))
                    }
                    Err(e) => {
                        error!(error = %e, "Capture buffer ownership violated, closing channel");
                        self.channel.shutdown();
                        Err(e.into())
                    }
                }
            }
        }
    }

    fn after_publish(&self, outcome: PublishOutcome) -> LoopAction {
        match outcome {
            PublishOutcome::Published => LoopAction::Continue,
            PublishOutcome::Dropped => {
                debug!("Channel closed, stopping capture");
                LoopAction::Stop
            }
        }
    }
}
