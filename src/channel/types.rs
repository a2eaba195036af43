// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the frame channel

use serde::{Deserialize, Serialize};

use crate::constants::{COLOR_BYTES_PER_PIXEL, DEPTH_BYTES_PER_PIXEL, pixel_count};
use crate::depth::GradientConfig;

/// The two streams carried by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Colorized depth (RGBA)
    Depth,
    /// Camera image (RGB)
    Color,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [StreamKind::Depth, StreamKind::Color];

    /// Bytes per pixel of the frames published on this stream
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            StreamKind::Depth => DEPTH_BYTES_PER_PIXEL,
            StreamKind::Color => COLOR_BYTES_PER_PIXEL,
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            StreamKind::Depth => "depth",
            StreamKind::Color => "color",
        })
    }
}

/// When the consumer should be woken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RedrawPolicy {
    /// Wake as soon as either stream has a new frame (default)
    ///
    /// The streams run at different rates, so waiting for both would stall
    /// the faster one.
    #[default]
    AnyStream,
    /// Wake only once both streams have a new frame
    BothStreams,
}

impl RedrawPolicy {
    /// Whether the consumer should wake for the given flags
    pub fn should_wake(self, ready: ReadyStreams) -> bool {
        match self {
            RedrawPolicy::AnyStream => ready.any(),
            RedrawPolicy::BothStreams => ready.both(),
        }
    }
}

/// Geometry and behaviour of a frame channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub width: u32,
    pub height: u32,
    pub redraw_policy: RedrawPolicy,
    pub gradient: GradientConfig,
}

impl ChannelConfig {
    pub fn pixel_count(&self) -> usize {
        pixel_count(self.width, self.height)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            width: crate::constants::FRAME_WIDTH,
            height: crate::constants::FRAME_HEIGHT,
            redraw_policy: RedrawPolicy::default(),
            gradient: GradientConfig::default(),
        }
    }
}

/// One physical frame buffer
///
/// Allocated once with the channel and reused for its whole lifetime.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Opaque capture timestamp from the producer, forwarded unchanged
    pub timestamp: u32,
    /// Per-stream publish counter; 0 means nothing was ever published here
    pub sequence: u64,
    /// Interleaved 8-bit channels (RGBA for depth, RGB for color)
    pub pixels: Box<[u8]>,
}

impl Frame {
    pub(crate) fn blank(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        Self {
            width,
            height,
            timestamp: 0,
            sequence: 0,
            pixels: vec![0u8; pixel_count(width, height) * bytes_per_pixel].into_boxed_slice(),
        }
    }

    /// Bytes per pixel of this frame
    pub fn bytes_per_pixel(&self) -> usize {
        self.pixels.len() / pixel_count(self.width, self.height).max(1)
    }

    /// Whether the buffer has ever carried a published frame
    pub fn is_published(&self) -> bool {
        self.sequence != 0
    }

    /// Pixel at (x, y), or `None` outside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.bytes_per_pixel();
        let idx = (y as usize * self.width as usize + x as usize) * bpp;
        self.pixels.get(idx..idx + bpp)
    }
}

/// Which streams have a frame the consumer has not claimed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadyStreams {
    pub depth: bool,
    pub color: bool,
}

impl ReadyStreams {
    pub fn any(&self) -> bool {
        self.depth || self.color
    }

    pub fn both(&self) -> bool {
        self.depth && self.color
    }

    pub fn get(&self, stream: StreamKind) -> bool {
        match stream {
            StreamKind::Depth => self.depth,
            StreamKind::Color => self.color,
        }
    }
}

/// What happened to a published frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The frame is the new ready frame of its stream
    Published,
    /// The channel is shut down; the frame was discarded
    Dropped,
}

/// Per-stream counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    /// Frames that became ready
    pub published: u64,
    /// Ready frames replaced before the consumer claimed them
    pub overwritten: u64,
    /// Claims performed by the consumer
    pub claimed: u64,
    /// Publishes discarded after shutdown
    pub dropped: u64,
}

/// Counters for both streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStats {
    pub depth: StreamStats,
    pub color: StreamStats,
}

impl ChannelStats {
    pub fn stream(&self, stream: StreamKind) -> &StreamStats {
        match stream {
            StreamKind::Depth => &self.depth,
            StreamKind::Color => &self.color,
        }
    }
}
