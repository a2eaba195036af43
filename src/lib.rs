// SPDX-License-Identifier: GPL-3.0-only

//! depthcam-view - a depth camera viewer built around a triple-buffered
//! frame handoff
//!
//! A producer thread publishes depth and color frames at their own rates;
//! a consumer waits until something is new, then renders the freshest
//! complete frames without ever blocking the producer.
//!
//! # Architecture
//!
//! - [`channel`]: [`channel::TripleSlotRing`] and [`channel::FrameChannel`],
//!   the lock-protected handoff between producer and consumer
//! - [`depth`]: the depth to RGBA colorizer
//! - [`consumer`]: the consumer idle loop and frame rate counter
//! - [`backends`]: sensor sources and the producer thread
//! - [`session`]: wiring and shutdown ordering
//! - [`terminal`]: the ratatui viewer
//! - [`config`]: user configuration handling
//!
//! # Example
//!
//! ```
//! use depthcam_view::channel::{ChannelConfig, FrameChannel, StreamKind};
//!
//! let config = ChannelConfig { width: 2, height: 1, ..ChannelConfig::default() };
//! let (channel, _lease, mut consumer) = FrameChannel::new(&config);
//!
//! channel.publish_depth(&[500, 0], 7).unwrap();
//! let ready = consumer.wait_for_frames().unwrap();
//! assert!(ready.depth);
//!
//! let depth = consumer.acquire_latest(StreamKind::Depth);
//! assert_eq!(depth.pixel(0, 0), Some(&[255, 222, 222, 128][..]));
//! assert_eq!(depth.pixel(1, 0).map(|px| px[3]), Some(0));
//! ```

pub mod backends;
pub mod channel;
pub mod config;
pub mod constants;
pub mod consumer;
pub mod depth;
pub mod errors;
pub mod session;
pub mod terminal;

// Re-export commonly used types
pub use config::{Config, ViewMode};
pub use errors::{AppError, AppResult};
