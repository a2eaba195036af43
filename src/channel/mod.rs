// SPDX-License-Identifier: GPL-3.0-only

//! Triple-buffered frame channel
//!
//! Hands depth and color frames from one producer thread to one consumer
//! thread. The producer never waits for the consumer; the consumer only ever
//! sees complete frames and may skip frames it was too slow to claim.

mod frame_channel;
mod ring;
mod types;

pub use frame_channel::{
    Acquired, ColorLease, DisplayFrames, FrameChannel, FrameConsumer, FrameGuard,
};
pub use ring::{RingError, RingPolicy, Rotation, SlotId, SlotRole, TripleSlotRing};
pub use types::{
    ChannelConfig, ChannelStats, Frame, PublishOutcome, ReadyStreams, RedrawPolicy, StreamKind,
    StreamStats,
};
