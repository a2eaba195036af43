// SPDX-License-Identifier: GPL-3.0-only

//! Single-producer, single-consumer frame handoff
//!
//! The channel owns three physical buffers per stream and one
//! [`TripleSlotRing`] per stream that assigns them roles. A single mutex
//! guards both rings, both "ready" flags and the closed flag; a condition
//! variable wakes the consumer on every publish.
//!
//! Each buffer also sits behind its own lock. The role protocol keeps those
//! locks uncontended: the producer only ever touches the depth `Ready` slot
//! and the color `Producing` slot, the consumer only the `Displaying` slots.
//!
//! # Example
//!
//! ```
//! use depthcam_view::channel::{ChannelConfig, FrameChannel};
//!
//! let config = ChannelConfig { width: 2, height: 1, ..ChannelConfig::default() };
//! let (channel, lease, mut consumer) = FrameChannel::new(&config);
//!
//! // Producer side
//! channel.publish_depth(&[500, 0], 1).unwrap();
//! channel.color_target(&lease).pixels.fill(200);
//! let (_next_lease, _) = channel.publish_color(lease, 2).unwrap();
//!
//! // Consumer side
//! let ready = consumer.wait_for_frames().unwrap();
//! assert!(ready.depth && ready.color);
//! let frames = consumer.acquire_frames();
//! assert_eq!(frames.color.pixels[0], 200);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, trace};

use super::ring::{RingError, RingPolicy, SlotId, SlotRole, TripleSlotRing};
use super::types::{
    ChannelConfig, ChannelStats, Frame, PublishOutcome, ReadyStreams, StreamKind, StreamStats,
};
use crate::depth::DepthColorizer;
use crate::errors::ChannelError;

/// Locked access to one physical frame buffer
pub type FrameGuard<'a> = MutexGuard<'a, Frame>;

/// Per-stream bookkeeping, only touched under the channel mutex
#[derive(Debug)]
struct StreamState {
    ring: TripleSlotRing,
    ready: bool,
    stats: StreamStats,
}

impl StreamState {
    fn new(policy: RingPolicy) -> Self {
        Self {
            ring: TripleSlotRing::new(policy),
            ready: false,
            stats: StreamStats::default(),
        }
    }

    /// Sequence number the next published frame will carry
    fn next_sequence(&self) -> u64 {
        self.stats.published + 1
    }

    fn mark_ready(&mut self) {
        if self.ready {
            self.stats.overwritten += 1;
        }
        self.ready = true;
        self.stats.published += 1;
    }

    /// Claim the ready frame if there is one; returns the displaying slot
    fn claim_if_ready(&mut self) -> (SlotId, bool) {
        if self.ready {
            self.ready = false;
            self.stats.claimed += 1;
            (self.ring.claim(), true)
        } else {
            (self.ring.slot(SlotRole::Displaying), false)
        }
    }
}

#[derive(Debug)]
struct ChannelState {
    depth: StreamState,
    color: StreamState,
    closed: bool,
}

impl ChannelState {
    fn ready(&self) -> ReadyStreams {
        ReadyStreams {
            depth: self.depth.ready,
            color: self.color.ready,
        }
    }

    fn stream(&self, stream: StreamKind) -> &StreamState {
        match stream {
            StreamKind::Depth => &self.depth,
            StreamKind::Color => &self.color,
        }
    }

    fn stream_mut(&mut self, stream: StreamKind) -> &mut StreamState {
        match stream {
            StreamKind::Depth => &mut self.depth,
            StreamKind::Color => &mut self.color,
        }
    }
}

/// Handle to the color buffer the capture subsystem may fill
///
/// There is exactly one lease per channel. It is handed out by
/// [`FrameChannel::new`], consumed by [`FrameChannel::publish_color`] and
/// replaced by the lease for the recycled buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct ColorLease {
    slot: SlotId,
}

impl ColorLease {
    /// Slot the lease grants write access to
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    #[cfg(test)]
    pub(crate) fn forge(slot: SlotId) -> Self {
        Self { slot }
    }
}

/// Triple-buffered depth and color handoff
pub struct FrameChannel {
    config: ChannelConfig,
    colorizer: DepthColorizer,
    state: Mutex<ChannelState>,
    frame_ready: Condvar,
    depth_slots: [Mutex<Frame>; 3],
    color_slots: [Mutex<Frame>; 3],
}

impl FrameChannel {
    /// Allocate all buffers and build the depth colorizer
    ///
    /// Returns the shared channel, the initial color lease for the capture
    /// subsystem and the single consumer handle.
    pub fn new(config: &ChannelConfig) -> (Arc<Self>, ColorLease, FrameConsumer) {
        let (w, h) = (config.width, config.height);
        let depth_bpp = StreamKind::Depth.bytes_per_pixel();
        let color_bpp = StreamKind::Color.bytes_per_pixel();

        let state = ChannelState {
            depth: StreamState::new(RingPolicy::Depth),
            color: StreamState::new(RingPolicy::Color),
            closed: false,
        };
        let lease = ColorLease {
            slot: state.color.ring.write_target(),
        };

        let channel = Arc::new(Self {
            config: config.clone(),
            colorizer: DepthColorizer::build(&config.gradient),
            state: Mutex::new(state),
            frame_ready: Condvar::new(),
            depth_slots: std::array::from_fn(|_| Mutex::new(Frame::blank(w, h, depth_bpp))),
            color_slots: std::array::from_fn(|_| Mutex::new(Frame::blank(w, h, color_bpp))),
        });

        info!(
            width = w,
            height = h,
            policy = ?config.redraw_policy,
            "Frame channel created"
        );

        let consumer = FrameConsumer {
            channel: Arc::clone(&channel),
        };
        (channel, lease, consumer)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn colorizer(&self) -> &DepthColorizer {
        &self.colorizer
    }

    /// Colorize a raw depth frame into the ready slot and wake the consumer
    ///
    /// The colorization runs under the channel mutex because it writes the
    /// shared `Ready` slot in place; its cost is fixed by the frame size.
    pub fn publish_depth(
        &self,
        raw: &[u16],
        timestamp: u32,
    ) -> Result<PublishOutcome, ChannelError> {
        let expected = self.config.pixel_count();
        if raw.len() != expected {
            return Err(ChannelError::FrameSize {
                stream: StreamKind::Depth,
                expected,
                actual: raw.len(),
            });
        }

        let mut state = self.state.lock();
        if state.closed {
            state.depth.stats.dropped += 1;
            trace!(timestamp, "Depth frame dropped, channel closed");
            return Ok(PublishOutcome::Dropped);
        }

        let target = state.depth.ring.write_target();
        {
            let mut frame = self.depth_slots[target.index()].lock();
            self.colorizer.colorize_frame(raw, &mut frame.pixels);
            frame.timestamp = timestamp;
            frame.sequence = state.depth.next_sequence();
        }
        state
            .depth
            .ring
            .publish(target)
            .map_err(|e| protocol_violation(StreamKind::Depth, e))?;
        state.depth.mark_ready();

        self.frame_ready.notify_one();
        Ok(PublishOutcome::Published)
    }

    /// Write access to the color buffer named by `lease`
    ///
    /// Taken without the channel mutex; the guard must be dropped before the
    /// lease can be handed back through [`FrameChannel::publish_color`].
    pub fn color_target<'a>(&'a self, lease: &'a ColorLease) -> FrameGuard<'a> {
        self.color_slots[lease.slot.index()].lock()
    }

    /// Mark the leased color buffer complete and receive the next lease
    ///
    /// The previous ready buffer, never claimed by the consumer, is recycled
    /// as the next capture target. A lease that does not name the current
    /// capture target is a protocol violation; the channel is left untouched.
    pub fn publish_color(
        &self,
        lease: ColorLease,
        timestamp: u32,
    ) -> Result<(ColorLease, PublishOutcome), ChannelError> {
        let mut state = self.state.lock();
        if state.closed {
            state.color.stats.dropped += 1;
            trace!(timestamp, "Color frame dropped, channel closed");
            return Ok((lease, PublishOutcome::Dropped));
        }

        let rotation = state
            .color
            .ring
            .publish(lease.slot)
            .map_err(|e| protocol_violation(StreamKind::Color, e))?;
        {
            let mut frame = self.color_slots[rotation.ready.index()].lock();
            frame.timestamp = timestamp;
            frame.sequence = state.color.next_sequence();
        }
        state.color.mark_ready();

        // Color publishes always recycle
        let next = rotation.recycled.unwrap_or(lease.slot);
        self.frame_ready.notify_one();
        Ok((ColorLease { slot: next }, PublishOutcome::Published))
    }

    /// Stop accepting frames and wake the consumer
    ///
    /// Call once the producer has stopped. Publishes arriving later are
    /// dropped; buffers stay valid until the last handle is gone.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        self.frame_ready.notify_all();
        info!("Frame channel closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Snapshot of the ready flags
    pub fn ready(&self) -> ReadyStreams {
        self.state.lock().ready()
    }

    /// Snapshot of the per-stream counters
    pub fn stats(&self) -> ChannelStats {
        let state = self.state.lock();
        ChannelStats {
            depth: state.depth.stats,
            color: state.color.stats,
        }
    }

    /// Role currently held by `slot` on `stream`
    pub fn role_of(&self, stream: StreamKind, slot: SlotId) -> SlotRole {
        self.state.lock().stream(stream).ring.role_of(slot)
    }

    /// Whether both role tables are still permutations of the three slots
    pub fn rings_consistent(&self) -> bool {
        let state = self.state.lock();
        state.depth.ring.is_bijection() && state.color.ring.is_bijection()
    }

    fn slot(&self, stream: StreamKind, slot: SlotId) -> FrameGuard<'_> {
        match stream {
            StreamKind::Depth => self.depth_slots[slot.index()].lock(),
            StreamKind::Color => self.color_slots[slot.index()].lock(),
        }
    }
}

impl std::fmt::Debug for FrameChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameChannel")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

fn protocol_violation(stream: StreamKind, err: RingError) -> ChannelError {
    let RingError::NotWriteTarget {
        completed,
        expected,
    } = err;
    ChannelError::ProtocolViolation {
        stream,
        completed,
        expected,
    }
}

/// A displayed frame held by the consumer
pub struct Acquired<'a> {
    pub stream: StreamKind,
    /// True when this call claimed a new frame, false when the previous
    /// displayed frame is handed out again
    pub fresh: bool,
    frame: FrameGuard<'a>,
}

impl std::ops::Deref for Acquired<'_> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.frame
    }
}

/// Both displayed frames, claimed under a single lock acquisition
pub struct DisplayFrames<'a> {
    pub depth: Acquired<'a>,
    pub color: Acquired<'a>,
}

impl DisplayFrames<'_> {
    pub fn get(&self, stream: StreamKind) -> &Acquired<'_> {
        match stream {
            StreamKind::Depth => &self.depth,
            StreamKind::Color => &self.color,
        }
    }

    /// Which streams were freshly claimed
    pub fn fresh(&self) -> ReadyStreams {
        ReadyStreams {
            depth: self.depth.fresh,
            color: self.color.fresh,
        }
    }
}

/// Consumer side of a [`FrameChannel`]
///
/// Acquired frames borrow the consumer mutably, so a displayed buffer must
/// be released before the next claim can rotate it back to the producer.
#[derive(Debug)]
pub struct FrameConsumer {
    channel: Arc<FrameChannel>,
}

impl FrameConsumer {
    pub fn channel(&self) -> &Arc<FrameChannel> {
        &self.channel
    }

    /// Block until the redraw policy is satisfied
    ///
    /// Flags are re-checked under the mutex after every wake. Returns `None`
    /// once the channel is closed.
    pub fn wait_for_frames(&self) -> Option<ReadyStreams> {
        let policy = self.channel.config.redraw_policy;
        let mut state = self.channel.state.lock();
        loop {
            if state.closed {
                return None;
            }
            let ready = state.ready();
            if policy.should_wake(ready) {
                return Some(ready);
            }
            self.channel.frame_ready.wait(&mut state);
        }
    }

    /// Like [`FrameConsumer::wait_for_frames`] but gives up after `timeout`
    ///
    /// On timeout returns an empty [`ReadyStreams`]. A timeout too large to
    /// form a deadline waits without one.
    pub fn wait_for_frames_timeout(&self, timeout: Duration) -> Option<ReadyStreams> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait_for_frames();
        };
        let policy = self.channel.config.redraw_policy;
        let mut state = self.channel.state.lock();
        loop {
            if state.closed {
                return None;
            }
            let ready = state.ready();
            if policy.should_wake(ready) {
                return Some(ready);
            }
            if self
                .channel
                .frame_ready
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return if state.closed {
                    None
                } else {
                    Some(ReadyStreams::default())
                };
            }
        }
    }

    /// Claim the latest frame of one stream
    ///
    /// If the stream has no new frame, the previously displayed buffer is
    /// returned unchanged with `fresh == false`.
    pub fn acquire_latest(&mut self, stream: StreamKind) -> Acquired<'_> {
        let channel = &*self.channel;
        let (slot, fresh) = channel.state.lock().stream_mut(stream).claim_if_ready();
        if fresh {
            debug!(stream = %stream, slot = %slot, "Claimed frame");
        }
        Acquired {
            stream,
            fresh,
            frame: channel.slot(stream, slot),
        }
    }

    /// Claim every ready stream and return both displayed buffers
    pub fn acquire_frames(&mut self) -> DisplayFrames<'_> {
        let channel = &*self.channel;
        let ((depth_slot, depth_fresh), (color_slot, color_fresh)) = {
            let mut state = channel.state.lock();
            (state.depth.claim_if_ready(), state.color.claim_if_ready())
        };

        DisplayFrames {
            depth: Acquired {
                stream: StreamKind::Depth,
                fresh: depth_fresh,
                frame: channel.slot(StreamKind::Depth, depth_slot),
            },
            color: Acquired {
                stream: StreamKind::Color,
                fresh: color_fresh,
                frame: channel.slot(StreamKind::Color, color_slot),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RedrawPolicy;
    use std::thread;

    fn small_config() -> ChannelConfig {
        ChannelConfig {
            width: 4,
            height: 2,
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn test_initial_lease_is_producing_slot() {
        let (channel, lease, _consumer) = FrameChannel::new(&small_config());
        assert_eq!(
            channel.role_of(StreamKind::Color, lease.slot()),
            SlotRole::Producing
        );
    }

    #[test]
    fn test_nothing_ready_initially() {
        let (channel, _lease, mut consumer) = FrameChannel::new(&small_config());
        assert_eq!(channel.ready(), ReadyStreams::default());

        let frames = consumer.acquire_frames();
        assert!(!frames.depth.fresh);
        assert!(!frames.color.fresh);
        assert!(!frames.depth.is_published());
        assert!(frames.depth.pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_depth_frame_size_mismatch() {
        let (channel, _lease, _consumer) = FrameChannel::new(&small_config());
        let err = channel.publish_depth(&[1, 2, 3], 0).unwrap_err();
        assert_eq!(
            err,
            ChannelError::FrameSize {
                stream: StreamKind::Depth,
                expected: 8,
                actual: 3,
            }
        );
        assert_eq!(channel.stats().depth, StreamStats::default());
        assert!(!channel.ready().depth);
    }

    #[test]
    fn test_forged_lease_is_protocol_violation() {
        let (channel, lease, _consumer) = FrameChannel::new(&small_config());
        let wrong = SlotId::ALL
            .into_iter()
            .find(|s| *s != lease.slot())
            .unwrap();

        let err = channel
            .publish_color(ColorLease::forge(wrong), 7)
            .unwrap_err();
        assert_eq!(
            err,
            ChannelError::ProtocolViolation {
                stream: StreamKind::Color,
                completed: wrong,
                expected: lease.slot(),
            }
        );
        // Nothing moved
        assert!(!channel.ready().color);
        assert_eq!(
            channel.role_of(StreamKind::Color, lease.slot()),
            SlotRole::Producing
        );
    }

    #[test]
    fn test_publish_after_shutdown_is_dropped() {
        let (channel, lease, consumer) = FrameChannel::new(&small_config());
        channel.shutdown();

        let outcome = channel.publish_depth(&[100; 8], 1).unwrap();
        assert_eq!(outcome, PublishOutcome::Dropped);

        let original_slot = lease.slot();
        let (lease, outcome) = channel.publish_color(lease, 2).unwrap();
        assert_eq!(outcome, PublishOutcome::Dropped);
        assert_eq!(lease.slot(), original_slot);

        let stats = channel.stats();
        assert_eq!(stats.depth.dropped, 1);
        assert_eq!(stats.color.dropped, 1);
        assert_eq!(stats.depth.published, 0);
        assert_eq!(consumer.wait_for_frames(), None);
    }

    #[test]
    fn test_shutdown_wakes_blocked_consumer() {
        let (channel, _lease, consumer) = FrameChannel::new(&small_config());
        let waiter = thread::spawn(move || consumer.wait_for_frames());

        thread::sleep(Duration::from_millis(20));
        channel.shutdown();
        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn test_wait_timeout_returns_empty() {
        let (_channel, _lease, consumer) = FrameChannel::new(&small_config());
        let ready = consumer
            .wait_for_frames_timeout(Duration::from_millis(5))
            .unwrap();
        assert!(!ready.any());
    }

    #[test]
    fn test_consumer_wakes_on_single_stream() {
        let (channel, _lease, consumer) = FrameChannel::new(&small_config());
        channel.publish_depth(&[300; 8], 1).unwrap();

        let ready = consumer.wait_for_frames().unwrap();
        assert_eq!(
            ready,
            ReadyStreams {
                depth: true,
                color: false
            }
        );
    }

    #[test]
    fn test_both_streams_policy_waits_for_color() {
        let config = ChannelConfig {
            redraw_policy: RedrawPolicy::BothStreams,
            ..small_config()
        };
        let (channel, lease, consumer) = FrameChannel::new(&config);
        channel.publish_depth(&[300; 8], 1).unwrap();

        let ready = consumer
            .wait_for_frames_timeout(Duration::from_millis(5))
            .unwrap();
        assert!(!ready.any());

        channel.publish_color(lease, 2).unwrap();
        let ready = consumer.wait_for_frames().unwrap();
        assert!(ready.both());
    }

    #[test]
    fn test_acquire_latest_claims_only_that_stream() {
        let (channel, lease, mut consumer) = FrameChannel::new(&small_config());
        channel.publish_depth(&[300; 8], 11).unwrap();
        channel.publish_color(lease, 22).unwrap();

        {
            let depth = consumer.acquire_latest(StreamKind::Depth);
            assert!(depth.fresh);
            assert_eq!(depth.timestamp, 11);
            assert_eq!(depth.sequence, 1);
        }
        assert_eq!(
            channel.ready(),
            ReadyStreams {
                depth: false,
                color: true
            }
        );

        let again = consumer.acquire_latest(StreamKind::Depth);
        assert!(!again.fresh);
        assert_eq!(again.timestamp, 11);
    }

    #[test]
    fn test_overwritten_frames_are_counted() {
        let (channel, _lease, mut consumer) = FrameChannel::new(&small_config());
        for ts in 0..5 {
            channel.publish_depth(&[300; 8], ts).unwrap();
        }
        let _ = consumer.acquire_frames();

        let stats = channel.stats();
        assert_eq!(stats.depth.published, 5);
        assert_eq!(stats.depth.overwritten, 4);
        assert_eq!(stats.depth.claimed, 1);
        assert!(channel.rings_consistent());
    }

    #[test]
    fn test_unbounded_timeout_still_wakes_on_publish() {
        let (channel, _lease, consumer) = FrameChannel::new(&small_config());

        let producer = Arc::clone(&channel);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.publish_depth(&[300; 8], 1).unwrap();
        });

        let ready = consumer.wait_for_frames_timeout(Duration::MAX).unwrap();
        assert!(ready.depth);
        handle.join().unwrap();
    }
}
