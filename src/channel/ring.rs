// SPDX-License-Identifier: GPL-3.0-only

//! Three-slot role rotation
//!
//! A [`TripleSlotRing`] tracks which of three physical buffers plays which
//! role. It never touches pixel data; the frame channel keeps the buffers
//! and uses the ring to decide who may access which slot.
//!
//! ```text
//! producer ──► [Producing] ──publish──► [Ready] ──claim──► [Displaying] ──► consumer
//!                  ▲                       │
//!                  └──────── recycle ──────┘   (color policy only)
//! ```

use std::fmt;

/// Identity of one of the three physical buffers of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u8);

impl SlotId {
    /// All slot identities in index order
    pub const ALL: [SlotId; 3] = [SlotId(0), SlotId(1), SlotId(2)];

    /// Index into the physical buffer array
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        SlotId(index as u8)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a slot at a given moment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRole {
    /// Writable by the producer (for depth: the driver's own buffer)
    Producing,
    /// Latest complete frame, not yet claimed by the consumer
    Ready,
    /// Being read by the consumer
    Displaying,
}

impl SlotRole {
    pub const ALL: [SlotRole; 3] = [SlotRole::Producing, SlotRole::Ready, SlotRole::Displaying];
}

/// How a stream hands buffers back and forth with its producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingPolicy {
    /// The driver fills a buffer of its own; the producer writes the
    /// processed frame straight into the `Ready` slot.
    Depth,
    /// The capture subsystem fills the `Producing` slot and must be handed a
    /// fresh buffer on every completion.
    Color,
}

/// Errors from an invalid rotation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// The completed slot is not the slot the producer was allowed to write
    NotWriteTarget { completed: SlotId, expected: SlotId },
}

/// Result of a successful publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    /// Slot now holding the latest frame
    pub ready: SlotId,
    /// Slot handed back to the producer (color policy only)
    pub recycled: Option<SlotId>,
}

/// Role state machine over three slots
///
/// The role table is always a permutation of the three roles. Every
/// transition is a swap of two entries, so no slot is ever lost or
/// duplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripleSlotRing {
    policy: RingPolicy,
    roles: [SlotRole; 3],
}

impl TripleSlotRing {
    /// Slot 0 producing, slot 1 ready, slot 2 displaying
    pub fn new(policy: RingPolicy) -> Self {
        Self {
            policy,
            roles: [SlotRole::Producing, SlotRole::Ready, SlotRole::Displaying],
        }
    }

    /// Slot currently holding `role`
    pub fn slot(&self, role: SlotRole) -> SlotId {
        // A bijective table always contains every role; slot 0 is never
        // reached unless the table is corrupt, which is_bijection reports.
        SlotId::ALL
            .into_iter()
            .find(|s| self.roles[s.index()] == role)
            .unwrap_or(SlotId(0))
    }

    /// Role currently held by `slot`
    pub fn role_of(&self, slot: SlotId) -> SlotRole {
        self.roles[slot.index()]
    }

    /// Slot the producer may write the next frame into
    pub fn write_target(&self) -> SlotId {
        match self.policy {
            RingPolicy::Depth => self.slot(SlotRole::Ready),
            RingPolicy::Color => self.slot(SlotRole::Producing),
        }
    }

    /// Record that the producer finished writing `completed`
    ///
    /// Under the color policy the previous `Ready` slot is recycled as the
    /// new `Producing` slot. It was never claimed, so nothing reads it; the
    /// `Displaying` slot is never recycled. An unclaimed ready frame is
    /// simply superseded.
    pub fn publish(&mut self, completed: SlotId) -> Result<Rotation, RingError> {
        let expected = self.write_target();
        if completed != expected {
            return Err(RingError::NotWriteTarget {
                completed,
                expected,
            });
        }

        match self.policy {
            RingPolicy::Depth => Ok(Rotation {
                ready: completed,
                recycled: None,
            }),
            RingPolicy::Color => {
                let stale = self.slot(SlotRole::Ready);
                self.swap(completed, stale);
                Ok(Rotation {
                    ready: completed,
                    recycled: Some(stale),
                })
            }
        }
    }

    /// Move the `Ready` slot to `Displaying` and return it
    ///
    /// The previously displayed slot becomes `Ready` and will be
    /// overwritten (depth) or recycled (color) by the next publish.
    pub fn claim(&mut self) -> SlotId {
        let ready = self.slot(SlotRole::Ready);
        let displaying = self.slot(SlotRole::Displaying);
        self.swap(ready, displaying);
        ready
    }

    /// Whether every role is held by exactly one slot
    pub fn is_bijection(&self) -> bool {
        SlotRole::ALL
            .iter()
            .all(|role| self.roles.iter().filter(|r| *r == role).count() == 1)
    }

    fn swap(&mut self, a: SlotId, b: SlotId) {
        self.roles.swap(a.index(), b.index());
    }
}
