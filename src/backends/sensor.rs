// SPDX-License-Identifier: GPL-3.0-only

//! Sensor source abstraction
//!
//! A sensor source is the capture subsystem seen from the producer thread:
//! it announces when a depth or color frame is complete and copies the frame
//! contents out on request.

use std::time::Duration;

use crate::errors::AppResult;

/// A completed capture announced by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorEvent {
    /// A depth frame is ready to be read with [`SensorSource::read_depth`]
    Depth { timestamp: u32 },
    /// A color frame is ready to be read with [`SensorSource::read_color`]
    Color { timestamp: u32 },
    /// Nothing completed within the wait budget
    Idle,
}

/// Producer-side device abstraction
pub trait SensorSource: Send {
    /// Human-readable device name
    fn name(&self) -> &str;

    /// Frame geometry shared by both streams
    fn resolution(&self) -> (u32, u32);

    /// Wait up to `max_wait` for the next completed frame
    fn next_event(&mut self, max_wait: Duration) -> AppResult<SensorEvent>;

    /// Copy the latest depth frame (one raw sample per pixel)
    fn read_depth(&mut self, raw: &mut [u16]);

    /// Fill an RGB buffer (3 bytes per pixel) with the latest color frame
    fn read_color(&mut self, rgb: &mut [u8]);
}
