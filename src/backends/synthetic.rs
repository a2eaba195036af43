// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic depth camera
//!
//! Generates a moving scene on both streams at independent rates so the
//! frame handoff can run without hardware. The depth stream shows a back
//! wall, a floor and a ball sweeping left and right, with a column of
//! missing samples (sensor shadow) next to the ball. The color stream shows
//! a vertical gradient with the ball as a bright disc.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::sensor::{SensorEvent, SensorSource};
use crate::errors::{AppError, AppResult};

/// Raw sample of the back wall (11-bit disparity units)
const WALL_SAMPLE: u16 = 1000;
/// Raw sample at the bottom row of the floor
const FLOOR_NEAR_SAMPLE: u16 = 600;
/// Raw sample at the centre of the ball
const BALL_SAMPLE: u16 = 450;
/// Ball radius as a fraction of the frame height
const BALL_RADIUS: f32 = 0.18;
/// Time for the ball to cross the frame once
const SWEEP_PERIOD: Duration = Duration::from_secs(4);

/// Rates and geometry of a [`SyntheticSensor`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticSettings {
    pub width: u32,
    pub height: u32,
    pub depth_fps: u32,
    pub color_fps: u32,
}

/// Scheduling state for one stream
#[derive(Debug)]
struct StreamClock {
    period: Duration,
    next_due: Instant,
}

impl StreamClock {
    fn new(fps: u32, start: Instant) -> Self {
        Self {
            period: Duration::from_secs(1) / fps.max(1),
            next_due: start,
        }
    }

    fn advance(&mut self, now: Instant) {
        self.next_due += self.period;
        // Don't try to catch up after a stall; resume at the nominal rate.
        if self.next_due < now {
            self.next_due = now + self.period;
        }
    }
}

/// A fake sensor producing depth and color at their own cadences
#[derive(Debug)]
pub struct SyntheticSensor {
    name: String,
    width: u32,
    height: u32,
    start: Instant,
    depth_clock: StreamClock,
    color_clock: StreamClock,
    /// Capture time of the frame announced last, per stream
    depth_time: Instant,
    color_time: Instant,
}

impl SyntheticSensor {
    pub fn new(settings: SyntheticSettings) -> AppResult<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(AppError::Sensor(format!(
                "invalid synthetic resolution {}x{}",
                settings.width, settings.height
            )));
        }
        if settings.depth_fps == 0 || settings.color_fps == 0 {
            return Err(AppError::Sensor(
                "synthetic stream rates must be non-zero".to_string(),
            ));
        }

        let start = Instant::now();
        debug!(
            width = settings.width,
            height = settings.height,
            depth_fps = settings.depth_fps,
            color_fps = settings.color_fps,
            "Synthetic sensor created"
        );
        Ok(Self {
            name: format!("Synthetic sensor {}x{}", settings.width, settings.height),
            width: settings.width,
            height: settings.height,
            start,
            depth_clock: StreamClock::new(settings.depth_fps, start),
            color_clock: StreamClock::new(settings.color_fps, start),
            depth_time: start,
            color_time: start,
        })
    }

    /// Capture timestamp in milliseconds since the sensor started
    fn timestamp(&self, at: Instant) -> u32 {
        // Wraps like a hardware counter
        at.duration_since(self.start).as_millis() as u32
    }

    /// Ball centre and radius in pixels at capture time `at`
    fn ball(&self, at: Instant) -> (f32, f32, f32) {
        let t = at.duration_since(self.start).as_secs_f32() / SWEEP_PERIOD.as_secs_f32();
        // Triangle wave 0..1..0
        let phase = t.fract();
        let sweep = if phase < 0.5 { phase * 2.0 } else { 2.0 - phase * 2.0 };
        let radius = self.height as f32 * BALL_RADIUS;
        let x = radius + sweep * (self.width as f32 - 2.0 * radius);
        let y = self.height as f32 * 0.45;
        (x, y, radius)
    }
}

impl SensorSource for SyntheticSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_event(&mut self, max_wait: Duration) -> AppResult<SensorEvent> {
        let now = Instant::now();
        let (due, is_depth) = if self.depth_clock.next_due <= self.color_clock.next_due {
            (self.depth_clock.next_due, true)
        } else {
            (self.color_clock.next_due, false)
        };

        if due > now {
            let wait = due - now;
            if wait > max_wait {
                thread::sleep(max_wait);
                return Ok(SensorEvent::Idle);
            }
            thread::sleep(wait);
        }

        let now = Instant::now();
        if is_depth {
            self.depth_clock.advance(now);
            self.depth_time = now;
            Ok(SensorEvent::Depth {
                timestamp: self.timestamp(now),
            })
        } else {
            self.color_clock.advance(now);
            self.color_time = now;
            Ok(SensorEvent::Color {
                timestamp: self.timestamp(now),
            })
        }
    }

    fn read_depth(&mut self, raw: &mut [u16]) {
        let (bx, by, radius) = self.ball(self.depth_time);
        let w = self.width as usize;
        let horizon = self.height as f32 * 0.6;

        for (i, sample) in raw.iter_mut().enumerate() {
            let x = (i % w) as f32;
            let y = (i / w) as f32;

            let dx = x - bx;
            let dy = y - by;
            let dist2 = dx * dx + dy * dy;

            *sample = if dist2 <= radius * radius {
                // Sphere surface: nearest at the centre
                let bulge = (1.0 - dist2 / (radius * radius)).sqrt();
                BALL_SAMPLE + ((1.0 - bulge) * 120.0) as u16
            } else if dx > radius && dx < radius * 1.25 && dy.abs() < radius {
                // Projector shadow to the right of the ball
                0
            } else if y > horizon {
                let t = (y - horizon) / (self.height as f32 - horizon);
                WALL_SAMPLE - (t * (WALL_SAMPLE - FLOOR_NEAR_SAMPLE) as f32) as u16
            } else {
                WALL_SAMPLE
            };
        }
    }

    fn read_color(&mut self, rgb: &mut [u8]) {
        let (bx, by, radius) = self.ball(self.color_time);
        let w = self.width as usize;
        let h = self.height as f32;

        for (i, px) in rgb.chunks_exact_mut(3).enumerate() {
            let x = (i % w) as f32;
            let y = (i / w) as f32;
            let dx = x - bx;
            let dy = y - by;

            if dx * dx + dy * dy <= radius * radius {
                px.copy_from_slice(&[230, 90, 40]);
            } else {
                let shade = (y / h * 160.0) as u8;
                px.copy_from_slice(&[40 + shade / 2, 60 + shade / 2, 90 + shade]);
            }
        }
    }
}
