// SPDX-License-Identifier: GPL-3.0-only

//! Capture side of the viewer
//!
//! ```text
//! ┌──────────────────┐   events    ┌───────────────┐  publish   ┌──────────────┐
//! │   SensorSource   │ ──────────▶ │ CaptureBridge │ ─────────▶ │ FrameChannel │
//! │ (synthetic, ...) │ read_depth  │               │            │              │
//! └──────────────────┘ read_color  └───────────────┘            └──────────────┘
//!                                   runs inside a CaptureLoopController thread
//! ```

mod frame_loop;
mod producer;
mod sensor;
mod synthetic;

pub use frame_loop::{CaptureLoopController, LoopAction};
pub use producer::CaptureBridge;
pub use sensor::{SensorEvent, SensorSource};
pub use synthetic::{SyntheticSensor, SyntheticSettings};
