// SPDX-License-Identifier: GPL-3.0-only

//! Depth colorization
//!
//! Converts raw 16-bit depth samples into a translucent RGBA overlay using a
//! precomputed non-linear gradient table.

mod colorizer;
mod constants;

pub use colorizer::{DepthColorizer, GradientConfig};
pub use constants::*;
