// SPDX-License-Identifier: GPL-3.0-only

//! Depth colorizer constants - Single source of truth
//!
//! Gradient curve parameters and palette constants used by the colorizer.

/// Number of entries in the gradient lookup table
///
/// Raw samples at or above this value are clamped to the last entry.
pub const DEPTH_LUT_SIZE: usize = 10_000;

/// Raw sample value that normalizes to 1.0 on the gradient curve
/// (the 11-bit disparity range of the sensor)
pub const DEPTH_LUT_REFERENCE: f32 = 2048.0;

/// Power applied to the normalized sample
pub const DEPTH_LUT_EXPONENT: f32 = 3.0;

/// Linear gain applied after the power curve, in units of 256 steps
pub const DEPTH_LUT_GAIN: f32 = 36.0;

/// Raw depth value reported when the sensor saw no return
pub const DEPTH_NO_RETURN: u16 = 0;

/// Alpha given to every pixel with a valid depth sample
pub const DEPTH_ALPHA: u8 = 128;

/// Number of bands in the color ramp (white, red, yellow, green, cyan, blue, black)
pub const DEPTH_COLOR_BANDS: u16 = 6;
