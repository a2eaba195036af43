// SPDX-License-Identifier: GPL-3.0-only

//! Depth colorizer
//!
//! Maps raw depth samples to a banded RGBA color ramp through a gradient
//! lookup table that is computed once and only read afterwards.
//!
//! The table follows a cubic curve so that near samples spread over more of
//! the ramp than far ones:
//!
//! ```text
//! table[i] = (i / reference)^exponent * gain * 256
//! ```
//!
//! Each table value is divided by four; the upper byte selects one of six
//! bands and the lower byte is the position inside the band.

use serde::{Deserialize, Serialize};

use super::constants::{
    DEPTH_ALPHA, DEPTH_COLOR_BANDS, DEPTH_LUT_EXPONENT, DEPTH_LUT_GAIN, DEPTH_LUT_REFERENCE,
    DEPTH_LUT_SIZE, DEPTH_NO_RETURN,
};

/// Shape of the gradient lookup table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientConfig {
    /// Number of table entries (raw samples beyond are clamped)
    pub table_len: usize,
    /// Raw sample value that normalizes to 1.0
    pub reference: f32,
    /// Power applied to the normalized sample
    pub exponent: f32,
    /// Gain applied after the power curve, in units of 256 steps
    pub gain: f32,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            table_len: DEPTH_LUT_SIZE,
            reference: DEPTH_LUT_REFERENCE,
            exponent: DEPTH_LUT_EXPONENT,
            gain: DEPTH_LUT_GAIN,
        }
    }
}

/// Precomputed depth to RGBA mapping
///
/// Immutable after [`DepthColorizer::build`], so it can be shared between
/// threads without synchronization.
#[derive(Debug, Clone)]
pub struct DepthColorizer {
    table: Box<[u16]>,
}

impl DepthColorizer {
    /// Build the lookup table for the given curve
    ///
    /// Curve values that do not fit in 16 bits saturate to `u16::MAX`,
    /// which lands past the last band and renders transparent.
    pub fn build(config: &GradientConfig) -> Self {
        let len = config.table_len.max(1);
        let table = (0..len)
            .map(|i| {
                let v = (i as f32 / config.reference).powf(config.exponent);
                (v * config.gain * 256.0) as u16
            })
            .collect();
        Self { table }
    }

    /// Number of entries in the lookup table
    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    /// Raw table value for a sample, after clamping to the table domain
    #[inline]
    pub fn gradient(&self, sample: u16) -> u16 {
        let idx = (sample as usize).min(self.table.len() - 1);
        self.table[idx]
    }

    /// Band index a sample falls into (values >= 6 are past the ramp)
    #[inline]
    pub fn band(&self, sample: u16) -> u16 {
        (self.gradient(sample) / 4) >> 8
    }

    /// Map one raw depth sample to RGBA
    #[inline]
    pub fn colorize(&self, sample: u16) -> [u8; 4] {
        let pval = self.gradient(sample) / 4;
        let lb = (pval & 0xff) as u8;

        let alpha = if sample == DEPTH_NO_RETURN {
            0
        } else {
            DEPTH_ALPHA
        };

        match pval >> 8 {
            0 => [255, 255 - lb, 255 - lb, alpha],
            1 => [255, lb, 0, alpha],
            2 => [255 - lb, 255, 0, alpha],
            3 => [0, 255, lb, alpha],
            4 => [0, 255 - lb, 255, alpha],
            5 => [0, 0, 255 - lb, alpha],
            _ => [0, 0, 0, 0],
        }
    }

    /// Colorize a whole frame of raw samples into an RGBA buffer
    ///
    /// Writes `min(raw.len(), rgba.len() / 4)` pixels.
    pub fn colorize_frame(&self, raw: &[u16], rgba: &mut [u8]) {
        let whole = rgba.len() / 4 * 4;
        let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(&mut rgba[..whole]);
        for (out, &sample) in pixels.iter_mut().zip(raw) {
            *out = self.colorize(sample);
        }
    }

    /// First raw sample whose color is past the last band, if any
    ///
    /// Table entries beyond `u16::MAX` are unreachable and not searched.
    pub fn far_limit(&self) -> Option<u16> {
        let last = (self.table.len() - 1).min(u16::MAX as usize) as u16;
        (0..=last).find(|&s| self.band(s) >= DEPTH_COLOR_BANDS)
    }
}

impl Default for DepthColorizer {
    fn default() -> Self {
        Self::build(&GradientConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_monotonic() {
        let colorizer = DepthColorizer::default();
        let mut prev = 0u16;
        for s in 0..colorizer.table_len() as u16 {
            let g = colorizer.gradient(s);
            assert!(g >= prev, "table decreased at sample {}", s);
            prev = g;
        }
    }

    #[test]
    fn test_near_sample_is_white_translucent() {
        let colorizer = DepthColorizer::default();
        assert_eq!(colorizer.colorize(1), [255, 255, 255, DEPTH_ALPHA]);
    }

    #[test]
    fn test_sample_500() {
        // (500 / 2048)^3 * 36 * 256 = 134.1 -> 134, / 4 = 33
        let colorizer = DepthColorizer::default();
        assert_eq!(colorizer.gradient(500), 134);
        assert_eq!(colorizer.colorize(500), [255, 222, 222, DEPTH_ALPHA]);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let colorizer = DepthColorizer::default();
        assert_eq!(colorizer.colorize(u16::MAX), colorizer.colorize(9_999));
        assert_eq!(colorizer.colorize(u16::MAX), [0, 0, 0, 0]);
    }

    #[test]
    fn test_far_limit_is_transparent() {
        let colorizer = DepthColorizer::default();
        let limit = colorizer.far_limit().expect("default curve leaves the ramp");
        assert_eq!(colorizer.band(limit - 1), DEPTH_COLOR_BANDS - 1);
        assert_eq!(colorizer.colorize(limit), [0, 0, 0, 0]);
    }

    #[test]
    fn test_colorize_frame_writes_rgba() {
        let colorizer = DepthColorizer::default();
        let raw = [0u16, 500, u16::MAX];
        let mut rgba = [7u8; 12];
        colorizer.colorize_frame(&raw, &mut rgba);
        assert_eq!(&rgba[0..4], &[255, 255, 255, 0]);
        assert_eq!(&rgba[4..8], &[255, 222, 222, DEPTH_ALPHA]);
        assert_eq!(&rgba[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_single_entry_table() {
        let colorizer = DepthColorizer::build(&GradientConfig {
            table_len: 0,
            ..GradientConfig::default()
        });
        assert_eq!(colorizer.table_len(), 1);
        assert_eq!(colorizer.colorize(0)[3], 0);
        assert_eq!(colorizer.colorize(1234)[3], DEPTH_ALPHA);
    }

    #[test]
    fn test_far_limit_on_oversized_table() {
        let flat = DepthColorizer::build(&GradientConfig {
            table_len: 70_000,
            gain: 0.000_001,
            ..GradientConfig::default()
        });
        assert_eq!(flat.far_limit(), None);

        let steep = DepthColorizer::build(&GradientConfig {
            table_len: 70_000,
            ..GradientConfig::default()
        });
        let limit = steep.far_limit().unwrap();
        assert_eq!(Some(limit), DepthColorizer::default().far_limit());
        assert!(steep.band(limit) >= DEPTH_COLOR_BANDS);
        assert!(steep.band(limit - 1) < DEPTH_COLOR_BANDS);
    }
}
