// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Frame geometry of the medium-resolution sensor mode
pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;

/// Bytes per pixel of a colorized depth frame (RGBA)
pub const DEPTH_BYTES_PER_PIXEL: usize = 4;
/// Bytes per pixel of a color frame (RGB)
pub const COLOR_BYTES_PER_PIXEL: usize = 3;

/// Nominal stream rates
///
/// In YUV capture mode the color stream only arrives at half the depth
/// rate, which is why the two streams are never forced into lock-step.
pub const DEFAULT_DEPTH_FPS: u32 = 30;
pub const DEFAULT_COLOR_FPS: u32 = 15;

/// Number of render passes between frame rate reports
pub const FPS_REPORT_INTERVAL: u32 = 30;

/// Longest time a consumer blocks before re-checking its stop flag
pub const CONSUMER_WAIT_TIMEOUT: Duration = Duration::from_millis(16);

/// Upper bound on how long the producer sleeps between sensor events
pub const PRODUCER_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Directory name used under the platform config dir
pub const CONFIG_DIR_NAME: &str = "depthcam-view";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Pixel count of a frame with the given geometry
pub const fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}
