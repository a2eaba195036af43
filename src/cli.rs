// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands that run without the terminal viewer
//!
//! This module provides command-line functionality for:
//! - Running a capture session headless for a fixed time
//! - Printing the effective configuration

use depthcam_view::backends::{LoopAction, SyntheticSensor};
use depthcam_view::channel::{DisplayFrames, StreamKind};
use depthcam_view::config::Config;
use depthcam_view::consumer::{FrameSink, PassReport};
use depthcam_view::errors::AppResult;
use depthcam_view::session::Session;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Sink that only prints progress, stopping once the deadline passes
struct ProgressSink {
    start: Instant,
    deadline: Duration,
    last_print: Instant,
}

impl FrameSink for ProgressSink {
    fn present(
        &mut self,
        frames: &DisplayFrames<'_>,
        report: &PassReport,
    ) -> AppResult<LoopAction> {
        if self.last_print.elapsed() >= Duration::from_millis(250) {
            self.last_print = Instant::now();
            let fps = report
                .fps
                .map(|fps| format!("{:.1}", fps))
                .unwrap_or_else(|| "--".to_string());
            print!(
                "\rPass {:>6} | depth #{:<6} color #{:<6} | {} fps",
                report.pass,
                frames.get(StreamKind::Depth).sequence,
                frames.get(StreamKind::Color).sequence,
                fps
            );
            std::io::Write::flush(&mut std::io::stdout())?;
        }

        Ok(if self.start.elapsed() >= self.deadline {
            LoopAction::Stop
        } else {
            LoopAction::Continue
        })
    }
}

/// Run a synthetic capture session without a display
pub fn run_headless(config: Config, duration: u64) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Capturing {}x{} (depth {} fps, color {} fps, {:?})",
        config.width, config.height, config.depth_fps, config.color_fps, config.redraw_policy
    );
    println!("Duration: {} seconds (press Ctrl+C to stop early)", duration);
    println!();

    let sensor = SyntheticSensor::new(config.synthetic_settings())?;
    let mut session = Session::start(&config, sensor, Arc::new(AtomicBool::new(false)))?;

    // Set up Ctrl+C handler
    let stop_flag = session.stop_signal();
    ctrlc::set_handler(move || {
        stop_flag.store(true, Ordering::SeqCst);
    })?;

    let now = Instant::now();
    let mut sink = ProgressSink {
        start: now,
        deadline: Duration::from_secs(duration),
        last_print: now,
    };
    let summary = session.run_consumer(&mut sink)?;
    println!();
    if now.elapsed() < sink.deadline {
        println!("Stopped early");
    }

    let stats = session.shutdown()?;

    println!();
    println!("Render passes:     {}", summary.passes);
    if let Some(fps) = summary.fps {
        println!("Render rate:       {:.1} fps", fps);
    }
    for stream in StreamKind::ALL {
        let counters = stats.stream(stream);
        let (shown, skipped) = match stream {
            StreamKind::Depth => (summary.depth_frames, summary.depth_skipped),
            StreamKind::Color => (summary.color_frames, summary.color_skipped),
        };
        println!(
            "{:<6} published {:>6}, shown {:>6}, skipped {:>6}, dropped after close {}",
            stream, counters.published, shown, skipped, counters.dropped
        );
    }

    Ok(())
}

/// Print the effective configuration and where it is stored
///
/// With `save` the printed configuration, CLI overrides included, becomes
/// the stored one.
pub fn print_config(config: &Config, save: bool) -> Result<(), Box<dyn std::error::Error>> {
    if save {
        let path = config.save()?;
        println!("# saved to {}", path.display());
    } else {
        match Config::path() {
            Ok(path) => println!("# {}", path.display()),
            Err(e) => println!("# {}", e),
        }
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
