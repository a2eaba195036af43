// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based depth viewer
//!
//! Renders the color stream with the translucent depth overlay blended on
//! top, using Unicode half-block characters for improved vertical
//! resolution.

use std::io::{self, stdout};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use tracing::{error, info};

use crate::backends::{LoopAction, SyntheticSensor};
use crate::channel::DisplayFrames;
use crate::config::{Config, ViewMode};
use crate::constants::CONSUMER_WAIT_TIMEOUT;
use crate::consumer::{FrameSink, PassOutcome, PassReport};
use crate::errors::AppResult;
use crate::session::Session;

/// Run the terminal depth viewer
pub fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let sensor = SyntheticSensor::new(config.synthetic_settings())?;
    let mut session = Session::start(&config, sensor, Arc::new(AtomicBool::new(false)))?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &mut session, config.view_mode);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Producer errors take precedence over the way the UI ended
    let stats = session.shutdown()?;
    info!(?stats, "Viewer closed");
    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut Session,
    view_mode: ViewMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut frame_widget = FrameWidget::new(view_mode);
    let mut show_help = false;
    let mut dirty = true;

    loop {
        // Block for at most one frame interval so input stays responsive
        match session
            .consumer_loop()
            .poll(&mut frame_widget, Some(CONSUMER_WAIT_TIMEOUT))?
        {
            PassOutcome::Presented(_) | PassOutcome::Stopped(_) => dirty = true,
            PassOutcome::Idle => {}
            PassOutcome::Closed => {
                error!("Frame channel closed, leaving viewer");
                break;
            }
        }

        if dirty {
            let status_message = if show_help {
                build_help_message()
            } else {
                build_status_message(&frame_widget)
            };

            terminal.draw(|f| {
                let area = f.area();

                // Reserve bottom line for status
                let frame_area = Rect {
                    x: area.x,
                    y: area.y,
                    width: area.width,
                    height: area.height.saturating_sub(1),
                };

                f.render_widget(&frame_widget, frame_area);

                // Render status bar
                let status_area = Rect {
                    x: area.x,
                    y: area.height.saturating_sub(1),
                    width: area.width,
                    height: 1,
                };

                let status = StatusBar {
                    message: &status_message,
                };
                f.render_widget(status, status_area);
            })?;
            dirty = false;
        }

        // Drain pending input without blocking; the channel wait paces the loop
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                // Resize and the like
                dirty = true;
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            dirty = true;

            // Ctrl+C to quit
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                return Ok(());
            }

            match key.code {
                // 'q' also quits
                KeyCode::Char('q') => return Ok(()),
                // 'v' to cycle the view mode
                KeyCode::Char('v') => {
                    show_help = false;
                    frame_widget.mode = frame_widget.mode.next();
                }
                // 'h' to toggle help
                KeyCode::Char('h') => show_help = !show_help,
                _ => {}
            }
        }
    }

    Ok(())
}

fn build_status_message(widget: &FrameWidget) -> String {
    let fps = widget
        .fps
        .map(|fps| format!("{:.1} fps", fps))
        .unwrap_or_else(|| "-- fps".to_string());
    format!(
        "{} | {} | depth #{} color #{} | 'v' view | 'h' help | 'q' quit",
        widget.mode.label(),
        fps,
        widget.depth_sequence,
        widget.color_sequence
    )
}

fn build_help_message() -> String {
    "v: Cycle overlay/depth/color | h: Toggle help | q/Ctrl+C: Quit".to_string()
}

/// Copy of the displayed frames taken while the consumer holds them
struct Snapshot {
    width: u32,
    height: u32,
    /// RGBA
    depth: Vec<u8>,
    /// RGB
    color: Vec<u8>,
}

/// Widget that renders the latest frames using half-block characters
///
/// Doubles as the [`FrameSink`]: each pass copies the displayed buffers so
/// drawing happens after the consumer has let go of them.
struct FrameWidget {
    mode: ViewMode,
    snapshot: Option<Snapshot>,
    fps: Option<f64>,
    depth_sequence: u64,
    color_sequence: u64,
}

impl FrameWidget {
    fn new(mode: ViewMode) -> Self {
        Self {
            mode,
            snapshot: None,
            fps: None,
            depth_sequence: 0,
            color_sequence: 0,
        }
    }
}

impl FrameSink for FrameWidget {
    fn present(
        &mut self,
        frames: &DisplayFrames<'_>,
        report: &PassReport,
    ) -> AppResult<LoopAction> {
        let depth = &frames.depth;
        let color = &frames.color;

        match &mut self.snapshot {
            Some(snapshot) => {
                // Only the streams that moved need copying
                if depth.fresh {
                    snapshot.depth.copy_from_slice(&depth.pixels);
                }
                if color.fresh {
                    snapshot.color.copy_from_slice(&color.pixels);
                }
            }
            None => {
                self.snapshot = Some(Snapshot {
                    width: depth.width,
                    height: depth.height,
                    depth: depth.pixels.to_vec(),
                    color: color.pixels.to_vec(),
                });
            }
        }

        self.fps = report.fps.or(self.fps);
        self.depth_sequence = depth.sequence;
        self.color_sequence = color.sequence;
        Ok(LoopAction::Continue)
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = &self.snapshot else {
            // No frame yet - show placeholder
            let msg = "Waiting for sensor...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };
        if area.width == 0 || area.height == 0 {
            return;
        }

        // Calculate display dimensions maintaining aspect ratio
        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64; // *2 because half-blocks

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        // Scale factors
        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(frame, self.mode, src_x, src_y_top);
                let bottom_color = sample_pixel(frame, self.mode, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

fn sample_pixel(frame: &Snapshot, mode: ViewMode, x: u32, y: u32) -> Color {
    let x = x.min(frame.width - 1) as usize;
    let y = y.min(frame.height - 1) as usize;
    let idx = y * frame.width as usize + x;

    let color = frame
        .color
        .get(idx * 3..idx * 3 + 3)
        .map(|c| [c[0], c[1], c[2]])
        .unwrap_or_default();
    let depth = frame
        .depth
        .get(idx * 4..idx * 4 + 4)
        .map(|d| [d[0], d[1], d[2], d[3]])
        .unwrap_or_default();

    let [r, g, b] = composite(mode, depth, color);
    Color::Rgb(r, g, b)
}

/// Combine one depth (RGBA) and one color (RGB) pixel for display
fn composite(mode: ViewMode, depth: [u8; 4], color: [u8; 3]) -> [u8; 3] {
    match mode {
        ViewMode::Color => color,
        // Missing samples stay black
        ViewMode::Depth => blend(depth, [0, 0, 0], true),
        ViewMode::Overlay => blend(depth, color, false),
    }
}

/// Source-alpha blend of `over` onto `under`
///
/// With `opaque` every sample with non-zero alpha is drawn at full strength.
fn blend(over: [u8; 4], under: [u8; 3], opaque: bool) -> [u8; 3] {
    let alpha = match over[3] {
        0 => 0,
        _ if opaque => 255,
        a => a as u32,
    };
    let mix = |o: u8, u: u8| ((o as u32 * alpha + u as u32 * (255 - alpha) + 127) / 255) as u8;
    [
        mix(over[0], under[0]),
        mix(over[1], under[1]),
        mix(over[2], under[2]),
    ]
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        // Render text, cut to the bar width in characters
        let text: String = self.message.chars().take(area.width as usize).collect();

        buf.set_string(
            area.x,
            area.y,
            &text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}
