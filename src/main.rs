// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use depthcam_view::Config;
use depthcam_view::channel::RedrawPolicy;

mod cli;

#[derive(Parser)]
#[command(name = "depthcam-view")]
#[command(about = "Depth camera viewer with a triple-buffered frame handoff")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Depth stream rate (overrides the config file)
    #[arg(long, global = true)]
    depth_fps: Option<u32>,

    /// Color stream rate (overrides the config file)
    #[arg(long, global = true)]
    color_fps: Option<u32>,

    /// Redraw only once both streams have a new frame
    #[arg(long, global = true)]
    both_streams: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run in terminal mode (renders the overlay to the terminal)
    Terminal,

    /// Capture without a display and print frame statistics
    Headless {
        /// Capture duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the config file as well
        #[arg(long)]
        save: bool,
    },
}

impl Cli {
    /// Apply command line overrides on top of the loaded config
    fn apply(&self, config: &mut Config) {
        if let Some(fps) = self.depth_fps {
            config.depth_fps = fps;
        }
        if let Some(fps) = self.color_fps {
            config.color_fps = fps;
        }
        if self.both_streams {
            config.redraw_policy = RedrawPolicy::BothStreams;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=depthcam_view=debug, RUST_LOG=info
    // The terminal viewer owns the screen, so only errors get through by default.
    let default_level = match cli.command {
        None | Some(Commands::Terminal) => "error",
        Some(_) => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load()?;
    cli.apply(&mut config);
    config.validate()?;

    match cli.command {
        Some(Commands::Terminal) | None => depthcam_view::terminal::run(config),
        Some(Commands::Headless { duration }) => cli::run_headless(config, duration),
        Some(Commands::Config { save }) => cli::print_config(&config, save),
    }
}
