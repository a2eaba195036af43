// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the frame handoff pipeline

use std::path::PathBuf;
use thiserror::Error;

use crate::channel::{SlotId, StreamKind};

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Frame channel integrity errors
    #[error("Frame channel error: {0}")]
    Channel(#[from] ChannelError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Sensor source errors
    #[error("Sensor error: {0}")]
    Sensor(String),
    /// Terminal or other I/O failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the frame channel
///
/// Neither variant mutates channel state: the rejected call leaves every
/// role, flag and buffer as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The capture subsystem completed a buffer that is not the one it was
    /// handed. Buffer ownership is broken somewhere outside the channel.
    #[error("{stream:?} stream completed slot {completed} but slot {expected} is the write target")]
    ProtocolViolation {
        stream: StreamKind,
        completed: SlotId,
        expected: SlotId,
    },
    /// A published frame does not have the channel's pixel count
    #[error("{stream:?} frame has {actual} samples, expected {expected}")]
    FrameSize {
        stream: StreamKind,
        expected: usize,
        actual: usize,
    },
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform configuration directory could be determined
    #[error("No configuration directory available")]
    NoConfigDir,
    /// Config file could not be read or written
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file is not valid JSON for [`crate::Config`]
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A value is out of its allowed range
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}
