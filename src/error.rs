//! Error types for archiver-dl
//!
//! This module provides the error taxonomy used by the download engine:
//! - Admission errors (no usable source URL)
//! - The "already exists" skip condition
//! - Transfer errors (chunk failures, write failures, bad responses)
//! - Merge errors (external muxing tool)
//! - Configuration and lifecycle errors

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for archiver-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for archiver-dl
///
/// Every per-task error is recovered inside the task lifecycle and surfaced through
/// logs and events; only construction-time errors are fatal to the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.chunk_concurrency")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Neither the primary nor the backup URL passed the existence probe
    #[error("invalid download source for {name}: status {primary_status}/{backup_status}")]
    InvalidSource {
        /// File name of the transfer destination
        name: String,
        /// Probe status of the primary URL ("none" when no response was received)
        primary_status: ProbeStatus,
        /// Probe status of the backup URL ("none" when no response was received)
        backup_status: ProbeStatus,
    },

    /// Destination already present on disk; the work is treated as already archived
    #[error("destination already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Transfer-related error
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Muxing the video and audio streams failed
    #[error("merge failed for {}: {reason}", output.display())]
    Merge {
        /// The output container that could not be produced
        output: PathBuf,
        /// The reason the merge failed
        reason: String,
    },

    /// External tool execution failed (ffmpeg, hook scripts)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Invalid task group registration
    #[error("invalid task group: {0}")]
    InvalidGroup(String),

    /// The queue processor was already started for this downloader
    #[error("queue processor already started")]
    AlreadyStarted,

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised while moving bytes for a single transfer
#[derive(Debug, Error)]
pub enum TransferError {
    /// The origin answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        /// The requested URL
        url: String,
        /// The HTTP status code returned
        status: u16,
    },

    /// The origin ignored the Range header and answered with the full body
    #[error("{url} ignored range request (HTTP {status})")]
    UnexpectedStatus {
        /// The requested URL
        url: String,
        /// The HTTP status code returned
        status: u16,
    },

    /// The body ended before the requested range was filled
    #[error("chunk {start}-{end} ended early after {received} bytes")]
    IncompleteChunk {
        /// First byte offset of the chunk
        start: u64,
        /// Last byte offset of the chunk (inclusive)
        end: u64,
        /// Number of bytes actually received
        received: u64,
    },

    /// Positional write into the destination file failed
    #[error("failed to write at offset {offset}: {source}")]
    Write {
        /// Byte offset of the failed write
        offset: u64,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The probe succeeded but did not report a content length
    #[error("{url} did not report a content length")]
    SizeUnknown {
        /// The probed URL
        url: String,
    },

    /// A chunk worker panicked or was aborted
    #[error("chunk worker failed: {0}")]
    Join(String),
}

/// HTTP status observed by an existence probe, or none if no response arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeStatus(pub Option<u16>);

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(code) => write!(f, "{code}"),
            None => f.write_str("none"),
        }
    }
}

impl Error {
    /// Build a configuration error for the given key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error is the "already exists" skip condition rather than a real failure
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }

    /// Machine-readable error code, used in structured log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidSource { .. } => "invalid_source",
            Error::AlreadyExists(_) => "already_exists",
            Error::Transfer(e) => match e {
                TransferError::HttpStatus { .. } => "http_status",
                TransferError::UnexpectedStatus { .. } => "range_ignored",
                TransferError::IncompleteChunk { .. } => "incomplete_chunk",
                TransferError::Write { .. } => "write_failed",
                TransferError::SizeUnknown { .. } => "size_unknown",
                TransferError::Join(_) => "worker_failed",
            },
            Error::Merge { .. } => "merge_failed",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::InvalidGroup(_) => "invalid_group",
            Error::AlreadyStarted => "already_started",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}
