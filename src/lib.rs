//! # archiver-dl
//!
//! Download orchestration engine for a video archiver.
//!
//! Turns a stream of "fetch this video + audio pair" requests into merged media files
//! on disk: a bounded intake queue, a fixed-size pool of simultaneously running tasks,
//! range-parallel transfers with primary/backup failover and retry, lossless muxing with
//! ffmpeg, and exactly-once completion signalling for groups of pages.
//!
//! ## Design Philosophy
//!
//! archiver-dl is designed to be:
//! - **Library-first** - No CLI or UI; the producer deciding *what* to archive lives elsewhere
//! - **Sensible defaults** - `Config::default()` works out of the box
//! - **Event-driven** - Task outcomes are observable through events and logs, never return values
//!
//! ## Quick Start
//!
//! ```no_run
//! use archiver_dl::{ArchiveDownloader, Config, Task, UrlPair};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = ArchiveDownloader::new(Config::default())?;
//!     downloader.start_queue_processor()?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     downloader
//!         .register_task_group("BV1xx411c7mD", 1, |done| {
//!             println!("archived into {}", done.output_dir.display());
//!         })
//!         .await?;
//!     downloader
//!         .add_task(
//!             Task::new(
//!                 "[1080P] Title",
//!                 UrlPair::new("https://cdn-a.example.com/v.m4s", "https://cdn-b.example.com/v.m4s"),
//!                 UrlPair::single("https://cdn-a.example.com/a.m4s"),
//!                 "/archive/fav/Title/BV1xx411c7mD-P1",
//!             )
//!             .in_group("BV1xx411c7mD"),
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download orchestrator (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Muxing of video and audio streams
pub mod merger;
/// Retry logic with a fixed interval
pub mod retry;
/// Task group completion tracking
pub mod tracker;
/// Range-parallel transfer of a single resource
pub mod transfer;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use downloader::{ArchiveDownloader, ArchiveHooks};
pub use error::{Error, ProbeStatus, Result, TransferError};
pub use merger::{FfmpegMerger, Merger, MissingMerger};
pub use tracker::{CompletionCallback, TaskGroupTracker};
pub use transfer::TransferClient;
pub use types::{Event, GroupCompletion, MediaKind, Stage, Task, UrlPair};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use archiver_dl::{ArchiveDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = ArchiveDownloader::new(Config::default())?;
///     downloader.start_queue_processor()?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: ArchiveDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, falling back to ctrl_c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
