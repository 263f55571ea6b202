//! Lossless muxing of the separate video and audio streams
//!
//! The core abstraction is the [`Merger`] trait. Two implementations are provided:
//!
//! - [`FfmpegMerger`]: runs an external `ffmpeg` with stream copy (no re-encoding)
//! - [`MissingMerger`]: stand-in when no ffmpeg is available; every merge fails
//!
//! A merger never retries and never deletes its inputs; the task lifecycle cleans
//! up the temporary artifacts whatever the outcome.

use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

/// Combines a video-only and an audio-only file into one container
#[async_trait]
pub trait Merger: Send + Sync {
    /// Produce `output` from `video` and `audio` without re-encoding
    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Merger backed by the external `ffmpeg` binary
pub struct FfmpegMerger {
    binary_path: PathBuf,
}

impl FfmpegMerger {
    /// Create a merger with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find ffmpeg in PATH
    ///
    /// # Returns
    ///
    /// `Some(FfmpegMerger)` if the binary is found, `None` otherwise.
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Path of the binary this merger invokes
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl Merger for FfmpegMerger {
    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let result = Command::new(&self.binary_path)
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-c:v", "copy", "-c:a", "copy"])
            // never overwrite an archived file
            .arg("-n")
            .arg(output)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute ffmpeg: {}", e)))?;

        if result.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        let reason = match (result.status.code(), stderr.trim().lines().last()) {
            (Some(code), Some(line)) => format!("ffmpeg exited with {code}: {line}"),
            (Some(code), None) => format!("ffmpeg exited with {code}"),
            (None, _) => "ffmpeg terminated by signal".to_string(),
        };
        Err(Error::Merge {
            output: output.to_path_buf(),
            reason,
        })
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Merger used when ffmpeg could not be located
///
/// Fails every merge with [`Error::NotSupported`] so the absence surfaces as a task
/// failure rather than an engine fault.
pub struct MissingMerger;

#[async_trait]
impl Merger for MissingMerger {
    async fn merge(&self, _video: &Path, _audio: &Path, output: &Path) -> Result<()> {
        Err(Error::NotSupported(format!(
            "cannot produce {}: ffmpeg not found (set tools.ffmpeg_path)",
            output.display()
        )))
    }

    fn name(&self) -> &'static str {
        "missing"
    }
}

/// Select the merger described by the tools configuration
pub fn from_config(tools: &ToolsConfig) -> Arc<dyn Merger> {
    if let Some(path) = &tools.ffmpeg_path {
        tracing::info!(path = %path.display(), "Using configured ffmpeg");
        return Arc::new(FfmpegMerger::new(path.clone()));
    }
    if tools.search_path
        && let Some(merger) = FfmpegMerger::from_path()
    {
        tracing::info!(path = %merger.binary_path().display(), "Found ffmpeg in PATH");
        return Arc::new(merger);
    }
    tracing::warn!("ffmpeg not available, merges will fail");
    Arc::new(MissingMerger)
}
